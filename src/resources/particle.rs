//! HGE-style particle systems.
//!
//! A [`ResParticle`] is an immutable template: the emission and physics
//! parameters read from a `.psi` descriptor, the bound sprite and the blend
//! mode. Live systems are [`ParticlePool`] instances allocated from a
//! [`ParticleSlab`](crate::resources::particleslab::ParticleSlab). Each holds
//! up to [`PARTICLE_MAX_COUNT`] particles.
//!
//! # Simulation
//!
//! Every [`ParticlePool::update`] performs, in order:
//! 1. emitter lifetime bookkeeping (a system with `lifetime >= 0` falls
//!    asleep after that many seconds)
//! 2. emission: `emission * delta` is added to the residue and the integer
//!    part is spawned, the fraction carries over
//! 3. semi-implicit Euler integration of every alive particle
//! 4. removal of expired particles by swapping in the last alive one
//!
//! # Coordinate System
//!
//! - Angles are radians, 0 points along +X
//! - Direction 0 in a descriptor points up (-Y); the emitter subtracts π/2
//! - Y+ is down (screen coordinates)

use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use arrayvec::ArrayVec;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use fastrand::Rng;
use glam::{DVec2, Vec2};

use crate::error::{ResourceError, Result};
use crate::resources::particleslab::{ParticleHandle, ParticleSlab};
use crate::resources::primitives::{BlendMode, Color};
use crate::resources::renderdevice::Graphics2D;
use crate::resources::sprite::Sprite;

/// Particles one system can hold.
pub const PARTICLE_MAX_COUNT: usize = 500;

/// Size of a `.psi` descriptor in bytes.
pub const PARTICLE_INFO_SIZE: usize = 128;

/// Emission and physics parameters of a particle template.
///
/// Ranges are `(min, max)` pairs sampled uniformly per particle. Colors are
/// normalized RGBA; a negative start red means "keep the sprite's color and
/// animate alpha only".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticleInfo {
    /// Raw blend word; bits 16..18 select the blend mode
    pub blend_info: u32,
    /// Particles per second
    pub emission: i32,
    /// Emitter lifetime in seconds, `-1` for continuous
    pub lifetime: f32,
    pub particle_life_min: f32,
    pub particle_life_max: f32,
    pub direction: f32,
    pub spread: f32,
    /// Particles follow the emitter when set
    pub relative: bool,
    pub speed_min: f32,
    pub speed_max: f32,
    pub gravity_min: f32,
    pub gravity_max: f32,
    pub radial_accel_min: f32,
    pub radial_accel_max: f32,
    pub tangential_accel_min: f32,
    pub tangential_accel_max: f32,
    pub size_start: f32,
    pub size_end: f32,
    pub size_var: f32,
    pub spin_start: f32,
    pub spin_end: f32,
    pub spin_var: f32,
    pub color_start: [f32; 4],
    pub color_end: [f32; 4],
    pub color_var: f32,
    pub alpha_var: f32,
}

impl ParticleInfo {
    /// Parse a 128-byte little-endian `.psi` descriptor.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != PARTICLE_INFO_SIZE {
            return Err(ResourceError::decode(format!(
                "particle descriptor must be {} bytes, got {}",
                PARTICLE_INFO_SIZE,
                data.len()
            )));
        }
        Self::read_from(&mut &data[..])
            .map_err(|e| ResourceError::decode(format!("particle descriptor: {}", e)))
    }

    fn read_from(r: &mut &[u8]) -> std::io::Result<Self> {
        let blend_info = r.read_u32::<LittleEndian>()?;
        let emission = r.read_i32::<LittleEndian>()?;
        let lifetime = r.read_f32::<LittleEndian>()?;
        let particle_life_min = r.read_f32::<LittleEndian>()?;
        let particle_life_max = r.read_f32::<LittleEndian>()?;
        let direction = r.read_f32::<LittleEndian>()?;
        let spread = r.read_f32::<LittleEndian>()?;
        let relative = r.read_u32::<LittleEndian>()? & 0xFF != 0;

        let mut floats = [0f32; 24];
        r.read_f32_into::<LittleEndian>(&mut floats)?;
        let [
            speed_min,
            speed_max,
            gravity_min,
            gravity_max,
            radial_accel_min,
            radial_accel_max,
            tangential_accel_min,
            tangential_accel_max,
            size_start,
            size_end,
            size_var,
            spin_start,
            spin_end,
            spin_var,
            cs_r,
            cs_g,
            cs_b,
            cs_a,
            ce_r,
            ce_g,
            ce_b,
            ce_a,
            color_var,
            alpha_var,
        ] = floats;

        Ok(Self {
            blend_info,
            emission,
            lifetime,
            particle_life_min,
            particle_life_max,
            direction,
            spread,
            relative,
            speed_min,
            speed_max,
            gravity_min,
            gravity_max,
            radial_accel_min,
            radial_accel_max,
            tangential_accel_min,
            tangential_accel_max,
            size_start,
            size_end,
            size_var,
            spin_start,
            spin_end,
            spin_var,
            color_start: [cs_r, cs_g, cs_b, cs_a],
            color_end: [ce_r, ce_g, ce_b, ce_a],
            color_var,
            alpha_var,
        })
    }

    /// Serialize back into the `.psi` layout.
    pub fn to_bytes(&self) -> [u8; PARTICLE_INFO_SIZE] {
        let head = [
            self.lifetime,
            self.particle_life_min,
            self.particle_life_max,
            self.direction,
            self.spread,
        ];
        let [cs_r, cs_g, cs_b, cs_a] = self.color_start;
        let [ce_r, ce_g, ce_b, ce_a] = self.color_end;
        let tail = [
            self.speed_min,
            self.speed_max,
            self.gravity_min,
            self.gravity_max,
            self.radial_accel_min,
            self.radial_accel_max,
            self.tangential_accel_min,
            self.tangential_accel_max,
            self.size_start,
            self.size_end,
            self.size_var,
            self.spin_start,
            self.spin_end,
            self.spin_var,
            cs_r,
            cs_g,
            cs_b,
            cs_a,
            ce_r,
            ce_g,
            ce_b,
            ce_a,
            self.color_var,
            self.alpha_var,
        ];

        let mut words = [0u32; PARTICLE_INFO_SIZE / 4];
        words[0] = self.blend_info;
        words[1] = self.emission as u32;
        for (w, v) in words[2..7].iter_mut().zip(head) {
            *w = v.to_bits();
        }
        words[7] = self.relative as u32;
        for (w, v) in words[8..].iter_mut().zip(tail) {
            *w = v.to_bits();
        }

        let mut bytes = [0u8; PARTICLE_INFO_SIZE];
        LittleEndian::write_u32_into(&words, &mut bytes);
        bytes
    }

    /// Blend mode encoded in the descriptor.
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::from_hge_bits((self.blend_info >> 16) & 3)
    }
}

/// A particle template.
#[derive(Debug)]
pub struct ResParticle {
    name: String,
    info: ParticleInfo,
    sprite: Sprite,
    blend: BlendMode,
    half_size: DVec2,
    rectangle: bool,
}

impl ResParticle {
    /// Bind `sprite` to the descriptor. The blend mode comes from the
    /// descriptor, not from the sprite resource.
    pub fn new(
        name: impl Into<String>,
        info: ParticleInfo,
        sprite: Sprite,
        half_size: DVec2,
        rectangle: bool,
    ) -> Self {
        Self {
            name: name.into(),
            blend: info.blend_mode(),
            info,
            sprite,
            half_size,
            rectangle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ParticleInfo {
        &self.info
    }

    pub fn sprite(&self) -> &Sprite {
        &self.sprite
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    pub fn half_size(&self) -> DVec2 {
        self.half_size
    }

    pub fn is_rectangle(&self) -> bool {
        self.rectangle
    }

    /// Allocate a live system for this template in `slab`.
    pub fn alloc_instance(self: &Rc<Self>, slab: &mut ParticleSlab) -> Result<ParticleHandle> {
        slab.alloc(ParticlePool::new(Rc::clone(self)))
    }

    /// Return a system to `slab`. Stale handles are ignored.
    pub fn free_instance(&self, slab: &mut ParticleSlab, handle: ParticleHandle) -> bool {
        slab.free(handle)
    }
}

/// One simulated particle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticleInstance {
    /// World position, or offset from the center for relative systems
    pub position: Vec2,
    pub velocity: Vec2,
    pub gravity: f32,
    pub radial_accel: f32,
    pub tangential_accel: f32,
    pub spin: f32,
    pub spin_delta: f32,
    pub size: f32,
    pub size_delta: f32,
    pub color: [f32; 4],
    pub color_delta: [f32; 4],
    pub age: f32,
    pub terminal_age: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleStatus {
    Alive,
    Sleep,
}

/// A live particle system.
#[derive(Debug)]
pub struct ParticlePool {
    template: Rc<ResParticle>,
    blend: BlendMode,
    status: ParticleStatus,
    center: Vec2,
    prev_center: Vec2,
    rotation: f32,
    age: f32,
    emission: f32,
    emission_residue: f32,
    particles: ArrayVec<ParticleInstance, PARTICLE_MAX_COUNT>,
    rng: Rng,
}

fn random_range(rng: &mut Rng, min: f32, max: f32) -> f32 {
    min + (max - min) * rng.f32()
}

impl ParticlePool {
    /// A fresh, alive system at the origin.
    pub fn new(template: Rc<ResParticle>) -> Self {
        Self {
            blend: template.blend_mode(),
            emission: template.info().emission as f32,
            template,
            status: ParticleStatus::Alive,
            center: Vec2::ZERO,
            prev_center: Vec2::ZERO,
            rotation: 0.0,
            age: 0.0,
            emission_residue: 0.0,
            particles: ArrayVec::new(),
            rng: Rng::new(),
        }
    }

    pub fn template(&self) -> &Rc<ResParticle> {
        &self.template
    }

    /// Reseed the random source, for reproducible runs.
    pub fn seed(&mut self, seed: u64) {
        self.rng = Rng::with_seed(seed);
    }

    pub fn alive_count(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &[ParticleInstance] {
        &self.particles
    }

    pub fn status(&self) -> ParticleStatus {
        self.status
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    pub fn emission(&self) -> f32 {
        self.emission
    }

    pub fn set_emission(&mut self, emission: f32) {
        self.emission = emission;
    }

    pub fn emission_residue(&self) -> f32 {
        self.emission_residue
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn prev_center(&self) -> Vec2 {
        self.prev_center
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    /// Restart emission.
    pub fn set_active(&mut self) {
        self.status = ParticleStatus::Alive;
        self.age = 0.0;
        self.emission_residue = 0.0;
    }

    /// Stop spawning; existing particles live on.
    pub fn set_inactive(&mut self) {
        self.status = ParticleStatus::Sleep;
    }

    /// Move the emitter. A sleeping system jumps without a trail.
    pub fn set_center(&mut self, pos: Vec2) {
        self.prev_center = match self.status {
            ParticleStatus::Alive => self.center,
            ParticleStatus::Sleep => pos,
        };
        self.center = pos;
    }

    /// Asleep with nothing left to draw
    pub fn is_finished(&self) -> bool {
        self.status == ParticleStatus::Sleep && self.particles.is_empty()
    }

    /// Advance the system by `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        let lifetime = self.template.info().lifetime;
        if self.status == ParticleStatus::Alive {
            self.age += delta;
            if lifetime >= 0.0 && self.age >= lifetime {
                self.status = ParticleStatus::Sleep;
            }
        }

        if self.status == ParticleStatus::Alive {
            self.emit(delta);
        }

        for p in self.particles.iter_mut() {
            let dir = p.velocity.normalize_or_zero();
            let accel = dir * p.radial_accel + dir.perp() * p.tangential_accel;
            p.velocity += accel * delta;
            p.velocity.y += p.gravity * delta;
            p.position += p.velocity * delta;

            p.spin += p.spin_delta * delta;
            p.size += p.size_delta * delta;
            for (c, d) in p.color.iter_mut().zip(p.color_delta.iter()) {
                *c += d * delta;
            }
            p.age += delta;
        }

        let mut i = 0;
        while i < self.particles.len() {
            if self.particles[i].age >= self.particles[i].terminal_age {
                self.particles.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn emit(&mut self, delta: f32) {
        let needed = (self.emission * delta + self.emission_residue).max(0.0);
        let count = needed.floor();
        self.emission_residue = needed - count;

        for _ in 0..count as usize {
            if self.particles.is_full() {
                break;
            }
            let particle = self.spawn_one();
            self.particles.push(particle);
        }
    }

    fn spawn_one(&mut self) -> ParticleInstance {
        let info = *self.template.info();
        let rng = &mut self.rng;

        let terminal_age = random_range(rng, info.particle_life_min, info.particle_life_max);

        let mut position = self.prev_center.lerp(self.center, rng.f32());
        position.x += random_range(rng, -2.0, 2.0);
        position.y += random_range(rng, -2.0, 2.0);
        if info.relative {
            position -= self.center;
        }

        let mut angle = info.direction - FRAC_PI_2 + random_range(rng, 0.0, info.spread)
            - info.spread / 2.0
            + self.rotation;
        if info.relative {
            angle += (self.prev_center - self.center).to_angle() + FRAC_PI_2;
        }
        let velocity = Vec2::from_angle(angle) * random_range(rng, info.speed_min, info.speed_max);

        let per_second = |end: f32, start: f32| {
            if terminal_age > 0.0 {
                (end - start) / terminal_age
            } else {
                0.0
            }
        };

        let size = random_range(
            rng,
            info.size_start,
            info.size_start + (info.size_end - info.size_start) * info.size_var,
        );
        let spin = random_range(
            rng,
            info.spin_start,
            info.spin_start + (info.spin_end - info.spin_start) * info.spin_var,
        );

        let mut color = [0.0f32; 4];
        let mut color_delta = [0.0f32; 4];
        for ch in 0..4 {
            let var = if ch == 3 { info.alpha_var } else { info.color_var };
            let start = info.color_start[ch];
            color[ch] = random_range(rng, start, start + (info.color_end[ch] - start) * var);
            color_delta[ch] = per_second(info.color_end[ch], color[ch]);
        }

        ParticleInstance {
            position,
            velocity,
            gravity: random_range(rng, info.gravity_min, info.gravity_max),
            radial_accel: random_range(rng, info.radial_accel_min, info.radial_accel_max),
            tangential_accel: random_range(
                rng,
                info.tangential_accel_min,
                info.tangential_accel_max,
            ),
            spin,
            spin_delta: per_second(info.spin_end, spin),
            size,
            size_delta: per_second(info.size_end, size),
            color,
            color_delta,
            age: 0.0,
            terminal_age,
        }
    }

    /// Draw every alive particle.
    ///
    /// `scale` multiplies each particle's size. Relative systems are drawn
    /// around the center interpolated `interpolation` of the way from the
    /// previous center.
    pub fn render(&self, graphics: &mut dyn Graphics2D, scale: Vec2, interpolation: f32) {
        let info = self.template.info();
        let sprite = self.template.sprite();
        let base = if info.relative {
            self.prev_center.lerp(self.center, interpolation.clamp(0.0, 1.0))
        } else {
            Vec2::ZERO
        };
        let keep_sprite_color = info.color_start[0] < 0.0;
        let sprite_color = sprite.color();

        for p in &self.particles {
            let color = if keep_sprite_color {
                sprite_color.with_alpha(Color::from_unit_rgba([0.0, 0.0, 0.0, p.color[3]]).a)
            } else {
                Color::from_unit_rgba(p.color)
            };
            sprite.draw_with_color(
                graphics,
                base + p.position,
                p.spin,
                scale * p.size,
                color,
                self.blend,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::primitives::Rect;
    use crate::resources::renderdevice::{HeadlessTexture, RecordingGraphics};
    use crate::resources::texture::ResTexture;

    fn sprite() -> Sprite {
        let tex = Rc::new(ResTexture::new(
            "parti",
            Box::new(HeadlessTexture {
                width: 32,
                height: 32,
            }),
        ));
        Sprite::new(tex, Rect::new(0.0, 0.0, 16.0, 16.0), 1.0)
    }

    fn template(info: ParticleInfo) -> Rc<ResParticle> {
        Rc::new(ResParticle::new("spark", info, sprite(), DVec2::ZERO, false))
    }

    fn steady_info() -> ParticleInfo {
        ParticleInfo {
            emission: 10,
            lifetime: -1.0,
            particle_life_min: 100.0,
            particle_life_max: 100.0,
            size_start: 1.0,
            size_end: 1.0,
            color_start: [1.0, 1.0, 1.0, 1.0],
            color_end: [1.0, 1.0, 1.0, 1.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_descriptor_layout() {
        let info = ParticleInfo {
            blend_info: 3 << 16,
            emission: 25,
            lifetime: 2.5,
            relative: true,
            alpha_var: 0.75,
            color_start: [0.1, 0.2, 0.3, 0.4],
            ..steady_info()
        };
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), PARTICLE_INFO_SIZE);
        assert_eq!(&bytes[4..8], &25i32.to_le_bytes());
        assert_eq!(&bytes[28..32], &1u32.to_le_bytes());
        assert_eq!(&bytes[124..128], &0.75f32.to_le_bytes());
        assert_eq!(ParticleInfo::from_bytes(&bytes).unwrap(), info);
        assert_eq!(info.blend_mode(), BlendMode::AddAlpha);
    }

    #[test]
    fn test_descriptor_rejects_wrong_size() {
        assert!(ParticleInfo::from_bytes(&[0u8; 127]).is_err());
        assert!(ParticleInfo::from_bytes(&[0u8; 129]).is_err());
    }

    #[test]
    fn test_emission_residue_carries_over() {
        let info = ParticleInfo {
            emission: 0,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.set_emission(2.5);

        pool.update(1.0);
        assert_eq!(pool.alive_count(), 2);
        assert!((pool.emission_residue() - 0.5).abs() < 1e-6);

        pool.update(1.0);
        assert_eq!(pool.alive_count(), 5);
        assert!(pool.emission_residue().abs() < 1e-6);
    }

    #[test]
    fn test_pool_never_exceeds_capacity() {
        let info = ParticleInfo {
            emission: 100_000,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.update(1.0);
        assert_eq!(pool.alive_count(), PARTICLE_MAX_COUNT);
        pool.update(1.0);
        assert_eq!(pool.alive_count(), PARTICLE_MAX_COUNT);
    }

    #[test]
    fn test_expired_particles_are_removed() {
        let info = ParticleInfo {
            emission: 3,
            particle_life_min: 1.5,
            particle_life_max: 1.5,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.update(1.0);
        assert_eq!(pool.alive_count(), 3);

        pool.set_inactive();
        pool.update(1.0);
        assert_eq!(pool.alive_count(), 0);
        assert!(pool.is_finished());
    }

    #[test]
    fn test_lifetime_puts_system_to_sleep() {
        let info = ParticleInfo {
            lifetime: 0.5,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.update(1.0);
        assert_eq!(pool.status(), ParticleStatus::Sleep);
        assert_eq!(pool.alive_count(), 0);

        pool.set_active();
        assert_eq!(pool.status(), ParticleStatus::Alive);
        pool.update(0.25);
        assert_eq!(pool.status(), ParticleStatus::Alive);
    }

    #[test]
    fn test_set_center_tracks_previous_only_when_alive() {
        let mut pool = ParticlePool::new(template(steady_info()));
        pool.set_center(Vec2::new(10.0, 0.0));
        pool.set_center(Vec2::new(20.0, 0.0));
        assert_eq!(pool.prev_center(), Vec2::new(10.0, 0.0));

        pool.set_inactive();
        pool.set_center(Vec2::new(50.0, 5.0));
        assert_eq!(pool.prev_center(), Vec2::new(50.0, 5.0));
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let info = ParticleInfo {
            emission: 1,
            gravity_min: 10.0,
            gravity_max: 10.0,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.seed(7);
        pool.update(1.0);
        let p = pool.particles()[0];
        assert!((p.velocity.y - 10.0).abs() < 1e-4);
        assert!((p.age - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_uses_sprite_color_when_start_red_negative() {
        let info = ParticleInfo {
            emission: 1,
            color_start: [-1.0, 0.0, 0.0, 0.5],
            color_end: [-1.0, 0.0, 0.0, 0.5],
            ..steady_info()
        };
        let tpl = template(info);
        tpl.sprite().set_color(Color::new(10, 20, 30, 255));
        let mut pool = ParticlePool::new(tpl);
        pool.update(1.0);

        let mut graphics = RecordingGraphics::new();
        pool.render(&mut graphics, Vec2::ONE, 1.0);
        assert_eq!(graphics.draws.len(), 1);
        assert_eq!(graphics.draws[0].color, Color::new(10, 20, 30, 128));
        assert_eq!(graphics.draws[0].blend, BlendMode::MulAdd);
    }

    #[test]
    fn test_relative_particles_follow_center() {
        let info = ParticleInfo {
            emission: 1,
            relative: true,
            ..steady_info()
        };
        let mut pool = ParticlePool::new(template(info));
        pool.update(1.0);

        let mut graphics = RecordingGraphics::new();
        pool.render(&mut graphics, Vec2::ONE, 1.0);
        let before = graphics.draws[0].position;

        pool.set_center(Vec2::new(100.0, 0.0));
        graphics.clear();
        pool.render(&mut graphics, Vec2::ONE, 1.0);
        let after = graphics.draws[0].position;
        assert!((after.x - before.x - 100.0).abs() < 1e-3);

        graphics.clear();
        pool.render(&mut graphics, Vec2::ONE, 0.5);
        assert!((graphics.draws[0].position.x - before.x - 50.0).abs() < 1e-3);
    }
}
