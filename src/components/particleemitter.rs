//! Particle emitter component.
//!
//! Binds an entity to a live particle system in the
//! [`ParticleSlab`](crate::resources::particleslab::ParticleSlab). The
//! system's center follows the entity's
//! [`MapPosition`](crate::components::mapposition::MapPosition).
//!
//! # How It Works
//!
//! 1. Allocate a system from a template and spawn the entity:
//!    ```ignore
//!    let template = manager.find_particle("spark").unwrap();
//!    let handle = template.alloc_instance(&mut slab)?;
//!    world.spawn((MapPosition::new(100.0, 100.0), ParticleEmitter::new(handle)));
//!    ```
//! 2. [`particle_emitter_system`] moves and steps the system every frame.
//! 3. [`particle_cleanup_system`] frees finished systems and despawns their
//!    entities when `despawn_when_finished` is set.
//!
//! # Related
//!
//! - [`crate::systems::particleemitter::particle_emitter_system`]
//! - [`crate::systems::particleemitter::particle_cleanup_system`]
//! - [`crate::systems::render::render_particles`]
//!
//! [`particle_emitter_system`]: crate::systems::particleemitter::particle_emitter_system
//! [`particle_cleanup_system`]: crate::systems::particleemitter::particle_cleanup_system

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::resources::particleslab::ParticleHandle;

/// Entity-side reference to a live particle system.
#[derive(Component, Debug, Clone, Copy)]
pub struct ParticleEmitter {
    pub handle: ParticleHandle,
    /// Emission direction offset in radians
    pub rotation: f32,
    /// Multiplies every particle's size when drawn
    pub scale: Vec2,
    /// Free the system and despawn the entity once it is asleep and empty
    pub despawn_when_finished: bool,
}

impl ParticleEmitter {
    pub fn new(handle: ParticleHandle) -> Self {
        Self {
            handle,
            rotation: 0.0,
            scale: Vec2::ONE,
            despawn_when_finished: false,
        }
    }

    /// Despawn once finished.
    pub fn one_shot(mut self) -> Self {
        self.despawn_when_finished = true;
        self
    }
}
