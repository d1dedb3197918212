//! Particle rendering.
//!
//! Draws every live particle system referenced by a
//! [`ParticleEmitter`] through a [`Graphics2D`] sink.
use bevy_ecs::prelude::*;

use crate::components::particleemitter::ParticleEmitter;
use crate::resources::particleslab::ParticleSlab;
use crate::resources::renderdevice::Graphics2D;

/// Draw all emitters.
///
/// `interpolation` in `0..=1` places relative systems between their previous
/// and current center, for rendering between fixed simulation steps.
pub fn render_particles(world: &mut World, graphics: &mut dyn Graphics2D, interpolation: f32) {
    let mut emitters = world.query::<&ParticleEmitter>();
    let to_draw: Vec<ParticleEmitter> = emitters.iter(world).copied().collect();

    let Some(slab) = world.get_non_send_resource::<ParticleSlab>() else {
        return;
    };
    for emitter in to_draw {
        if let Some(pool) = slab.get(emitter.handle) {
            pool.render(graphics, emitter.scale, interpolation);
        }
    }
}
