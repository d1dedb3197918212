//! Particle emitter systems.
//!
//! These systems process [`ParticleEmitter`] components and step the particle
//! systems they reference in the non-send
//! [`ParticleSlab`](crate::resources::particleslab::ParticleSlab).
//!
//! # Behavior
//!
//! - The system center follows the entity's `MapPosition` before stepping
//! - A zero delta still moves the center but skips simulation
//! - Handles that no longer resolve are skipped
//! - One-shot emitters are freed and despawned once asleep and empty

use bevy_ecs::prelude::*;
use log::debug;

use crate::components::mapposition::MapPosition;
use crate::components::particleemitter::ParticleEmitter;
use crate::resources::particleslab::ParticleSlab;
use crate::resources::worldtime::WorldTime;

/// Move every particle system to its entity and advance it by the frame delta.
///
/// # Ordering
///
/// Should run **after** movement so systems emit from the entity's
/// position of this frame.
pub fn particle_emitter_system(
    query: Query<(&MapPosition, &ParticleEmitter)>,
    time: Res<WorldTime>,
    mut slab: NonSendMut<ParticleSlab>,
) {
    let dt = time.delta; // delta is already scaled
    for (position, emitter) in query.iter() {
        let Some(pool) = slab.get_mut(emitter.handle) else {
            debug!("particle_emitter_system: stale handle {:?}", emitter.handle);
            continue;
        };
        pool.set_center(position.pos);
        pool.set_rotation(emitter.rotation);
        if dt > 0.0 {
            pool.update(dt);
        }
    }
}

/// Free finished one-shot particle systems and despawn their entities.
pub fn particle_cleanup_system(
    query: Query<(Entity, &ParticleEmitter)>,
    mut slab: NonSendMut<ParticleSlab>,
    mut commands: Commands,
) {
    for (entity, emitter) in query.iter() {
        if !emitter.despawn_when_finished {
            continue;
        }
        let finished = slab
            .get(emitter.handle)
            .is_none_or(|pool| pool.is_finished());
        if finished {
            slab.free(emitter.handle);
            commands.entity(entity).despawn();
            debug!("particle_cleanup_system: despawned emitter {:?}", entity);
        }
    }
}
