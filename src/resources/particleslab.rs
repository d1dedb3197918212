//! Fixed-size arena of live particle systems.
//!
//! Slots are pre-sized and never grow. A freed slot bumps its generation,
//! so a stale [`ParticleHandle`] resolves to nothing instead of aliasing the
//! system that reuses the slot.
//!
//! This is a non-send resource: particle systems hold `Rc` handles to their
//! templates. Insert with `insert_non_send_resource` and access via
//! `NonSendMut<ParticleSlab>`.

use log::{debug, warn};

use crate::error::{ResourceError, Result};
use crate::resources::particle::ParticlePool;

/// Live particle systems the slab can hold.
pub const PARTICLE_SYSTEM_MAX: usize = 500;

/// Generation-checked reference to a slab slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleHandle {
    index: u32,
    generation: u32,
}

impl ParticleHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    pool: Option<Box<ParticlePool>>,
}

/// Arena of particle systems with an explicit free list.
#[derive(Debug)]
pub struct ParticleSlab {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Default for ParticleSlab {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSlab {
    /// Slab with [`PARTICLE_SYSTEM_MAX`] slots.
    pub fn new() -> Self {
        Self::with_capacity(PARTICLE_SYSTEM_MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self {
            slots,
            // Lowest index is handed out first.
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Store `pool` in a free slot.
    pub fn alloc(&mut self, pool: ParticlePool) -> Result<ParticleHandle> {
        let Some(index) = self.free.pop() else {
            warn!(
                "ParticleSlab: all {} particle system slots are in use",
                self.slots.len()
            );
            return Err(ResourceError::CapacityExceeded(format!(
                "particle system slab is full ({} slots)",
                self.slots.len()
            )));
        };
        let slot = &mut self.slots[index as usize];
        slot.pool = Some(Box::new(pool));
        debug!("ParticleSlab: allocated slot {}", index);
        Ok(ParticleHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Release the slot behind `handle`. Returns false for stale handles.
    pub fn free(&mut self, handle: ParticleHandle) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.pool.is_some() => {
                slot.pool = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                true
            }
            _ => {
                warn!("ParticleSlab: ignoring free of stale handle {:?}", handle);
                false
            }
        }
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&ParticlePool> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.pool.as_deref())
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut ParticlePool> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.pool.as_deref_mut())
    }

    /// Systems currently allocated
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Handles and systems of every allocated slot
    pub fn iter(&self) -> impl Iterator<Item = (ParticleHandle, &ParticlePool)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.pool.as_deref().map(|pool| {
                (
                    ParticleHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    pool,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::particle::{ParticleInfo, ResParticle};
    use crate::resources::primitives::Rect;
    use crate::resources::renderdevice::HeadlessTexture;
    use crate::resources::sprite::Sprite;
    use crate::resources::texture::ResTexture;
    use glam::DVec2;
    use std::rc::Rc;

    fn template() -> Rc<ResParticle> {
        let tex = Rc::new(ResTexture::new(
            "t",
            Box::new(HeadlessTexture {
                width: 8,
                height: 8,
            }),
        ));
        let sprite = Sprite::new(tex, Rect::new(0.0, 0.0, 8.0, 8.0), 1.0);
        Rc::new(ResParticle::new(
            "p",
            ParticleInfo::default(),
            sprite,
            DVec2::ZERO,
            false,
        ))
    }

    #[test]
    fn test_alloc_fails_when_full() {
        let tpl = template();
        let mut slab = ParticleSlab::with_capacity(3);
        for _ in 0..3 {
            tpl.alloc_instance(&mut slab).unwrap();
        }
        let err = tpl.alloc_instance(&mut slab).unwrap_err();
        assert!(matches!(err, ResourceError::CapacityExceeded(_)));
        assert_eq!(slab.len(), 3);
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let tpl = template();
        let mut slab = ParticleSlab::with_capacity(1);
        let first = tpl.alloc_instance(&mut slab).unwrap();
        assert!(tpl.free_instance(&mut slab, first));
        assert!(slab.get(first).is_none());

        let second = tpl.alloc_instance(&mut slab).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(slab.get(first).is_none());
        assert!(slab.get(second).is_some());
        assert!(!slab.free(first));
        assert_eq!(slab.len(), 1);
    }

    #[test]
    fn test_default_capacity() {
        let slab = ParticleSlab::new();
        assert_eq!(slab.capacity(), PARTICLE_SYSTEM_MAX);
        assert!(slab.is_empty());
        assert_eq!(slab.iter().count(), 0);
    }
}
