//! ECS components for entities.
//!
//! Submodules overview:
//! - [`mapposition`] – world-space position (pivot) for an entity
//! - [`particleemitter`] – binds an entity to a live particle system

pub mod mapposition;
pub mod particleemitter;
