//! stgres library.
//!
//! Resource management for a 2D shooter engine: encrypted asset packs, a
//! virtual file system, global and stage resource pools, and the HGE
//! particle engine, with ECS components and systems to drive particles.

pub mod archive;
pub mod components;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;
