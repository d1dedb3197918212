//! Engine systems.
//!
//! Submodules overview
//! - [`particleemitter`] – move, step and clean up particle systems
//! - [`render`] – draw particle systems through a [`Graphics2D`](crate::resources::renderdevice::Graphics2D) sink
//! - [`time`] – update simulation time and delta

pub mod particleemitter;
pub mod render;
pub mod time;
