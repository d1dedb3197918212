//! Event types and observers.
//!
//! Submodules:
//! - [`stage`] – enter/leave a stage, scoping loads to the stage pool
pub mod stage;
