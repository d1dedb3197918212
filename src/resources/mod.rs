//! Resource layer: packs, the virtual file system, typed resources and the
//! pools that own them.
//!
//! Most types here are plain Rust values. [`resourcemgr::ResourceManager`]
//! and [`particleslab::ParticleSlab`] share data through `Rc` and are meant
//! to be inserted as non-send resources; [`engineconfig::EngineConfig`] and
//! [`worldtime::WorldTime`] are regular ECS resources.
//!
//! Overview
//! - `animation` – frame sequences sliced from a texture region
//! - `engineconfig` – INI settings for scale, packs and passwords
//! - `font` – HGE bitmap fonts and TrueType font handles
//! - `manifest` – JSON batch loading of packs and resources
//! - `particle` – particle descriptors and the HGE particle simulation
//! - `particleslab` – fixed-capacity storage of live particle systems
//! - `primitives` – blend modes, colors and rectangles
//! - `raylibdevice` – raylib backend (feature `raylib`)
//! - `renderdevice` – rendering seams plus headless implementations
//! - `resourcemgr` – mounted packs and the global/stage pools
//! - `resourcepool` – one named map per resource kind
//! - `sprite` – texture regions with hot spot, color and blend mode
//! - `texture` – loaded textures
//! - `vfs` – pack priority list with native filesystem fallback
//! - `worldtime` – simulation time and delta
pub mod animation;
pub mod engineconfig;
pub mod font;
pub mod manifest;
pub mod particle;
pub mod particleslab;
pub mod primitives;
#[cfg(feature = "raylib")]
pub mod raylibdevice;
pub mod renderdevice;
pub mod resourcemgr;
pub mod resourcepool;
pub mod sprite;
pub mod texture;
pub mod vfs;
pub mod worldtime;
