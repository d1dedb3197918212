//! Engine configuration resource.
//!
//! Settings for the resource layer loaded from an INI configuration file.
//! Provides defaults for safe startup and methods to load/save
//! configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [resources]
//! image_scale = 1.0
//! packs = data.zip, stage1.zip
//!
//! [passwords]
//! data.zip = secret
//!
//! [particles]
//! max_systems = 500
//! ```
//!
//! Packs are mounted in listed order, so later packs take priority. Password
//! keys match either the full pack path or its file name, case-insensitively.

use std::path::{Path, PathBuf};

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::{error, info};
use rustc_hash::FxHashMap;

use crate::error::{ResourceError, Result};
use crate::resources::particleslab::PARTICLE_SYSTEM_MAX;
use crate::resources::resourcemgr::ResourceManager;

/// Default safe values for startup
const DEFAULT_IMAGE_SCALE: f32 = 1.0;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

/// Engine configuration resource.
#[derive(Resource, Debug, Clone)]
pub struct EngineConfig {
    /// Scale applied to sprite geometry at load time.
    pub image_scale: f32,
    /// Packs to mount, lowest priority first.
    pub packs: Vec<String>,
    /// Pack passwords keyed by lowercased pack path or file name.
    pub passwords: FxHashMap<String, String>,
    /// Particle system slots.
    pub max_particle_systems: usize,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            image_scale: DEFAULT_IMAGE_SCALE,
            packs: Vec::new(),
            passwords: FxHashMap::default(),
            max_particle_systems: PARTICLE_SYSTEM_MAX,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    pub fn load_from_file(&mut self) -> Result<()> {
        let mut config = new_ini();
        config
            .load(&self.config_path)
            .map_err(|e| ResourceError::Config(format!("failed to load config file: {}", e)))?;
        self.read_ini(&config)
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<()> {
        let mut config = new_ini();
        config
            .read(text.to_string())
            .map_err(|e| ResourceError::Config(format!("failed to parse config: {}", e)))?;
        self.read_ini(&config)
    }

    fn read_ini(&mut self, config: &Ini) -> Result<()> {
        // [resources] section
        if let Some(scale) = config
            .getfloat("resources", "image_scale")
            .map_err(ResourceError::Config)?
        {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ResourceError::Config(format!("invalid image_scale {}", scale)));
            }
            self.image_scale = scale as f32;
        }
        if let Some(packs) = config.get("resources", "packs") {
            self.packs = packs
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        // [passwords] section
        if let Some(section) = config.get_map_ref().get("passwords") {
            for (pack, password) in section {
                if let Some(password) = password {
                    self.passwords.insert(pack.to_lowercase(), password.clone());
                }
            }
        }

        // [particles] section
        if let Some(max) = config
            .getuint("particles", "max_systems")
            .map_err(ResourceError::Config)?
        {
            self.max_particle_systems = max as usize;
        }

        info!(
            "Loaded config: image_scale={}, {} packs, max_systems={}",
            self.image_scale,
            self.packs.len(),
            self.max_particle_systems
        );
        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<()> {
        let mut config = Ini::new();

        // [resources] section
        config.set("resources", "image_scale", Some(self.image_scale.to_string()));
        config.set("resources", "packs", Some(self.packs.join(", ")));

        // [passwords] section
        for (pack, password) in &self.passwords {
            config.set("passwords", pack, Some(password.clone()));
        }

        // [particles] section
        config.set(
            "particles",
            "max_systems",
            Some(self.max_particle_systems.to_string()),
        );

        config.write(&self.config_path)?;
        info!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    /// Password configured for `pack`, by full path or file name.
    pub fn password_for(&self, pack: &str) -> Option<&str> {
        let full = pack.to_lowercase();
        let file_name = Path::new(&full)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&full)
            .to_string();
        self.passwords
            .get(&full)
            .or_else(|| self.passwords.get(&file_name))
            .map(String::as_str)
    }

    /// Mount the configured packs and set the image scale.
    ///
    /// A pack that fails to mount does not stop the others; the first
    /// failure is returned after all packs were tried.
    pub fn apply(&self, manager: &mut ResourceManager) -> Result<()> {
        manager.set_image_scale(self.image_scale);
        let mut first_error = None;
        for pack in &self.packs {
            if let Err(e) = manager.load_pack(pack, self.password_for(pack)) {
                error!("EngineConfig: cannot mount '{}': {}", pack, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// INI parser that keeps `;` and `#` inside values.
///
/// Only whole-line comments are recognized, so passwords survive intact.
fn new_ini() -> Ini {
    let mut config = Ini::new();
    config.set_inline_comment_symbols(Some(&[]));
    config
}
