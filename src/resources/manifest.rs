//! JSON resource manifests.
//!
//! A manifest lists packs to mount and resources to load into one pool, in
//! dependency order: textures, images, animations, particles, sprite fonts,
//! TTF fonts. Applying it never stops at the first failure; every entry is
//! attempted and the outcome is reported.
//!
//! ```json
//! {
//!   "pool": "stage",
//!   "packs": [{ "path": "stage1.zip", "password": "secret" }],
//!   "textures": [{ "name": "boss_tex", "path": "boss.png" }],
//!   "images": [{ "name": "boss", "texture": "boss_tex", "rect": [0, 0, 64, 64],
//!                "half_size": [24, 24] }],
//!   "animations": [{ "name": "boss_idle", "texture": "boss_tex",
//!                    "rect": [0, 64, 256, 64], "columns": 4, "rows": 1, "interval": 6 }],
//!   "particles": [{ "name": "spark", "path": "spark.psi", "sprite": "boss" }],
//!   "sprite_fonts": [{ "name": "menu", "path": "fonts\\menu.fnt" }],
//!   "ttf_fonts": [{ "name": "ui", "path": "ui.ttf", "width": 16, "height": 16 }]
//! }
//! ```

use std::fs;
use std::path::Path;

use glam::DVec2;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::resources::animation::AnimationParams;
use crate::resources::primitives::{BlendMode, Rect};
use crate::resources::renderdevice::RenderDevice;
use crate::resources::resourcemgr::ResourceManager;
use crate::resources::resourcepool::{PoolType, ResourceType};
use crate::resources::sprite::ImageParams;

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackEntry {
    pub path: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    pub path: String,
    #[serde(default = "default_true")]
    pub mipmaps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub name: String,
    pub texture: String,
    /// `[x, y, width, height]` in texels
    pub rect: [f32; 4],
    #[serde(default)]
    pub half_size: [f64; 2],
    #[serde(default)]
    pub rectangle: bool,
    #[serde(default)]
    pub blend: Option<BlendMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationEntry {
    pub name: String,
    pub texture: String,
    pub rect: [f32; 4],
    #[serde(default = "default_one")]
    pub columns: u32,
    #[serde(default = "default_one")]
    pub rows: u32,
    #[serde(default = "default_one")]
    pub interval: u32,
    #[serde(default)]
    pub half_size: [f64; 2],
    #[serde(default)]
    pub rectangle: bool,
    #[serde(default)]
    pub blend: Option<BlendMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleEntry {
    pub name: String,
    pub path: String,
    pub sprite: String,
    #[serde(default)]
    pub half_size: [f64; 2],
    #[serde(default)]
    pub rectangle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteFontEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default = "default_true")]
    pub mipmaps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtfFontEntry {
    pub name: String,
    pub path: String,
    pub width: f32,
    pub height: f32,
}

/// Batch description of packs and resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManifest {
    /// Target pool; the manager's active pool when absent
    pub pool: Option<PoolType>,
    pub image_scale: Option<f32>,
    pub packs: Vec<PackEntry>,
    pub textures: Vec<TextureEntry>,
    pub images: Vec<ImageEntry>,
    pub animations: Vec<AnimationEntry>,
    pub particles: Vec<ParticleEntry>,
    pub sprite_fonts: Vec<SpriteFontEntry>,
    pub ttf_fonts: Vec<TtfFontEntry>,
}

/// Outcome of [`ResourceManifest::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestReport {
    /// `(kind, name)` of every resource now available
    pub loaded: Vec<(ResourceType, String)>,
    /// Pack paths that were mounted
    pub mounted: Vec<String>,
    /// Human-readable description of each failure
    pub failed: Vec<String>,
}

impl ManifestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: ResourceType, name: &str, result: Result<()>) {
        match result {
            Ok(()) => self.loaded.push((kind, name.to_string())),
            Err(e) => self.failed.push(format!("{} '{}': {}", kind, name, e)),
        }
    }
}

fn rect(r: [f32; 4]) -> Rect {
    Rect::new(r[0], r[1], r[2], r[3])
}

impl ResourceManifest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ResourceError::Config(format!("invalid manifest: {}", e)))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ResourceError::Config(format!("cannot serialize manifest: {}", e)))
    }

    /// Mount the packs and load every resource.
    ///
    /// When `pool` is set it becomes the manager's active pool and stays so.
    pub fn apply(
        &self,
        manager: &mut ResourceManager,
        device: &mut dyn RenderDevice,
    ) -> ManifestReport {
        let mut report = ManifestReport::default();

        if let Some(pool) = self.pool {
            manager.set_active_pool(pool);
        }
        if let Some(scale) = self.image_scale {
            manager.set_image_scale(scale);
        }

        for pack in &self.packs {
            match manager.load_pack(&pack.path, pack.password.as_deref()) {
                Ok(()) => report.mounted.push(pack.path.clone()),
                Err(e) => report.failed.push(format!("pack '{}': {}", pack.path, e)),
            }
        }

        for t in &self.textures {
            let result = manager.load_texture(&t.name, &t.path, t.mipmaps, device);
            report.record(ResourceType::Texture, &t.name, result);
        }

        for i in &self.images {
            let params = ImageParams {
                rect: rect(i.rect),
                half_size: DVec2::from_array(i.half_size),
                rectangle: i.rectangle,
            };
            let result = manager.load_image(&i.name, &i.texture, &params);
            if result.is_ok()
                && let (Some(blend), Some(sprite)) = (i.blend, manager.find_sprite(&i.name))
            {
                sprite.set_blend_mode(blend);
            }
            report.record(ResourceType::Sprite, &i.name, result);
        }

        for a in &self.animations {
            let params = AnimationParams {
                rect: rect(a.rect),
                columns: a.columns,
                rows: a.rows,
                interval: a.interval,
                half_size: DVec2::from_array(a.half_size),
                rectangle: a.rectangle,
            };
            let result = manager.load_animation(&a.name, &a.texture, &params);
            if result.is_ok()
                && let (Some(blend), Some(anim)) = (a.blend, manager.find_animation(&a.name))
            {
                anim.set_blend_mode(blend);
            }
            report.record(ResourceType::Animation, &a.name, result);
        }

        for p in &self.particles {
            let result = manager.load_particle(
                &p.name,
                &p.path,
                &p.sprite,
                DVec2::from_array(p.half_size),
                p.rectangle,
            );
            report.record(ResourceType::Particle, &p.name, result);
        }

        for f in &self.sprite_fonts {
            let result =
                manager.load_sprite_font(&f.name, &f.path, f.texture.as_deref(), f.mipmaps, device);
            report.record(ResourceType::SpriteFont, &f.name, result);
        }

        for f in &self.ttf_fonts {
            let result = manager.load_ttf_font(&f.name, &f.path, f.width, f.height, device);
            report.record(ResourceType::TrueTypeFont, &f.name, result);
        }

        if report.is_success() {
            info!(
                "ResourceManifest: {} resources loaded, {} packs mounted",
                report.loaded.len(),
                report.mounted.len()
            );
        } else {
            warn!(
                "ResourceManifest: {} loaded, {} failed",
                report.loaded.len(),
                report.failed.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::renderdevice::HeadlessDevice;

    #[test]
    fn test_parse_defaults() {
        let manifest = ResourceManifest::from_json(
            r#"{ "pool": "stage",
                 "textures": [{ "name": "t", "path": "t.png" }],
                 "animations": [{ "name": "a", "texture": "t", "rect": [0, 0, 32, 32] }] }"#,
        )
        .unwrap();
        assert_eq!(manifest.pool, Some(PoolType::Stage));
        assert!(manifest.textures[0].mipmaps);
        assert_eq!(manifest.animations[0].columns, 1);
        assert_eq!(manifest.animations[0].interval, 1);
        assert!(manifest.images.is_empty());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = ResourceManifest::from_json("{ \"textures\": 5 }").unwrap_err();
        assert!(matches!(err, ResourceError::Config(_)));
    }

    #[test]
    fn test_apply_reports_every_failure() {
        let manifest = ResourceManifest::from_json(
            r#"{ "textures": [{ "name": "t", "path": "/no/such.png" }],
                 "images": [{ "name": "i", "texture": "t", "rect": [0, 0, 8, 8] }] }"#,
        )
        .unwrap();
        let mut manager = ResourceManager::new();
        let mut device = HeadlessDevice::new();
        let report = manifest.apply(&mut manager, &mut device);
        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 2);
        assert!(report.loaded.is_empty());
    }
}
