//! Named, typed resource caches.
//!
//! A [`ResourcePool`] keeps one map per [`ResourceType`]. Loading a name that
//! already exists keeps the existing resource, discards the new parameters
//! and still succeeds. A failed load leaves the pool unchanged.
//!
//! Loads that depend on another resource (a sprite on its texture, a
//! particle template on its sprite) receive the dependency already resolved
//! by the [`ResourceManager`](crate::resources::resourcemgr::ResourceManager),
//! which searches the stage pool before the global one.

use std::fmt;
use std::rc::Rc;

use glam::DVec2;
use log::{error, info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::resources::animation::{AnimationParams, ResAnimation};
use crate::resources::font::{FontProvider, HgeFont, HgeFontDefinition, ResFont, resolve_bitmap_path};
use crate::resources::particle::{ParticleInfo, ResParticle};
use crate::resources::renderdevice::RenderDevice;
use crate::resources::sprite::{ImageParams, ResSprite, Sprite};
use crate::resources::texture::ResTexture;
use crate::resources::vfs::VirtualFileSystem;

/// Which of the manager's two pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    /// Lives for the whole process
    #[default]
    Global,
    /// Cleared on level transitions
    Stage,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolType::Global => "global",
            PoolType::Stage => "stage",
        })
    }
}

/// Kinds of resource a pool stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Texture,
    Sprite,
    Animation,
    Particle,
    SpriteFont,
    TrueTypeFont,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Texture,
        ResourceType::Sprite,
        ResourceType::Animation,
        ResourceType::Particle,
        ResourceType::SpriteFont,
        ResourceType::TrueTypeFont,
    ];
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceType::Texture => "texture",
            ResourceType::Sprite => "sprite",
            ResourceType::Animation => "animation",
            ResourceType::Particle => "particle",
            ResourceType::SpriteFont => "sprite font",
            ResourceType::TrueTypeFont => "ttf font",
        })
    }
}

/// Name to handle map for one kind.
#[derive(Debug)]
pub struct ResourceMap<T> {
    map: FxHashMap<String, Rc<T>>,
}

impl<T> Default for ResourceMap<T> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
        }
    }
}

impl<T> ResourceMap<T> {
    pub fn get(&self, name: &str) -> Option<Rc<T>> {
        self.map.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Insert unless `name` exists. `build` only runs for new names.
    fn load_with(
        &mut self,
        pool: PoolType,
        kind: ResourceType,
        name: &str,
        build: impl FnOnce() -> Result<T>,
    ) -> Result<()> {
        if self.map.contains_key(name) {
            warn!(
                "ResourcePool: {} '{}' already exists in the {} pool, load parameters discarded",
                kind, name, pool
            );
            return Ok(());
        }
        match build() {
            Ok(resource) => {
                self.map.insert(name.to_string(), Rc::new(resource));
                info!("ResourcePool: {} '{}' loaded into the {} pool", kind, name, pool);
                Ok(())
            }
            Err(e) => {
                if e.is_not_found() {
                    warn!("ResourcePool: cannot load {} '{}': {}", kind, name, e);
                } else {
                    error!("ResourcePool: cannot load {} '{}': {}", kind, name, e);
                }
                Err(e)
            }
        }
    }
}

fn missing_dependency(kind: ResourceType, name: &str) -> ResourceError {
    ResourceError::not_found(format!("{} '{}'", kind, name))
}

/// One scoped cache of every resource kind.
#[derive(Debug, Default)]
pub struct ResourcePool {
    pool_type: PoolType,
    textures: ResourceMap<ResTexture>,
    sprites: ResourceMap<ResSprite>,
    animations: ResourceMap<ResAnimation>,
    particles: ResourceMap<ResParticle>,
    sprite_fonts: ResourceMap<ResFont>,
    ttf_fonts: ResourceMap<ResFont>,
}

impl ResourcePool {
    pub fn new(pool_type: PoolType) -> Self {
        Self {
            pool_type,
            ..Default::default()
        }
    }

    pub fn pool_type(&self) -> PoolType {
        self.pool_type
    }

    /// Drop every resource. Outstanding handles stay valid.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.sprites.clear();
        self.animations.clear();
        self.particles.clear();
        self.sprite_fonts.clear();
        self.ttf_fonts.clear();
        info!("ResourcePool: {} pool cleared", self.pool_type);
    }

    pub fn check_resource_exists(&self, kind: ResourceType, name: &str) -> bool {
        match kind {
            ResourceType::Texture => self.textures.contains(name),
            ResourceType::Sprite => self.sprites.contains(name),
            ResourceType::Animation => self.animations.contains(name),
            ResourceType::Particle => self.particles.contains(name),
            ResourceType::SpriteFont => self.sprite_fonts.contains(name),
            ResourceType::TrueTypeFont => self.ttf_fonts.contains(name),
        }
    }

    /// Names of every resource of `kind`, in no particular order.
    pub fn list_resource_names(&self, kind: ResourceType) -> Vec<String> {
        let names: Box<dyn Iterator<Item = &str>> = match kind {
            ResourceType::Texture => Box::new(self.textures.names()),
            ResourceType::Sprite => Box::new(self.sprites.names()),
            ResourceType::Animation => Box::new(self.animations.names()),
            ResourceType::Particle => Box::new(self.particles.names()),
            ResourceType::SpriteFont => Box::new(self.sprite_fonts.names()),
            ResourceType::TrueTypeFont => Box::new(self.ttf_fonts.names()),
        };
        names.map(str::to_string).collect()
    }

    /// Total number of resources of every kind
    pub fn len(&self) -> usize {
        self.textures.len()
            + self.sprites.len()
            + self.animations.len()
            + self.particles.len()
            + self.sprite_fonts.len()
            + self.ttf_fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `path` through `vfs` and decode it into a texture.
    pub fn load_texture(
        &mut self,
        name: &str,
        path: &str,
        mipmaps: bool,
        vfs: &mut VirtualFileSystem,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        self.textures
            .load_with(self.pool_type, ResourceType::Texture, name, || {
                let data = vfs.load_file(path)?;
                let native = device
                    .create_texture_from_memory(&data, mipmaps)
                    .map_err(|e| ResourceError::Device(format!("texture '{}': {}", path, e)))?;
                Ok(ResTexture::new(name, native))
            })
    }

    /// Cut a sprite out of `texture`.
    pub fn load_image(
        &mut self,
        name: &str,
        texture_name: &str,
        texture: Option<Rc<ResTexture>>,
        params: &ImageParams,
        scale: f32,
    ) -> Result<()> {
        self.sprites
            .load_with(self.pool_type, ResourceType::Sprite, name, || {
                let texture =
                    texture.ok_or_else(|| missing_dependency(ResourceType::Texture, texture_name))?;
                if !params.rect.is_valid() {
                    return Err(ResourceError::InvalidArgument(format!(
                        "image '{}' has an empty region",
                        name
                    )));
                }
                let sprite = Sprite::new(texture, params.rect, scale);
                Ok(ResSprite::new(name, sprite, params.half_size, params.rectangle))
            })
    }

    /// Slice a frame grid out of `texture`.
    pub fn load_animation(
        &mut self,
        name: &str,
        texture_name: &str,
        texture: Option<Rc<ResTexture>>,
        params: &AnimationParams,
        scale: f32,
    ) -> Result<()> {
        self.animations
            .load_with(self.pool_type, ResourceType::Animation, name, || {
                let texture =
                    texture.ok_or_else(|| missing_dependency(ResourceType::Texture, texture_name))?;
                ResAnimation::new(name, &texture, params, scale)
            })
    }

    /// Read a `.psi` descriptor and bind it to a copy of `sprite`.
    #[allow(clippy::too_many_arguments)]
    pub fn load_particle(
        &mut self,
        name: &str,
        path: &str,
        sprite_name: &str,
        sprite: Option<Rc<ResSprite>>,
        half_size: DVec2,
        rectangle: bool,
        vfs: &mut VirtualFileSystem,
    ) -> Result<()> {
        self.particles
            .load_with(self.pool_type, ResourceType::Particle, name, || {
                let sprite =
                    sprite.ok_or_else(|| missing_dependency(ResourceType::Sprite, sprite_name))?;
                let data = vfs.load_file(path)?;
                let info = ParticleInfo::from_bytes(&data)?;
                Ok(ResParticle::new(
                    name,
                    info,
                    sprite.sprite().clone(),
                    half_size,
                    rectangle,
                ))
            })
    }

    /// Load an HGE font definition and its bitmap.
    ///
    /// Without `texture_path` the bitmap named in the definition is loaded
    /// relative to the definition file.
    pub fn load_sprite_font(
        &mut self,
        name: &str,
        path: &str,
        texture_path: Option<&str>,
        mipmaps: bool,
        vfs: &mut VirtualFileSystem,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        self.sprite_fonts
            .load_with(self.pool_type, ResourceType::SpriteFont, name, || {
                let data = vfs.load_file(path)?;
                let text = String::from_utf8(data).map_err(|e| {
                    ResourceError::decode(format!("font definition '{}': {}", path, e))
                })?;
                let def = HgeFontDefinition::parse(&text)?;

                let bitmap_path = match texture_path {
                    Some(p) => p.to_string(),
                    None => resolve_bitmap_path(path, &def.bitmap),
                };
                let bitmap = vfs.load_file(&bitmap_path)?;
                let native = device
                    .create_texture_from_memory(&bitmap, mipmaps)
                    .map_err(|e| {
                        ResourceError::Device(format!("font bitmap '{}': {}", bitmap_path, e))
                    })?;
                let texture = Rc::new(ResTexture::new(bitmap_path, native));
                Ok(ResFont::new(
                    name,
                    FontProvider::Sprite(HgeFont::new(texture, def.glyphs)),
                ))
            })
    }

    /// Hand TrueType data to the render device.
    pub fn load_ttf_font(
        &mut self,
        name: &str,
        path: &str,
        width: f32,
        height: f32,
        vfs: &mut VirtualFileSystem,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        self.ttf_fonts
            .load_with(self.pool_type, ResourceType::TrueTypeFont, name, || {
                let data = vfs.load_file(path)?;
                let native = device
                    .create_ttf_font_from_memory(&data, width, height)
                    .map_err(|e| ResourceError::Device(format!("font '{}': {}", path, e)))?;
                Ok(ResFont::new(name, FontProvider::TrueType(native)))
            })
    }

    pub fn get_texture(&self, name: &str) -> Option<Rc<ResTexture>> {
        self.textures.get(name)
    }

    pub fn get_sprite(&self, name: &str) -> Option<Rc<ResSprite>> {
        self.sprites.get(name)
    }

    pub fn get_animation(&self, name: &str) -> Option<Rc<ResAnimation>> {
        self.animations.get(name)
    }

    pub fn get_particle(&self, name: &str) -> Option<Rc<ResParticle>> {
        self.particles.get(name)
    }

    pub fn get_sprite_font(&self, name: &str) -> Option<Rc<ResFont>> {
        self.sprite_fonts.get(name)
    }

    pub fn get_ttf_font(&self, name: &str) -> Option<Rc<ResFont>> {
        self.ttf_fonts.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::primitives::Rect;
    use crate::resources::renderdevice::{HeadlessDevice, HeadlessTexture};

    fn texture(name: &str) -> Rc<ResTexture> {
        Rc::new(ResTexture::new(
            name,
            Box::new(HeadlessTexture {
                width: 64,
                height: 64,
            }),
        ))
    }

    fn image(x: f32) -> ImageParams {
        ImageParams {
            rect: Rect::new(x, 0.0, 16.0, 16.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_image_keeps_first() {
        let mut pool = ResourcePool::new(PoolType::Global);
        pool.load_image("ship", "tex", Some(texture("tex")), &image(0.0), 1.0)
            .unwrap();
        let first = pool.get_sprite("ship").unwrap();

        pool.load_image("ship", "tex", Some(texture("tex")), &image(32.0), 1.0)
            .unwrap();
        let second = pool.get_sprite("ship").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.sprite().rect().x, 0.0);
    }

    #[test]
    fn test_missing_texture_leaves_pool_unchanged() {
        let mut pool = ResourcePool::new(PoolType::Stage);
        let err = pool
            .load_image("ship", "nope", None, &image(0.0), 1.0)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_failed_texture_load_is_not_cached() {
        let mut pool = ResourcePool::new(PoolType::Global);
        let mut vfs = VirtualFileSystem::new();
        let mut device = HeadlessDevice::new();
        assert!(pool
            .load_texture("t", "/no/such/texture.png", true, &mut vfs, &mut device)
            .is_err());
        assert!(!pool.check_resource_exists(ResourceType::Texture, "t"));
    }

    #[test]
    fn test_listing_and_clear() {
        let mut pool = ResourcePool::new(PoolType::Global);
        pool.load_image("a", "tex", Some(texture("tex")), &image(0.0), 1.0)
            .unwrap();
        pool.load_image("b", "tex", Some(texture("tex")), &image(16.0), 1.0)
            .unwrap();
        let mut names = pool.list_resource_names(ResourceType::Sprite);
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert!(pool.list_resource_names(ResourceType::Texture).is_empty());

        let held = pool.get_sprite("a").unwrap();
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(held.name(), "a");
    }
}
