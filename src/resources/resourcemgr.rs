//! Resource manager: mount list, virtual file loader and two scoped pools.
//!
//! Load calls go to the active pool. Lookups search the stage pool first,
//! then the global pool, so a stage can override a global asset by name.
//! Every entry point logs its failures and returns them as `Err`; nothing
//! panics on bad data.
//!
//! This is a non-send resource: resources are shared through `Rc`. Insert
//! with `insert_non_send_resource` and access via `NonSend<ResourceManager>`
//! or `NonSendMut<ResourceManager>`.

use std::rc::Rc;

use glam::{DVec2, Vec2};
use log::{info, warn};

use crate::error::{ResourceError, Result};
use crate::resources::animation::{AnimationParams, ResAnimation};
use crate::resources::font::ResFont;
use crate::resources::particle::ResParticle;
use crate::resources::renderdevice::RenderDevice;
use crate::resources::resourcepool::{PoolType, ResourcePool, ResourceType};
use crate::resources::sprite::{ImageParams, ResSprite};
use crate::resources::texture::ResTexture;
use crate::resources::vfs::VirtualFileSystem;

#[derive(Debug)]
pub struct ResourceManager {
    vfs: VirtualFileSystem,
    image_scale: f32,
    active_pool: PoolType,
    global: ResourcePool,
    stage: ResourcePool,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceManager {
    pub fn new() -> Self {
        Self {
            vfs: VirtualFileSystem::new(),
            image_scale: 1.0,
            active_pool: PoolType::Global,
            global: ResourcePool::new(PoolType::Global),
            stage: ResourcePool::new(PoolType::Stage),
        }
    }

    pub fn vfs(&self) -> &VirtualFileSystem {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut VirtualFileSystem {
        &mut self.vfs
    }

    /// Scale applied to sprite geometry at load time
    pub fn image_scale(&self) -> f32 {
        self.image_scale
    }

    pub fn set_image_scale(&mut self, scale: f32) {
        self.image_scale = scale;
    }

    pub fn active_pool_type(&self) -> PoolType {
        self.active_pool
    }

    /// Select the pool that receives loads.
    pub fn set_active_pool(&mut self, pool: PoolType) {
        self.active_pool = pool;
    }

    pub fn pool(&self, pool: PoolType) -> &ResourcePool {
        match pool {
            PoolType::Global => &self.global,
            PoolType::Stage => &self.stage,
        }
    }

    pub fn pool_mut(&mut self, pool: PoolType) -> &mut ResourcePool {
        match pool {
            PoolType::Global => &mut self.global,
            PoolType::Stage => &mut self.stage,
        }
    }

    pub fn active_pool(&self) -> &ResourcePool {
        self.pool(self.active_pool)
    }

    /// Clear both pools, reselect the global pool and reset the image scale.
    pub fn clear_all_resources(&mut self) {
        self.global.clear();
        self.stage.clear();
        self.active_pool = PoolType::Global;
        self.image_scale = 1.0;
        info!("ResourceManager: all resources cleared");
    }

    // Packs and files

    pub fn load_pack(&mut self, path: &str, password: Option<&str>) -> Result<()> {
        self.vfs.load_pack(path, password)
    }

    pub fn unload_pack(&mut self, path: &str) {
        self.vfs.unload_pack(path);
    }

    pub fn unload_all_packs(&mut self) {
        self.vfs.unload_all_packs();
    }

    pub fn load_file(&mut self, path: &str) -> Result<Vec<u8>> {
        self.vfs.load_file(path)
    }

    /// Copy a resource file out to the native filesystem.
    pub fn extract_resource(&mut self, path: &str, target: &str) -> Result<()> {
        self.vfs.extract(path, target)
    }

    // Loading into the active pool

    pub fn load_texture(
        &mut self,
        name: &str,
        path: &str,
        mipmaps: bool,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        let pool = match self.active_pool {
            PoolType::Global => &mut self.global,
            PoolType::Stage => &mut self.stage,
        };
        pool.load_texture(name, path, mipmaps, &mut self.vfs, device)
    }

    pub fn load_image(&mut self, name: &str, texture_name: &str, params: &ImageParams) -> Result<()> {
        let texture = self.find_texture(texture_name);
        let scale = self.image_scale;
        self.pool_mut(self.active_pool)
            .load_image(name, texture_name, texture, params, scale)
    }

    pub fn load_animation(
        &mut self,
        name: &str,
        texture_name: &str,
        params: &AnimationParams,
    ) -> Result<()> {
        let texture = self.find_texture(texture_name);
        let scale = self.image_scale;
        self.pool_mut(self.active_pool)
            .load_animation(name, texture_name, texture, params, scale)
    }

    pub fn load_particle(
        &mut self,
        name: &str,
        path: &str,
        sprite_name: &str,
        half_size: DVec2,
        rectangle: bool,
    ) -> Result<()> {
        let sprite = self.find_sprite(sprite_name);
        let pool = match self.active_pool {
            PoolType::Global => &mut self.global,
            PoolType::Stage => &mut self.stage,
        };
        pool.load_particle(
            name,
            path,
            sprite_name,
            sprite,
            half_size,
            rectangle,
            &mut self.vfs,
        )
    }

    pub fn load_sprite_font(
        &mut self,
        name: &str,
        path: &str,
        texture_path: Option<&str>,
        mipmaps: bool,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        let pool = match self.active_pool {
            PoolType::Global => &mut self.global,
            PoolType::Stage => &mut self.stage,
        };
        pool.load_sprite_font(name, path, texture_path, mipmaps, &mut self.vfs, device)
    }

    pub fn load_ttf_font(
        &mut self,
        name: &str,
        path: &str,
        width: f32,
        height: f32,
        device: &mut dyn RenderDevice,
    ) -> Result<()> {
        let pool = match self.active_pool {
            PoolType::Global => &mut self.global,
            PoolType::Stage => &mut self.stage,
        };
        pool.load_ttf_font(name, path, width, height, &mut self.vfs, device)
    }

    // Lookups: stage first, then global

    pub fn find_texture(&self, name: &str) -> Option<Rc<ResTexture>> {
        self.stage
            .get_texture(name)
            .or_else(|| self.global.get_texture(name))
    }

    pub fn find_sprite(&self, name: &str) -> Option<Rc<ResSprite>> {
        self.stage
            .get_sprite(name)
            .or_else(|| self.global.get_sprite(name))
    }

    pub fn find_animation(&self, name: &str) -> Option<Rc<ResAnimation>> {
        self.stage
            .get_animation(name)
            .or_else(|| self.global.get_animation(name))
    }

    pub fn find_particle(&self, name: &str) -> Option<Rc<ResParticle>> {
        self.stage
            .get_particle(name)
            .or_else(|| self.global.get_particle(name))
    }

    pub fn find_sprite_font(&self, name: &str) -> Option<Rc<ResFont>> {
        self.stage
            .get_sprite_font(name)
            .or_else(|| self.global.get_sprite_font(name))
    }

    pub fn find_ttf_font(&self, name: &str) -> Option<Rc<ResFont>> {
        self.stage
            .get_ttf_font(name)
            .or_else(|| self.global.get_ttf_font(name))
    }

    /// Dimensions of a texture in texels.
    pub fn texture_size(&self, name: &str) -> Result<Vec2> {
        match self.find_texture(name) {
            Some(texture) => Ok(texture.size()),
            None => {
                warn!("ResourceManager: texture '{}' not found", name);
                Err(ResourceError::not_found(format!("texture '{}'", name)))
            }
        }
    }

    /// Whether `name` exists in either pool
    pub fn check_resource_exists(&self, kind: ResourceType, name: &str) -> bool {
        self.stage.check_resource_exists(kind, name) || self.global.check_resource_exists(kind, name)
    }

    /// Names of `kind` in both pools, deduplicated.
    pub fn list_resource_names(&self, kind: ResourceType) -> Vec<String> {
        let mut names = self.global.list_resource_names(kind);
        names.extend(self.stage.list_resource_names(kind));
        names.sort_unstable();
        names.dedup();
        names
    }
}
