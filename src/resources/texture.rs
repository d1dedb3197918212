//! Texture resource.

use std::fmt;

use glam::Vec2;

use crate::resources::renderdevice::NativeTexture;

/// A named texture decoded by the render device.
///
/// Texture resolution is never affected by the global image scale; only
/// sprite geometry cut from the texture is.
pub struct ResTexture {
    name: String,
    texture: Box<dyn NativeTexture>,
}

impl ResTexture {
    pub fn new(name: impl Into<String>, texture: Box<dyn NativeTexture>) -> Self {
        Self {
            name: name.into(),
            texture,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend texture, downcast with `as_any` by the backend that made it
    pub fn native(&self) -> &dyn NativeTexture {
        self.texture.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Dimensions in texels as floats
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }
}

impl fmt::Debug for ResTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResTexture")
            .field("name", &self.name)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
