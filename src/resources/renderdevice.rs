//! Render collaborator contracts.
//!
//! The resource layer never talks to a GPU directly. A [`RenderDevice`]
//! turns encoded bytes into native textures and fonts at load time, and a
//! [`Graphics2D`] sink receives [`SpriteDraw`] commands at render time.
//! Native primitives are opaque boxed trait objects; a backend recovers its
//! own type through `as_any`.
//!
//! [`HeadlessDevice`] and [`RecordingGraphics`] implement the contracts
//! without a window. They back the command line tools and the tests.

use std::any::Any;
use std::io::Cursor;

use glam::Vec2;
use log::debug;

use crate::resources::primitives::{BlendMode, Color, Rect};

/// A texture owned by the render backend.
pub trait NativeTexture: Any {
    /// Width in texels
    fn width(&self) -> u32;
    /// Height in texels
    fn height(&self) -> u32;
    fn as_any(&self) -> &dyn Any;
}

/// A scalable font owned by the render backend.
pub trait NativeFont: Any {
    /// Distance between baselines in pixels
    fn line_height(&self) -> f32;
    fn as_any(&self) -> &dyn Any;
}

/// Load-time half of the render collaborator.
pub trait RenderDevice {
    /// Decode an encoded image (PNG, JPEG, ...) into a texture.
    fn create_texture_from_memory(
        &mut self,
        data: &[u8],
        mipmaps: bool,
    ) -> Result<Box<dyn NativeTexture>, String>;

    /// Build a TrueType font from file bytes with the given glyph size.
    fn create_ttf_font_from_memory(
        &mut self,
        data: &[u8],
        width: f32,
        height: f32,
    ) -> Result<Box<dyn NativeFont>, String>;
}

/// One textured quad.
pub struct SpriteDraw<'a> {
    pub texture: &'a dyn NativeTexture,
    /// Source region in texels
    pub source: Rect,
    /// World position of the hot spot
    pub position: Vec2,
    /// Drawn size before `scale`
    pub size: Vec2,
    /// Pivot inside the drawn quad, in drawn units
    pub hot_spot: Vec2,
    /// Rotation in radians around the hot spot
    pub rotation: f32,
    pub scale: Vec2,
    pub color: Color,
    pub z: f32,
    pub blend: BlendMode,
}

/// Render-time half of the render collaborator.
pub trait Graphics2D {
    fn draw_sprite(&mut self, cmd: &SpriteDraw<'_>);
}

/// Texture with known dimensions and no pixel storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub width: u32,
    pub height: u32,
}

impl NativeTexture for HeadlessTexture {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Font placeholder that remembers its requested glyph size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessFont {
    pub glyph_width: f32,
    pub glyph_height: f32,
}

impl NativeFont for HeadlessFont {
    fn line_height(&self) -> f32 {
        self.glyph_height
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Render device that validates data but keeps nothing on a GPU.
///
/// Images are probed with the `image` crate, so a texture load still fails
/// on undecodable data. TTF data is checked for a known sfnt signature.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    textures_created: usize,
    fonts_created: usize,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of textures created so far
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    /// Number of fonts created so far
    pub fn fonts_created(&self) -> usize {
        self.fonts_created
    }
}

const SFNT_SIGNATURES: [[u8; 4]; 4] = [
    [0x00, 0x01, 0x00, 0x00],
    *b"true",
    *b"OTTO",
    *b"ttcf",
];

impl RenderDevice for HeadlessDevice {
    fn create_texture_from_memory(
        &mut self,
        data: &[u8],
        _mipmaps: bool,
    ) -> Result<Box<dyn NativeTexture>, String> {
        let (width, height) = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .into_dimensions()
            .map_err(|e| e.to_string())?;
        self.textures_created += 1;
        debug!("HeadlessDevice: texture {}x{}", width, height);
        Ok(Box::new(HeadlessTexture { width, height }))
    }

    fn create_ttf_font_from_memory(
        &mut self,
        data: &[u8],
        width: f32,
        height: f32,
    ) -> Result<Box<dyn NativeFont>, String> {
        if data.len() < 4 || !SFNT_SIGNATURES.iter().any(|s| data[..4] == s[..]) {
            return Err("not a TrueType/OpenType font".to_string());
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(format!("invalid glyph size {}x{}", width, height));
        }
        self.fonts_created += 1;
        Ok(Box::new(HeadlessFont {
            glyph_width: width,
            glyph_height: height,
        }))
    }
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub source: Rect,
    pub position: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub color: Color,
    pub blend: BlendMode,
}

/// Graphics sink that records every draw call.
#[derive(Debug, Default)]
pub struct RecordingGraphics {
    pub draws: Vec<DrawRecord>,
}

impl RecordingGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget recorded draws, typically once per frame.
    pub fn clear(&mut self) {
        self.draws.clear();
    }
}

impl Graphics2D for RecordingGraphics {
    fn draw_sprite(&mut self, cmd: &SpriteDraw<'_>) {
        self.draws.push(DrawRecord {
            source: cmd.source,
            position: cmd.position,
            size: cmd.size,
            rotation: cmd.rotation,
            scale: cmd.scale,
            color: cmd.color,
            blend: cmd.blend,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_headless_texture_reads_png_dimensions() {
        let mut device = HeadlessDevice::new();
        let tex = device
            .create_texture_from_memory(&png_bytes(32, 16), true)
            .unwrap();
        assert_eq!((tex.width(), tex.height()), (32, 16));
        assert_eq!(device.textures_created(), 1);
    }

    #[test]
    fn test_headless_texture_rejects_garbage() {
        let mut device = HeadlessDevice::new();
        assert!(device.create_texture_from_memory(b"not an image", false).is_err());
        assert_eq!(device.textures_created(), 0);
    }

    #[test]
    fn test_headless_font_checks_signature() {
        let mut device = HeadlessDevice::new();
        let font = device
            .create_ttf_font_from_memory(b"\x00\x01\x00\x00rest", 12.0, 16.0)
            .unwrap();
        assert_eq!(font.line_height(), 16.0);
        assert!(device.create_ttf_font_from_memory(b"nope", 12.0, 16.0).is_err());
    }

    #[test]
    fn test_native_texture_downcasts() {
        let boxed: Box<dyn NativeTexture> = Box::new(HeadlessTexture {
            width: 4,
            height: 4,
        });
        let concrete = boxed.as_any().downcast_ref::<HeadlessTexture>().unwrap();
        assert_eq!(concrete.width, 4);
    }
}
