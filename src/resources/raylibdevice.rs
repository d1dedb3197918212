//! Raylib render backend.
//!
//! Implements [`RenderDevice`] and [`Graphics2D`] on top of raylib. Raylib
//! handles must be used from the main thread only, like every other
//! resource that wraps them.
//!
//! Raylib has no "additive vertex color" blend; the color half of a
//! [`BlendMode`] is ignored and only the alpha half selects between alpha
//! and additive blending.

use std::any::Any;
use std::io::Cursor;

use raylib::ffi;
use raylib::prelude::*;

use crate::resources::primitives::BlendMode;
use crate::resources::renderdevice::{
    Graphics2D, NativeFont, NativeTexture, RenderDevice, SpriteDraw,
};

/// Texture uploaded to the GPU.
pub struct RaylibTexture(pub Texture2D);

impl NativeTexture for RaylibTexture {
    fn width(&self) -> u32 {
        self.0.width().max(0) as u32
    }
    fn height(&self) -> u32 {
        self.0.height().max(0) as u32
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Font rasterized by raylib.
pub struct RaylibFontHandle(pub Font);

impl NativeFont for RaylibFontHandle {
    fn line_height(&self) -> f32 {
        self.0.base_size() as f32
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Load-time device borrowing the raylib handle.
pub struct RaylibDevice<'a> {
    rl: &'a mut RaylibHandle,
    thread: &'a RaylibThread,
}

impl<'a> RaylibDevice<'a> {
    pub fn new(rl: &'a mut RaylibHandle, thread: &'a RaylibThread) -> Self {
        Self { rl, thread }
    }
}

fn image_extension(data: &[u8]) -> Result<&'static str, String> {
    let format = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .format()
        .ok_or_else(|| "unknown image format".to_string())?;
    Ok(match format {
        image::ImageFormat::Png => ".png",
        image::ImageFormat::Jpeg => ".jpg",
        other => return Err(format!("unsupported image format {:?}", other)),
    })
}

impl RenderDevice for RaylibDevice<'_> {
    fn create_texture_from_memory(
        &mut self,
        data: &[u8],
        mipmaps: bool,
    ) -> Result<Box<dyn NativeTexture>, String> {
        let ext = image_extension(data)?;
        let image = Image::load_image_from_mem(ext, data).map_err(|e| e.to_string())?;
        let mut texture = self
            .rl
            .load_texture_from_image(self.thread, &image)
            .map_err(|e| e.to_string())?;
        if mipmaps {
            texture.gen_texture_mipmaps();
        }
        Ok(Box::new(RaylibTexture(texture)))
    }

    fn create_ttf_font_from_memory(
        &mut self,
        data: &[u8],
        _width: f32,
        height: f32,
    ) -> Result<Box<dyn NativeFont>, String> {
        let font = self
            .rl
            .load_font_from_memory(self.thread, ".ttf", data, height.round() as i32, None)
            .map_err(|e| e.to_string())?;
        Ok(Box::new(RaylibFontHandle(font)))
    }
}

/// Draw sink over any raylib draw handle.
pub struct RaylibGraphics<'a, D: RaylibDraw> {
    d: &'a mut D,
}

impl<'a, D: RaylibDraw> RaylibGraphics<'a, D> {
    pub fn new(d: &'a mut D) -> Self {
        Self { d }
    }
}

impl<D: RaylibDraw> Graphics2D for RaylibGraphics<'_, D> {
    fn draw_sprite(&mut self, cmd: &SpriteDraw<'_>) {
        let Some(texture) = cmd.texture.as_any().downcast_ref::<RaylibTexture>() else {
            log::warn!("RaylibGraphics: texture was not created by raylib");
            return;
        };
        let src = Rectangle {
            x: cmd.source.x,
            y: cmd.source.y,
            width: cmd.source.width,
            height: cmd.source.height,
        };
        let size = cmd.size * cmd.scale;
        let dest = Rectangle {
            x: cmd.position.x,
            y: cmd.position.y,
            width: size.x,
            height: size.y,
        };
        let origin = cmd.hot_spot * cmd.scale;
        let tint = Color::new(cmd.color.r, cmd.color.g, cmd.color.b, cmd.color.a);

        let mode = match cmd.blend {
            b if b.is_alpha_blend() => ffi::BlendMode::BLEND_ALPHA,
            BlendMode::AddAdd | BlendMode::MulAdd => ffi::BlendMode::BLEND_ADDITIVE,
            _ => ffi::BlendMode::BLEND_ALPHA,
        };
        unsafe { ffi::BeginBlendMode(mode as i32) };
        self.d.draw_texture_pro(
            &texture.0,
            src,
            dest,
            Vector2::new(origin.x, origin.y),
            cmd.rotation.to_degrees(),
            tint,
        );
        unsafe { ffi::EndBlendMode() };
    }
}
