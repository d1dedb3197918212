//! Sprites: rectangular texture regions and the named image resource.

use std::cell::Cell;
use std::rc::Rc;

use glam::{DVec2, Vec2};

use crate::resources::primitives::{BlendMode, Color, Rect};
use crate::resources::renderdevice::{Graphics2D, SpriteDraw};
use crate::resources::texture::ResTexture;

/// A region of a texture, ready to draw.
///
/// The drawn size is the source region multiplied by the image scale that
/// was in effect when the sprite was cut. The hot spot starts at the center
/// of the drawn quad. Color and z are interior-mutable so shared sprites can
/// be recolored through an `Rc`.
#[derive(Debug, Clone)]
pub struct Sprite {
    texture: Rc<ResTexture>,
    rect: Rect,
    size: Vec2,
    hot_spot: Vec2,
    color: Cell<Color>,
    z: Cell<f32>,
}

impl Sprite {
    /// Cut `rect` out of `texture`, scaling the drawn geometry by `scale`.
    pub fn new(texture: Rc<ResTexture>, rect: Rect, scale: f32) -> Self {
        let size = rect.size() * scale;
        Self {
            texture,
            rect,
            size,
            hot_spot: size * 0.5,
            color: Cell::new(Color::WHITE),
            z: Cell::new(1.0),
        }
    }

    pub fn texture(&self) -> &Rc<ResTexture> {
        &self.texture
    }

    /// Source region in texels
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Drawn size
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn hot_spot(&self) -> Vec2 {
        self.hot_spot
    }

    pub fn set_hot_spot(&mut self, hot_spot: Vec2) {
        self.hot_spot = hot_spot;
    }

    pub fn color(&self) -> Color {
        self.color.get()
    }

    pub fn set_color(&self, color: Color) {
        self.color.set(color);
    }

    pub fn z(&self) -> f32 {
        self.z.get()
    }

    pub fn set_z(&self, z: f32) {
        self.z.set(z);
    }

    /// Draw with the sprite's own color.
    pub fn draw(
        &self,
        graphics: &mut dyn Graphics2D,
        position: Vec2,
        rotation: f32,
        scale: Vec2,
        blend: BlendMode,
    ) {
        self.draw_with_color(graphics, position, rotation, scale, self.color(), blend);
    }

    /// Draw with an explicit vertex color.
    pub fn draw_with_color(
        &self,
        graphics: &mut dyn Graphics2D,
        position: Vec2,
        rotation: f32,
        scale: Vec2,
        color: Color,
        blend: BlendMode,
    ) {
        graphics.draw_sprite(&SpriteDraw {
            texture: self.texture.native(),
            source: self.rect,
            position,
            size: self.size,
            hot_spot: self.hot_spot,
            rotation,
            scale,
            color,
            z: self.z(),
            blend,
        });
    }
}

/// Parameters of an image load.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageParams {
    /// Region of the texture in texels
    pub rect: Rect,
    /// Collision half-extents, stored as given
    pub half_size: DVec2,
    /// Rectangle collision instead of circle
    pub rectangle: bool,
}

/// A named sprite with blend mode and collision metadata.
#[derive(Debug)]
pub struct ResSprite {
    name: String,
    sprite: Sprite,
    blend: Cell<BlendMode>,
    half_size: DVec2,
    rectangle: bool,
}

impl ResSprite {
    pub fn new(name: impl Into<String>, sprite: Sprite, half_size: DVec2, rectangle: bool) -> Self {
        sprite.set_color(Color::WHITE);
        Self {
            name: name.into(),
            sprite,
            blend: Cell::new(BlendMode::default()),
            half_size,
            rectangle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sprite(&self) -> &Sprite {
        &self.sprite
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend.get()
    }

    pub fn set_blend_mode(&self, blend: BlendMode) {
        self.blend.set(blend);
    }

    pub fn half_size(&self) -> DVec2 {
        self.half_size
    }

    pub fn is_rectangle(&self) -> bool {
        self.rectangle
    }

    /// Draw at `position` with this resource's blend mode.
    pub fn render(&self, graphics: &mut dyn Graphics2D, position: Vec2, rotation: f32, scale: Vec2) {
        self.sprite
            .draw(graphics, position, rotation, scale, self.blend_mode());
    }
}
