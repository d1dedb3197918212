//! Small value types shared by resources and the render collaborator.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Blend mode used when drawing sprites, animations, fonts and particles.
///
/// The first half names the color operation (add or multiply vertex color),
/// the second the alpha operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    AddAdd,
    AddAlpha,
    MulAdd,
    #[default]
    MulAlpha,
}

impl BlendMode {
    /// Decode HGE blend bits: bit 0 = additive color, bit 1 = alpha blending.
    pub fn from_hge_bits(bits: u32) -> Self {
        match (bits & 1 != 0, bits & 2 != 0) {
            (true, true) => BlendMode::AddAlpha,
            (true, false) => BlendMode::AddAdd,
            (false, true) => BlendMode::MulAlpha,
            (false, false) => BlendMode::MulAdd,
        }
    }

    /// Whether vertex color is added to the texel instead of multiplied
    pub fn is_color_add(self) -> bool {
        matches!(self, BlendMode::AddAdd | BlendMode::AddAlpha)
    }

    /// Whether the destination is alpha blended instead of added
    pub fn is_alpha_blend(self) -> bool {
        matches!(self, BlendMode::AddAlpha | BlendMode::MulAlpha)
    }
}

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    /// Create a color from RGBA components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create from a packed `0xAARRGGBB` value.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// Pack as `0xAARRGGBB`.
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Create from normalized `[r, g, b, a]` floats, clamping to `0..=1`.
    pub fn from_unit_rgba(rgba: [f32; 4]) -> Self {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(to_u8(rgba[0]), to_u8(rgba[1]), to_u8(rgba[2]), to_u8(rgba[3]))
    }

    /// Copy of this color with another alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Axis-aligned rectangle in texture or world units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner
    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Width and height
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Whether both extents are positive and finite
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}
