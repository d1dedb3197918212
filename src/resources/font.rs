//! Font resources: HGE bitmap fonts and device-backed TrueType fonts.
//!
//! An HGE font definition is a small text file:
//!
//! ```text
//! [HGEFONT]
//! Bitmap=font.png
//! Char=" ",1,1,3,19,0,3
//! Char=41,5,1,11,19,0,1
//! ```
//!
//! Each `Char` line gives the glyph (quoted literal or hex code point), its
//! texel region `x,y,w,h` and the pre/post advance adjustments.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;
use log::warn;
use rustc_hash::FxHashMap;

use crate::error::{ResourceError, Result};
use crate::resources::primitives::{BlendMode, Color, Rect};
use crate::resources::renderdevice::NativeFont;
use crate::resources::texture::ResTexture;

/// Placement of one bitmap glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Region of the font bitmap in texels
    pub rect: Rect,
    /// Advance applied before the glyph
    pub pre: f32,
    /// Advance applied after the glyph
    pub post: f32,
}

impl Glyph {
    /// Horizontal advance of the glyph
    pub fn advance(&self) -> f32 {
        self.pre + self.rect.width + self.post
    }
}

/// Parsed contents of an HGE font definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HgeFontDefinition {
    /// `Bitmap=` value, relative to the definition file
    pub bitmap: String,
    pub glyphs: FxHashMap<char, Glyph>,
}

impl HgeFontDefinition {
    /// Parse definition text. A leading BOM is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut def = HgeFontDefinition::default();
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.eq_ignore_ascii_case("[HGEFONT]") {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("HgeFont: ignoring line {}: '{}'", line_no + 1, line);
                continue;
            };
            match key.trim() {
                "Bitmap" => def.bitmap = value.trim().to_string(),
                "Char" => {
                    let (ch, glyph) = parse_char(value.trim()).ok_or_else(|| {
                        ResourceError::decode(format!(
                            "bad font glyph on line {}: '{}'",
                            line_no + 1,
                            line
                        ))
                    })?;
                    def.glyphs.insert(ch, glyph);
                }
                other => warn!("HgeFont: unknown key '{}' on line {}", other, line_no + 1),
            }
        }

        if def.bitmap.is_empty() {
            return Err(ResourceError::decode("font definition has no Bitmap entry"));
        }
        Ok(def)
    }
}

fn parse_char(value: &str) -> Option<(char, Glyph)> {
    let (ch, rest) = if let Some(quoted) = value.strip_prefix('"') {
        let mut chars = quoted.chars();
        let ch = chars.next()?;
        let rest = chars.as_str().strip_prefix('"')?.strip_prefix(',')?;
        (ch, rest)
    } else {
        let (code, rest) = value.split_once(',')?;
        let ch = char::from_u32(u32::from_str_radix(code.trim(), 16).ok()?)?;
        (ch, rest)
    };

    let nums: Vec<f32> = rest
        .split(',')
        .map(|n| n.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    let [x, y, w, h, pre, post] = nums.as_slice() else {
        return None;
    };
    Some((
        ch,
        Glyph {
            rect: Rect::new(*x, *y, *w, *h),
            pre: *pre,
            post: *post,
        },
    ))
}

/// Join `bitmap` to the directory of `definition_path`.
///
/// Both `/` and `\` count as separators; the result keeps the separator the
/// definition path used.
pub fn resolve_bitmap_path(definition_path: &str, bitmap: &str) -> String {
    match definition_path.rfind(['/', '\\']) {
        Some(pos) => format!("{}{}", &definition_path[..=pos], bitmap),
        None => bitmap.to_string(),
    }
}

/// Bitmap font built from an HGE definition.
#[derive(Debug)]
pub struct HgeFont {
    texture: Rc<ResTexture>,
    glyphs: FxHashMap<char, Glyph>,
    line_height: f32,
}

impl HgeFont {
    pub fn new(texture: Rc<ResTexture>, glyphs: FxHashMap<char, Glyph>) -> Self {
        let line_height = glyphs.values().map(|g| g.rect.height).fold(0.0, f32::max);
        Self {
            texture,
            glyphs,
            line_height,
        }
    }

    pub fn texture(&self) -> &Rc<ResTexture> {
        &self.texture
    }

    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Height of the tallest glyph
    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Size of `text` laid out left-aligned. Unknown glyphs take no space.
    pub fn measure(&self, text: &str) -> Vec2 {
        let mut width: f32 = 0.0;
        let mut lines = 0;
        for line in text.split('\n') {
            lines += 1;
            let line_width: f32 = line
                .chars()
                .filter_map(|c| self.glyphs.get(&c))
                .map(Glyph::advance)
                .sum();
            width = width.max(line_width);
        }
        Vec2::new(width, self.line_height * lines as f32)
    }
}

/// Where a font's glyphs come from.
pub enum FontProvider {
    Sprite(HgeFont),
    TrueType(Box<dyn NativeFont>),
}

impl fmt::Debug for FontProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontProvider::Sprite(font) => f.debug_tuple("Sprite").field(font).finish(),
            FontProvider::TrueType(font) => f
                .debug_struct("TrueType")
                .field("line_height", &font.line_height())
                .finish(),
        }
    }
}

/// A named font with its draw state.
#[derive(Debug)]
pub struct ResFont {
    name: String,
    provider: FontProvider,
    blend: Cell<BlendMode>,
    blend_color: Cell<Color>,
}

impl ResFont {
    pub fn new(name: impl Into<String>, provider: FontProvider) -> Self {
        Self {
            name: name.into(),
            provider,
            blend: Cell::new(BlendMode::default()),
            blend_color: Cell::new(Color::WHITE),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &FontProvider {
        &self.provider
    }

    /// The bitmap font, when this is one
    pub fn as_sprite_font(&self) -> Option<&HgeFont> {
        match &self.provider {
            FontProvider::Sprite(font) => Some(font),
            FontProvider::TrueType(_) => None,
        }
    }

    pub fn line_height(&self) -> f32 {
        match &self.provider {
            FontProvider::Sprite(font) => font.line_height(),
            FontProvider::TrueType(font) => font.line_height(),
        }
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend.get()
    }

    pub fn set_blend_mode(&self, blend: BlendMode) {
        self.blend.set(blend);
    }

    pub fn blend_color(&self) -> Color {
        self.blend_color.get()
    }

    pub fn set_blend_color(&self, color: Color) {
        self.blend_color.set(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::renderdevice::{HeadlessFont, HeadlessTexture};

    const DEFINITION: &str = "\u{feff}[HGEFONT]\r\n\
        Bitmap=font.png\r\n\
        Char=\" \",1,1,3,19,0,3\r\n\
        Char=\",\",5,1,4,19,-1,1\r\n\
        Char=41,10,1,11,20,0,1\r\n";

    #[test]
    fn test_parse_definition() {
        let def = HgeFontDefinition::parse(DEFINITION).unwrap();
        assert_eq!(def.bitmap, "font.png");
        assert_eq!(def.glyphs.len(), 3);
        assert_eq!(def.glyphs[&'A'].rect, Rect::new(10.0, 1.0, 11.0, 20.0));
        assert_eq!(def.glyphs[&','].pre, -1.0);
    }

    #[test]
    fn test_parse_rejects_missing_bitmap_and_bad_glyphs() {
        assert!(HgeFontDefinition::parse("[HGEFONT]\nChar=41,0,0,1,1,0,0\n").is_err());
        assert!(HgeFontDefinition::parse("Bitmap=a.png\nChar=41,0,0\n").is_err());
    }

    #[test]
    fn test_measure() {
        let def = HgeFontDefinition::parse(DEFINITION).unwrap();
        let tex = Rc::new(ResTexture::new(
            "font",
            Box::new(HeadlessTexture {
                width: 256,
                height: 256,
            }),
        ));
        let font = HgeFont::new(tex, def.glyphs);
        assert_eq!(font.line_height(), 20.0);
        // 'A' = 12, ' ' = 6
        assert_eq!(font.measure("A A"), Vec2::new(30.0, 20.0));
        assert_eq!(font.measure("A\nAA"), Vec2::new(24.0, 40.0));
        assert_eq!(font.measure("?"), Vec2::new(0.0, 20.0));
    }

    #[test]
    fn test_resolve_bitmap_path() {
        assert_eq!(resolve_bitmap_path("fonts\\menu.fnt", "menu.png"), "fonts\\menu.png");
        assert_eq!(resolve_bitmap_path("fonts/menu.fnt", "menu.png"), "fonts/menu.png");
        assert_eq!(resolve_bitmap_path("menu.fnt", "menu.png"), "menu.png");
    }

    #[test]
    fn test_res_font_blend_state() {
        let font = ResFont::new(
            "ttf",
            FontProvider::TrueType(Box::new(HeadlessFont {
                glyph_width: 10.0,
                glyph_height: 14.0,
            })),
        );
        assert_eq!(font.line_height(), 14.0);
        assert!(font.as_sprite_font().is_none());
        font.set_blend_mode(BlendMode::AddAlpha);
        font.set_blend_color(Color::BLACK);
        assert_eq!(font.blend_mode(), BlendMode::AddAlpha);
        assert_eq!(font.blend_color(), Color::BLACK);
    }
}
