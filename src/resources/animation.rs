//! Frame animation resource.

use std::cell::Cell;
use std::rc::Rc;

use glam::DVec2;
use smallvec::SmallVec;

use crate::error::{ResourceError, Result};
use crate::resources::primitives::{BlendMode, Rect};
use crate::resources::sprite::Sprite;
use crate::resources::texture::ResTexture;

/// Upper bound on `columns * rows` for one animation.
pub const ANIMATION_MAX_FRAMES: u32 = 4096;

/// Parameters of an animation load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationParams {
    /// Whole region holding the frame grid, in texels
    pub rect: Rect,
    /// Frames per row
    pub columns: u32,
    /// Number of rows
    pub rows: u32,
    /// Ticks each frame stays on screen
    pub interval: u32,
    pub half_size: DVec2,
    pub rectangle: bool,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            columns: 1,
            rows: 1,
            interval: 1,
            half_size: DVec2::ZERO,
            rectangle: false,
        }
    }
}

/// A sequence of equally sized frames cut from one texture.
#[derive(Debug)]
pub struct ResAnimation {
    name: String,
    frames: SmallVec<[Sprite; 8]>,
    interval: u32,
    blend: Cell<BlendMode>,
    half_size: DVec2,
    rectangle: bool,
}

impl ResAnimation {
    /// Slice `params.rect` into a `columns` x `rows` grid, row by row.
    pub fn new(
        name: impl Into<String>,
        texture: &Rc<ResTexture>,
        params: &AnimationParams,
        scale: f32,
    ) -> Result<Self> {
        let name = name.into();
        if params.columns == 0 || params.rows == 0 {
            return Err(ResourceError::InvalidArgument(format!(
                "animation '{}' needs at least one row and column",
                name
            )));
        }
        if params.interval == 0 {
            return Err(ResourceError::InvalidArgument(format!(
                "animation '{}' has a zero frame interval",
                name
            )));
        }
        if !params.rect.is_valid() {
            return Err(ResourceError::InvalidArgument(format!(
                "animation '{}' has an empty region",
                name
            )));
        }

        let count = params
            .columns
            .checked_mul(params.rows)
            .filter(|&n| n <= ANIMATION_MAX_FRAMES)
            .ok_or_else(|| {
                ResourceError::InvalidArgument(format!(
                    "animation '{}' has too many frames ({} x {})",
                    name, params.columns, params.rows
                ))
            })?;

        let frame_w = params.rect.width / params.columns as f32;
        let frame_h = params.rect.height / params.rows as f32;

        let mut frames = SmallVec::with_capacity(count as usize);
        for row in 0..params.rows {
            for col in 0..params.columns {
                let region = Rect::new(
                    params.rect.x + frame_w * col as f32,
                    params.rect.y + frame_h * row as f32,
                    frame_w,
                    frame_h,
                );
                let frame = Sprite::new(Rc::clone(texture), region, scale);
                frame.set_z(0.5);
                frames.push(frame);
            }
        }

        Ok(Self {
            name,
            frames,
            interval: params.interval,
            blend: Cell::new(BlendMode::default()),
            half_size: params.half_size,
            rectangle: params.rectangle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of frames
    pub fn count(&self) -> usize {
        self.frames.len()
    }

    /// Frame at `index`, or `None` past the end
    pub fn sprite(&self, index: usize) -> Option<&Sprite> {
        self.frames.get(index)
    }

    /// Frame shown at `tick`
    pub fn sprite_for_tick(&self, tick: u64) -> &Sprite {
        let index = (tick / self.interval as u64) % self.frames.len() as u64;
        &self.frames[index as usize]
    }

    pub fn interval(&self) -> u32 {
        self.interval
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
}
