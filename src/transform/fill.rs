use kurbo::{Affine, Size, Vec2};

use crate::foundation::core::Canvas;
use crate::foundation::error::{LapseError, LapseResult};

/// Where the scaled image sits on an axis where it overflows the canvas.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FillAnchor {
    /// Crop equally from both sides.
    #[default]
    Center,
    /// Keep the top/left edge; overflow is cropped from the bottom/right.
    Origin,
}

/// Scale-to-fill placement of a source image on the output canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillPlacement {
    /// Uniform scale factor, `max(canvas_w / src_w, canvas_h / src_h)`.
    pub ratio: f64,
    /// Source size after scaling; covers the canvas on both axes.
    pub scaled: Size,
    /// Canvas-space position of the scaled image's top-left corner.
    pub offset: Vec2,
}

impl FillPlacement {
    /// Source pixel space to canvas pixel space.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.ratio)
    }
}

/// Compute the scale-to-fill placement for a `src_w` x `src_h` image.
///
/// Axes where the scaled image is smaller than the canvas are centered. Axes where it overflows
/// follow `anchor`.
pub fn fill_placement(
    src_w: u32,
    src_h: u32,
    canvas: Canvas,
    anchor: FillAnchor,
) -> LapseResult<FillPlacement> {
    if src_w == 0 || src_h == 0 {
        return Err(LapseError::validation("source image must be non-empty"));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(LapseError::validation("canvas must be non-empty"));
    }

    let (sw, sh) = (f64::from(src_w), f64::from(src_h));
    let (tw, th) = (f64::from(canvas.width), f64::from(canvas.height));
    let ratio = (tw / sw).max(th / sh);
    let scaled = Size::new(sw * ratio, sh * ratio);

    let axis_offset = |target: f64, scaled: f64| {
        if scaled < target {
            (target - scaled) / 2.0
        } else {
            match anchor {
                FillAnchor::Center => (target - scaled) / 2.0,
                FillAnchor::Origin => 0.0,
            }
        }
    };

    Ok(FillPlacement {
        ratio,
        scaled,
        offset: Vec2::new(
            axis_offset(tw, scaled.width),
            axis_offset(th, scaled.height),
        ),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/transform/fill.rs"]
mod tests;
