use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use kurbo::Point;

use crate::capture::frame::{Frame, Orientation};
use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::math::mul_div255_u8;
use crate::render::pixel_buffer::{PixelBuffer, PixelFormat};
use crate::render::pool::SharedPixelBufferPool;
use crate::transform::fill::{FillAnchor, fill_placement};
use crate::transform::perspective::{AxisComposition, Homography, tilt_homography};

/// Per-frame transform options.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransformOpts {
    /// Warp each frame against the capture's average orientation.
    pub compensate_tilt: bool,
    /// How per-axis rotations combine when compensating.
    pub axis_composition: AxisComposition,
    /// Placement of the overflowing axis after scale-to-fill.
    pub fill_anchor: FillAnchor,
    /// Straight-alpha RGBA8 fill for canvas areas no source pixel covers.
    pub background: [u8; 4],
}

impl Default for TransformOpts {
    fn default() -> Self {
        Self {
            compensate_tilt: false,
            axis_composition: AxisComposition::default(),
            fill_anchor: FillAnchor::default(),
            background: [0, 0, 0, 255],
        }
    }
}

/// Turns captured frames into encoder-ready [`PixelBuffer`]s of a fixed size and format.
///
/// The transform is a pure function of the frame, the reference orientation and the options.
#[derive(Clone, Debug)]
pub struct FrameTransformer {
    canvas: Canvas,
    format: PixelFormat,
    opts: TransformOpts,
}

impl FrameTransformer {
    /// Create a transformer producing `canvas`-sized BGRA buffers.
    pub fn new(canvas: Canvas, opts: TransformOpts) -> Self {
        Self {
            canvas,
            format: PixelFormat::Bgra8,
            opts,
        }
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Options in effect.
    pub fn opts(&self) -> TransformOpts {
        self.opts
    }

    /// Source pixel space to canvas pixel space for one frame.
    pub fn frame_homography(
        &self,
        idx: FrameIndex,
        src_w: u32,
        src_h: u32,
        orientation: Option<Orientation>,
        reference: Option<Orientation>,
    ) -> LapseResult<Homography> {
        let placement = fill_placement(src_w, src_h, self.canvas, self.opts.fill_anchor)?;
        let fill = Homography::from_affine(placement.affine());
        if !self.opts.compensate_tilt {
            return Ok(fill);
        }

        let orientation = orientation.ok_or(LapseError::MissingOrientation { index: idx.0 })?;
        let reference = reference.ok_or_else(|| {
            LapseError::validation("tilt compensation requires a reference orientation")
        })?;
        Ok(fill.then(tilt_homography(
            orientation,
            reference,
            self.canvas,
            self.opts.axis_composition,
        )))
    }

    /// Decode, warp and draw one frame into a buffer borrowed from `pool`.
    ///
    /// The decoded source image is dropped before returning.
    pub fn transform(
        &self,
        idx: FrameIndex,
        frame: Frame,
        reference: Option<Orientation>,
        pool: &SharedPixelBufferPool,
    ) -> LapseResult<PixelBuffer> {
        let Frame { image, orientation } = frame;
        let src = image.into_rgba()?;
        let h = self.frame_homography(idx, src.width(), src.height(), orientation, reference)?;

        let mut buf = pool.borrow(self.canvas.width, self.canvas.height, self.format);
        buf.clear(self.opts.background);
        draw_projected(&src, h, self.opts.background, &mut buf)
            .ok_or_else(|| LapseError::frame(idx.0, "frame transform is not invertible"))?;
        Ok(buf)
    }
}

// `h` works on continuous coordinates (pixel i covers [i, i + 1)); the warp samples integer pixel
// centers. The source is padded by one replicated pixel on every side so bilinear sampling reaches
// the outermost row and column.
fn draw_projected(
    src: &image::RgbaImage,
    h: Homography,
    bg: [u8; 4],
    dst: &mut PixelBuffer,
) -> Option<()> {
    let padded = pad_edges(src);
    let to_canvas = Homography::translate(-0.5, -0.5)
        .then(h)
        .then(Homography::translate(-0.5, -0.5));
    let from_canvas = to_canvas.inverse()?;
    let projection = to_projection(&to_canvas)?;

    let mut warped = image::RgbaImage::new(dst.width, dst.height);
    warp_into(
        &padded,
        &projection,
        Interpolation::Bilinear,
        image::Rgba([0, 0, 0, 0]),
        &mut warped,
    );

    for (x, y, px) in warped.enumerate_pixels() {
        // Canvas pixels whose preimage lies behind the eye plane keep the background.
        if from_canvas
            .apply(Point::new(f64::from(x), f64::from(y)))
            .is_some()
        {
            dst.put_rgba(x, y, over(px.0, bg));
        }
    }
    Some(())
}

fn to_projection(h: &Homography) -> Option<Projection> {
    let r = h.rows();
    let mut m = [0f32; 9];
    for (dst, v) in m.iter_mut().zip(r.iter().flatten()) {
        *dst = *v as f32;
    }
    Projection::from_matrix(m)
}

fn pad_edges(src: &image::RgbaImage) -> image::RgbaImage {
    let max_x = src.width().saturating_sub(1);
    let max_y = src.height().saturating_sub(1);
    image::RgbaImage::from_fn(src.width() + 2, src.height() + 2, |x, y| {
        *src.get_pixel(x.saturating_sub(1).min(max_x), y.saturating_sub(1).min(max_y))
    })
}

// Straight-alpha source over an opaque background.
fn over(src: [u8; 4], bg: [u8; 4]) -> [u8; 4] {
    let a = u16::from(src[3]);
    if a == 255 {
        return src;
    }
    let inv = 255 - a;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = u16::from(mul_div255_u8(u16::from(src[c]), a))
            + u16::from(mul_div255_u8(u16::from(bg[c]), inv));
        out[c] = v.min(255) as u8;
    }
    out[3] = 255;
    out
}

#[cfg(test)]
#[path = "../../tests/unit/transform/raster.rs"]
mod tests;
