use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::ImageDecoder as _;

use crate::foundation::error::LapseResult;
use crate::transform::perspective::Axis;

/// Device attitude at capture time, in degrees.
///
/// `roll` rotates about the image x axis, `pitch` about the y axis and `yaw` about the viewing
/// (z) axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Orientation {
    /// Rotation about the x axis, degrees.
    pub roll: f64,
    /// Rotation about the y axis, degrees.
    pub pitch: f64,
    /// Rotation about the z axis, degrees.
    pub yaw: f64,
}

impl Orientation {
    /// Level attitude.
    pub const ZERO: Self = Self {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    /// Construct from degrees.
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Per-axis difference `self - reference`.
    pub fn delta_from(self, reference: Orientation) -> Orientation {
        Orientation {
            roll: self.roll - reference.roll,
            pitch: self.pitch - reference.pitch,
            yaw: self.yaw - reference.yaw,
        }
    }

    /// Value for a single axis, degrees.
    pub fn axis(self, axis: Axis) -> f64 {
        match axis {
            Axis::Roll => self.roll,
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
        }
    }
}

/// Pixels of a captured frame: already decoded, or a file decoded on first use.
///
/// File-backed frames keep at most one decoded image alive at a time while a long capture drains.
pub enum FrameImage {
    /// Straight-alpha RGBA8 pixels.
    Decoded(image::RgbaImage),
    /// Encoded image on disk.
    File(PathBuf),
}

impl FrameImage {
    /// Decode (if needed) and return the pixels, consuming the frame image.
    pub fn into_rgba(self) -> LapseResult<image::RgbaImage> {
        match self {
            Self::Decoded(img) => Ok(img),
            Self::File(path) => decode_upright(&path),
        }
    }
}

impl fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded(img) => f
                .debug_struct("Decoded")
                .field("width", &img.width())
                .field("height", &img.height())
                .finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// One captured still plus its optional orientation tag.
#[derive(Debug)]
pub struct Frame {
    /// Frame pixels.
    pub image: FrameImage,
    /// Device attitude at capture time, if the capture recorded it.
    pub orientation: Option<Orientation>,
}

impl Frame {
    /// Frame from already-decoded pixels.
    pub fn from_image(img: image::RgbaImage) -> Self {
        Self {
            image: FrameImage::Decoded(img),
            orientation: None,
        }
    }

    /// Frame backed by an image file, decoded when the frame is transformed.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            image: FrameImage::File(path.into()),
            orientation: None,
        }
    }

    /// Attach capture-time orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Decode an image file into RGBA8, applying its EXIF orientation so the result is upright.
pub fn decode_upright(path: &Path) -> LapseResult<image::RgbaImage> {
    let reader = image::ImageReader::open(path)
        .with_context(|| format!("open image '{}'", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("detect image format of '{}'", path.display()))?;
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("create decoder for '{}'", path.display()))?;
    let orientation = decoder
        .orientation()
        .with_context(|| format!("read orientation of '{}'", path.display()))?;
    let mut img = image::DynamicImage::from_decoder(decoder)
        .with_context(|| format!("decode image '{}'", path.display()))?;
    img.apply_orientation(orientation);
    Ok(img.to_rgba8())
}
