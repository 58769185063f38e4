//! Lapse assembles time-lapse videos from sequences of captured still frames.
//!
//! The pipeline has three stages:
//!
//! 1. **Frame source**: an ordered, single-owner queue of captured frames ([`FrameSource`]), each
//!    optionally tagged with the device [`Orientation`] at capture time.
//! 2. **Frame transform**: every frame is scaled to fill the output canvas and, optionally,
//!    perspective-corrected against the average orientation of the whole capture
//!    ([`FrameTransformer`]).
//! 3. **Encoder driver**: frames are paced at a fixed rate with exact rational timestamps and fed to
//!    a [`VideoWriter`] only when it reports it can accept more data ([`TimeLapseBuilder`]).
//!
//! MP4 output goes through the system `ffmpeg` binary ([`FfmpegWriter`]); [`InMemoryWriter`] keeps
//! appended buffers in memory for tests and previews.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod capture;
mod encode;
mod foundation;
mod render;
mod session;
mod transform;

pub use crate::capture::frame::{Frame, FrameImage, Orientation, decode_upright};
pub use crate::capture::manifest::{CaptureManifest, ManifestEntry, load_directory, load_manifest};
pub use crate::capture::source::{FrameSource, OrientationTotals};
pub use crate::encode::ffmpeg::{
    FfmpegWriter, FfmpegWriterOpts, display_rotation_supported, encoder_available,
    is_ffmpeg_on_path,
};
pub use crate::encode::writer::{
    InMemoryWriter, TrackRotation, VideoCodec, VideoWriter, WriterConfig,
};
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FramePacing, MediaTime, Progress};
pub use crate::foundation::error::{LapseError, LapseResult};
pub use crate::render::pixel_buffer::{PixelBuffer, PixelFormat};
pub use crate::render::pool::{
    PixelBufferPool, PixelBufferPoolOpts, PixelBufferPoolStats, SharedPixelBufferPool,
};
pub use crate::session::builder::{
    AssemblyEvent, AssemblyReport, AssemblyState, TimeLapseBuilder, TimeLapseOpts,
};
pub use crate::session::cancel::CancelToken;
pub use crate::session::settings::{DEFAULT_TIMESCALE, RenderSettings};
pub use crate::transform::fill::{FillAnchor, FillPlacement, fill_placement};
pub use crate::transform::perspective::{
    Axis, AxisComposition, Homography, PERSPECTIVE_DEPTH, axis_homography, tilt_homography,
};
pub use crate::transform::raster::{FrameTransformer, TransformOpts};
