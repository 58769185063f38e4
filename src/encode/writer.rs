use std::cell::Cell;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Fps, FramePacing, MediaTime};
use crate::foundation::error::{LapseError, LapseResult};
use crate::render::pixel_buffer::{PixelBuffer, PixelFormat};
use crate::render::pool::{PixelBufferPoolOpts, SharedPixelBufferPool};
use crate::session::cancel::CancelToken;

/// Output video codec.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC.
    #[default]
    H264,
    /// H.265 / HEVC.
    Hevc,
}

impl VideoCodec {
    /// `ffmpeg` encoder implementing this codec.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
        }
    }
}

/// Display rotation stored on the video track.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackRotation {
    /// Present frames as encoded.
    #[default]
    None,
    /// Rotate 90° clockwise on playback (portrait capture).
    Cw90,
    /// Rotate 180° on playback.
    Cw180,
    /// Rotate 270° clockwise on playback.
    Cw270,
}

impl TrackRotation {
    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }
}

/// Configuration handed to a [`VideoWriter`] at start.
#[derive(Clone, Debug, PartialEq)]
pub struct WriterConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Layout of appended buffers.
    pub format: PixelFormat,
    /// Output frame rate.
    pub fps: Fps,
    /// Exact pacing derived from `fps` and the base timescale.
    pub pacing: FramePacing,
    /// Output codec.
    pub codec: VideoCodec,
    /// Track display rotation.
    pub rotation: TrackRotation,
    /// Output container path. Must not exist when the writer starts.
    pub out_path: PathBuf,
    /// Pixel buffer pool sizing.
    pub pool: PixelBufferPoolOpts,
}

impl WriterConfig {
    /// Frame dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }
}

/// A video encoder consuming paced pixel buffers under backpressure.
///
/// Call order: `start`, then any number of (`wait_until_ready` / `is_ready_for_more_data`,
/// `append`), then exactly one of `finish` or `abort`. Buffers are appended in strictly
/// increasing presentation order.
pub trait VideoWriter: Send {
    /// Allocate the output container, configure one video track and a pixel buffer pool.
    ///
    /// Fails with [`LapseError::SetupFailed`] when the output exists or is unwritable, or the
    /// codec/settings combination is unsupported.
    fn start(&mut self, cfg: &WriterConfig) -> LapseResult<()>;

    /// Pool that appended buffers are recycled into. `None` before `start`.
    fn pixel_buffer_pool(&self) -> Option<SharedPixelBufferPool>;

    /// Non-blocking backpressure check.
    fn is_ready_for_more_data(&self) -> bool;

    /// Block until the writer can accept another buffer.
    ///
    /// Errors if the encoder has failed, and with [`LapseError::Cancelled`] once `cancel` fires
    /// while waiting.
    fn wait_until_ready(&mut self, cancel: &CancelToken) -> LapseResult<()>;

    /// Append one buffer at `pts`.
    fn append(&mut self, buffer: PixelBuffer, pts: MediaTime) -> LapseResult<()>;

    /// Mark the input finished and finalize the container, returning once it is complete on disk.
    fn finish(&mut self) -> LapseResult<()>;

    /// Stop without finalizing. Leaves removal of partial output to the caller.
    fn abort(&mut self);
}

/// In-memory writer for tests and previews.
///
/// Keeps every appended buffer with its timestamp. `start` creates an empty file at the output
/// path and `finish` writes a plain-text frame index there, so file lifecycle matches a real
/// container.
#[derive(Debug, Default)]
pub struct InMemoryWriter {
    cfg: Option<WriterConfig>,
    pool: Option<SharedPixelBufferPool>,
    frames: Vec<(MediaTime, PixelBuffer)>,

    stall_every: Option<usize>,
    fail_at: Option<usize>,
    hang_after: Option<usize>,
    stalled: bool,
    hung: bool,
    stalls: u64,
    readiness_checks: Cell<u64>,

    finished: bool,
    aborted: bool,
}

impl InMemoryWriter {
    /// Create a writer that is always ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report "not ready" after every `n` appended buffers until the next `wait_until_ready`.
    pub fn with_stall_every(mut self, n: usize) -> Self {
        self.stall_every = (n > 0).then_some(n);
        self
    }

    /// Fail the append of the buffer at 0-based position `n`.
    pub fn with_failure_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Stop accepting data after `n` appended buffers; `wait_until_ready` then blocks until the
    /// run is cancelled, like an encoder that stopped draining its input.
    pub fn with_hang_after(mut self, n: usize) -> Self {
        self.hang_after = Some(n);
        self
    }

    /// Configuration captured by `start`.
    pub fn config(&self) -> Option<&WriterConfig> {
        self.cfg.as_ref()
    }

    /// Appended buffers in presentation order.
    pub fn frames(&self) -> &[(MediaTime, PixelBuffer)] {
        &self.frames
    }

    /// Times the writer reported "not ready" and was waited on.
    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    /// Readiness checks answered so far.
    pub fn readiness_checks(&self) -> u64 {
        self.readiness_checks.get()
    }

    /// Return `true` after a successful `finish`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Return `true` after `abort`.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl VideoWriter for InMemoryWriter {
    fn start(&mut self, cfg: &WriterConfig) -> LapseResult<()> {
        if self.cfg.is_some() {
            return Err(LapseError::setup("in-memory writer already started"));
        }
        if cfg.out_path.exists() {
            return Err(LapseError::setup(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        std::fs::File::create(&cfg.out_path).map_err(|e| {
            LapseError::setup(format!(
                "failed to create output '{}': {e}",
                cfg.out_path.display()
            ))
        })?;

        self.pool = Some(SharedPixelBufferPool::new(cfg.pool));
        self.cfg = Some(cfg.clone());
        Ok(())
    }

    fn pixel_buffer_pool(&self) -> Option<SharedPixelBufferPool> {
        self.pool.clone()
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.readiness_checks.set(self.readiness_checks.get() + 1);
        self.cfg.is_some() && !self.stalled && !self.hung && !self.finished && !self.aborted
    }

    fn wait_until_ready(&mut self, cancel: &CancelToken) -> LapseResult<()> {
        if self.cfg.is_none() || self.aborted {
            return Err(LapseError::encoder("in-memory writer is not running"));
        }
        if self.hung {
            self.stalls += 1;
            while !cancel.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
        if cancel.is_cancelled() {
            return Err(LapseError::Cancelled);
        }
        if self.stalled {
            self.stalled = false;
            self.stalls += 1;
        }
        Ok(())
    }

    fn append(&mut self, buffer: PixelBuffer, pts: MediaTime) -> LapseResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| LapseError::encoder("in-memory writer not started"))?;
        if self.stalled || self.hung {
            return Err(LapseError::encoder("append while writer is not ready"));
        }
        if buffer.width != cfg.width || buffer.height != cfg.height || buffer.format != cfg.format
        {
            return Err(LapseError::validation(format!(
                "buffer mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                buffer.width, buffer.height, buffer.format, cfg.width, cfg.height, cfg.format
            )));
        }
        if let Some((last, _)) = self.frames.last()
            && pts <= *last
        {
            return Err(LapseError::encoder(
                "presentation times must be strictly increasing",
            ));
        }
        if self.fail_at == Some(self.frames.len()) {
            return Err(LapseError::encoder("injected append failure"));
        }

        self.frames.push((pts, buffer));
        if self.hang_after == Some(self.frames.len()) {
            self.hung = true;
        }
        if let Some(n) = self.stall_every
            && self.frames.len().is_multiple_of(n)
        {
            self.stalled = true;
        }
        Ok(())
    }

    fn finish(&mut self) -> LapseResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| LapseError::encoder("in-memory writer not started"))?;

        let mut index = String::new();
        for (i, (pts, _)) in self.frames.iter().enumerate() {
            index.push_str(&format!("{i} {}/{}\n", pts.value, pts.timescale));
        }
        std::fs::write(&cfg.out_path, index)
            .with_context(|| format!("write frame index '{}'", cfg.out_path.display()))?;

        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/writer.rs"]
mod tests;
