use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::writer::{TrackRotation, VideoCodec, WriterConfig};
use crate::foundation::core::{Canvas, Fps, FramePacing};
use crate::foundation::error::{LapseError, LapseResult};
use crate::render::pixel_buffer::PixelFormat;
use crate::render::pool::PixelBufferPoolOpts;

/// Base timescale (ticks per second) for presentation timestamps.
pub const DEFAULT_TIMESCALE: u32 = 600;

const DEFAULT_FILE_NAME: &str = "timelapse.mp4";

/// Output video settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate (whole frames per second).
    pub fps: u32,
    /// Output codec.
    pub codec: VideoCodec,
    /// Base timescale; raised to a multiple when `fps` does not divide it.
    pub timescale: u32,
    /// Display rotation written to the video track.
    pub rotation: TrackRotation,
    /// Output container path.
    pub output_path: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 6,
            codec: VideoCodec::H264,
            timescale: DEFAULT_TIMESCALE,
            rotation: TrackRotation::None,
            output_path: std::env::temp_dir().join(DEFAULT_FILE_NAME),
        }
    }
}

impl RenderSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> LapseResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read settings '{}'", path.display()))?;
        let settings: Self =
            serde_json::from_slice(&bytes).map_err(|e| LapseError::serde(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings describe an encodable stream.
    pub fn validate(&self) -> LapseResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LapseError::validation("width/height must be > 0"));
        }
        if self.fps == 0 {
            return Err(LapseError::validation("fps must be > 0"));
        }
        if self.timescale == 0 {
            return Err(LapseError::validation("timescale must be > 0"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(LapseError::validation("output_path must not be empty"));
        }
        self.pacing()?;
        Ok(())
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Output frame rate.
    pub fn fps(&self) -> LapseResult<Fps> {
        Fps::whole(self.fps)
    }

    /// Exact frame pacing for these settings.
    pub fn pacing(&self) -> LapseResult<FramePacing> {
        FramePacing::new(self.fps()?, self.timescale)
    }

    /// Writer configuration for these settings.
    pub fn writer_config(&self, pool: PixelBufferPoolOpts) -> LapseResult<WriterConfig> {
        Ok(WriterConfig {
            width: self.width,
            height: self.height,
            format: PixelFormat::Bgra8,
            fps: self.fps()?,
            pacing: self.pacing()?,
            codec: self.codec,
            rotation: self.rotation,
            out_path: self.output_path.clone(),
            pool,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/settings.rs"]
mod tests;
