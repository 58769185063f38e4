use std::cmp::Ordering;

use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::math::{gcd_u64, lcm_u64};

/// Absolute 0-based frame index in output (encode) order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> LapseResult<Self> {
        if den == 0 {
            return Err(LapseError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(LapseError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole frames per second (`n/1`).
    pub fn whole(n: u32) -> LapseResult<Self> {
        Self::new(n, 1)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Canvas center in pixel coordinates.
    pub fn center(self) -> kurbo::Point {
        kurbo::Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// An exact rational media timestamp: `value / timescale` seconds.
///
/// Equality and ordering compare the rational value, so `1/600` equals `3/1800`.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaTime {
    /// Tick count.
    pub value: i64,
    /// Ticks per second, always non-zero.
    pub timescale: u32,
}

impl MediaTime {
    /// Create a timestamp. `timescale` must be non-zero.
    pub fn new(value: i64, timescale: u32) -> LapseResult<Self> {
        if timescale == 0 {
            return Err(LapseError::validation("MediaTime timescale must be > 0"));
        }
        Ok(Self { value, timescale })
    }

    /// Timestamp in seconds. Lossy; use only for display and logging.
    pub fn as_secs_f64(self) -> f64 {
        self.value as f64 / f64::from(self.timescale)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = i128::from(self.value) * i128::from(other.timescale);
        let rhs = i128::from(other.value) * i128::from(self.timescale);
        lhs.cmp(&rhs)
    }
}

/// Fixed-rate pacing: frame `i` is presented at `i * step / timescale` seconds.
///
/// The timescale is the smallest multiple of the base timescale for which `step` is an integer,
/// so timestamps never drift regardless of frame count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePacing {
    timescale: u32,
    step: i64,
}

impl FramePacing {
    /// Build pacing for `fps` starting from `base_timescale` (600 by default).
    pub fn new(fps: Fps, base_timescale: u32) -> LapseResult<Self> {
        if base_timescale == 0 {
            return Err(LapseError::validation("timescale must be > 0"));
        }
        let fps = Fps::new(fps.num, fps.den)?;

        // step = timescale * den / num is integral iff (num / gcd(num, den)) divides timescale.
        let num = u64::from(fps.num);
        let den = u64::from(fps.den);
        let reduced_num = num / gcd_u64(num, den);
        let timescale = lcm_u64(u64::from(base_timescale), reduced_num);
        let timescale = u32::try_from(timescale).map_err(|_| {
            LapseError::validation(format!(
                "fps {}/{} needs a timescale above u32::MAX",
                fps.num, fps.den
            ))
        })?;
        let step = u64::from(timescale) * den / num;
        let step = i64::try_from(step)
            .map_err(|_| LapseError::validation("frame step does not fit in i64"))?;

        Ok(Self { timescale, step })
    }

    /// Effective timescale (ticks per second).
    pub fn timescale(self) -> u32 {
        self.timescale
    }

    /// Duration of one frame in ticks.
    pub fn step(self) -> i64 {
        self.step
    }

    /// Duration of one frame.
    pub fn frame_duration(self) -> MediaTime {
        MediaTime {
            value: self.step,
            timescale: self.timescale,
        }
    }

    /// Presentation timestamp of frame `idx`.
    pub fn presentation_time(self, idx: FrameIndex) -> LapseResult<MediaTime> {
        let value = i64::try_from(idx.0)
            .ok()
            .and_then(|i| i.checked_mul(self.step))
            .ok_or_else(|| LapseError::validation("presentation time overflows i64 ticks"))?;
        Ok(MediaTime {
            value,
            timescale: self.timescale,
        })
    }

    /// Total duration of `frames` frames.
    pub fn duration(self, frames: u64) -> LapseResult<MediaTime> {
        self.presentation_time(FrameIndex(frames))
    }
}

/// Assembly progress: `completed` frames written out of `total`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Progress {
    /// Frames written so far.
    pub completed: u64,
    /// Frames in the source when assembly started.
    pub total: u64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`; `0` when `total` is zero.
    pub fn fraction(self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64).clamp(0.0, 1.0) as f32
    }

    /// Return `true` once every frame has been written.
    pub fn is_complete(self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
