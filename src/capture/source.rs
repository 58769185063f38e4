use std::collections::VecDeque;

use crate::capture::frame::{Frame, Orientation};

/// Running orientation totals over every captured frame that carried metadata.
///
/// Invariant: `average() == total / count`, updated incrementally by [`OrientationTotals::record`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientationTotals {
    total: Orientation,
    count: u64,
}

impl OrientationTotals {
    /// Add one frame's orientation.
    pub fn record(&mut self, o: Orientation) {
        self.total.roll += o.roll;
        self.total.pitch += o.pitch;
        self.total.yaw += o.yaw;
        self.count += 1;
    }

    /// Number of recorded orientations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Per-axis sums.
    pub fn total(&self) -> Orientation {
        self.total
    }

    /// Per-axis mean, or `None` when nothing was recorded.
    pub fn average(&self) -> Option<Orientation> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(Orientation {
            roll: self.total.roll / n,
            pitch: self.total.pitch / n,
            yaw: self.total.yaw / n,
        })
    }
}

/// Ordered, single-owner FIFO of captured frames.
///
/// The capture side appends with [`FrameSource::push`]; ownership then moves to the assembler,
/// which drains it front to back. Orientation averages are accumulated on push and are not
/// affected by removals, so the reference orientation is fixed once capture is done.
#[derive(Debug, Default)]
pub struct FrameSource {
    frames: VecDeque<Frame>,
    totals: OrientationTotals,
}

impl FrameSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a captured frame, updating the running orientation totals.
    pub fn push(&mut self, frame: Frame) {
        if let Some(o) = frame.orientation {
            self.totals.record(o);
        }
        self.frames.push_back(frame);
    }

    /// Remaining frame count.
    pub fn count(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when no frames remain.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Remove and return the oldest remaining frame.
    pub fn remove_first(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Orientation totals over every frame ever pushed.
    pub fn totals(&self) -> OrientationTotals {
        self.totals
    }

    /// Average capture orientation, used as the tilt-compensation reference.
    pub fn reference_orientation(&self) -> Option<Orientation> {
        self.totals.average()
    }

    /// Borrow the remaining frames in encode order.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

impl Extend<Frame> for FrameSource {
    fn extend<I: IntoIterator<Item = Frame>>(&mut self, iter: I) {
        for frame in iter {
            self.push(frame);
        }
    }
}

impl FromIterator<Frame> for FrameSource {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        let mut source = Self::new();
        source.extend(iter);
        source
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/source.rs"]
mod tests;
