//! Video writers.
//!
//! Writers receive encoder-ready pixel buffers in presentation order and own the output container.

/// `ffmpeg`-based MP4 writer (system `ffmpeg` binary).
pub(crate) mod ffmpeg;
/// Writer trait, writer configuration and the in-memory writer.
pub(crate) mod writer;
