use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::capture::source::FrameSource;
use crate::encode::ffmpeg::{FfmpegWriter, FfmpegWriterOpts};
use crate::encode::writer::VideoWriter;
use crate::foundation::core::{FrameIndex, MediaTime, Progress};
use crate::foundation::error::{LapseError, LapseResult};
use crate::render::pool::PixelBufferPoolOpts;
use crate::session::cancel::CancelToken;
use crate::session::settings::RenderSettings;
use crate::transform::raster::{FrameTransformer, TransformOpts};

/// Lifecycle of one assembly run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyState {
    /// Builder created, nothing touched on disk.
    NotStarted,
    /// Writer configured, output allocated.
    Started,
    /// Frames are being pulled into the writer.
    Draining,
    /// Output finalized. Terminal.
    Finished,
    /// Run failed or was cancelled; partial output removed. Terminal.
    Failed,
}

/// Options for [`TimeLapseBuilder`].
#[derive(Clone, Debug)]
pub struct TimeLapseOpts {
    /// Per-frame transform options.
    pub transform: TransformOpts,
    /// Buffers allowed in flight inside the encoder before it reports "not ready".
    pub encoder_queue_depth: usize,
    /// Pixel buffer pool sizing.
    pub pool: PixelBufferPoolOpts,
    /// `ffmpeg` executable used by [`TimeLapseBuilder::render`].
    pub ffmpeg: PathBuf,
}

impl Default for TimeLapseOpts {
    fn default() -> Self {
        Self {
            transform: TransformOpts::default(),
            encoder_queue_depth: 4,
            pool: PixelBufferPoolOpts::default(),
            ffmpeg: FfmpegWriterOpts::default().ffmpeg,
        }
    }
}

/// Summary of a finished assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyReport {
    /// Finalized output file.
    pub output_path: PathBuf,
    /// Frames appended to the writer.
    pub frames_written: u64,
    /// Presentation duration of the output.
    pub duration: MediaTime,
    /// Times the driver had to wait for the writer to become ready.
    pub stalls: u64,
}

/// Event stream of a background assembly started with [`TimeLapseBuilder::spawn`].
#[derive(Debug)]
pub enum AssemblyEvent {
    /// One more frame was written.
    Progress(Progress),
    /// The output was finalized. Last event of a successful run.
    Completed(AssemblyReport),
    /// The run failed. Last event of a failed run.
    Failed(LapseError),
}

/// Encoder driver: pulls frames from a [`FrameSource`] into a [`VideoWriter`] at a fixed rate.
///
/// A builder performs exactly one run. Frames are dequeued only when the writer reports it is
/// ready for more data, transformed one at a time and appended with exact timestamps
/// `i * step / timescale`. Any error aborts the writer and removes the partial output.
#[derive(Debug)]
pub struct TimeLapseBuilder {
    settings: RenderSettings,
    opts: TimeLapseOpts,
    cancel: CancelToken,
    state: AssemblyState,
}

impl TimeLapseBuilder {
    /// Create a builder for one run. Fails on invalid settings.
    pub fn new(settings: RenderSettings, opts: TimeLapseOpts) -> LapseResult<Self> {
        settings.validate()?;
        if opts.encoder_queue_depth == 0 {
            return Err(LapseError::validation("encoder_queue_depth must be >= 1"));
        }
        Ok(Self {
            settings,
            opts,
            cancel: CancelToken::new(),
            state: AssemblyState::NotStarted,
        })
    }

    /// Use `token` for cancellation instead of the builder's own.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Settings of this run.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Assemble `source` into an MP4 through the system `ffmpeg`.
    pub fn render<P, C>(
        &mut self,
        source: FrameSource,
        on_progress: P,
        on_complete: C,
    ) -> LapseResult<AssemblyReport>
    where
        P: FnMut(Progress),
        C: FnOnce(&AssemblyReport),
    {
        let mut writer = self.ffmpeg_writer();
        self.render_with_writer(source, &mut writer, on_progress, on_complete)
    }

    /// Assemble `source` into `writer`.
    ///
    /// `on_progress` runs after every appended frame with `completed` in `1..=total`.
    /// `on_complete` runs once, after the output is finalized.
    #[tracing::instrument(
        skip_all,
        fields(frames = source.count(), out = %self.settings.output_path.display())
    )]
    pub fn render_with_writer<P, C>(
        &mut self,
        mut source: FrameSource,
        writer: &mut dyn VideoWriter,
        mut on_progress: P,
        on_complete: C,
    ) -> LapseResult<AssemblyReport>
    where
        P: FnMut(Progress),
        C: FnOnce(&AssemblyReport),
    {
        if self.state != AssemblyState::NotStarted {
            return Err(LapseError::validation(
                "a TimeLapseBuilder performs exactly one assembly",
            ));
        }
        if source.is_empty() {
            return Err(LapseError::validation(
                "cannot assemble a time-lapse from zero frames",
            ));
        }

        let out = self.settings.output_path.clone();
        if let Err(e) = remove_stale_output(&out) {
            self.state = AssemblyState::Failed;
            return Err(e);
        }

        match self.drive(&mut source, writer, &mut on_progress) {
            Ok(report) => {
                self.state = AssemblyState::Finished;
                tracing::info!(
                    frames = report.frames_written,
                    duration_s = report.duration.as_secs_f64(),
                    stalls = report.stalls,
                    "time-lapse finalized"
                );
                on_complete(&report);
                Ok(report)
            }
            Err(e) => {
                self.state = AssemblyState::Failed;
                writer.abort();
                discard_partial_output(&out);
                tracing::warn!(error = %e, "time-lapse assembly failed");
                Err(e)
            }
        }
    }

    /// Run [`TimeLapseBuilder::render`] on a background thread, reporting through `events`.
    pub fn spawn(
        self,
        source: FrameSource,
        events: mpsc::Sender<AssemblyEvent>,
    ) -> LapseResult<JoinHandle<FfmpegWriter>> {
        let writer = self.ffmpeg_writer();
        self.spawn_with_writer(source, writer, events)
    }

    /// Run [`TimeLapseBuilder::render_with_writer`] on a background thread.
    ///
    /// The thread returns the writer once the run is over; the outcome arrives as the last event.
    pub fn spawn_with_writer<W>(
        mut self,
        source: FrameSource,
        mut writer: W,
        events: mpsc::Sender<AssemblyEvent>,
    ) -> LapseResult<JoinHandle<W>>
    where
        W: VideoWriter + 'static,
    {
        std::thread::Builder::new()
            .name("lapse-assemble".to_string())
            .spawn(move || {
                let progress_tx = events.clone();
                let res = self.render_with_writer(
                    source,
                    &mut writer,
                    |p| {
                        let _ = progress_tx.send(AssemblyEvent::Progress(p));
                    },
                    |_| {},
                );
                let _ = events.send(match res {
                    Ok(report) => AssemblyEvent::Completed(report),
                    Err(e) => AssemblyEvent::Failed(e),
                });
                writer
            })
            .map_err(|e| LapseError::setup(format!("failed to spawn assembly thread: {e}")))
    }

    fn ffmpeg_writer(&self) -> FfmpegWriter {
        FfmpegWriter::new(FfmpegWriterOpts {
            ffmpeg: self.opts.ffmpeg.clone(),
            max_in_flight: self.opts.encoder_queue_depth,
        })
    }

    fn drive(
        &mut self,
        source: &mut FrameSource,
        writer: &mut dyn VideoWriter,
        on_progress: &mut dyn FnMut(Progress),
    ) -> LapseResult<AssemblyReport> {
        let cfg = self.settings.writer_config(self.opts.pool)?;
        let pacing = cfg.pacing;
        let total = source.count() as u64;

        writer.start(&cfg)?;
        self.state = AssemblyState::Started;
        let pool = writer
            .pixel_buffer_pool()
            .ok_or_else(|| LapseError::setup("writer did not provide a pixel buffer pool"))?;

        // Capture is complete by now, so the average orientation is fixed for the whole run.
        let reference = source.reference_orientation();
        let transformer = FrameTransformer::new(cfg.canvas(), self.opts.transform);
        tracing::info!(
            total,
            timescale = pacing.timescale(),
            step = pacing.step(),
            compensate = self.opts.transform.compensate_tilt,
            "assembly started"
        );

        self.state = AssemblyState::Draining;
        let mut written = 0u64;
        let mut stalls = 0u64;
        while !source.is_empty() {
            if !writer.is_ready_for_more_data() {
                stalls += 1;
                if let Err(e) = writer.wait_until_ready(&self.cancel) {
                    if matches!(e, LapseError::Cancelled) {
                        tracing::info!(written, total, "assembly cancelled while writer was busy");
                    }
                    return Err(e);
                }
            }

            // One pull: drain while the writer keeps accepting.
            while !source.is_empty() && writer.is_ready_for_more_data() {
                if self.cancel.is_cancelled() {
                    tracing::info!(written, total, "assembly cancelled");
                    return Err(LapseError::Cancelled);
                }
                let Some(frame) = source.remove_first() else {
                    break;
                };

                let idx = FrameIndex(written);
                let buf = transformer
                    .transform(idx, frame, reference, &pool)
                    .map_err(|e| e.at_frame(idx.0))?;
                let pts = pacing.presentation_time(idx)?;
                writer.append(buf, pts).map_err(|e| e.at_frame(idx.0))?;

                written += 1;
                tracing::debug!(
                    frame = idx.0,
                    pts = pts.value,
                    timescale = pts.timescale,
                    "frame appended"
                );
                on_progress(Progress {
                    completed: written,
                    total,
                });
            }
        }

        writer.finish()?;
        Ok(AssemblyReport {
            output_path: cfg.out_path,
            frames_written: written,
            duration: pacing.duration(written)?,
            stalls,
        })
    }
}

fn remove_stale_output(path: &Path) -> LapseResult<()> {
    if !path.exists() {
        return Ok(());
    }
    tracing::debug!(path = %path.display(), "removing stale output");
    std::fs::remove_file(path).map_err(|e| {
        LapseError::setup(format!(
            "failed to remove existing output '{}': {e}",
            path.display()
        ))
    })
}

fn discard_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/builder.rs"]
mod tests;
