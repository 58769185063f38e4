use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::encode::writer::{VideoWriter, WriterConfig};
use crate::foundation::core::{FrameIndex, MediaTime};
use crate::foundation::error::{LapseError, LapseResult};
use crate::render::pixel_buffer::PixelBuffer;
use crate::render::pool::SharedPixelBufferPool;
use crate::session::cancel::CancelToken;

// Waits on the readiness gate wake up this often to look at the cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Options for [`FfmpegWriter`].
#[derive(Clone, Debug)]
pub struct FfmpegWriterOpts {
    /// `ffmpeg` executable (looked up on `PATH` when relative).
    pub ffmpeg: PathBuf,
    /// Buffers allowed in flight between `append` and the encoder's stdin.
    pub max_in_flight: usize,
}

impl Default for FfmpegWriterOpts {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            max_in_flight: 4,
        }
    }
}

/// MP4 writer that streams raw frames into the system `ffmpeg`.
///
/// Appended buffers are handed to an output thread that writes them to the encoder's stdin and
/// recycles them into the pool. A counting gate limits buffers in flight: the writer is "ready
/// for more data" while fewer than `max_in_flight` buffers are queued, and
/// [`VideoWriter::wait_until_ready`] blocks on the gate, waking periodically to observe
/// cancellation.
pub struct FfmpegWriter {
    opts: FfmpegWriterOpts,
    session: Option<Session>,
}

struct Session {
    cfg: WriterConfig,
    child: Child,
    tx: Option<mpsc::Sender<PixelBuffer>>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    gate: Arc<ReadyGate>,
    pool: SharedPixelBufferPool,
    appended: u64,
}

impl FfmpegWriter {
    /// Create a writer. Nothing is spawned until `start`.
    pub fn new(opts: FfmpegWriterOpts) -> Self {
        Self {
            opts,
            session: None,
        }
    }

    fn session_mut(&mut self) -> LapseResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| LapseError::encoder("ffmpeg writer not started"))
    }
}

impl VideoWriter for FfmpegWriter {
    fn start(&mut self, cfg: &WriterConfig) -> LapseResult<()> {
        if self.session.is_some() {
            return Err(LapseError::setup("ffmpeg writer already started"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(LapseError::setup("output width/height must be non-zero"));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(LapseError::setup(
                "output width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.opts.max_in_flight == 0 {
            return Err(LapseError::setup("max_in_flight must be >= 1"));
        }

        ensure_parent_dir(&cfg.out_path)?;
        if cfg.out_path.exists() {
            return Err(LapseError::setup(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        check_writable(&cfg.out_path)?;

        if !encoder_available(&self.opts.ffmpeg, cfg.codec.ffmpeg_encoder()) {
            return Err(LapseError::setup(format!(
                "ffmpeg at '{}' is missing or cannot encode with '{}'",
                self.opts.ffmpeg.display(),
                cfg.codec.ffmpeg_encoder()
            )));
        }

        let rotation_tag = if cfg.rotation.degrees() == 0
            || display_rotation_supported(&self.opts.ffmpeg)
        {
            RotationTag::DisplayMatrix
        } else {
            tracing::warn!("ffmpeg lacks -display_rotation; writing legacy rotate metadata");
            RotationTag::LegacyMetadata
        };

        let mut cmd = Command::new(&self.opts.ffmpeg);
        cmd.args(ffmpeg_args(cfg, rotation_tag))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| LapseError::setup(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LapseError::setup("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| LapseError::setup("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let gate = Arc::new(ReadyGate::new(self.opts.max_in_flight));
        let pool = SharedPixelBufferPool::new(cfg.pool);
        let (tx, rx) = mpsc::channel::<PixelBuffer>();
        let feeder = {
            let gate = gate.clone();
            let pool = pool.clone();
            std::thread::Builder::new()
                .name("lapse-ffmpeg-feed".to_string())
                .spawn(move || feed_stdin(stdin, rx, &gate, &pool))
        };
        let feeder = match feeder {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LapseError::setup(format!(
                    "failed to spawn ffmpeg feeder thread: {e}"
                )));
            }
        };

        tracing::info!(
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps.as_f64(),
            timescale = cfg.pacing.timescale(),
            codec = cfg.codec.ffmpeg_encoder(),
            out = %cfg.out_path.display(),
            "ffmpeg writer started"
        );

        self.session = Some(Session {
            cfg: cfg.clone(),
            child,
            tx: Some(tx),
            feeder: Some(feeder),
            stderr_drain: Some(stderr_drain),
            gate,
            pool,
            appended: 0,
        });
        Ok(())
    }

    fn pixel_buffer_pool(&self) -> Option<SharedPixelBufferPool> {
        self.session.as_ref().map(|s| s.pool.clone())
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.tx.is_some() && s.gate.is_ready())
            .unwrap_or(false)
    }

    fn wait_until_ready(&mut self, cancel: &CancelToken) -> LapseResult<()> {
        let session = self.session_mut()?;
        match session.gate.wait_ready(cancel) {
            GateWait::Ready => Ok(()),
            GateWait::Cancelled => Err(LapseError::Cancelled),
            GateWait::Failed => Err(LapseError::encoder("ffmpeg stopped accepting frames")),
        }
    }

    fn append(&mut self, buffer: PixelBuffer, pts: MediaTime) -> LapseResult<()> {
        let session = self.session_mut()?;
        let cfg = &session.cfg;
        if buffer.width != cfg.width || buffer.height != cfg.height || buffer.format != cfg.format
        {
            return Err(LapseError::validation(format!(
                "buffer mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                buffer.width, buffer.height, buffer.format, cfg.width, cfg.height, cfg.format
            )));
        }

        // Raw video input carries no timestamps; ffmpeg presents frame i at i / fps. Anything else
        // cannot be represented.
        let expected = cfg.pacing.presentation_time(FrameIndex(session.appended))?;
        if pts != expected {
            return Err(LapseError::encoder(format!(
                "ffmpeg writer needs uniformly paced frames: got {}/{}, expected {}/{}",
                pts.value, pts.timescale, expected.value, expected.timescale
            )));
        }

        let tx = session
            .tx
            .as_ref()
            .ok_or_else(|| LapseError::encoder("ffmpeg writer is already finalized"))?;
        session.gate.acquire();
        if tx.send(buffer).is_err() {
            session.gate.release();
            return Err(LapseError::encoder("ffmpeg stopped accepting frames"));
        }
        session.appended += 1;
        Ok(())
    }

    fn finish(&mut self) -> LapseResult<()> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| LapseError::encoder("ffmpeg writer not started"))?;

        drop(session.tx.take());
        let feed_res = match session.feeder.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LapseError::encoder("ffmpeg feeder thread panicked"))?,
            None => Ok(()),
        };

        let status = session
            .child
            .wait()
            .map_err(|e| LapseError::encoder(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match session.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LapseError::encoder("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| LapseError::encoder(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(LapseError::encoder(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        feed_res
            .map_err(|e| LapseError::encoder(format!("failed to write frames to ffmpeg: {e}")))?;

        tracing::info!(
            frames = session.appended,
            out = %session.cfg.out_path.display(),
            "ffmpeg writer finalized"
        );
        Ok(())
    }

    fn abort(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        drop(session.tx.take());
        session.gate.fail();
        let _ = session.child.kill();
        let _ = session.child.wait();
        if let Some(handle) = session.feeder.take() {
            let _ = handle.join();
        }
        if let Some(handle) = session.stderr_drain.take() {
            let _ = handle.join();
        }
        tracing::warn!(
            frames = session.appended,
            out = %session.cfg.out_path.display(),
            "ffmpeg writer aborted"
        );
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

fn feed_stdin(
    mut stdin: ChildStdin,
    rx: mpsc::Receiver<PixelBuffer>,
    gate: &ReadyGate,
    pool: &SharedPixelBufferPool,
) -> std::io::Result<()> {
    for buf in rx {
        let res = stdin.write_all(&buf.data);
        pool.release(buf);
        if let Err(e) = res {
            gate.fail();
            return Err(e);
        }
        gate.release();
    }
    stdin.flush()
}

/// Counting gate over buffers in flight.
#[derive(Debug)]
pub(crate) struct ReadyGate {
    capacity: usize,
    state: Mutex<GateState>,
    cond: Condvar,
}

/// Outcome of [`ReadyGate::wait_ready`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GateWait {
    Ready,
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
struct GateState {
    in_flight: usize,
    failed: bool,
}

impl ReadyGate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(GateState::default()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state
            .lock()
            .map(|s| !s.failed && s.in_flight < self.capacity)
            .unwrap_or(false)
    }

    /// Block until a slot frees up, the gate fails, or `cancel` fires.
    pub(crate) fn wait_ready(&self, cancel: &CancelToken) -> GateWait {
        let Ok(mut s) = self.state.lock() else {
            return GateWait::Failed;
        };
        loop {
            if s.failed {
                return GateWait::Failed;
            }
            if s.in_flight < self.capacity {
                return GateWait::Ready;
            }
            if cancel.is_cancelled() {
                return GateWait::Cancelled;
            }
            s = match self.cond.wait_timeout(s, CANCEL_POLL) {
                Ok((s, _)) => s,
                Err(_) => return GateWait::Failed,
            };
        }
    }

    pub(crate) fn acquire(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.in_flight += 1;
        }
    }

    pub(crate) fn release(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.in_flight = s.in_flight.saturating_sub(1);
        }
        self.cond.notify_all();
    }

    pub(crate) fn fail(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.failed = true;
        }
        self.cond.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().map(|s| s.in_flight).unwrap_or(0)
    }
}

/// How track rotation is written into the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RotationTag {
    /// `-display_rotation` input option, stored as a display matrix.
    DisplayMatrix,
    /// `rotate` stream metadata, understood by older ffmpeg releases only.
    LegacyMetadata,
}

/// Command-line arguments for one MP4 encode of raw frames read from stdin.
pub(crate) fn ffmpeg_args(cfg: &WriterConfig, rotation_tag: RotationTag) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-n",
        "-f",
        "rawvideo",
        "-pix_fmt",
        cfg.format.ffmpeg_name(),
    ]
    .iter()
    .map(OsString::from)
    .collect();

    let mut push = |a: String| args.push(OsString::from(a));
    push("-s".to_string());
    push(format!("{}x{}", cfg.width, cfg.height));
    // For rawvideo input, `-r` before `-i` sets the input frame rate.
    push("-r".to_string());
    push(format!("{}/{}", cfg.fps.num, cfg.fps.den));
    let degrees = cfg.rotation.degrees();
    if degrees != 0 && rotation_tag == RotationTag::DisplayMatrix {
        // Counter-clockwise, applies to the next input.
        push("-display_rotation".to_string());
        push(format!("-{degrees}"));
    }
    push("-i".to_string());
    push("pipe:0".to_string());
    push("-an".to_string());
    push("-c:v".to_string());
    push(cfg.codec.ffmpeg_encoder().to_string());
    push("-pix_fmt".to_string());
    push("yuv420p".to_string());
    push("-video_track_timescale".to_string());
    push(cfg.pacing.timescale().to_string());
    if degrees != 0 && rotation_tag == RotationTag::LegacyMetadata {
        push("-metadata:s:v:0".to_string());
        push(format!("rotate={degrees}"));
    }
    push("-movflags".to_string());
    push("+faststart".to_string());

    args.push(cfg.out_path.clone().into_os_string());
    args
}

/// Ensure the parent directory of `path` exists.
pub(crate) fn ensure_parent_dir(path: &Path) -> LapseResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            LapseError::setup(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

// Create and remove the output so an unwritable destination fails before any frame is processed.
fn check_writable(path: &Path) -> LapseResult<()> {
    std::fs::File::create(path).map_err(|e| {
        LapseError::setup(format!("cannot write output '{}': {e}", path.display()))
    })?;
    std::fs::remove_file(path).map_err(|e| {
        LapseError::setup(format!(
            "failed to remove test file '{}': {e}",
            path.display()
        ))
    })
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return `true` when the `ffmpeg` at `ffmpeg` accepts the `-display_rotation` input option.
pub fn display_rotation_supported(ffmpeg: &Path) -> bool {
    let Ok(out) = Command::new(ffmpeg)
        .args(["-hide_banner", "-h", "full"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    else {
        return false;
    };
    out.status.success()
        && String::from_utf8_lossy(&out.stdout)
            .lines()
            .any(|line| line.trim_start().starts_with("-display_rotation"))
}

/// Return `true` when the `ffmpeg` at `ffmpeg` lists `encoder` among its encoders.
pub fn encoder_available(ffmpeg: &Path, encoder: &str) -> bool {
    let Ok(out) = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    else {
        return false;
    };
    if !out.status.success() {
        return false;
    }
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(encoder))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
