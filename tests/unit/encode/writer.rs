use super::*;

use crate::foundation::core::FrameIndex;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "lapse_writer_{name}_{}_{}.idx",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn config(out_path: PathBuf) -> WriterConfig {
    let fps = Fps::whole(6).unwrap();
    WriterConfig {
        width: 2,
        height: 2,
        format: PixelFormat::Bgra8,
        fps,
        pacing: FramePacing::new(fps, 600).unwrap(),
        codec: VideoCodec::H264,
        rotation: TrackRotation::None,
        out_path,
        pool: PixelBufferPoolOpts::default(),
    }
}

fn pts(cfg: &WriterConfig, i: u64) -> MediaTime {
    cfg.pacing.presentation_time(FrameIndex(i)).unwrap()
}

#[test]
fn codec_and_rotation_names() {
    assert_eq!(VideoCodec::H264.ffmpeg_encoder(), "libx264");
    assert_eq!(VideoCodec::Hevc.ffmpeg_encoder(), "libx265");
    assert_eq!(TrackRotation::None.degrees(), 0);
    assert_eq!(TrackRotation::Cw90.degrees(), 90);
    assert_eq!(
        serde_json::to_string(&TrackRotation::Cw270).unwrap(),
        "\"cw270\""
    );
}

#[test]
fn lifecycle_creates_then_finalizes_the_output() {
    let out = temp_path("lifecycle");
    let cfg = config(out.clone());
    let mut w = InMemoryWriter::new();
    assert!(!w.is_ready_for_more_data());
    assert!(w.pixel_buffer_pool().is_none());

    w.start(&cfg).unwrap();
    assert!(out.exists());
    let pool = w.pixel_buffer_pool().unwrap();

    for i in 0..3 {
        assert!(w.is_ready_for_more_data());
        let buf = pool.borrow(2, 2, PixelFormat::Bgra8);
        w.append(buf, pts(&cfg, i)).unwrap();
    }
    w.finish().unwrap();

    assert!(w.is_finished());
    assert_eq!(w.frames().len(), 3);
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "0 0/600\n1 100/600\n2 200/600\n"
    );
    let _ = std::fs::remove_file(&out);
}

#[test]
fn start_refuses_existing_output() {
    let out = temp_path("exists");
    std::fs::write(&out, b"old").unwrap();
    let err = InMemoryWriter::new().start(&config(out.clone())).unwrap_err();
    assert!(matches!(err, LapseError::SetupFailed(_)));
    let _ = std::fs::remove_file(&out);
}

#[test]
fn stall_pattern_requires_a_wait() {
    let out = temp_path("stall");
    let cfg = config(out.clone());
    let mut w = InMemoryWriter::new().with_stall_every(2);
    w.start(&cfg).unwrap();

    w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 0))
        .unwrap();
    assert!(w.is_ready_for_more_data());
    w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 1))
        .unwrap();
    assert!(!w.is_ready_for_more_data());

    let err = w
        .append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 2))
        .unwrap_err();
    assert!(matches!(err, LapseError::Encoder(_)));

    w.wait_until_ready(&CancelToken::new()).unwrap();
    assert!(w.is_ready_for_more_data());
    assert_eq!(w.stalls(), 1);
    assert!(w.readiness_checks() >= 3);
    let _ = std::fs::remove_file(&out);
}

#[test]
fn append_validates_shape_and_ordering() {
    let out = temp_path("validate");
    let cfg = config(out.clone());
    let mut w = InMemoryWriter::new();
    w.start(&cfg).unwrap();

    let err = w
        .append(PixelBuffer::new(4, 2, PixelFormat::Bgra8), pts(&cfg, 0))
        .unwrap_err();
    assert!(matches!(err, LapseError::Validation(_)));

    w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 1))
        .unwrap();
    let err = w
        .append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 1))
        .unwrap_err();
    assert!(matches!(err, LapseError::Encoder(_)));
    let _ = std::fs::remove_file(&out);
}

#[test]
fn injected_failure_hits_the_requested_position() {
    let out = temp_path("inject");
    let cfg = config(out.clone());
    let mut w = InMemoryWriter::new().with_failure_at(1);
    w.start(&cfg).unwrap();
    w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 0))
        .unwrap();
    assert!(
        w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 1))
            .is_err()
    );
    w.abort();
    assert!(w.is_aborted());
    assert!(!w.is_ready_for_more_data());
    assert!(w.wait_until_ready(&CancelToken::new()).is_err());
    let _ = std::fs::remove_file(&out);
}

#[test]
fn hung_writer_blocks_until_cancelled() {
    let out = temp_path("hang");
    let cfg = config(out.clone());
    let mut w = InMemoryWriter::new().with_hang_after(1);
    w.start(&cfg).unwrap();
    w.append(PixelBuffer::new(2, 2, PixelFormat::Bgra8), pts(&cfg, 0))
        .unwrap();
    assert!(!w.is_ready_for_more_data());

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(30));
            token.cancel();
        })
    };
    let err = w.wait_until_ready(&token).unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, LapseError::Cancelled));
    assert!(!w.is_ready_for_more_data());
    let _ = std::fs::remove_file(&out);
}
