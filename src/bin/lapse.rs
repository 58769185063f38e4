use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "lapse", version)]
struct Cli {
    /// Log per-frame progress.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble captured frames into an MP4 (requires `ffmpeg` on PATH).
    Assemble(AssembleArgs),
    /// Render a single transformed frame as a PNG.
    Frame(FrameArgs),
    /// Print the effective render settings as JSON.
    ProbeSettings(SettingsArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Directory of captured images, assembled in file-name order.
    #[arg(long, conflicts_with = "manifest", required_unless_present = "manifest")]
    frames: Option<PathBuf>,

    /// Capture manifest JSON (frames with orientation metadata).
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Render settings JSON; flags below override it.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Output frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Output codec.
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// Display rotation written to the video track, in degrees clockwise.
    #[arg(long, value_parser = ["0", "90", "180", "270"])]
    rotation: Option<String>,
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Warp frames against the capture's average orientation.
    #[arg(long, default_value_t = false)]
    compensate: bool,

    /// Compose roll/pitch/yaw in 3D before projecting (default: one projection per axis).
    #[arg(long, default_value_t = false)]
    compound_axes: bool,

    /// Placement of the overflowing axis after scale-to-fill.
    #[arg(long, value_enum, default_value_t = AnchorArg::Center)]
    anchor: AnchorArg,
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    transform: TransformArgs,

    /// Output MP4 path (defaults to the settings' output path).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Frames allowed in flight inside the encoder.
    #[arg(long, default_value_t = 4)]
    queue_depth: usize,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    transform: TransformArgs,

    /// Frame index (0-based, encode order).
    #[arg(long)]
    index: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecArg {
    H264,
    Hevc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AnchorArg {
    Center,
    Origin,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Assemble(args) => cmd_assemble(args),
        Command::Frame(args) => cmd_frame(args),
        Command::ProbeSettings(args) => cmd_probe_settings(args),
    }
}

fn cmd_assemble(args: AssembleArgs) -> anyhow::Result<()> {
    let source = load_source(&args.input)?;
    let mut settings = resolve_settings(&args.settings)?;
    if let Some(out) = args.out {
        settings.output_path = out;
    }
    if let Some(parent) = settings.output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let opts = lapse::TimeLapseOpts {
        transform: transform_opts(&args.transform),
        encoder_queue_depth: args.queue_depth,
        ..lapse::TimeLapseOpts::default()
    };
    let mut builder = lapse::TimeLapseBuilder::new(settings, opts)?;

    let mut last_percent = None;
    let report = builder.render(
        source,
        |p| {
            let percent = (p.fraction() * 100.0).floor() as u32;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                eprint!("\r{percent:3}% ({}/{})", p.completed, p.total);
            }
        },
        |_| eprintln!(),
    )?;

    eprintln!(
        "wrote {} ({} frames, {:.3}s)",
        report.output_path.display(),
        report.frames_written,
        report.duration.as_secs_f64()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut source = load_source(&args.input)?;
    let settings = resolve_settings(&args.settings)?;
    if args.index >= source.count() as u64 {
        anyhow::bail!(
            "frame index {} out of range (source has {} frames)",
            args.index,
            source.count()
        );
    }

    let reference = source.reference_orientation();
    let mut frame = None;
    for _ in 0..=args.index {
        frame = source.remove_first();
    }
    let frame = frame.context("frame source drained early")?;

    let transformer =
        lapse::FrameTransformer::new(settings.canvas(), transform_opts(&args.transform));
    let pool = lapse::SharedPixelBufferPool::new(lapse::PixelBufferPoolOpts::default());
    let buf = transformer.transform(lapse::FrameIndex(args.index), frame, reference, &pool)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    buf.to_rgba_image()
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe_settings(args: SettingsArgs) -> anyhow::Result<()> {
    let settings = resolve_settings(&args)?;
    let json = serde_json::to_string_pretty(&settings).context("serialize settings")?;
    println!("{json}");
    Ok(())
}

fn load_source(args: &InputArgs) -> anyhow::Result<lapse::FrameSource> {
    let source = match (&args.frames, &args.manifest) {
        (Some(dir), _) => lapse::load_directory(dir)?,
        (None, Some(manifest)) => lapse::load_manifest(manifest)?,
        (None, None) => anyhow::bail!("one of --frames or --manifest is required"),
    };
    Ok(source)
}

fn resolve_settings(args: &SettingsArgs) -> anyhow::Result<lapse::RenderSettings> {
    let mut settings = match &args.settings {
        Some(path) => lapse::RenderSettings::from_path(path)?,
        None => lapse::RenderSettings::default(),
    };
    if let Some(w) = args.width {
        settings.width = w;
    }
    if let Some(h) = args.height {
        settings.height = h;
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(codec) = args.codec {
        settings.codec = match codec {
            CodecArg::H264 => lapse::VideoCodec::H264,
            CodecArg::Hevc => lapse::VideoCodec::Hevc,
        };
    }
    if let Some(rotation) = args.rotation.as_deref() {
        settings.rotation = match rotation {
            "90" => lapse::TrackRotation::Cw90,
            "180" => lapse::TrackRotation::Cw180,
            "270" => lapse::TrackRotation::Cw270,
            _ => lapse::TrackRotation::None,
        };
    }
    settings.validate()?;
    Ok(settings)
}

fn transform_opts(args: &TransformArgs) -> lapse::TransformOpts {
    lapse::TransformOpts {
        compensate_tilt: args.compensate,
        axis_composition: if args.compound_axes {
            lapse::AxisComposition::Compound
        } else {
            lapse::AxisComposition::PerAxisReset
        },
        fill_anchor: match args.anchor {
            AnchorArg::Center => lapse::FillAnchor::Center,
            AnchorArg::Origin => lapse::FillAnchor::Origin,
        },
        ..lapse::TransformOpts::default()
    }
}
