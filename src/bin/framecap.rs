use std::{path::PathBuf, rc::Rc, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framecap::{
    CaptureConfig, CaptureSession, FrameLoop, FrameRGBA, GlobalClock, RenderEngine, Resolution,
    SessionHandle, SessionRegistry, TestPatternEngine, into_handle,
};

#[derive(Parser, Debug)]
#[command(name = "framecap", version)]
struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the encoder executable can be run.
    Probe(ProbeArgs),
    /// Print the session names of a capture config, in order.
    List(ListArgs),
    /// Render a test pattern and capture it with the configured sessions.
    Record(RecordArgs),
    /// Write one extracted test pattern frame as a PNG.
    Snapshot(SnapshotArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Encoder executable (name on PATH or a path).
    #[arg(long, default_value = "ffmpeg")]
    encoder: PathBuf,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Capture config JSON.
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Capture config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 90)]
    frames: u64,

    /// Sessions to open. Opens every session when omitted.
    #[arg(long = "session")]
    sessions: Vec<String>,

    /// Sleep between ticks to honour the target frame rate hint.
    #[arg(long)]
    realtime: bool,

    /// Viewport width of the test pattern engine.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height of the test pattern engine.
    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[derive(Parser, Debug)]
struct SnapshotArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Requested width; rounded to a multiple of 8.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Requested height; rounded to a multiple of 8.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Logical time in seconds.
    #[arg(long, default_value_t = 0.0)]
    time: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Probe(args) => cmd_probe(args),
        Command::List(args) => cmd_list(args),
        Command::Record(args) => cmd_record(args),
        Command::Snapshot(args) => cmd_snapshot(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let program = framecap::locate_encoder(&args.encoder)?;
    println!("{}: available", program.display());
    Ok(())
}

fn cmd_list(args: ListArgs) -> anyhow::Result<()> {
    let cfg = CaptureConfig::from_json_path(&args.config)?;
    let (_sessions, registry) = build_sessions(&cfg, Rc::new(GlobalClock::new()))?;
    for name in registry.list_names() {
        println!("{name}");
    }
    Ok(())
}

fn build_sessions(
    cfg: &CaptureConfig,
    clock: Rc<GlobalClock>,
) -> anyhow::Result<(Vec<SessionHandle>, SessionRegistry)> {
    let mut registry = SessionRegistry::new();
    let mut sessions = Vec::with_capacity(cfg.sessions.len());
    for s in &cfg.sessions {
        let session = CaptureSession::new(
            s.name.clone(),
            s.settings.clone(),
            cfg.encoder.clone(),
            clock.clone(),
        )
        .with_context(|| format!("create session '{}'", s.name))?;
        let handle = into_handle(session);
        registry.register(s.name.clone(), &handle)?;
        sessions.push(handle);
    }
    Ok((sessions, registry))
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let cfg = CaptureConfig::from_json_path(&args.config)?;
    let clock = Rc::new(GlobalClock::new());
    let (sessions, registry) = build_sessions(&cfg, clock.clone())?;

    if args.sessions.is_empty() {
        registry.open_all();
    } else {
        for name in &args.sessions {
            if let Err(e) = registry.open_by_id(name) {
                tracing::debug!(session = %name, "skipped: {e}");
            }
        }
    }
    if !registry.is_capturing() {
        anyhow::bail!("no capture session could be opened");
    }

    let engine = TestPatternEngine::new(Resolution::new(args.width, args.height)?);
    let mut frame_loop = FrameLoop::new(engine, clock);
    let summary = frame_loop.run(&sessions, args.frames, args.realtime);

    registry.close_all();
    drop(frame_loop);

    for s in &sessions {
        let s = s.borrow();
        if let Some(report) = s.last_report() {
            eprintln!(
                "wrote {} ({} frames, {} dropped)",
                report.filename.display(),
                report.frames_written,
                s.frames_dropped()
            );
        }
    }
    eprintln!(
        "{} ticks, {} frames written, {} dropped",
        summary.ticks, summary.written, summary.dropped
    );
    Ok(())
}

fn cmd_snapshot(args: SnapshotArgs) -> anyhow::Result<()> {
    let size = Resolution::new(args.width, args.height)?;
    let mut engine = TestPatternEngine::new(size);
    let mut screen = FrameRGBA::new(engine.viewport());
    let time = Duration::try_from_secs_f64(args.time).context("--time must be >= 0")?;
    engine.render(&mut screen, time)?;

    let out_size = size.normalized();
    let bytes = framecap::extract(&mut engine, &screen, size)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &bytes,
        out_size.width,
        out_size.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {} ({out_size})", args.out.display());
    Ok(())
}
