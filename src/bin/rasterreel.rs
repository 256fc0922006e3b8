use std::{
    fs::File,
    io::{BufRead as _, BufReader},
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use rasterreel::{
    DEFAULT_DELAY_MS, DirFetcher, FfmpegSink, LaunchConfig, NativeRasterInput, PlaybackConfig,
    PlaybackController, PlayerCommand,
};

#[derive(Parser, Debug)]
#[command(name = "rasterreel", version)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a sequence of native-raster frames on a timer.
    Play(PlayArgs),
    /// Decode a single native-raster record to a PNG.
    Decode(DecodeArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Directory holding `<id>.json` frame records.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Comma-separated frame ids, played in order.
    #[arg(long, value_delimiter = ',', required_unless_present = "query")]
    id: Vec<String>,

    /// Milliseconds between frames.
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    delay: u64,

    /// Launch parameters as a query string, e.g. `id=a,b&delay=500`.
    #[arg(long, conflicts_with = "id")]
    query: Option<String>,

    /// Record the played frames to a video file (.webm or .mp4, requires `ffmpeg` on PATH).
    #[arg(long)]
    record: Option<PathBuf>,

    /// Configure `--record` but wait for a toggle before capturing.
    #[arg(long, requires = "record")]
    record_paused: bool,

    /// Start paused.
    #[arg(long)]
    paused: bool,

    /// Stop after this many painted frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Give up on a decode after this many milliseconds.
    #[arg(long, default_value_t = 10_000)]
    decode_timeout: u64,

    /// Write the last painted frame to this PNG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Read commands from stdin: `p` play/pause, `r` record on/off, `q` quit.
    #[arg(long, short)]
    interactive: bool,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Input record JSON (`{width, height, data_b64, id?}`).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Play(args) => cmd_play(args),
        Command::Decode(args) => cmd_decode(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn launch_config(args: &PlayArgs) -> anyhow::Result<LaunchConfig> {
    let cfg = match &args.query {
        Some(q) => LaunchConfig::from_query(q)?,
        None => LaunchConfig::new(args.id.clone(), args.delay)?,
    };
    Ok(cfg)
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let launch = launch_config(&args)?;
    let fetcher = DirFetcher::new(&args.dir);
    let frames = rasterreel::load_frames(launch.ids.as_slice(), &fetcher)
        .with_context(|| format!("load frames from '{}'", args.dir.display()))?;

    let cfg = PlaybackConfig {
        interval: launch.delay,
        decode_timeout: Duration::from_millis(args.decode_timeout.max(1)),
        max_frames: args.frames,
    };
    let mut player = PlaybackController::new(frames, cfg)?;

    if let Some(path) = &args.record {
        player = player.with_recording_sink(Box::new(FfmpegSink::new(path)?));
        if !args.record_paused {
            player.start_recording()?;
        }
    }
    if !args.paused {
        player.start()?;
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    if args.interactive {
        spawn_stdin_commands(tx.clone())?;
    }

    let deadline = args.duration.map(deadline_after).transpose()?;
    let exit = player.run_until(&rx, deadline)?;
    drop(tx);
    tracing::debug!(?exit, "playback loop finished");

    if let Some(path) = &args.snapshot {
        player.surface().save_png(path)?;
        eprintln!("wrote {}", path.display());
    }

    let stats = player.finish()?;
    eprintln!(
        "requested {} painted {} failed {} recorded {}",
        stats.requests_issued, stats.frames_painted, stats.frames_failed, stats.recording_steps
    );
    Ok(())
}

fn deadline_after(secs: f64) -> anyhow::Result<Instant> {
    let span = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("--duration {secs} is not a usable number of seconds"))?;
    Instant::now()
        .checked_add(span)
        .with_context(|| format!("--duration {secs} is too far in the future"))
}

fn spawn_stdin_commands(tx: Sender<PlayerCommand>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("rasterreel-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let cmd = match line.trim() {
                    "" | "p" | "play" | "pause" => PlayerCommand::TogglePlay,
                    "r" | "rec" => PlayerCommand::ToggleRecording,
                    "q" | "quit" => PlayerCommand::Shutdown,
                    other => {
                        eprintln!("unknown command '{other}' (p = play/pause, r = record, q = quit)");
                        continue;
                    }
                };
                let quit = cmd == PlayerCommand::Shutdown;
                if tx.send(cmd).is_err() || quit {
                    break;
                }
            }
        })
        .context("spawn stdin reader")?;
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let f = File::open(&args.in_path)
        .with_context(|| format!("open record '{}'", args.in_path.display()))?;
    let input: NativeRasterInput = serde_json::from_reader(BufReader::new(f))
        .with_context(|| "parse native-raster record JSON")?;

    let frame = rasterreel::decode_native_raster(&input)?;

    rasterreel::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.pixels,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
