//! Video sequence player (vseq-player) - Main entry point
//!
//! Mounts a sequence of segments given on the command line and prints the
//! status line of every state change until the sequence completes or fails.
//! Media is simulated; assets are resolved against an object store when
//! `--base-url` is given, otherwise from an in-memory store.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vseq_common::events::{SequenceEvent, SequencePhase};
use vseq_common::human_time::format_clock;
use vseq_player::media::{MediaBackend, SimulatedBackend};
use vseq_player::resolver::{AssetStore, HttpObjectStore, StaticAssetStore};
use vseq_player::{PlayerConfig, PlayerContext, Segment, StatusReporter};

/// Content length used for simulated segments without an explicit duration
const DEFAULT_SIMULATED_SECONDS: f64 = 10.0;

/// Command-line arguments for vseq-player
#[derive(Parser, Debug)]
#[command(name = "vseq-player")]
#[command(about = "Plays a sequence of video segments as one continuous sequence")]
#[command(version)]
struct Args {
    /// Configuration file (overrides VSEQ_CONFIG and the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Object store base URL used to resolve segment assets
    #[arg(long, env = "VSEQ_BASE_URL")]
    base_url: Option<String>,

    /// Wait for an explicit play instead of starting automatically
    #[arg(long)]
    no_autoplay: bool,

    /// Start muted
    #[arg(long)]
    muted: bool,

    /// Playback rate (1.0 = normal speed)
    #[arg(long)]
    rate: Option<f64>,

    /// Only calculate the sequence duration
    #[arg(long)]
    dry_run: bool,

    /// Segments as ID[=SECONDS][:TITLE]
    #[arg(required = true)]
    segments: Vec<SegmentArg>,
}

/// One `ID[=SECONDS][:TITLE]` argument
#[derive(Debug, Clone, PartialEq)]
struct SegmentArg {
    id: String,
    seconds: Option<f64>,
    title: Option<String>,
}

impl FromStr for SegmentArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (head, title) = match s.split_once(':') {
            Some((head, title)) => (head, Some(title.to_string())),
            None => (s, None),
        };
        let (id, seconds) = match head.split_once('=') {
            Some((id, seconds)) => {
                let seconds: f64 = seconds
                    .parse()
                    .map_err(|_| format!("invalid duration '{}' in '{}'", seconds, s))?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(format!("duration must be non-negative in '{}'", s));
                }
                (id, Some(seconds))
            }
            None => (head, None),
        };
        if id.is_empty() {
            return Err(format!("missing segment id in '{}'", s));
        }

        Ok(Self {
            id: id.to_string(),
            seconds,
            title,
        })
    }
}

impl SegmentArg {
    fn segment(&self) -> Segment {
        Segment::new(
            self.id.clone(),
            self.title.clone().unwrap_or_else(|| self.id.clone()),
        )
    }

    fn simulated_uri(&self) -> String {
        format!("sim://{}", self.id)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The configured log level is not known yet; loading logs through a
    // temporary subscriber
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .finish();
    let mut config =
        load_config(args.config.as_deref(), bootstrap).context("Failed to load configuration")?;
    if args.no_autoplay {
        config.autoplay = false;
    }
    if args.muted {
        config.muted = true;
    }
    if let Some(rate) = args.rate {
        config.playback_rate = rate;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(env_filter(&config.logging.level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vseq-player with {} segments", args.segments.len());

    let (store, backend) = build_collaborators(&args, &config)?;
    let context = PlayerContext::new(config, store, backend);

    if args.dry_run {
        return dry_run(&context, &args.segments).await;
    }

    play(&context, &args.segments).await
}

/// `RUST_LOG` if set, otherwise `level` for the vseq crates
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vseq_player={},vseq_common={}", level, level).into())
}

/// Load the configuration with `subscriber` as the active dispatcher
fn load_config<S>(path: Option<&Path>, subscriber: S) -> vseq_player::Result<PlayerConfig>
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::with_default(subscriber, || PlayerConfig::load(path))
}

/// Asset store and media backend for the given arguments
fn build_collaborators(
    args: &Args,
    config: &PlayerConfig,
) -> Result<(Arc<dyn AssetStore>, Arc<dyn MediaBackend>)> {
    let mut backend = SimulatedBackend::new(config.time_update_interval());

    let store: Arc<dyn AssetStore> = match &args.base_url {
        Some(base_url) => {
            info!("Resolving assets against {}", base_url);
            backend = backend.with_default_duration(DEFAULT_SIMULATED_SECONDS);
            Arc::new(
                HttpObjectStore::new(base_url.clone(), config.resolve_timeout())
                    .context("Failed to create object store client")?,
            )
        }
        None => {
            let mut store = StaticAssetStore::new();
            for arg in &args.segments {
                store = store.with_object(config.asset_path(&arg.id), arg.simulated_uri());
                backend = backend.with_duration(
                    arg.simulated_uri(),
                    arg.seconds.unwrap_or(DEFAULT_SIMULATED_SECONDS),
                );
            }
            Arc::new(store)
        }
    };

    Ok((store, Arc::new(backend)))
}

async fn dry_run(context: &PlayerContext, segments: &[SegmentArg]) -> Result<()> {
    let ids: Vec<String> = segments.iter().map(|s| s.id.clone()).collect();
    let durations = context.calculate_sequence_duration(&ids).await;

    for entry in &durations.segments {
        match &entry.error {
            None => println!("{:>3}  {:<24} {}", entry.index, entry.id, format_clock(entry.duration)),
            Some(reason) => println!("{:>3}  {:<24} unavailable ({})", entry.index, entry.id, reason),
        }
    }
    println!("Total: {}", format_clock(durations.total));
    Ok(())
}

async fn play(context: &PlayerContext, segments: &[SegmentArg]) -> Result<()> {
    let handle = context
        .mount(segments.iter().map(SegmentArg::segment).collect())
        .context("Failed to mount sequence")?;
    let mut snapshots = handle.watch();
    let mut events = handle.subscribe();
    let mut last_message = String::new();

    loop {
        let report = StatusReporter::report(&snapshots.borrow_and_update());
        if report.message != last_message {
            println!("[{:>9}] {}", report.phase.to_string(), report.message);
            last_message = report.message;
        }
        if report.phase.is_terminal() {
            break;
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = events.recv() => {
                if let Ok(SequenceEvent::SegmentSkipped { segment_id, reason, .. }) = event {
                    println!("Skipping {}: {}", segment_id, reason);
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, unmounting sequence");
                handle.unmount().await.context("Failed to unmount sequence")?;
                return Ok(());
            }
        }
    }

    let snapshot = handle.snapshot();
    if let Err(e) = handle.unmount().await {
        warn!("Unmount after finish: {}", e);
    }
    if snapshot.phase == SequencePhase::Error {
        bail!(
            "Sequence failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_missing_config_file_warning_is_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("vseq_common=info,vseq_player=info"))
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let config = load_config(Some(Path::new("/nonexistent/vseq/player.toml")), subscriber)
            .unwrap();

        assert!(config.autoplay);
        let output = logs.text();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("not found, using built-in defaults"), "{}", output);
    }

    #[test]
    fn test_segment_arg_full() {
        let arg: SegmentArg = "warmup=42.5:Warm up".parse().unwrap();
        assert_eq!(
            arg,
            SegmentArg {
                id: "warmup".to_string(),
                seconds: Some(42.5),
                title: Some("Warm up".to_string()),
            }
        );
        assert_eq!(arg.segment().title, "Warm up");
    }

    #[test]
    fn test_segment_arg_id_only() {
        let arg: SegmentArg = "stretch".parse().unwrap();
        assert_eq!(arg.seconds, None);
        assert_eq!(arg.segment().title, "stretch");
        assert_eq!(arg.simulated_uri(), "sim://stretch");
    }

    #[test]
    fn test_segment_arg_rejects_bad_duration() {
        assert!("a=soon".parse::<SegmentArg>().is_err());
        assert!("a=-3".parse::<SegmentArg>().is_err());
        assert!("=3".parse::<SegmentArg>().is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "vseq-player",
            "--muted",
            "--rate",
            "1.5",
            "a=10",
            "b=20:Second",
        ])
        .unwrap();
        assert!(args.muted);
        assert_eq!(args.rate, Some(1.5));
        assert_eq!(args.segments.len(), 2);
    }
}
