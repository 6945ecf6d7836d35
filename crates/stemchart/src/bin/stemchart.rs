//! stemchart - interactive multi-stem playback session
//!
//! Loads `<asset dir>/{drums,bass,others,vocals}.<ext>`, then reads console
//! commands from stdin (`play`, `stop`, `toggle <channel> on|off`,
//! `loop on|off`, `status`, `quit`) while printing session updates to stdout.
//! Logs go to stderr.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stemchart::command::HELP;
use stemchart::feedback::render_line;
use stemchart::{
    spawn_feedback, telemetry, AssetLocator, ConsoleCommand, FileBackend, MemoryBackend,
    PlaybackBackend, SessionConfig, SessionDaemon, SessionSnapshot, TextFeedback,
};
use stemconf::StemConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

const AFTER_HELP: &str = "\
Stems are looked up as <asset dir>/<channel>.<extension>, `wav` by default.
MP3 and FLAC stems need a build with `--features symphonia-decode` plus
`extension = \"mp3\"` under [assets] in stemchart.toml (or
STEMCHART_EXTENSION=mp3).";

#[derive(Parser)]
#[command(name = "stemchart")]
#[command(about = "Play instrument stems on a shared clock with per-stem charts")]
#[command(version, after_help = AFTER_HELP)]
struct Cli {
    /// Config file (replaces ./stemchart.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding drums/bass/others/vocals audio files
    #[arg(short, long)]
    asset_dir: Option<PathBuf>,

    /// Use an in-memory backend instead of opening audio files
    #[arg(long)]
    dry_run: bool,

    /// Do not restart stems whose media ends
    #[arg(long)]
    no_loop: bool,

    /// Seed for chart generation
    #[arg(long)]
    seed: Option<u64>,

    /// Print updates as JSON lines
    #[arg(long)]
    json: bool,

    /// Only print state on `status`
    #[arg(short, long)]
    quiet: bool,

    /// Start playback right after loading
    #[arg(long)]
    autoplay: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_snapshot(snapshot: &SessionSnapshot, json: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize snapshot"),
        }
    } else {
        println!("{}", render_line(snapshot));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = StemConfig::load_with_sources_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.asset_dir {
        config.infra.paths.asset_dir = Some(dir);
    }
    if cli.no_loop {
        config.bootstrap.playback.looping = false;
    }
    if let Some(seed) = cli.seed {
        config.bootstrap.chart.seed = Some(seed);
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    telemetry::init(&config.infra.telemetry.log_level)?;
    info!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "stemchart {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let extension = config.bootstrap.assets.extension.clone();
    let assets = match &config.infra.paths.asset_dir {
        Some(dir) => AssetLocator::new(dir, extension),
        None => AssetLocator::beside_executable(extension),
    };

    let backend: Arc<dyn PlaybackBackend> = if cli.dry_run {
        info!("dry run, no audio files will be opened");
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(FileBackend::new())
    };

    let session = SessionDaemon::start(SessionConfig::from(&config), backend, assets).await?;

    let feedback = (!cli.quiet)
        .then(|| spawn_feedback(session.subscribe(), TextFeedback::new(std::io::stdout()).json(cli.json)));

    if cli.autoplay {
        session.play_all().await?;
    }

    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line.transpose().context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match line.parse::<ConsoleCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };

                let Some(request) = command.to_session_command() else {
                    println!("{HELP}");
                    continue;
                };
                let snapshot = session.send(request).await?;
                match command {
                    ConsoleCommand::Status => print_snapshot(&snapshot, cli.json),
                    ConsoleCommand::Quit => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if !session.is_closed() {
        let _ = session.shutdown().await;
    }
    session.closed().await;

    if let Some(feedback) = feedback {
        let _ = feedback.await;
    }

    info!("stemchart shutdown complete");
    Ok(())
}
