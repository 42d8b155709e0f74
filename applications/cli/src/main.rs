/// Encore - command shell for the playback engine
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use encore_core::InMemoryLibrary;
use encore_playback::{
    AudioBackend, Command, JsonFileStore, PersistenceStore, PlaybackService, ServiceParts,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backend;
mod config;
mod shell;

use backend::ProbeBackend;
use config::CliConfig;
use shell::Input;

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Queue-based music playback shell", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./encore.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library manifest (JSON array of tracks)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Queue state file
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive playback shell (default)
    Shell,
    /// Probe audio files and print their durations
    Probe {
        /// Files to probe
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the saved queue state
    Snapshot,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(library) = cli.library {
        config.library.manifest = library;
    }
    if let Some(state) = cli.state {
        config.state.path = state;
    }

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => run_shell(config),
        Commands::Probe { paths } => probe(&paths),
        Commands::Snapshot => print_snapshot(&config.state.path),
    }
}

fn load_library(manifest: &Path) -> Result<InMemoryLibrary> {
    if !manifest.exists() {
        warn!(
            "Library manifest {} not found, starting with an empty library",
            manifest.display()
        );
        return Ok(InMemoryLibrary::default());
    }

    let file = File::open(manifest)
        .with_context(|| format!("Failed to open {}", manifest.display()))?;
    InMemoryLibrary::from_json_reader(BufReader::new(file))
        .with_context(|| format!("Invalid library manifest {}", manifest.display()))
}

fn run_shell(config: CliConfig) -> Result<()> {
    let library = Arc::new(load_library(&config.library.manifest)?);
    info!("Library: {} tracks", library.len());

    let backends: [Box<dyn AudioBackend>; 2] = [
        Box::new(ProbeBackend::new("backend-0").context("Failed to start backend")?),
        Box::new(ProbeBackend::new("backend-1").context("Failed to start backend")?),
    ];

    let service = PlaybackService::spawn(ServiceParts {
        config: config.playback,
        library,
        backends,
        store: Box::new(JsonFileStore::new(&config.state.path)),
        observers: vec![Box::new(shell::ConsoleObserver)],
    })?;
    let handle = service.handle();
    handle.wait_ready()?;

    print!("{}", shell::format_status(&handle.status()));
    println!("Type 'help' for commands.");

    prompt()?;
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read input")?;

        match shell::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Input::Send(message))) => handle.send(message)?,
            Ok(Some(Input::More(group))) => match handle.current_track() {
                Some(track) => handle.command(Command::EnqueueFrom(track, group))?,
                None => println!("Nothing selected"),
            },
            Ok(Some(Input::Status)) => print!("{}", shell::format_status(&handle.status())),
            Ok(Some(Input::Help)) => print!("{}", shell::HELP),
            Ok(Some(Input::Quit)) => break,
            Err(message) => println!("{}", message),
        }
        prompt()?;
    }

    service.shutdown()?;
    info!("Queue state saved to {}", config.state.path.display());
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("encore> ");
    io::stdout().flush()
}

fn probe(paths: &[PathBuf]) -> Result<()> {
    let mut failures = 0;
    for path in paths {
        match backend::probe(path) {
            Ok(Some(ms)) => println!("{}\t{}.{:03}s", path.display(), ms / 1000, ms % 1000),
            Ok(None) => println!("{}\tunknown duration", path.display()),
            Err(e) => {
                failures += 1;
                println!("{}\t{}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} files could not be probed", failures, paths.len());
    }
    Ok(())
}

fn print_snapshot(path: &Path) -> Result<()> {
    let mut store = JsonFileStore::new(path);
    let Some(snapshot) = store.load()? else {
        println!("No saved state at {}", path.display());
        return Ok(());
    };

    println!(
        "Shuffle: {}, repeat: {}",
        snapshot.shuffle_mode(),
        snapshot.finish_action().as_str()
    );
    if let Some(id) = &snapshot.pending_seek_track_id {
        println!("Resume {} at {} ms", id, snapshot.pending_seek_ms);
    }
    for (index, entry) in snapshot.tracks.iter().enumerate() {
        let marker = if index == snapshot.current_pos { '>' } else { ' ' };
        println!("{} {:4} {}", marker, index, entry.id);
    }
    Ok(())
}
