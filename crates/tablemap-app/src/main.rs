//! Headless tablemap shell (native).
//!
//! `watch` follows the shared map as a guest and logs every merge; `push`
//! uploads a scene file as the admin; `assets` lists what the server offers.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tablemap_core::remote::HttpRemoteStore;
use tablemap_core::{
    ConfigError, ConnectionState, EditorConfig, EditorSession, LayerKind, RemoteError,
    RemoteStore, Role, SceneSnapshot, SyncError,
};
use thiserror::Error;

const TICK: Duration = Duration::from_millis(100);
const PUSH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid scene file: {0}")]
    Scene(#[from] serde_json::Error),

    #[error("server did not acknowledge the push")]
    PushFailed,
}

#[derive(Debug, Parser)]
#[command(name = "tablemap", version, about = "Headless tablemap client")]
struct Cli {
    /// Server base URL (overrides the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// JSON editor config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the shared map as a guest and log each update
    Watch {
        /// Exit after this many merged updates
        #[arg(long)]
        updates: Option<usize>,
    },
    /// Upload a scene file as the admin
    Push {
        /// Scene snapshot JSON
        scene: PathBuf,
    },
    /// List character portraits and map assets on the server
    Assets,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    log::info!("Using server {}", config.server_url);

    match cli.command {
        Command::Watch { updates } => watch(config, updates),
        Command::Push { scene } => push(config, &scene),
        Command::Assets => assets(&config),
    }
}

fn watch(config: EditorConfig, updates: Option<usize>) -> Result<(), AppError> {
    let mut session = EditorSession::new(Role::Guest, config)?;
    session.connect()?;
    session.start_sync(Instant::now());

    let mut merged = 0;
    let mut last_state = ConnectionState::Unknown;
    while updates.is_none_or(|limit| merged < limit) {
        thread::sleep(TICK);
        if let Some(report) = session.tick(Instant::now()) {
            merged += 1;
            let scene = session.scene();
            log::info!(
                "Update {merged}: {} tokens, {} objects, cell size {:.1}, {} nodes replaced",
                scene.layer(LayerKind::Tokens).children.len(),
                scene.layer(LayerKind::Objects).children.len(),
                session.state().cell_size,
                report.destroyed
            );
            for request in session.take_image_requests() {
                log::debug!("Image wanted: {}", request.source.as_str());
            }
        }
        let state = session.connection_state();
        if state != last_state {
            log::info!("Connection: {state:?}");
            last_state = state;
        }
    }
    session.stop_sync();
    Ok(())
}

fn push(config: EditorConfig, path: &Path) -> Result<(), AppError> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = SceneSnapshot::from_json(&text)?;
    log::info!("Loaded {} nodes from {}", snapshot.node_count(), path.display());

    let mut session = EditorSession::new(Role::Admin, config)?;
    session.apply_remote(snapshot);
    session.connect()?;
    session.start_sync(Instant::now());
    session.flush();

    let deadline = Instant::now() + PUSH_TIMEOUT;
    while Instant::now() < deadline {
        thread::sleep(TICK);
        session.tick(Instant::now());
        match session.connection_state() {
            ConnectionState::Reachable => {
                log::info!("Scene pushed");
                return Ok(());
            }
            ConnectionState::Unreachable => return Err(AppError::PushFailed),
            ConnectionState::Unknown => {}
        }
    }
    Err(AppError::PushFailed)
}

fn assets(config: &EditorConfig) -> Result<(), AppError> {
    let store = HttpRemoteStore::new(&config.server_url)?;
    for url in store.list_characters()? {
        println!("character\t{url}");
    }
    for (category, urls) in store.list_assets()? {
        for url in urls {
            println!("{category}\t{url}");
        }
    }
    Ok(())
}
