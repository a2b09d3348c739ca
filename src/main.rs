//! Pointer Drift - profile-driven pointer movement
//!
//! Starts the worker thread and runs the console on the main thread.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use pointer_drift::backend::{
    platform_injector, BackendController, NativeBackend, SerialBackend, SystemPortOpener,
};
use pointer_drift::config::{AppConfig, ProfileWatcher};
use pointer_drift::console::Console;
use pointer_drift::input::platform_input;
use pointer_drift::keybinds::KeyBindingStore;
use pointer_drift::logging::init_logging;
use pointer_drift::paths::AppPaths;
use pointer_drift::profile::ProfileStore;
use pointer_drift::state::{BackendKind, SharedState};
use pointer_drift::worker::{LoggingHooks, Worker};

/// Pointer Drift - move the pointer along stored movement profiles
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding config, profiles, keybinds and logs
    #[arg(long, env = "POINTER_DRIFT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to configuration file (default: <data-dir>/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Movement backend to start with (native, serial)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Profile to select at startup
    #[arg(short, long)]
    profile: Option<String>,

    /// Run without the console; stop with the quit key
    #[arg(long)]
    headless: bool,

    /// Do not watch the profile document for changes
    #[arg(long)]
    no_watch: bool,

    /// List profiles and exit
    #[arg(long)]
    list_profiles: bool,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect(args.data_dir.as_deref());
    if let Some(config) = &args.config {
        paths = paths.with_config(config.clone());
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, Some(&paths.logs_dir))?;

    info!("Starting Pointer Drift v{}...", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", paths.data_dir.display());

    let config = AppConfig::load(&paths.config)?;
    paths.apply_files(&config.files);

    let profiles = ProfileStore::new(&paths.profiles);
    let keybinds = KeyBindingStore::new(&paths.keybinds);

    if args.list_profiles {
        return list_profiles(&profiles);
    }

    let report = keybinds.load_report();
    if let Some(warning) = &report.warning {
        warn!("Keybinds: {}", warning);
    }

    let backend = args.backend.unwrap_or(config.worker.default_backend);
    let state = Arc::new(SharedState::new(report.bindings, backend));
    if let Some(name) = &args.profile {
        state.select_profile(name.trim());
    }

    let _watcher = if args.no_watch {
        None
    } else {
        match ProfileWatcher::spawn(&paths.profiles, state.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("Profile watcher disabled: {:#}", e);
                None
            }
        }
    };

    let controller = BackendController::new(
        backend,
        SerialBackend::new(config.serial.clone(), Box::new(SystemPortOpener)),
        NativeBackend::new(platform_injector()),
    );
    let worker = Worker::new(
        state.clone(),
        profiles.clone(),
        controller,
        platform_input(),
        Box::new(LoggingHooks),
        config.worker.clone(),
    );

    let handle = std::thread::Builder::new()
        .name("worker".into())
        .spawn(move || worker.run())
        .context("Failed to spawn worker thread")?;

    if args.headless {
        info!("Running headless; press the quit key to stop");
    } else {
        if let Err(e) = Console::new(state.clone(), profiles, keybinds).run() {
            warn!("Console failed: {:#}", e);
        }
        state.stop();
    }

    if handle.join().is_err() {
        warn!("Worker thread panicked");
    }

    info!("Shutting down...");
    Ok(())
}

fn list_profiles(profiles: &ProfileStore) -> Result<()> {
    let set = profiles
        .load()
        .with_context(|| format!("Failed to load {}", profiles.path().display()))?;

    println!("\n{}", "=== Profiles ===".bold().cyan());
    for p in set.profiles() {
        println!(
            "  {}  s={} {}={} delay={}",
            p.name.green(),
            p.vertical_force,
            p.direction.key(),
            p.lateral_magnitude,
            p.tick_delay_ms
        );
    }
    for r in set.rejected() {
        println!(
            "  {} (entry {}): {}",
            r.name.as_deref().unwrap_or("?").red(),
            r.index,
            r.reason
        );
    }
    println!(
        "\n  Total: {}",
        set.profiles().len().to_string().green()
    );
    Ok(())
}
