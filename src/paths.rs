//! Application path management for portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Explicit**: `--data-dir` puts every file in the given directory.
//! - **Portable mode**: If a `.portable` marker file exists next to the
//!   executable, all data files are stored in the same directory.
//! - **Installed mode** (default): Data is stored in the platform data
//!   directory (`%APPDATA%\Pointer Drift`, `~/.local/share/Pointer Drift`).

use crate::config::{AppConfig, FilesConfig};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Pointer Drift";

/// Application paths for config, documents and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding everything else
    pub data_dir: PathBuf,
    /// Path to the configuration file
    pub config: PathBuf,
    /// Profile document
    pub profiles: PathBuf,
    /// Keybinding document
    pub keybinds: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether files live next to the executable (or cwd in dev mode)
    pub is_portable: bool,
}

impl AppPaths {
    /// Paths rooted at `data_dir` with default document names
    pub fn in_dir(data_dir: impl Into<PathBuf>, is_portable: bool) -> Self {
        let data_dir = data_dir.into();
        let files = FilesConfig::default();
        Self {
            config: data_dir.join("config.yaml"),
            profiles: data_dir.join(files.profiles),
            keybinds: data_dir.join(files.keybinds),
            logs_dir: data_dir.join("logs"),
            data_dir,
            is_portable,
        }
    }

    /// Detect the appropriate paths based on environment.
    ///
    /// **Debug mode**: If `config.yaml` or `profiles.json` exists in the
    /// current working directory, use that directory.
    ///
    /// Called before logging is initialized, so diagnostics use eprintln.
    pub fn detect(data_dir: Option<&Path>) -> Self {
        if let Some(dir) = data_dir {
            return Self::in_dir(dir, true);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join("config.yaml").exists() || cwd.join("profiles.json").exists() {
                eprintln!("[paths] Running in DEV mode (cwd: {})", cwd.display());
                return Self::in_dir(cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::in_dir(exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!(
            "[paths] Running in INSTALLED mode (data dir: {})",
            app_data.display()
        );

        Self::in_dir(app_data, false)
    }

    /// Replace the config path (`--config`)
    pub fn with_config(mut self, config: PathBuf) -> Self {
        self.config = config;
        self
    }

    /// Apply document locations from the loaded config
    pub fn apply_files(&mut self, files: &FilesConfig) {
        self.profiles = AppConfig::resolve(&self.data_dir, &files.profiles);
        self.keybinds = AppConfig::resolve(&self.data_dir, &files.keybinds);
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.data_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
