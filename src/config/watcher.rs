//! Profile document watcher for hot-reload support
//!
//! The notify callback only forwards events; a debounce thread coalesces
//! bursts (editors write in several steps) and flags the document as changed
//! on the shared state. The worker picks it up on its next tick.

use crate::state::SharedState;
use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the profile document and flags changes to it
pub struct ProfileWatcher {
    _watcher: RecommendedWatcher,
    _debounce: JoinHandle<()>,
}

impl ProfileWatcher {
    /// Start watching `path`. Its parent directory is watched so that
    /// atomic replacement (write + rename) is seen.
    pub fn spawn(path: &Path, state: Arc<SharedState>) -> Result<Self> {
        let file_name: OsString = path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("Not a file path: {}", path.display()))?;
        let dir: PathBuf = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = channel::unbounded::<()>();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let touches_target = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if touches_target {
                        debug!("Profile document changed: {:?}", event.paths);
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;

        let debounce = std::thread::Builder::new()
            .name("profile-watch".into())
            .spawn(move || {
                // Ends once the watcher (and with it the sender) is dropped
                while rx.recv().is_ok() {
                    loop {
                        match rx.recv_timeout(DEBOUNCE) {
                            Ok(()) => continue,
                            Err(RecvTimeoutError::Timeout) => break,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    info!("Profile document changed");
                    state.notify_document_changed();
                }
            })
            .context("Failed to spawn watcher thread")?;

        info!("Profile watcher started for: {}", path.display());

        Ok(Self {
            _watcher: watcher,
            _debounce: debounce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_change_is_flagged() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("profiles.json");
        fs::write(&path, "[]")?;

        let state = Arc::new(SharedState::default());
        let _watcher = ProfileWatcher::spawn(&path, state.clone())?;

        std::thread::sleep(Duration::from_millis(100));
        fs::write(&path, r#"[{"name":"a","s":1,"e":1,"delay":5}]"#)?;

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = false;
        while Instant::now() < deadline {
            if state.take_document_changed() {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(seen, "change was not flagged");
        Ok(())
    }

    #[test]
    fn test_other_files_ignored() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("profiles.json");
        fs::write(&path, "[]")?;

        let state = Arc::new(SharedState::default());
        let _watcher = ProfileWatcher::spawn(&path, state.clone())?;

        std::thread::sleep(Duration::from_millis(100));
        fs::write(temp_dir.path().join("notes.txt"), "hello")?;
        std::thread::sleep(Duration::from_millis(400));

        assert!(!state.take_document_changed());
        Ok(())
    }
}
