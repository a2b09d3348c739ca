//! Shared file plumbing for the persisted JSON documents
//!
//! Both the profile document and the keybinding document are written with the
//! same discipline: serialize to a sibling `.tmp` file, then rename it over the
//! target. A failed rename deletes the target and retries exactly once.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced to callers of a store's `save`
#[derive(Error, Debug)]
pub enum StoreError {
    /// Creating the directory, writing the temp file or renaming it failed
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be serialized
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Path of the temporary sibling used while writing `target`
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write `bytes` to `target` atomically.
///
/// Creates the parent directory if needed. The temp file never survives a
/// failed write.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating store directory: {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }

    let tmp = temp_path(target);
    let written = fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.flush()?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }

    if fs::rename(&tmp, target).is_ok() {
        return Ok(());
    }

    // Some platforms refuse to rename over an existing (or locked) file
    warn!(
        "Rename over {} failed, removing target and retrying once",
        target.display()
    );
    let _ = fs::remove_file(target);
    match fs::rename(&tmp, target) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(StoreError::io(target, e))
        }
    }
}

/// Serialize `value` as 2-space indented JSON and write it atomically
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(
    target: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(target, json.as_bytes())
}
