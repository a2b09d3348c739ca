//! Profile document persistence and lookup

use super::scale::{self, canonical_force, snap1, zero_eps};
use super::{normalize_name, EntryError, LateralDirection, MovementProfile};
use crate::state::LiveParams;
use crate::store::{self, StoreError};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from loading, looking up or saving profiles
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile document is not an array")]
    NotAnArray,

    #[error("profile '{0}' not found")]
    NotFound(String),

    #[error("invalid entry for '{name}': {reason}")]
    Invalid { name: String, reason: EntryError },

    /// Live parameters that cannot be saved as a profile
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An entry that failed validation, kept for reporting
#[derive(Debug, Clone)]
pub struct RejectedEntry {
    /// Position in the document
    pub index: usize,
    /// The entry's name if it had a readable one
    pub name: Option<String>,
    pub reason: EntryError,
}

/// Parsed contents of the profile document.
///
/// The raw entries are kept as read so that saving writes every entry back
/// untouched, rejected ones included.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    entries: Vec<Value>,
    profiles: Vec<MovementProfile>,
    rejected: Vec<RejectedEntry>,
}

fn entry_key(item: &Value) -> Option<String> {
    item.get("name").and_then(Value::as_str).map(normalize_name)
}

impl ProfileSet {
    /// Validate raw document entries. Later duplicates of a name are rejected.
    pub fn from_entries(entries: &[Value]) -> Self {
        let mut set = Self {
            entries: entries.to_vec(),
            ..Self::default()
        };
        let mut seen = HashSet::new();

        for (index, item) in entries.iter().enumerate() {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);

            let parsed = MovementProfile::from_value(item).and_then(|p| {
                if seen.insert(p.key()) {
                    Ok(p)
                } else {
                    Err(EntryError::DuplicateName(p.name))
                }
            });

            match parsed {
                Ok(p) => set.profiles.push(p),
                Err(reason) => set.rejected.push(RejectedEntry {
                    index,
                    name,
                    reason,
                }),
            }
        }

        set
    }

    /// Valid profiles in document order
    pub fn profiles(&self) -> &[MovementProfile] {
        &self.profiles
    }

    /// Entries that failed validation
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Look up by case-normalized name.
    ///
    /// A name that only matches a rejected entry reports why it was rejected.
    pub fn find(&self, name: &str) -> Result<&MovementProfile, ProfileError> {
        let key = normalize_name(name);

        if let Some(p) = self.profiles.iter().find(|p| p.key() == key) {
            return Ok(p);
        }

        match self
            .rejected
            .iter()
            .find(|r| r.name.as_deref().map(normalize_name).as_deref() == Some(key.as_str()))
        {
            Some(r) => Err(ProfileError::Invalid {
                name: name.to_string(),
                reason: r.reason.clone(),
            }),
            None => Err(ProfileError::NotFound(name.to_string())),
        }
    }

    /// Entries as they will be written, rejected ones included
    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Replace the first entry with the same name, or append.
    ///
    /// The entry being replaced may be a rejected one. Every other entry is
    /// left as it was.
    pub fn upsert(&mut self, profile: MovementProfile) -> Result<(), ProfileError> {
        let value = profile.to_value();
        MovementProfile::from_value(&value).map_err(|reason| ProfileError::Invalid {
            name: profile.name.clone(),
            reason,
        })?;

        let key = profile.key();
        let mut entries = std::mem::take(&mut self.entries);
        match entries
            .iter_mut()
            .find(|item| entry_key(item).as_deref() == Some(key.as_str()))
        {
            Some(existing) => *existing = value,
            None => entries.push(value),
        }
        *self = Self::from_entries(&entries);
        Ok(())
    }

    /// Remove every entry with this case-normalized name, returning whether
    /// anything was removed
    pub fn remove(&mut self, name: &str) -> bool {
        let key = normalize_name(name);
        let mut entries = std::mem::take(&mut self.entries);
        let before = entries.len();
        entries.retain(|item| entry_key(item).as_deref() != Some(key.as_str()));
        let removed = before != entries.len();
        *self = Self::from_entries(&entries);
        removed
    }
}

/// Loads and saves the profile document
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the whole document
    pub fn load(&self) -> Result<ProfileSet, ProfileError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ProfileError::Read {
            path: self.path.clone(),
            source,
        })?;

        let doc: Value = serde_json::from_str(&content).map_err(|source| ProfileError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let entries = doc.as_array().ok_or(ProfileError::NotAnArray)?;
        let set = ProfileSet::from_entries(entries);

        for r in set.rejected() {
            debug!(
                "Profile entry #{} ({}) rejected: {}",
                r.index,
                r.name.as_deref().unwrap_or("?"),
                r.reason
            );
        }

        Ok(set)
    }

    /// Load for editing: an unreadable or corrupt document counts as empty
    pub fn load_or_empty(&self) -> ProfileSet {
        match self.load() {
            Ok(set) => set,
            Err(ProfileError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ProfileSet::default()
            }
            Err(e) => {
                warn!("{} - starting from an empty profile set", e);
                ProfileSet::default()
            }
        }
    }

    /// Write the document atomically, every entry in its original order
    pub fn save(&self, set: &ProfileSet) -> Result<(), ProfileError> {
        store::write_json_atomic(&self.path, set.entries())?;
        Ok(())
    }

    /// Fetch one profile by name from the persisted document
    pub fn find_by_name(&self, name: &str) -> Result<MovementProfile, ProfileError> {
        self.load()?.find(name).cloned()
    }

    /// Save the live parameters as the profile `name`.
    ///
    /// Enforces the lateral mutual exclusivity the worker relies on, then
    /// upserts into the persisted document.
    pub fn save_from_live(
        &self,
        name: &str,
        live: &LiveParams,
    ) -> Result<MovementProfile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::Rejected("no profile selected".into()));
        }

        if !scale::delay_in_range(i64::from(live.delay_ms)) {
            return Err(ProfileError::Rejected("delay must be 1..50".into()));
        }

        let down = snap1(zero_eps(f64::from(live.down_force)));
        let east = snap1(zero_eps(f64::from(live.east_drift)));
        let west = snap1(zero_eps(f64::from(live.west_drift)));

        let (direction, magnitude) = match (east != 0.0, west != 0.0) {
            (true, true) => {
                return Err(ProfileError::Rejected(
                    "either east or west must be zero (not both non-zero)".into(),
                ))
            }
            (false, false) => {
                return Err(ProfileError::Rejected(
                    "must set either east or west to non-zero".into(),
                ))
            }
            (true, false) => (LateralDirection::East, east),
            (false, true) => (LateralDirection::West, west),
        };

        let profile = MovementProfile {
            name: normalize_name(name),
            vertical_force: canonical_force(down),
            direction,
            lateral_magnitude: canonical_force(magnitude),
            tick_delay_ms: live.delay_ms as u32,
        };

        let mut set = self.load_or_empty();
        set.upsert(profile.clone())?;
        self.save(&set)?;

        debug!("Saved profile '{}' to {}", profile.name, self.path.display());
        Ok(profile)
    }
}

/// Convert a stored profile into live parameters on the canonical scale
pub fn live_params_for(profile: &MovementProfile) -> LiveParams {
    let lateral = canonical_force(profile.lateral_magnitude) as f32;
    let (east_drift, west_drift) = match profile.direction {
        LateralDirection::East => (lateral, 0.0),
        LateralDirection::West => (0.0, lateral),
    };

    LiveParams {
        down_force: canonical_force(profile.vertical_force) as f32,
        east_drift,
        west_drift,
        delay_ms: scale::clamp_delay(i64::from(profile.tick_delay_ms)) as i32,
    }
}
