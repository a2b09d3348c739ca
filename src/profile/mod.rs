//! Movement profiles - named recipes for the worker loop
//!
//! A profile is one JSON object in the profile document:
//!
//! ```json
//! { "name": "alpha", "s": 2.5, "e": 1.2, "delay": 10 }
//! ```
//!
//! `s` is the downward force, exactly one of `e`/`w` carries the lateral
//! drift and `delay` is the tick length in milliseconds.

pub mod scale;
mod store;

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub use store::{live_params_for, ProfileError, ProfileSet, ProfileStore, RejectedEntry};

/// Keys an entry may carry; anything else invalidates it
pub const ALLOWED_KEYS: [&str; 5] = ["name", "s", "e", "w", "delay"];

/// Lateral drift direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralDirection {
    East,
    West,
}

impl LateralDirection {
    /// Document key for this direction
    pub fn key(self) -> &'static str {
        match self {
            LateralDirection::East => "e",
            LateralDirection::West => "w",
        }
    }

    /// Frame prefix used by the serial device
    pub fn letter(self) -> char {
        match self {
            LateralDirection::East => 'E',
            LateralDirection::West => 'W',
        }
    }
}

impl fmt::Display for LateralDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LateralDirection::East => write!(f, "east"),
            LateralDirection::West => write!(f, "west"),
        }
    }
}

/// A validated movement profile
#[derive(Debug, Clone, PartialEq)]
pub struct MovementProfile {
    pub name: String,
    pub vertical_force: f64,
    pub direction: LateralDirection,
    pub lateral_magnitude: f64,
    pub tick_delay_ms: u32,
}

/// Why an entry was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("invalid key: {0}")]
    UnknownKey(String),
    #[error("missing/invalid name")]
    InvalidName,
    #[error("name must not be empty")]
    EmptyName,
    #[error("missing/invalid s")]
    InvalidForce,
    #[error("missing/invalid delay")]
    InvalidDelay,
    #[error("delay must be 1..50 (got {0})")]
    DelayOutOfRange(i64),
    #[error("must have exactly one of e or w")]
    LateralNotExclusive,
    #[error("invalid {0}")]
    InvalidLateral(&'static str),
    #[error("{0} must be non-negative")]
    Negative(&'static str),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
}

/// Lower-cased, trimmed form used as the store key
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn non_negative(value: &Value, key: &'static str, invalid: EntryError) -> Result<f64, EntryError> {
    let v = value.as_f64().ok_or(invalid)?;
    if v < 0.0 {
        return Err(EntryError::Negative(key));
    }
    Ok(v)
}

impl MovementProfile {
    /// Validate a raw document entry
    pub fn from_value(item: &Value) -> Result<Self, EntryError> {
        let obj = item.as_object().ok_or(EntryError::NotAnObject)?;

        if let Some(key) = obj.keys().find(|k| !ALLOWED_KEYS.contains(&k.as_str())) {
            return Err(EntryError::UnknownKey(key.clone()));
        }

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or(EntryError::InvalidName)?;
        if name.trim().is_empty() {
            return Err(EntryError::EmptyName);
        }

        let s = obj.get("s").ok_or(EntryError::InvalidForce)?;
        let vertical_force = non_negative(s, "s", EntryError::InvalidForce)?;

        let delay = obj.get("delay").ok_or(EntryError::InvalidDelay)?;
        let tick_delay_ms = match delay.as_i64() {
            Some(d) if scale::delay_in_range(d) => d as u32,
            Some(d) => return Err(EntryError::DelayOutOfRange(d)),
            None if delay.is_u64() => return Err(EntryError::DelayOutOfRange(i64::MAX)),
            None => return Err(EntryError::InvalidDelay),
        };

        let (direction, raw) = match (obj.get("e"), obj.get("w")) {
            (Some(e), None) => (LateralDirection::East, e),
            (None, Some(w)) => (LateralDirection::West, w),
            _ => return Err(EntryError::LateralNotExclusive),
        };
        let key = direction.key();
        let lateral_magnitude = non_negative(raw, key, EntryError::InvalidLateral(key))?;

        Ok(Self {
            name: name.to_string(),
            vertical_force,
            direction,
            lateral_magnitude,
            tick_delay_ms,
        })
    }

    /// Serialize back into a document entry
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::from(self.name.clone()));
        obj.insert("s".into(), Value::from(self.vertical_force));
        obj.insert(self.direction.key().into(), Value::from(self.lateral_magnitude));
        obj.insert("delay".into(), Value::from(self.tick_delay_ms));
        Value::Object(obj)
    }

    /// Store key for this profile
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Signed horizontal velocity: east positive, west negative
    pub fn lateral_velocity(&self) -> f64 {
        match self.direction {
            LateralDirection::East => self.lateral_magnitude,
            LateralDirection::West => -self.lateral_magnitude,
        }
    }
}
