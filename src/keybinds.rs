//! Key bindings - logical actions mapped to physical input codes
//!
//! Persisted as:
//!
//! ```json
//! {
//!   "version": 1,
//!   "binds": { "toggle_script": 6, "quit": 35, ... },
//!   "flags": { "require_both_mouse_buttons": true }
//! }
//! ```
//!
//! Loading is lenient field by field: anything missing or malformed keeps its
//! default, unknown fields are ignored and out-of-range codes become unbound.

use crate::input::keys::{self, code_name};
use crate::store::{self, StoreError};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document format version written by `save`
pub const KEYBINDS_VERSION: i64 = 1;

/// Logical actions a code can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleScript,
    Quit,
    ToggleConsole,
    Reload,
    HoldModifier,
    HoldButtonA,
    HoldButtonB,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ToggleScript,
        Action::Quit,
        Action::ToggleConsole,
        Action::Reload,
        Action::HoldModifier,
        Action::HoldButtonA,
        Action::HoldButtonB,
    ];

    /// Key under `binds` in the document
    pub fn key(self) -> &'static str {
        match self {
            Action::ToggleScript => "toggle_script",
            Action::Quit => "quit",
            Action::ToggleConsole => "toggle_console",
            Action::Reload => "reload",
            Action::HoldModifier => "hold_modifier",
            Action::HoldButtonA => "hold_mouse1",
            Action::HoldButtonB => "hold_mouse2",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Active bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub toggle_script: i32,
    pub quit: i32,
    pub toggle_console: i32,
    pub reload: i32,
    pub hold_modifier: i32,
    pub hold_button_a: i32,
    pub hold_button_b: i32,
    pub require_both_hold_buttons: bool,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            toggle_script: keys::VK_XBUTTON2,
            quit: keys::VK_END,
            toggle_console: keys::VK_INSERT,
            reload: keys::VK_F5,
            hold_modifier: keys::UNBOUND,
            hold_button_a: keys::VK_LBUTTON,
            hold_button_b: keys::VK_RBUTTON,
            require_both_hold_buttons: true,
        }
    }
}

impl KeyBindings {
    pub fn get(&self, action: Action) -> i32 {
        match action {
            Action::ToggleScript => self.toggle_script,
            Action::Quit => self.quit,
            Action::ToggleConsole => self.toggle_console,
            Action::Reload => self.reload,
            Action::HoldModifier => self.hold_modifier,
            Action::HoldButtonA => self.hold_button_a,
            Action::HoldButtonB => self.hold_button_b,
        }
    }

    /// Bind `action` to `code`; invalid codes unbind it
    pub fn set(&mut self, action: Action, code: i32) {
        let code = sanitize(code);
        match action {
            Action::ToggleScript => self.toggle_script = code,
            Action::Quit => self.quit = code,
            Action::ToggleConsole => self.toggle_console = code,
            Action::Reload => self.reload = code,
            Action::HoldModifier => self.hold_modifier = code,
            Action::HoldButtonA => self.hold_button_a = code,
            Action::HoldButtonB => self.hold_button_b = code,
        }
    }

    /// Hold buttons actually polled; unbound buttons fall back to LMB/RMB
    pub fn effective_hold_buttons(&self) -> (i32, i32) {
        let a = if self.hold_button_a != keys::UNBOUND {
            self.hold_button_a
        } else {
            keys::VK_LBUTTON
        };
        let b = if self.hold_button_b != keys::UNBOUND {
            self.hold_button_b
        } else {
            keys::VK_RBUTTON
        };
        (a, b)
    }

    /// Merge a parsed document onto these bindings.
    ///
    /// Returns the keys that were present but malformed.
    pub fn merge_document(&mut self, doc: &Value) -> Vec<String> {
        let mut malformed = Vec::new();

        if let Some(binds) = doc.get("binds").and_then(Value::as_object) {
            for action in Action::ALL {
                match binds.get(action.key()) {
                    None => {}
                    Some(v) => match v.as_i64() {
                        Some(code) => {
                            let code = i32::try_from(code).unwrap_or(keys::UNBOUND);
                            self.set(action, code);
                        }
                        None => malformed.push(format!("binds.{}", action.key())),
                    },
                }
            }
        }

        if let Some(flag) = doc
            .get("flags")
            .and_then(Value::as_object)
            .and_then(|f| f.get("require_both_mouse_buttons"))
        {
            match flag.as_bool() {
                Some(b) => self.require_both_hold_buttons = b,
                None => malformed.push("flags.require_both_mouse_buttons".into()),
            }
        }

        malformed
    }

    /// Document form of these bindings
    pub fn to_document(&self) -> Value {
        let mut binds = Map::new();
        for action in Action::ALL {
            binds.insert(action.key().into(), Value::from(self.get(action)));
        }

        json!({
            "version": KEYBINDS_VERSION,
            "binds": binds,
            "flags": {
                "require_both_mouse_buttons": self.require_both_hold_buttons,
            },
        })
    }

    /// One line per action, for display
    pub fn describe(&self) -> Vec<(Action, String)> {
        Action::ALL
            .into_iter()
            .map(|a| (a, code_name(self.get(a))))
            .collect()
    }
}

fn sanitize(code: i32) -> i32 {
    if keys::is_valid_code(code) {
        code
    } else {
        keys::UNBOUND
    }
}

/// Result of a lenient load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub bindings: KeyBindings,
    /// Set when the file existed but could not be used in full
    pub warning: Option<String>,
}

/// Loads and saves the keybinding document
#[derive(Debug, Clone)]
pub struct KeyBindingStore {
    path: PathBuf,
}

impl KeyBindingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bindings merged onto defaults; never fails
    pub fn load(&self) -> KeyBindings {
        self.load_report().bindings
    }

    /// Like `load`, also describing anything that was ignored
    pub fn load_report(&self) -> LoadReport {
        let mut bindings = KeyBindings::default();

        if !self.path.exists() {
            debug!("No keybinds at {}, using defaults", self.path.display());
            return LoadReport {
                bindings,
                warning: None,
            };
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                return LoadReport {
                    bindings,
                    warning: Some(format!("cannot read {}: {}", self.path.display(), e)),
                }
            }
        };

        let doc: Value = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                return LoadReport {
                    bindings,
                    warning: Some(format!("parse failed: {}", e)),
                }
            }
        };

        if !doc.is_object() {
            return LoadReport {
                bindings,
                warning: Some("keybind document is not an object".into()),
            };
        }

        let malformed = bindings.merge_document(&doc);
        let warning = (!malformed.is_empty())
            .then(|| format!("ignored malformed fields: {}", malformed.join(", ")));

        LoadReport { bindings, warning }
    }

    pub fn save(&self, bindings: &KeyBindings) -> Result<(), StoreError> {
        store::write_json_atomic(&self.path, &bindings.to_document())
    }
}
