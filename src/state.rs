//! Runtime state shared between the worker thread and the console
//!
//! One `SharedState` lives behind an `Arc` for the whole process. Flags are
//! independent atomics. The selected profile name sits behind its own mutex
//! because a change to it triggers a side-effecting reload. The live movement
//! parameters are relaxed atomics: the console may overwrite them at any time
//! and the worker simply re-reads them every tick.

use crate::keybinds::KeyBindings;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};

/// Output path for movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BackendKind {
    /// External microcontroller on a serial port
    #[serde(alias = "serial_device")]
    Serial = 0,
    /// OS synthetic pointer events
    #[serde(alias = "native_injection")]
    Native = 1,
}

impl BackendKind {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => BackendKind::Serial,
            _ => BackendKind::Native,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Serial => "serial",
            BackendKind::Native => "native",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serial" | "arduino" => Ok(BackendKind::Serial),
            "native" | "sendinput" => Ok(BackendKind::Native),
            other => Err(format!("unknown backend '{}' (expected serial|native)", other)),
        }
    }
}

/// Effective movement parameters, mirrored from the active profile
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveParams {
    pub down_force: f32,
    pub east_drift: f32,
    pub west_drift: f32,
    /// Not range-checked: the console may store anything, the worker clamps
    pub delay_ms: i32,
}

impl LiveParams {
    /// Horizontal velocity, east positive
    pub fn lateral_velocity(&self) -> f64 {
        f64::from(self.east_drift) - f64::from(self.west_drift)
    }
}

/// f32 stored as its bit pattern
#[derive(Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Process-wide state observed and edited by both threads
pub struct SharedState {
    running: AtomicBool,
    holding: AtomicBool,
    script_enabled: AtomicBool,
    console_visible: AtomicBool,
    reload_requested: AtomicBool,
    document_changed: AtomicBool,
    movement_ready: AtomicBool,
    backend: AtomicU8,

    selected_profile: Mutex<String>,

    down_force: AtomicF32,
    east_drift: AtomicF32,
    west_drift: AtomicF32,
    delay_ms: AtomicI32,

    bindings: RwLock<KeyBindings>,
}

impl SharedState {
    pub fn new(bindings: KeyBindings, backend: BackendKind) -> Self {
        Self {
            running: AtomicBool::new(true),
            holding: AtomicBool::new(false),
            script_enabled: AtomicBool::new(true),
            console_visible: AtomicBool::new(false),
            reload_requested: AtomicBool::new(false),
            document_changed: AtomicBool::new(false),
            movement_ready: AtomicBool::new(false),
            backend: AtomicU8::new(backend as u8),
            selected_profile: Mutex::new(String::new()),
            down_force: AtomicF32::default(),
            east_drift: AtomicF32::default(),
            west_drift: AtomicF32::default(),
            delay_ms: AtomicI32::new(0),
            bindings: RwLock::new(bindings),
        }
    }

    // --- flags ---

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown; observed by the worker at the top of its next tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_holding(&self) -> bool {
        self.holding.load(Ordering::Relaxed)
    }

    pub fn set_holding(&self, holding: bool) {
        self.holding.store(holding, Ordering::Relaxed);
    }

    pub fn script_enabled(&self) -> bool {
        self.script_enabled.load(Ordering::Relaxed)
    }

    pub fn set_script_enabled(&self, enabled: bool) {
        self.script_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the script flag, returning the new value
    pub fn toggle_script(&self) -> bool {
        !self.script_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn console_visible(&self) -> bool {
        self.console_visible.load(Ordering::Relaxed)
    }

    /// Flip the console flag, returning the new value
    pub fn toggle_console(&self) -> bool {
        !self.console_visible.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::Release);
    }

    /// Consume a pending reload request
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::AcqRel)
    }

    /// The profile document was written by someone. Unlike an explicit
    /// reload, live values survive unless the selected entry changed.
    pub fn notify_document_changed(&self) {
        self.document_changed.store(true, Ordering::Release);
    }

    pub fn take_document_changed(&self) -> bool {
        self.document_changed.swap(false, Ordering::AcqRel)
    }

    /// Whether the worker currently has a valid profile applied
    pub fn movement_ready(&self) -> bool {
        self.movement_ready.load(Ordering::Relaxed)
    }

    pub(crate) fn set_movement_ready(&self, ready: bool) {
        self.movement_ready.store(ready, Ordering::Relaxed);
    }

    pub fn backend(&self) -> BackendKind {
        BackendKind::from_u8(self.backend.load(Ordering::Relaxed))
    }

    pub fn set_backend(&self, backend: BackendKind) {
        self.backend.store(backend as u8, Ordering::Relaxed);
    }

    // --- profile selection ---

    pub fn selected_profile(&self) -> String {
        self.selected_profile.lock().clone()
    }

    pub fn select_profile(&self, name: impl Into<String>) {
        *self.selected_profile.lock() = name.into();
    }

    pub fn clear_profile(&self) {
        self.selected_profile.lock().clear();
    }

    // --- live parameters ---

    pub fn live_params(&self) -> LiveParams {
        LiveParams {
            down_force: self.down_force.load(),
            east_drift: self.east_drift.load(),
            west_drift: self.west_drift.load(),
            delay_ms: self.delay_ms.load(Ordering::Relaxed),
        }
    }

    pub fn set_live_params(&self, params: LiveParams) {
        self.down_force.store(params.down_force);
        self.east_drift.store(params.east_drift);
        self.west_drift.store(params.west_drift);
        self.delay_ms.store(params.delay_ms, Ordering::Relaxed);
    }

    pub fn set_down_force(&self, v: f32) {
        self.down_force.store(v);
    }

    /// Set east drift; a non-zero value zeroes west drift
    pub fn set_east_drift(&self, v: f32) {
        self.east_drift.store(v);
        if v != 0.0 {
            self.west_drift.store(0.0);
        }
    }

    /// Set west drift; a non-zero value zeroes east drift
    pub fn set_west_drift(&self, v: f32) {
        self.west_drift.store(v);
        if v != 0.0 {
            self.east_drift.store(0.0);
        }
    }

    pub fn set_delay_ms(&self, ms: i32) {
        self.delay_ms.store(ms, Ordering::Relaxed);
    }

    // --- key bindings ---

    pub fn bindings(&self) -> KeyBindings {
        *self.bindings.read()
    }

    pub fn set_bindings(&self, bindings: KeyBindings) {
        *self.bindings.write() = bindings;
    }

    pub fn update_bindings(&self, f: impl FnOnce(&mut KeyBindings)) {
        f(&mut self.bindings.write());
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(KeyBindings::default(), BackendKind::Native)
    }
}
