//! Routes movement to the selected backend

use super::{
    ConnectionStatus, EmitOutcome, MovementBackend, NativeBackend, SerialBackend, SkipReason,
};
use crate::state::{BackendKind, LiveParams};
use tracing::{info, warn};

/// Owns both backends; only the selected one is driven
pub struct BackendController {
    active: BackendKind,
    serial: SerialBackend,
    native: NativeBackend,
}

impl BackendController {
    pub fn new(active: BackendKind, serial: SerialBackend, native: NativeBackend) -> Self {
        Self {
            active,
            serial,
            native,
        }
    }

    pub fn active(&self) -> BackendKind {
        self.active
    }

    /// Switch backends. Leaving serial closes the port; any switch drops
    /// the sub-pixel remainder. Returns whether anything changed.
    pub fn select(&mut self, kind: BackendKind) -> bool {
        if kind == self.active {
            return false;
        }

        match kind {
            BackendKind::Native => self.serial.close(),
            BackendKind::Serial => self.serial.mark_needs_open(),
        }
        self.native.reset_accumulator();

        info!("Backend: {} -> {}", self.active, kind);
        self.active = kind;
        true
    }

    /// Advance connection state without emitting.
    ///
    /// On serial this opens the port (respecting backoff) so the device can
    /// settle before movement starts.
    pub fn poll(&mut self) {
        if self.active == BackendKind::Serial {
            if let Err(e) = self.serial.ensure_open() {
                warn!("Backend: {}", e);
            }
        }
    }

    /// Emit one tick on the active backend; failures are logged, not returned
    pub fn emit(&mut self, params: &LiveParams) -> EmitOutcome {
        let result = match self.active {
            BackendKind::Serial => self.serial.emit(params),
            BackendKind::Native => self.native.emit(params),
        };

        result.unwrap_or_else(|e| {
            warn!("Backend: {}", e);
            EmitOutcome::Skipped(SkipReason::Failed)
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.active {
            BackendKind::Serial => self.serial.status(),
            BackendKind::Native => self.native.status(),
        }
    }

    pub fn serial(&self) -> &SerialBackend {
        &self.serial
    }

    pub fn native(&self) -> &NativeBackend {
        &self.native
    }

    /// Release device handles
    pub fn shutdown(&mut self) {
        self.serial.close();
        self.native.close();
    }
}
