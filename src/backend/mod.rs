//! Movement backends (serial device, native injection)
//!
//! Both backends implement [`MovementBackend`]; the [`BackendController`]
//! owns one of each and routes emission to whichever is selected. Device
//! failures never escape the controller: they are logged and turned into a
//! skipped tick.

pub mod controller;
pub mod native;
pub mod serial;

use crate::accumulator::Delta;
use crate::state::{BackendKind, LiveParams};
use thiserror::Error;

pub use controller::BackendController;
pub use native::{platform_injector, NativeBackend, PointerInjector};
pub use serial::{PortOpener, SerialBackend, SystemPortOpener};

/// Serial or injection failure; always recoverable
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("serial open failed on {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial write failed on {port}: {source}")]
    Write {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pointer injection failed: {0}")]
    Injection(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Why a tick produced no output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Waiting out the retry interval after a failed open
    Backoff,
    /// Port just opened; device still resetting
    Settling,
    /// Accumulated movement below one pixel
    SubPixel,
    /// The backend failed this tick (already logged)
    Failed,
}

/// Result of one emission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Frames written to the serial device
    Sent,
    /// Relative motion injected
    Moved(Delta),
    Skipped(SkipReason),
}

/// Connection state reported for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Backend is ready to emit
    Connected,
    /// Backend is closed and not trying to open
    Disconnected,
    /// Open failed; retrying after backoff
    Reconnecting { attempt: usize },
}

/// Shared capability of every backend
pub trait MovementBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Make the backend ready to emit
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Release any device handle
    fn close(&mut self);

    /// Emit one tick of movement
    fn emit(&mut self, params: &LiveParams) -> Result<EmitOutcome, DeviceError>;

    fn status(&self) -> ConnectionStatus;
}
