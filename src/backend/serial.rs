//! Serial device backend
//!
//! The device receives two text frames per tick:
//!
//! ```text
//! S2.500000\n      vertical force
//! E1.200000\n      lateral direction + magnitude (E or W)
//! ```
//!
//! The port is opened lazily. A failed open arms a retry deadline, a fresh
//! open arms a settle deadline (the microcontroller resets when the port
//! opens). Neither blocks: until a deadline passes, ticks are skipped.

use super::{ConnectionStatus, DeviceError, EmitOutcome, MovementBackend, SkipReason};
use crate::config::SerialConfig;
use crate::state::{BackendKind, LiveParams};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Writable half of an open port
pub type PortHandle = Box<dyn Write + Send>;

/// Opens the configured port
pub trait PortOpener: Send {
    fn open(&mut self, config: &SerialConfig) -> Result<PortHandle, DeviceError>;
}

/// Opens real ports through the `serialport` crate (8N1, no flow control)
#[derive(Debug, Default)]
pub struct SystemPortOpener;

struct SystemPort(Box<dyn serialport::SerialPort>);

impl Write for SystemPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl PortOpener for SystemPortOpener {
    fn open(&mut self, config: &SerialConfig) -> Result<PortHandle, DeviceError> {
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(config.write_timeout_ms))
            .open()
            .map_err(|source| DeviceError::Open {
                port: config.port.clone(),
                source,
            })?;
        Ok(Box::new(SystemPort(port)))
    }
}

/// Format the two frames for one tick
pub fn format_frames(params: &LiveParams) -> (String, String) {
    let down = f64::from(params.down_force);
    let (dir, step) = if params.west_drift > 0.0 {
        ('W', f64::from(params.west_drift))
    } else {
        ('E', f64::from(params.east_drift))
    };
    (format!("S{:.6}\n", down), format!("{}{:.6}\n", dir, step))
}

pub struct SerialBackend {
    config: SerialConfig,
    opener: Box<dyn PortOpener>,
    port: Option<PortHandle>,
    retry_at: Option<Instant>,
    ready_at: Option<Instant>,
    failed_opens: usize,
}

impl SerialBackend {
    pub fn new(config: SerialConfig, opener: Box<dyn PortOpener>) -> Self {
        Self {
            config,
            opener,
            port: None,
            retry_at: None,
            ready_at: None,
            failed_opens: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn port_name(&self) -> &str {
        &self.config.port
    }

    /// Forget any pending backoff so the next tick opens immediately
    pub fn mark_needs_open(&mut self) {
        self.retry_at = None;
    }

    /// Open the port unless it is open or a backoff is pending.
    ///
    /// Returns `Ok(Some(reason))` when the caller should skip this tick.
    pub fn ensure_open(&mut self) -> Result<Option<SkipReason>, DeviceError> {
        let now = Instant::now();

        if self.port.is_none() {
            if matches!(self.retry_at, Some(at) if now < at) {
                return Ok(Some(SkipReason::Backoff));
            }
            if let Err(e) = self.open() {
                self.failed_opens += 1;
                self.retry_at = Some(now + Duration::from_millis(self.config.retry_backoff_ms));
                return Err(e);
            }
        }

        match self.ready_at {
            Some(at) if now < at => Ok(Some(SkipReason::Settling)),
            Some(_) => {
                self.ready_at = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn write_frames(&mut self, params: &LiveParams) -> std::io::Result<()> {
        let (force, lateral) = format_frames(params);
        if let Some(port) = self.port.as_mut() {
            port.write_all(force.as_bytes())?;
            port.write_all(lateral.as_bytes())?;
            port.flush()?;
        }
        Ok(())
    }
}

impl MovementBackend for SerialBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Serial
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = self.opener.open(&self.config)?;
        self.port = Some(port);
        self.retry_at = None;
        self.failed_opens = 0;
        self.ready_at = if self.config.settle_ms > 0 {
            Some(Instant::now() + Duration::from_millis(self.config.settle_ms))
        } else {
            None
        };

        info!(
            "Serial: connected to {} @ {} 8N1",
            self.config.port, self.config.baud_rate
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial: closed {}", self.config.port);
        }
        self.ready_at = None;
    }

    fn emit(&mut self, params: &LiveParams) -> Result<EmitOutcome, DeviceError> {
        if let Some(reason) = self.ensure_open()? {
            return Ok(EmitOutcome::Skipped(reason));
        }

        if let Err(source) = self.write_frames(params) {
            warn!("Serial: write failed -> dropping connection");
            self.close();
            return Err(DeviceError::Write {
                port: self.config.port.clone(),
                source,
            });
        }

        debug!(
            "Serial: sent down={:.2} east={:.2} west={:.2}",
            params.down_force, params.east_drift, params.west_drift
        );
        Ok(EmitOutcome::Sent)
    }

    fn status(&self) -> ConnectionStatus {
        if self.port.is_some() {
            ConnectionStatus::Connected
        } else if self.failed_opens > 0 {
            ConnectionStatus::Reconnecting {
                attempt: self.failed_opens,
            }
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

impl Drop for SerialBackend {
    fn drop(&mut self) {
        self.close();
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{test_config, FakeOpener};
    use super::*;

    fn params() -> LiveParams {
        LiveParams {
            down_force: 2.5,
            east_drift: 1.2,
            west_drift: 0.0,
            delay_ms: 10,
        }
    }

    #[test]
    fn test_frame_format() {
        let (s, lat) = format_frames(&params());
        assert_eq!(s, "S2.500000\n");
        assert_eq!(lat, "E1.200000\n");

        let west = LiveParams {
            west_drift: 0.5,
            east_drift: 0.0,
            ..params()
        };
        assert_eq!(format_frames(&west).1, "W0.500000\n");
    }

    #[test]
    fn test_emit_opens_lazily_and_writes_frames() {
        let opener = FakeOpener::default();
        let mut backend = SerialBackend::new(test_config(1000), Box::new(opener.clone()));
        assert!(!backend.is_open());

        assert_eq!(backend.emit(&params()).unwrap(), EmitOutcome::Sent);
        assert!(backend.is_open());

        let wire = opener.wire.lock();
        assert_eq!(wire.opens, 1);
        assert_eq!(wire.text(), "S2.500000\nE1.200000\n");
    }

    #[test]
    fn test_write_failure_closes_and_next_emit_reopens() {
        let opener = FakeOpener::default();
        let mut backend = SerialBackend::new(test_config(60_000), Box::new(opener.clone()));
        backend.emit(&params()).unwrap();

        opener.wire.lock().fail_writes = true;
        assert!(matches!(
            backend.emit(&params()),
            Err(DeviceError::Write { .. })
        ));
        assert!(!backend.is_open());

        opener.wire.lock().fail_writes = false;
        assert_eq!(backend.emit(&params()).unwrap(), EmitOutcome::Sent);
        assert_eq!(opener.wire.lock().opens, 2);
    }

    #[test]
    fn test_open_failure_backs_off() {
        let opener = FakeOpener::default();
        opener.wire.lock().fail_opens = true;
        let mut backend = SerialBackend::new(test_config(60_000), Box::new(opener.clone()));

        assert!(matches!(backend.emit(&params()), Err(DeviceError::Open { .. })));
        assert_eq!(
            backend.emit(&params()).unwrap(),
            EmitOutcome::Skipped(SkipReason::Backoff)
        );
        assert_eq!(opener.wire.lock().opens, 1);
        assert_eq!(backend.status(), ConnectionStatus::Reconnecting { attempt: 1 });

        // A switch back to serial clears the backoff
        opener.wire.lock().fail_opens = false;
        backend.mark_needs_open();
        assert_eq!(backend.emit(&params()).unwrap(), EmitOutcome::Sent);
        assert_eq!(backend.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_zero_backoff_retries_next_tick() {
        let opener = FakeOpener::default();
        opener.wire.lock().fail_opens = true;
        let mut backend = SerialBackend::new(test_config(0), Box::new(opener.clone()));

        assert!(backend.emit(&params()).is_err());
        assert!(backend.emit(&params()).is_err());
        assert_eq!(opener.wire.lock().opens, 2);
    }

    #[test]
    fn test_settle_delay_skips_first_ticks() {
        let opener = FakeOpener::default();
        let config = SerialConfig {
            settle_ms: 60_000,
            ..test_config(0)
        };
        let mut backend = SerialBackend::new(config, Box::new(opener.clone()));

        assert_eq!(
            backend.emit(&params()).unwrap(),
            EmitOutcome::Skipped(SkipReason::Settling)
        );
        assert!(backend.is_open());
        assert!(opener.wire.lock().written.is_empty());
    }

    #[test]
    fn test_close_drops_handle() {
        let opener = FakeOpener::default();
        let mut backend = SerialBackend::new(test_config(0), Box::new(opener));
        backend.open().unwrap();
        backend.close();
        assert!(!backend.is_open());
        assert_eq!(backend.status(), ConnectionStatus::Disconnected);
    }
}
