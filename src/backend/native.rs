//! Native pointer injection backend
//!
//! Per tick the lateral velocity (east minus west) and the vertical force
//! are fed through a [`MovementAccumulator`]; only whole-pixel deltas are
//! injected as relative pointer motion.

use super::{ConnectionStatus, DeviceError, EmitOutcome, MovementBackend, SkipReason};
use crate::accumulator::MovementAccumulator;
use crate::state::{BackendKind, LiveParams};
use tracing::{trace, warn};

/// Injects relative pointer motion into the OS
pub trait PointerInjector: Send {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), DeviceError>;
}

/// Best available injector for this platform
pub fn platform_injector() -> Box<dyn PointerInjector> {
    #[cfg(windows)]
    {
        Box::new(SendInputInjector)
    }
    #[cfg(not(windows))]
    {
        Box::new(UnsupportedInjector::default())
    }
}

/// Relative, non-coalesced `SendInput` mouse moves
#[cfg(windows)]
pub struct SendInputInjector;

#[cfg(windows)]
impl PointerInjector for SendInputInjector {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), DeviceError> {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_MOVE,
            MOUSEEVENTF_MOVE_NOCOALESCE, MOUSEINPUT,
        };

        let input = [INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: 0,
                    dwFlags: MOUSEEVENTF_MOVE | MOUSEEVENTF_MOVE_NOCOALESCE,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }];

        let sent = unsafe { SendInput(&input, std::mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            return Err(DeviceError::Injection(
                windows::core::Error::from_win32().to_string(),
            ));
        }
        Ok(())
    }
}

/// Stand-in for platforms without injection; warns once
#[derive(Debug, Default)]
pub struct UnsupportedInjector {
    warned: bool,
}

impl PointerInjector for UnsupportedInjector {
    fn move_relative(&mut self, _dx: i32, _dy: i32) -> Result<(), DeviceError> {
        if !self.warned {
            self.warned = true;
            warn!("Native: pointer injection is not available on this platform");
        }
        Err(DeviceError::Unsupported("pointer injection"))
    }
}

pub struct NativeBackend {
    injector: Box<dyn PointerInjector>,
    accumulator: MovementAccumulator,
}

impl NativeBackend {
    pub fn new(injector: Box<dyn PointerInjector>) -> Self {
        Self {
            injector,
            accumulator: MovementAccumulator::new(),
        }
    }

    /// Drop sub-pixel history
    pub fn reset_accumulator(&mut self) {
        self.accumulator.reset();
    }

    pub fn accumulator(&self) -> &MovementAccumulator {
        &self.accumulator
    }
}

impl MovementBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn close(&mut self) {
        self.accumulator.reset();
    }

    fn emit(&mut self, params: &LiveParams) -> Result<EmitOutcome, DeviceError> {
        let fx = params.lateral_velocity();
        let fy = f64::from(params.down_force);
        let (delta, moved) = self.accumulator.step(fx, fy);

        let (rx, ry) = self.accumulator.remainder();
        trace!(
            "Native: fx={:.3} fy={:.3} -> dx={} dy={} | rem=({:.3},{:.3})",
            fx,
            fy,
            delta.dx,
            delta.dy,
            rx,
            ry
        );

        if !moved {
            return Ok(EmitOutcome::Skipped(SkipReason::SubPixel));
        }

        self.injector.move_relative(delta.dx, delta.dy)?;
        Ok(EmitOutcome::Moved(delta))
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }
}
