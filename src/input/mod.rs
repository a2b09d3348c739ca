//! Key and button polling for the worker loop
//!
//! The worker never talks to the OS directly. It asks an [`InputSource`]
//! whether a code is held right now (level) or was pressed since the last
//! query (edge). Production uses the platform poller, tests use
//! [`fake::ScriptedInput`].

pub mod keys;

pub use keys::{code_name, parse_code};

/// Polled key/button state
pub trait InputSource: Send {
    /// Whether `code` is currently held down. Code 0 is never held.
    fn is_held(&mut self, code: i32) -> bool;

    /// Whether `code` went down since the previous query for it. Code 0 is
    /// never pressed.
    fn was_pressed(&mut self, code: i32) -> bool;
}

/// Best available input source for this platform
pub fn platform_input() -> Box<dyn InputSource> {
    #[cfg(windows)]
    {
        Box::new(AsyncKeyInput)
    }
    #[cfg(not(windows))]
    {
        tracing::warn!("Global key polling is not available on this platform; key bindings are inert");
        Box::new(NullInput)
    }
}

/// Polls `GetAsyncKeyState`
#[cfg(windows)]
pub struct AsyncKeyInput;

#[cfg(windows)]
impl InputSource for AsyncKeyInput {
    fn is_held(&mut self, code: i32) -> bool {
        if !keys::is_valid_code(code) {
            return false;
        }
        // High bit: currently down
        let state = unsafe { windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState(code) };
        (state as u16 & 0x8000) != 0
    }

    fn was_pressed(&mut self, code: i32) -> bool {
        if !keys::is_valid_code(code) {
            return false;
        }
        // Low bit: pressed since the previous call
        let state = unsafe { windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState(code) };
        (state & 1) != 0
    }
}

/// Input source that reports nothing held and nothing pressed
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInput;

impl InputSource for NullInput {
    fn is_held(&mut self, _code: i32) -> bool {
        false
    }

    fn was_pressed(&mut self, _code: i32) -> bool {
        false
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted input for driving the worker in tests

    use super::InputSource;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Default)]
    struct Script {
        held: HashSet<i32>,
        pressed: HashSet<i32>,
    }

    /// Cloneable handle; all clones share one script
    #[derive(Clone, Default)]
    pub struct ScriptedInput {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedInput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a single press edge for `code`
        pub fn press(&self, code: i32) {
            self.script.lock().pressed.insert(code);
        }

        pub fn hold(&self, code: i32) {
            self.script.lock().held.insert(code);
        }

        pub fn release(&self, code: i32) {
            self.script.lock().held.remove(&code);
        }
    }

    impl InputSource for ScriptedInput {
        fn is_held(&mut self, code: i32) -> bool {
            code != 0 && self.script.lock().held.contains(&code)
        }

        fn was_pressed(&mut self, code: i32) -> bool {
            code != 0 && self.script.lock().pressed.remove(&code)
        }
    }

    #[test]
    fn test_press_is_consumed() {
        let mut input = ScriptedInput::new();
        input.press(5);
        assert!(input.was_pressed(5));
        assert!(!input.was_pressed(5));
    }

    #[test]
    fn test_hold_is_level() {
        let mut input = ScriptedInput::new();
        input.hold(1);
        assert!(input.is_held(1));
        assert!(input.is_held(1));
        input.release(1);
        assert!(!input.is_held(1));
        assert!(!input.is_held(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_input_is_inert() {
        let mut input = NullInput;
        assert!(!input.is_held(keys::VK_LBUTTON));
        assert!(!input.was_pressed(keys::VK_END));
    }
}
