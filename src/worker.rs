//! Background worker loop
//!
//! One thread polls the bound keys, tracks the selected profile and drives
//! the active backend. Every iteration is a [`Worker::tick`], which returns
//! how long to sleep; [`Worker::run`] just loops over it. Nothing in a tick
//! blocks: serial backoff and device settle are deadlines, not sleeps.

use crate::backend::BackendController;
use crate::config::WorkerConfig;
use crate::input::InputSource;
use crate::profile::{self, scale, MovementProfile, ProfileStore};
use crate::state::{BackendKind, SharedState};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Callbacks into the presentation side
pub trait WorkerHooks: Send {
    /// The console-toggle key was pressed; `visible` is the new state
    fn on_console_toggle(&mut self, visible: bool);

    /// The reload key was pressed
    fn on_reload(&mut self);
}

/// Hooks that only log
#[derive(Debug, Default)]
pub struct LoggingHooks;

impl WorkerHooks for LoggingHooks {
    fn on_console_toggle(&mut self, visible: bool) {
        info!("Console {}", if visible { "shown" } else { "hidden" });
    }

    fn on_reload(&mut self) {
        info!("Reload requested from key binding");
    }
}

/// What `run` should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue(Duration),
    Quit,
}

pub struct Worker {
    state: Arc<SharedState>,
    profiles: ProfileStore,
    controller: BackendController,
    input: Box<dyn InputSource>,
    hooks: Box<dyn WorkerHooks>,
    config: WorkerConfig,
    last_backend: BackendKind,
    last_profile: String,
    /// The stored profile most recently written into the live values
    last_applied: Option<MovementProfile>,
}

impl Worker {
    pub fn new(
        state: Arc<SharedState>,
        profiles: ProfileStore,
        controller: BackendController,
        input: Box<dyn InputSource>,
        hooks: Box<dyn WorkerHooks>,
        config: WorkerConfig,
    ) -> Self {
        let last_backend = controller.active();
        Self {
            state,
            profiles,
            controller,
            input,
            hooks,
            config,
            last_backend,
            last_profile: String::new(),
            last_applied: None,
        }
    }

    pub fn controller(&self) -> &BackendController {
        &self.controller
    }

    /// One loop iteration
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_running() {
            return TickOutcome::Quit;
        }

        let binds = self.state.bindings();

        // 1. Edge-triggered actions
        if self.input.was_pressed(binds.quit) {
            info!("Quit key pressed");
            self.state.stop();
            return TickOutcome::Quit;
        }

        if self.input.was_pressed(binds.toggle_console) {
            let visible = self.state.toggle_console();
            self.hooks.on_console_toggle(visible);
        }

        if self.input.was_pressed(binds.toggle_script) {
            let enabled = self.state.toggle_script();
            info!("Script {}", if enabled { "enabled" } else { "disabled" });
        }

        let mut reload = self.state.take_reload_request();
        let changed = self.state.take_document_changed();
        if self.input.was_pressed(binds.reload) {
            self.hooks.on_reload();
            reload = true;
        }

        // 2. Backend selection
        let backend = self.state.backend();
        if backend != self.last_backend {
            self.controller.select(backend);
            self.last_backend = backend;
        }
        self.controller.poll();

        // 3. Hold condition
        let buttons_ok = if binds.require_both_hold_buttons {
            let (a, b) = binds.effective_hold_buttons();
            self.input.is_held(a) && self.input.is_held(b)
        } else {
            true
        };
        let modifier_ok = binds.hold_modifier == 0 || self.input.is_held(binds.hold_modifier);
        let holding = buttons_ok && modifier_ok;
        self.state.set_holding(holding);

        // 4. Profile tracking
        let selected = self.state.selected_profile();
        if selected != self.last_profile || reload {
            self.apply_profile(&selected);
            self.last_profile = selected;
        } else if changed && !selected.is_empty() {
            self.refresh_profile(&selected);
        }

        let ready = self.state.movement_ready();
        let params = self.state.live_params();

        // 5. Emission
        if holding && self.state.script_enabled() && ready && !self.last_profile.is_empty() {
            self.controller.emit(&params);
        }

        // 6. Pacing
        let delay = if ready {
            Duration::from_millis(u64::from(scale::clamp_delay(i64::from(params.delay_ms))))
        } else {
            self.config.idle_delay()
        };
        TickOutcome::Continue(delay)
    }

    fn apply_profile(&mut self, name: &str) {
        if name.is_empty() {
            self.state.set_movement_ready(false);
            self.last_applied = None;
            info!("Profile cleared -> movement disabled");
            return;
        }

        match self.profiles.find_by_name(name) {
            Ok(profile) => self.apply_loaded(profile),
            Err(e) => self.disable(name, e),
        }
    }

    /// The document changed on disk: only a changed entry for the selected
    /// profile replaces the live values
    fn refresh_profile(&mut self, name: &str) {
        match self.profiles.find_by_name(name) {
            Ok(profile) if self.last_applied.as_ref() == Some(&profile) => {
                debug!("Profile '{}' unchanged on disk, keeping live values", name);
            }
            Ok(profile) => self.apply_loaded(profile),
            Err(e) => self.disable(name, e),
        }
    }

    fn apply_loaded(&mut self, profile: MovementProfile) {
        let params = profile::live_params_for(&profile);
        self.state.set_live_params(params);
        self.state.set_movement_ready(true);
        info!(
            "Profile -> '{}' down={:.2} east={:.2} west={:.2} delay={}",
            profile.name, params.down_force, params.east_drift, params.west_drift, params.delay_ms
        );
        self.last_applied = Some(profile);
    }

    fn disable(&mut self, name: &str, e: profile::ProfileError) {
        self.state.set_movement_ready(false);
        self.last_applied = None;
        warn!("Profile '{}' unavailable -> movement disabled: {}", name, e);
    }

    /// Run until quit; closes the backends on the way out
    pub fn run(mut self) {
        let startup = self.config.startup_delay();
        if !startup.is_zero() {
            std::thread::sleep(startup);
        }
        info!("Worker started (backend: {})", self.controller.active());

        let result = panic::catch_unwind(AssertUnwindSafe(|| loop {
            match self.tick() {
                TickOutcome::Continue(delay) => std::thread::sleep(delay),
                TickOutcome::Quit => break,
            }
        }));

        if let Err(panic) = result {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Worker crashed: {}", msg);
            self.state.stop();
        }

        self.controller.shutdown();
        debug!("Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::native::fake::RecordingInjector;
    use crate::backend::serial::fake::{test_config, FakeOpener};
    use crate::backend::{NativeBackend, SerialBackend};
    use crate::input::fake::ScriptedInput;
    use crate::input::keys;
    use crate::keybinds::KeyBindings;
    use crate::state::LiveParams;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingHooks {
        toggles: Arc<Mutex<Vec<bool>>>,
        reloads: Arc<Mutex<usize>>,
    }

    impl WorkerHooks for RecordingHooks {
        fn on_console_toggle(&mut self, visible: bool) {
            self.toggles.lock().push(visible);
        }

        fn on_reload(&mut self) {
            *self.reloads.lock() += 1;
        }
    }

    struct Rig {
        _dir: TempDir,
        profiles_path: std::path::PathBuf,
        state: Arc<SharedState>,
        input: ScriptedInput,
        opener: FakeOpener,
        injector: RecordingInjector,
        hooks: RecordingHooks,
        worker: Worker,
    }

    fn rig(backend: BackendKind) -> Rig {
        let dir = TempDir::new().unwrap();
        let profiles_path = dir.path().join("profiles.json");
        fs::write(
            &profiles_path,
            r#"[
                {"name":"alpha","s":2.5,"e":1.2,"delay":10},
                {"name":"slow","s":0.5,"w":0.25,"delay":40}
            ]"#,
        )
        .unwrap();

        let state = Arc::new(SharedState::new(KeyBindings::default(), backend));
        let input = ScriptedInput::new();
        let opener = FakeOpener::default();
        let injector = RecordingInjector::default();
        let hooks = RecordingHooks::default();

        let controller = BackendController::new(
            backend,
            SerialBackend::new(test_config(0), Box::new(opener.clone())),
            NativeBackend::new(Box::new(injector.clone())),
        );
        let config = WorkerConfig {
            startup_delay_ms: 0,
            idle_delay_ms: 10,
            default_backend: backend,
        };
        let worker = Worker::new(
            state.clone(),
            ProfileStore::new(&profiles_path),
            controller,
            Box::new(input.clone()),
            Box::new(hooks.clone()),
            config,
        );

        Rig {
            _dir: dir,
            profiles_path,
            state,
            input,
            opener,
            injector,
            hooks,
            worker,
        }
    }

    fn hold_buttons(input: &ScriptedInput) {
        input.hold(keys::VK_LBUTTON);
        input.hold(keys::VK_RBUTTON);
    }

    #[test]
    fn test_quit_key_stops_loop() {
        let mut r = rig(BackendKind::Native);
        assert!(matches!(r.worker.tick(), TickOutcome::Continue(_)));

        r.input.press(keys::VK_END);
        assert_eq!(r.worker.tick(), TickOutcome::Quit);
        assert!(!r.state.is_running());
        assert_eq!(r.worker.tick(), TickOutcome::Quit);
    }

    #[test]
    fn test_external_stop_ends_loop() {
        let mut r = rig(BackendKind::Native);
        r.state.stop();
        assert_eq!(r.worker.tick(), TickOutcome::Quit);
    }

    #[test]
    fn test_toggles_fire_on_edges_only() {
        let mut r = rig(BackendKind::Native);
        assert!(r.state.script_enabled());

        r.input.press(keys::VK_XBUTTON2);
        r.worker.tick();
        assert!(!r.state.script_enabled());
        r.worker.tick();
        assert!(!r.state.script_enabled());

        r.input.press(keys::VK_INSERT);
        r.worker.tick();
        r.input.press(keys::VK_INSERT);
        r.worker.tick();
        assert_eq!(*r.hooks.toggles.lock(), vec![true, false]);
    }

    #[test]
    fn test_reload_key_invokes_hook() {
        let mut r = rig(BackendKind::Native);
        r.input.press(keys::VK_F5);
        r.worker.tick();
        assert_eq!(*r.hooks.reloads.lock(), 1);
    }

    #[test]
    fn test_hold_requires_both_buttons() {
        let mut r = rig(BackendKind::Native);
        r.input.hold(keys::VK_LBUTTON);
        r.worker.tick();
        assert!(!r.state.is_holding());

        r.input.hold(keys::VK_RBUTTON);
        r.worker.tick();
        assert!(r.state.is_holding());
    }

    #[test]
    fn test_hold_with_modifier_and_single_button_mode() {
        let mut r = rig(BackendKind::Native);
        r.state.update_bindings(|b| {
            b.hold_modifier = keys::VK_SHIFT;
            b.require_both_hold_buttons = false;
        });

        r.worker.tick();
        assert!(!r.state.is_holding());

        r.input.hold(keys::VK_SHIFT);
        r.worker.tick();
        assert!(r.state.is_holding());
    }

    #[test]
    fn test_selecting_profile_applies_live_params() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        let outcome = r.worker.tick();

        assert!(r.state.movement_ready());
        assert_eq!(
            r.state.live_params(),
            LiveParams {
                down_force: 2.5,
                east_drift: 1.2,
                west_drift: 0.0,
                delay_ms: 10,
            }
        );
        assert_eq!(outcome, TickOutcome::Continue(Duration::from_millis(10)));
    }

    #[test]
    fn test_unknown_profile_keeps_previous_params() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();
        let before = r.state.live_params();

        r.state.select_profile("ghost");
        let outcome = r.worker.tick();
        assert!(!r.state.movement_ready());
        assert_eq!(r.state.live_params(), before);
        assert_eq!(outcome, TickOutcome::Continue(Duration::from_millis(10)));

        hold_buttons(&r.input);
        r.worker.tick();
        assert!(r.injector.moves.lock().is_empty());
    }

    #[test]
    fn test_cleared_profile_disables_movement() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();
        r.state.clear_profile();
        r.worker.tick();
        assert!(!r.state.movement_ready());
    }

    #[test]
    fn test_native_emission_while_holding() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();
        assert!(r.injector.moves.lock().is_empty());

        hold_buttons(&r.input);
        r.worker.tick();
        assert_eq!(*r.injector.moves.lock(), vec![(1, 2)]);

        r.state.set_script_enabled(false);
        r.worker.tick();
        assert_eq!(r.injector.moves.lock().len(), 1);
    }

    #[test]
    fn test_serial_emission_frames() {
        let mut r = rig(BackendKind::Serial);
        r.state.select_profile("slow");
        hold_buttons(&r.input);
        let outcome = r.worker.tick();

        assert_eq!(r.opener.wire.lock().text(), "S0.500000\nW0.250000\n");
        assert_eq!(outcome, TickOutcome::Continue(Duration::from_millis(40)));
    }

    #[test]
    fn test_serial_write_failure_reopens() {
        let mut r = rig(BackendKind::Serial);
        r.state.select_profile("alpha");
        hold_buttons(&r.input);
        r.worker.tick();

        r.opener.wire.lock().fail_writes = true;
        r.worker.tick();
        assert!(!r.worker.controller().serial().is_open());

        r.opener.wire.lock().fail_writes = false;
        r.worker.tick();
        assert!(r.worker.controller().serial().is_open());
        assert_eq!(r.opener.wire.lock().opens, 2);
    }

    #[test]
    fn test_backend_switch_resets_accumulator() {
        let mut r = rig(BackendKind::Native);
        r.state.set_live_params(LiveParams {
            down_force: 0.5,
            east_drift: 0.0,
            west_drift: 0.0,
            delay_ms: 10,
        });
        r.worker.tick();

        // Seed a remainder by emitting directly through the controller
        r.worker.controller.emit(&r.state.live_params());
        assert_ne!(
            r.worker.controller().native().accumulator().remainder(),
            (0.0, 0.0)
        );

        r.state.set_backend(BackendKind::Serial);
        r.worker.tick();
        assert_eq!(r.worker.controller().active(), BackendKind::Serial);
        assert_eq!(
            r.worker.controller().native().accumulator().remainder(),
            (0.0, 0.0)
        );
        assert!(r.worker.controller().serial().is_open());
    }

    #[test]
    fn test_live_delay_is_clamped() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();

        r.state.set_delay_ms(500);
        assert_eq!(
            r.worker.tick(),
            TickOutcome::Continue(Duration::from_millis(50))
        );
        r.state.set_delay_ms(-3);
        assert_eq!(
            r.worker.tick(),
            TickOutcome::Continue(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_reload_request_rereads_document() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();

        fs::write(
            &r.profiles_path,
            r#"[{"name":"alpha","s":1.0,"e":0.5,"delay":20}]"#,
        )
        .unwrap();
        r.worker.tick();
        assert_eq!(r.state.live_params().down_force, 2.5);

        r.state.request_reload();
        r.worker.tick();
        assert_eq!(r.state.live_params().down_force, 1.0);
        assert_eq!(r.state.live_params().delay_ms, 20);
    }

    #[test]
    fn test_document_change_keeps_unsaved_live_edits() {
        let mut r = rig(BackendKind::Native);
        r.state.select_profile("alpha");
        r.worker.tick();
        r.state.set_down_force(4.0);

        // Another profile was edited; alpha's entry is the same
        fs::write(
            &r.profiles_path,
            r#"[{"name":"alpha","s":2.5,"e":1.2,"delay":10}]"#,
        )
        .unwrap();
        r.state.notify_document_changed();
        r.worker.tick();
        assert_eq!(r.state.live_params().down_force, 4.0);
        assert!(r.state.movement_ready());

        // alpha itself changed on disk
        fs::write(
            &r.profiles_path,
            r#"[{"name":"alpha","s":3.0,"e":1.2,"delay":10}]"#,
        )
        .unwrap();
        r.state.notify_document_changed();
        r.worker.tick();
        assert_eq!(r.state.live_params().down_force, 3.0);

        // alpha removed from the document
        fs::write(&r.profiles_path, "[]").unwrap();
        r.state.notify_document_changed();
        r.worker.tick();
        assert!(!r.state.movement_ready());
    }

    #[test]
    fn test_run_exits_and_closes_serial() {
        let mut r = rig(BackendKind::Serial);
        r.state.select_profile("alpha");
        hold_buttons(&r.input);
        r.worker.tick();
        {
            let wire = r.opener.wire.lock();
            assert_eq!(wire.open_ports, 1);
            assert!(!wire.written.is_empty());
        }

        r.input.press(keys::VK_END);
        let state = r.state.clone();
        let wire = r.opener.wire.clone();
        r.worker.run();

        assert!(!state.is_running());
        assert_eq!(wire.lock().open_ports, 0);
        assert_eq!(wire.lock().opens, 1);
    }

    struct PanickingInput;

    impl InputSource for PanickingInput {
        fn is_held(&mut self, _code: i32) -> bool {
            false
        }

        fn was_pressed(&mut self, _code: i32) -> bool {
            panic!("input device vanished");
        }
    }

    #[test]
    fn test_run_survives_panic_and_stops() {
        let r = rig(BackendKind::Serial);
        let worker = Worker::new(
            r.state.clone(),
            ProfileStore::new(&r.profiles_path),
            BackendController::new(
                BackendKind::Serial,
                SerialBackend::new(test_config(0), Box::new(r.opener.clone())),
                NativeBackend::new(Box::new(r.injector.clone())),
            ),
            Box::new(PanickingInput),
            Box::new(LoggingHooks),
            WorkerConfig {
                startup_delay_ms: 0,
                idle_delay_ms: 10,
                default_backend: BackendKind::Serial,
            },
        );

        worker.run();

        assert!(!r.state.is_running());
        assert_eq!(r.opener.wire.lock().open_ports, 0);
    }
}
