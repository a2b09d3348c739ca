//! Interactive console
//!
//! A line-oriented front end over the shared state and the two stores. It
//! runs on the main thread while the worker ticks in the background; every
//! command is a plain read or write of `SharedState` or a store call.

use crate::input::{code_name, parse_code};
use crate::keybinds::{Action, KeyBindingStore};
use crate::profile::{scale, ProfileStore};
use crate::state::{BackendKind, SharedState};
use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::{debug, info};

const HELP: &str = "\
Profiles:
  list                      list profiles (* = selected)
  select <name>             select a profile
  clear                     clear the selection (movement off)
  save                      save live values into the selected profile
  save-as <name>            save live values as a new profile and select it
  delete <name>             remove a profile from the document
  reload                    re-read the profile document
Live values:
  show                      show state and live values
  set down|east|west <0-5>  change a force
  set delay <ms>            change the tick length
  backend [serial|native]   show or switch the movement backend
  script [on|off]           show or switch movement on/off
Key bindings:
  binds                     list bindings
  bind <action> <key>       bind (key name like F5, End, mouse2, or a code)
  unbind <action>           clear a binding
  require-both on|off       need both hold buttons
  save-binds                write bindings to disk
  reload-binds              re-read bindings from disk
  quit                      exit";

/// Result of one console command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Info(String),
    Error(String),
    Exit,
}

impl Reply {
    fn info(msg: impl Into<String>) -> Self {
        Reply::Info(msg.into())
    }

    fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }
}

pub struct Console {
    state: Arc<SharedState>,
    profiles: ProfileStore,
    keybinds: KeyBindingStore,
}

impl Console {
    pub fn new(state: Arc<SharedState>, profiles: ProfileStore, keybinds: KeyBindingStore) -> Self {
        Self {
            state,
            profiles,
            keybinds,
        }
    }

    /// Run the prompt until `quit`, Ctrl-C/EOF, or the worker stops
    pub fn run(self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        println!(
            "{} (type {} for commands)",
            "pointer-drift console".bold().cyan(),
            "help".yellow()
        );

        while self.state.is_running() {
            match rl.readline("drift> ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str()).ok();
                    match self.execute(&line) {
                        Reply::Info(msg) => println!("{}", msg),
                        Reply::Error(msg) => println!("{}", msg.red()),
                        Reply::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.state.stop();
                    break;
                }
                Err(e) => {
                    self.state.stop();
                    return Err(e.into());
                }
            }
        }

        debug!("Console closed");
        Ok(())
    }

    /// Execute one command line
    pub fn execute(&self, line: &str) -> Reply {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Reply::info("");
        };
        let args: Vec<&str> = parts.collect();

        match (cmd.to_lowercase().as_str(), args.as_slice()) {
            ("help" | "?", _) => Reply::info(HELP),
            ("quit" | "exit", _) => {
                info!("Quit from console");
                self.state.stop();
                Reply::Exit
            }

            ("list" | "ls", []) => self.list(),
            ("select", [_, ..]) => self.select(&args.join(" ")),
            ("clear", []) => {
                self.state.clear_profile();
                Reply::info("Selection cleared")
            }
            ("save", []) => self.save_as(&self.state.selected_profile()),
            ("save-as", [_, ..]) => {
                let name = args.join(" ");
                let reply = self.save_as(&name);
                if matches!(reply, Reply::Info(_)) {
                    self.state.select_profile(name.trim());
                }
                reply
            }
            ("delete", [_, ..]) => self.delete(&args.join(" ")),
            ("reload", []) => {
                self.state.request_reload();
                Reply::info("Reload requested")
            }

            ("show" | "status", []) => self.show(),
            ("set", [field, value]) => self.set(field, value),
            ("backend", []) => Reply::info(format!("Backend: {}", self.state.backend())),
            ("backend", [kind]) => match kind.parse::<BackendKind>() {
                Ok(kind) => {
                    self.state.set_backend(kind);
                    Reply::info(format!("Backend: {}", kind))
                }
                Err(e) => Reply::error(e),
            },
            ("script", []) => Reply::info(format!("Script: {}", on_off(self.state.script_enabled()))),
            ("script", [flag]) => match parse_switch(flag) {
                Some(on) => {
                    self.state.set_script_enabled(on);
                    Reply::info(format!("Script: {}", on_off(on)))
                }
                None => Reply::error("expected on or off"),
            },

            ("binds", []) => self.binds(),
            ("bind", [action, key]) => self.bind(action, Some(*key)),
            ("unbind", [action]) => self.bind(action, None),
            ("require-both", [flag]) => match parse_switch(flag) {
                Some(on) => {
                    self.state.update_bindings(|b| b.require_both_hold_buttons = on);
                    Reply::info(format!("Require both hold buttons: {}", on_off(on)))
                }
                None => Reply::error("expected on or off"),
            },
            ("save-binds", []) => match self.keybinds.save(&self.state.bindings()) {
                Ok(()) => Reply::info(format!("Saved {}", self.keybinds.path().display())),
                Err(e) => Reply::error(format!("Save failed: {}", e)),
            },
            ("reload-binds", []) => {
                let report = self.keybinds.load_report();
                self.state.set_bindings(report.bindings);
                match report.warning {
                    Some(w) => Reply::error(format!("Bindings reloaded with warnings: {}", w)),
                    None => Reply::info("Bindings reloaded"),
                }
            }

            _ => Reply::error(format!("Unknown command '{}' (try help)", line.trim())),
        }
    }

    fn list(&self) -> Reply {
        let set = match self.profiles.load() {
            Ok(set) => set,
            Err(e) => return Reply::error(format!("Cannot load profiles: {}", e)),
        };
        if set.is_empty() && set.rejected().is_empty() {
            return Reply::info("No profiles");
        }

        let selected = crate::profile::normalize_name(&self.state.selected_profile());
        let mut out = Vec::new();
        for p in set.profiles() {
            let mark = if p.key() == selected { "*" } else { " " };
            out.push(format!(
                "{} {:<16} s={:<5} {}={:<5} delay={}",
                mark,
                p.name.green(),
                p.vertical_force,
                p.direction.key(),
                p.lateral_magnitude,
                p.tick_delay_ms
            ));
        }
        for r in set.rejected() {
            out.push(format!(
                "  {} #{}: {}",
                r.name.as_deref().unwrap_or("?").red(),
                r.index,
                r.reason
            ));
        }
        Reply::info(out.join("\n"))
    }

    fn select(&self, name: &str) -> Reply {
        match self.profiles.find_by_name(name) {
            Ok(profile) => {
                if crate::profile::normalize_name(&self.state.selected_profile()) == profile.key() {
                    self.state.request_reload();
                }
                self.state.select_profile(profile.name.clone());
                Reply::info(format!("Selected '{}'", profile.name))
            }
            Err(e) => Reply::error(e.to_string()),
        }
    }

    fn save_as(&self, name: &str) -> Reply {
        match self.profiles.save_from_live(name, &self.state.live_params()) {
            Ok(profile) => {
                info!("Saved profile '{}'", profile.name);
                Reply::info(format!("Saved '{}'", profile.name))
            }
            Err(e) => Reply::error(format!("Save failed: {}", e)),
        }
    }

    fn delete(&self, name: &str) -> Reply {
        let mut set = self.profiles.load_or_empty();
        if !set.remove(name) {
            return Reply::error(format!("profile '{}' not found", name.trim()));
        }
        if let Err(e) = self.profiles.save(&set) {
            return Reply::error(format!("Save failed: {}", e));
        }
        if crate::profile::normalize_name(&self.state.selected_profile())
            == crate::profile::normalize_name(name)
        {
            self.state.clear_profile();
        }
        Reply::info(format!("Deleted '{}'", name.trim()))
    }

    fn show(&self) -> Reply {
        let s = &self.state;
        let p = s.live_params();
        let selected = s.selected_profile();
        let lines = [
            format!(
                "Profile:  {}{}",
                if selected.is_empty() { "(none)".to_string() } else { selected },
                if s.movement_ready() { "" } else { " (movement off)" }
            ),
            format!("Backend:  {}", s.backend()),
            format!(
                "Script:   {}   Holding: {}",
                on_off(s.script_enabled()),
                if s.is_holding() { "yes" } else { "no" }
            ),
            format!(
                "Live:     down={:.2} east={:.2} west={:.2} delay={}ms",
                p.down_force, p.east_drift, p.west_drift, p.delay_ms
            ),
        ];
        Reply::info(lines.join("\n"))
    }

    fn set(&self, field: &str, value: &str) -> Reply {
        let field = field.to_lowercase();
        if field == "delay" {
            return match value.parse::<i32>() {
                Ok(ms) => {
                    self.state.set_delay_ms(ms);
                    if scale::delay_in_range(i64::from(ms)) {
                        Reply::info(format!("delay = {}ms", ms))
                    } else {
                        Reply::info(format!("delay = {}ms (runs clamped, cannot be saved)", ms))
                    }
                }
                Err(_) => Reply::error("delay must be an integer"),
            };
        }

        let v = match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => scale::canonical_force(v) as f32,
            _ => return Reply::error("force must be a non-negative number"),
        };
        match field.as_str() {
            "down" | "s" => self.state.set_down_force(v),
            "east" | "e" => self.state.set_east_drift(v),
            "west" | "w" => self.state.set_west_drift(v),
            _ => return Reply::error(format!("unknown field '{}'", field)),
        }
        Reply::info(format!("{} = {:.2}", field, v))
    }

    fn binds(&self) -> Reply {
        let b = self.state.bindings();
        let mut out: Vec<String> = b
            .describe()
            .into_iter()
            .map(|(action, key)| format!("  {:<16} {}", action.key(), key.yellow()))
            .collect();
        out.push(format!(
            "  {:<16} {}",
            "require_both",
            on_off(b.require_both_hold_buttons)
        ));
        Reply::info(out.join("\n"))
    }

    fn bind(&self, action: &str, key: Option<&str>) -> Reply {
        let Some(action) = Action::from_key(&action.to_lowercase()) else {
            let known: Vec<&str> = Action::ALL.iter().map(|a| a.key()).collect();
            return Reply::error(format!("unknown action (one of: {})", known.join(", ")));
        };

        let code = match key {
            None => 0,
            Some(key) => match parse_code(key) {
                Some(code) => code,
                None => return Reply::error(format!("unknown key '{}'", key)),
            },
        };

        self.state.update_bindings(|b| b.set(action, code));
        let bound = self.state.bindings().get(action);
        Reply::info(format!("{} -> {}", action, code_name(bound)))
    }
}

fn parse_switch(flag: &str) -> Option<bool> {
    match flag.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
