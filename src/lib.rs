//! Pointer Drift - profile-driven pointer movement
//!
//! A background worker moves the pointer while the hold buttons are down,
//! following the selected movement profile. Movement goes either to a
//! microcontroller on a serial port or straight into the OS as relative
//! pointer events.

pub mod accumulator;
pub mod backend;
pub mod config;
pub mod console;
pub mod input;
pub mod keybinds;
pub mod logging;
pub mod paths;
pub mod profile;
pub mod state;
pub mod store;
pub mod worker;
