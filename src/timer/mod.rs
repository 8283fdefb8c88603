//! Pomodoro countdown that survives the process not watching it.
//!
//! [state] holds the persisted snapshot and the pure reconciliation with the wall clock,
//! [controller] the operations the cli and the daemon run against the store.

pub mod controller;
pub mod state;
