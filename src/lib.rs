//! Productivity dashboard for the terminal: a todo list, a pomodoro timer and tags, rolled into
//! daily statistics. Everything is kept in a local key-value store shared by a one-shot cli and a
//! small daemon that keeps the countdown going and counts idle time.
//!

pub mod activity_api;
pub mod cli;
pub mod daemon;
pub mod productivity;
pub mod storage;
pub mod timer;
pub mod utils;
