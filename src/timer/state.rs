use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::storage::entities::Tag;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const BREAK_SECONDS: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Work,
    Break,
}

impl TimerMode {
    /// The mode a finished countdown hands over to.
    pub fn next(self) -> Self {
        match self {
            TimerMode::Work => TimerMode::Break,
            TimerMode::Break => TimerMode::Work,
        }
    }
}

impl Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerMode::Work => write!(f, "work"),
            TimerMode::Break => write!(f, "break"),
        }
    }
}

/// Nominal countdown lengths in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerLengths {
    pub work: u32,
    pub rest: u32,
}

impl TimerLengths {
    pub fn from_work_minutes(minutes: u32) -> Self {
        Self {
            work: minutes * 60,
            rest: BREAK_SECONDS,
        }
    }

    pub fn of(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work,
            TimerMode::Break => self.rest,
        }
    }
}

impl Default for TimerLengths {
    fn default() -> Self {
        Self::from_work_minutes(DEFAULT_WORK_MINUTES)
    }
}

/// Persisted countdown. `time_left` is only exact at `last_updated`, everything after that is
/// derived from the wall clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    /// Seconds.
    pub time_left: u32,
    #[serde(alias = "isActive")]
    pub running: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub selected_tags: Vec<Tag>,
    /// Start of the work session in progress.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_start: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    /// Idle work countdown at full length.
    pub fn fresh(lengths: TimerLengths, now: DateTime<Utc>) -> Self {
        Self {
            mode: TimerMode::Work,
            time_left: lengths.work,
            running: false,
            last_updated: now,
            selected_tags: vec![],
            session_start: None,
        }
    }

    /// The persisted start of the work session, or an estimate from how much of the countdown is
    /// already gone.
    pub fn session_start_or_estimate(&self, lengths: TimerLengths) -> DateTime<Utc> {
        self.session_start.unwrap_or_else(|| {
            let spent = lengths.work.saturating_sub(self.time_left);
            self.last_updated - Duration::seconds(spent as i64)
        })
    }
}

/// A countdown that ran out while nothing was watching it.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCountdown {
    pub mode: TimerMode,
    pub started: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub snapshot: TimerSnapshot,
    pub finished: Option<FinishedCountdown>,
}

/// Applies the wall clock time passed since `snapshot.last_updated` to a running countdown.
///
/// Only whole seconds are consumed and `last_updated` moves forward by exactly that amount, so
/// frequent reconciliations don't drift. A countdown that reached zero switches to the next mode
/// at full length and stops.
pub fn reconcile(
    mut snapshot: TimerSnapshot,
    now: DateTime<Utc>,
    lengths: TimerLengths,
) -> Reconciliation {
    if !snapshot.running {
        return Reconciliation {
            snapshot,
            finished: None,
        };
    }

    let elapsed = (now - snapshot.last_updated).num_seconds().max(0);
    let adjusted = (snapshot.time_left as i64 - elapsed).max(0) as u32;
    if adjusted > 0 {
        snapshot.time_left = adjusted;
        snapshot.last_updated += Duration::seconds(elapsed);
        return Reconciliation {
            snapshot,
            finished: None,
        };
    }

    let finished = FinishedCountdown {
        mode: snapshot.mode,
        started: snapshot.session_start_or_estimate(lengths),
        tags: snapshot.selected_tags.clone(),
    };
    let mode = snapshot.mode.next();
    Reconciliation {
        snapshot: TimerSnapshot {
            mode,
            time_left: lengths.of(mode),
            running: false,
            last_updated: now,
            selected_tags: snapshot.selected_tags,
            session_start: None,
        },
        finished: Some(finished),
    }
}
