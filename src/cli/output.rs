use chrono::{DateTime, Local, Utc};

use crate::storage::entities::{Task, TimerSession};

const BAR_WIDTH: usize = 30;

/// Countdown seconds as MM:SS.
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Minutes as 1h5m or 45m. Fractions are rounded to whole minutes.
pub fn format_minutes(minutes: f64) -> String {
    let minutes = minutes.max(0.).round() as u64;
    if minutes >= 60 {
        format!("{}h{}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

/// Bar proportional to `value / max`, at most [BAR_WIDTH] characters long.
pub fn bar(value: f64, max: f64) -> String {
    if max <= 0. || value <= 0. {
        return String::new();
    }
    let width = ((value / max) * BAR_WIDTH as f64).round().max(1.) as usize;
    "#".repeat(width.min(BAR_WIDTH))
}

pub fn streak_line(streak: u32) -> String {
    format!("Streak: {streak} day{}", if streak == 1 { "" } else { "s" })
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%x %H:%M").to_string()
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|v| format!("#{v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn task_line(task: &Task) -> String {
    format!(
        "{}\t[{}]\t{}\t{}\t{}",
        task.id,
        if task.completed { "x" } else { " " },
        format_minutes(task.time_spent as f64),
        task.text,
        format_tags(&task.tags)
    )
}

pub fn session_line(session: &TimerSession) -> String {
    let end = session
        .end_time
        .map(format_time)
        .unwrap_or_else(|| "running".into());
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        session.id,
        format_time(session.start_time),
        end,
        format_minutes(session.duration as f64),
        if session.completed { "done" } else { "abandoned" },
        format_tags(&session.tags)
    )
}
