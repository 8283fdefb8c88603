use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use now::DateTimeNow;

/// This is the standard way of converting a date to a string in focusboard.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns `count` consecutive days ending with `end`, oldest first.
pub fn days_ending_at(end: NaiveDate, count: u64) -> Vec<NaiveDate> {
    (0..count)
        .rev()
        .filter_map(|offset| end.checked_sub_days(Days::new(offset)))
        .collect()
}

/// Local calendar day a timestamp falls on.
pub fn local_date(moment: DateTime<Utc>) -> NaiveDate {
    moment.with_timezone(&Local).date_naive()
}

/// Start of the local day `days_back` days before `moment`.
pub fn local_day_start(moment: DateTime<Utc>, days_back: u64) -> DateTime<Utc> {
    let start = moment.with_timezone(&Local).beginning_of_day();
    start
        .checked_sub_days(Days::new(days_back))
        .unwrap_or(start)
        .with_timezone(&Utc)
}

/// Whole minutes, rounded to the nearest minute.
pub fn rounded_minutes(duration: chrono::Duration) -> u32 {
    let minutes = (duration.num_milliseconds() as f64 / 60_000.).round();
    minutes.clamp(0., u32::MAX as f64) as u32
}
