use std::fmt::{Display, Write};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    productivity::{
        aggregate::DateRange,
        insights::{summarize, Summary},
        Dashboard,
    },
    storage::kv::KeyValueStore,
    utils::percentage::Percentage,
};

use super::{
    output::{bar, format_minutes, streak_line},
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(long, short, default_value_t = DateRange::Day)]
    range: DateRange,
    #[arg(
        long = "date",
        short,
        help = "Last day of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(short = 'p', long = "percentage", help = "Only show tags with more than the specified share of time", default_value_t = Percentage::new_opt(0.).unwrap())]
    min_percentage: Percentage,
}

/// Prints totals and the tag distribution of the days in the requested range.
pub async fn process_stats_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    StatsCommand {
        range,
        end_date,
        date_style,
        min_percentage,
    }: StatsCommand,
) -> Result<()> {
    let aggregates = match parse_end_date(end_date, date_style)? {
        Some(end) => dashboard.aggregates.get_range_ending(range, end).await,
        None => dashboard.aggregates.get_range(range).await,
    };
    let summary = summarize(range, &aggregates, min_percentage);
    print!("{}", format_summary(&summary));
    println!();
    println!("{}", streak_line(dashboard.streak.current().await));
    Ok(())
}

fn parse_end_date(end_date: Option<String>, date_style: DateStyle) -> Result<Option<NaiveDate>> {
    let Some(end_date) = end_date else {
        return Ok(None);
    };
    match parse_date_string(&end_date, Local::now(), date_style.into()) {
        Ok(v) => Ok(Some(v.date_naive())),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {e}"),
            )
            .into()),
    }
}

fn format_summary(summary: &Summary) -> String {
    let mut out = String::new();
    let last_day = summary
        .days
        .last()
        .map(|v| v.date.to_string())
        .unwrap_or_default();
    // Writing into a String can't fail
    let _ = writeln!(out, "{} ending {last_day}", summary.range);
    let _ = writeln!(out, "Tasks completed\t{}", summary.total_tasks);
    let _ = writeln!(out, "Pomodoros\t{}", summary.total_pomodoros);
    let _ = writeln!(
        out,
        "Focused\t\t{}",
        format_minutes(summary.total_minutes as f64)
    );
    let _ = writeln!(
        out,
        "Idle\t\t{}",
        format_minutes(summary.idle_minutes as f64)
    );

    if !summary.tags.is_empty() {
        let _ = writeln!(out);
        let longest = summary.tags[0].minutes;
        for usage in summary.tags.iter() {
            let _ = writeln!(
                out,
                "{}%\t{}\t{}\t{}",
                *usage.share as i32,
                format_minutes(usage.minutes),
                usage.tag,
                bar(usage.minutes, longest)
            );
        }
    }

    if summary.days.len() > 1 {
        let _ = writeln!(out);
        let longest = summary.days.iter().map(|v| v.minutes).max().unwrap_or(0);
        for day in summary.days.iter() {
            let _ = writeln!(
                out,
                "{}\t{} tasks\t{} pomodoros\t{}\t{}",
                day.date.format("%a %x"),
                day.tasks,
                day.pomodoros,
                format_minutes(day.minutes as f64),
                bar(day.minutes as f64, longest as f64)
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use crate::{
        productivity::{aggregate::DateRange, insights::summarize},
        storage::entities::DailyAggregate,
        utils::percentage::Percentage,
    };

    use super::{format_summary, parse_end_date, DateStyle};

    #[test]
    fn test_date_styles() {
        let uk = parse_end_date(Some("03/04/2025".into()), DateStyle::Uk).unwrap();
        let us = parse_end_date(Some("03/04/2025".into()), DateStyle::Us).unwrap();

        assert_eq!(uk, NaiveDate::from_ymd_opt(2025, 4, 3));
        assert_eq!(us, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert_eq!(parse_end_date(None, DateStyle::Uk).unwrap(), None);
        assert!(parse_end_date(Some("whenever".into()), DateStyle::Uk).is_err());
    }

    #[test]
    fn test_summary_output() {
        let aggregate = |day: u32, minutes: f64| DailyAggregate {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            total_tasks_completed: 1,
            total_pomodoro_completed: 2,
            total_time_spent: minutes as u64,
            task_time_by_tag: BTreeMap::from([("Deep Work".to_string(), minutes)]),
            idle_time: 0,
        };
        let summary = summarize(
            DateRange::Week,
            &[aggregate(1, 30.), aggregate(2, 45.)],
            Percentage::new_opt(0.).unwrap(),
        );

        let output = format_summary(&summary);

        assert!(output.starts_with("week ending 2024-05-02"));
        assert!(output.contains("Pomodoros\t4"));
        assert!(output.contains("100%\t1h15m\tDeep Work"));
        assert_eq!(output.lines().filter(|v| v.contains("tasks")).count(), 2);
    }
}
