use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
    storage::entities::{DailyAggregate, Tag},
    utils::percentage::{share_percentage, Percentage},
};

use super::aggregate::DateRange;

#[derive(Debug, Clone, PartialEq)]
pub struct TagUsage {
    pub tag: Tag,
    pub minutes: f64,
    /// Share of the time summed over every tag.
    pub share: Percentage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayUsage {
    pub date: NaiveDate,
    pub tasks: u32,
    pub pomodoros: u32,
    pub minutes: u64,
    pub idle_minutes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub range: DateRange,
    pub total_tasks: u64,
    pub total_pomodoros: u64,
    pub total_minutes: u64,
    pub idle_minutes: u64,
    /// Longest first.
    pub tags: Vec<TagUsage>,
    /// Oldest first.
    pub days: Vec<DayUsage>,
}

/// Totals over `aggregates` plus the time distribution between tags. Tags with no time, or with
/// a share not above `min_percentage`, are left out of the distribution.
pub fn summarize(
    range: DateRange,
    aggregates: &[DailyAggregate],
    min_percentage: Percentage,
) -> Summary {
    let mut by_tag = HashMap::<&str, f64>::new();
    let mut days = Vec::with_capacity(aggregates.len());
    let mut summary = Summary {
        range,
        total_tasks: 0,
        total_pomodoros: 0,
        total_minutes: 0,
        idle_minutes: 0,
        tags: vec![],
        days: vec![],
    };

    for v in aggregates {
        summary.total_tasks += v.total_tasks_completed as u64;
        summary.total_pomodoros += v.total_pomodoro_completed as u64;
        summary.total_minutes += v.total_time_spent;
        summary.idle_minutes += v.idle_time;
        for (tag, minutes) in v.task_time_by_tag.iter() {
            *by_tag.entry(tag.as_str()).or_insert(0.) += minutes;
        }
        days.push(DayUsage {
            date: v.date,
            tasks: v.total_tasks_completed,
            pomodoros: v.total_pomodoro_completed,
            minutes: v.total_time_spent,
            idle_minutes: v.idle_time,
        });
    }
    days.sort_by_key(|v| v.date);

    let tag_sum = by_tag.values().sum::<f64>();
    let mut tags = by_tag
        .into_iter()
        .filter(|(_, minutes)| *minutes > 0.)
        .map(|(tag, minutes)| TagUsage {
            tag: tag.to_owned(),
            minutes,
            share: share_percentage(minutes, tag_sum),
        })
        .filter(|v| *v.share > *min_percentage || *min_percentage == 0.)
        .collect::<Vec<_>>();
    tags.sort_by(|a, b| {
        b.minutes
            .total_cmp(&a.minutes)
            .then_with(|| a.tag.cmp(&b.tag))
    });

    summary.tags = tags;
    summary.days = days;
    summary
}
