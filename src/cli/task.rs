use anyhow::{bail, Result};
use clap::Subcommand;

use crate::{
    productivity::{aggregate::DateRange, Dashboard},
    storage::kv::KeyValueStore,
};

use super::output::{format_minutes, streak_line, task_line};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(about = "Add a task")]
    Add {
        #[arg(required = true, help = "Text of the task")]
        text: Vec<String>,
        #[arg(long = "tag", short, help = "Tag the task right away. Can be repeated")]
        tags: Vec<String>,
    },
    #[command(about = "List tasks")]
    List {
        #[arg(long, short, help = "Include completed tasks")]
        all: bool,
    },
    #[command(about = "Complete a task, or reopen a completed one")]
    Done { id: String },
    #[command(about = "Delete a task")]
    Delete { id: String },
    #[command(about = "Add a tag to a task")]
    Tag { id: String, tag: String },
    #[command(about = "Remove a tag from a task")]
    Untag { id: String, tag: String },
    #[command(about = "Add minutes to a task. Negative values subtract")]
    Adjust {
        id: String,
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    #[command(about = "Start timing a task, or pause it when it's already timed")]
    Track { id: String },
    #[command(about = "Completed tasks with the most time spent")]
    Top {
        #[arg(long, short, default_value_t = DateRange::Week)]
        range: DateRange,
        #[arg(long, short)]
        tag: Option<String>,
        #[arg(long = "limit", short = 'n', default_value_t = 5)]
        limit: usize,
    },
    #[command(about = "Completed tasks")]
    History {
        #[arg(long, short)]
        tag: Option<String>,
        #[arg(long, short, help = "Only tasks completed within the range")]
        range: Option<DateRange>,
    },
}

pub async fn process_task_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: TaskCommand,
) -> Result<()> {
    match command {
        TaskCommand::Add { text, tags } => {
            for tag in tags.iter() {
                ensure_known_tag(dashboard, tag).await?;
            }
            let task = dashboard.todos.add(&text.join(" ")).await?;
            for tag in tags.iter() {
                dashboard.todos.add_tag(&task.id, tag).await?;
            }
            println!("Added task {}", task.id);
        }
        TaskCommand::List { all } => {
            let active = dashboard.todos.active_task().await;
            for task in dashboard.todos.tasks().await {
                if task.completed && !all {
                    continue;
                }
                if active.as_deref() == Some(task.id.as_str()) {
                    let tracked = dashboard.todos.tracked_minutes(&task.id).await;
                    println!(
                        "{}\ttracking {}",
                        task_line(&task),
                        format_minutes(tracked as f64)
                    );
                } else {
                    println!("{}", task_line(&task));
                }
            }
            println!(
                "Completed today: {}",
                dashboard.todos.completed_today().await
            );
            println!("{}", streak_line(dashboard.streak.current().await));
        }
        TaskCommand::Done { id } => {
            let task = dashboard.todos.toggle(&id).await?;
            if task.completed {
                println!(
                    "Completed \"{}\" after {}",
                    task.text,
                    format_minutes(task.time_spent as f64)
                );
            } else {
                println!("Reopened \"{}\"", task.text);
            }
        }
        TaskCommand::Delete { id } => {
            dashboard.todos.delete(&id).await?;
            println!("Deleted task {id}");
        }
        TaskCommand::Tag { id, tag } => {
            ensure_known_tag(dashboard, &tag).await?;
            if !dashboard.todos.add_tag(&id, &tag).await? {
                println!("Task {id} is already tagged {tag}");
            }
        }
        TaskCommand::Untag { id, tag } => {
            if !dashboard.todos.remove_tag(&id, &tag).await? {
                println!("Task {id} isn't tagged {tag}");
            }
        }
        TaskCommand::Adjust { id, minutes } => {
            let total = dashboard.todos.adjust_time(&id, minutes).await?;
            println!("Task {id} now has {}", format_minutes(total as f64));
        }
        TaskCommand::Track { id } => {
            if dashboard.todos.toggle_timer(&id).await? {
                println!("Timing task {id}");
            } else {
                println!(
                    "Paused task {id} with {} tracked",
                    format_minutes(dashboard.todos.tracked_minutes(&id).await as f64)
                );
            }
        }
        TaskCommand::Top { range, tag, limit } => {
            let tasks = dashboard
                .history
                .top_tasks_by_time_spent(range, tag.as_deref(), limit)
                .await;
            for task in tasks {
                println!("{}", task_line(&task));
            }
        }
        TaskCommand::History { tag, range } => {
            let mut tasks = match range {
                Some(range) => dashboard.history.tasks_in_range(range).await,
                None => dashboard.history.completed_tasks().await,
            };
            if let Some(tag) = tag {
                tasks.retain(|v| v.has_tag(&tag));
            }
            for task in tasks {
                println!("{}", task_line(&task));
            }
        }
    }
    Ok(())
}

async fn ensure_known_tag<S: KeyValueStore>(dashboard: &Dashboard<S>, tag: &str) -> Result<()> {
    if !dashboard.tags.list_tags().await.iter().any(|v| v == tag) {
        bail!("Unknown tag {tag}, add it with `focusboard tag add`");
    }
    Ok(())
}
