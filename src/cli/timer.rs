use anyhow::{bail, Result};
use clap::Subcommand;

use crate::{
    productivity::Dashboard,
    storage::kv::KeyValueStore,
    timer::state::{TimerMode, TimerSnapshot},
};

use super::output::{format_countdown, format_minutes, session_line};

#[derive(Subcommand, Debug)]
pub enum TimerCommand {
    #[command(about = "Show the countdown")]
    Status,
    #[command(about = "Start or resume the countdown")]
    Start,
    #[command(about = "Pause the countdown")]
    Pause,
    #[command(about = "Stop the countdown and reset it to full length")]
    Reset,
    #[command(about = "Switch between work and break")]
    Mode { mode: TimerMode },
    #[command(about = "Tags credited with the next work session. No tags clears the selection")]
    Tags { tags: Vec<String> },
    #[command(about = "Show or set the length of a work session in minutes")]
    Length { minutes: Option<u32> },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    #[command(about = "List recorded sessions")]
    List {
        #[arg(long, short)]
        tag: Option<String>,
    },
    #[command(about = "Add the time of a session to a task")]
    Link { session_id: String, task_id: String },
    #[command(about = "Sessions finished today that aren't linked to a task")]
    Unlinked,
}

pub async fn process_timer_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: TimerCommand,
) -> Result<()> {
    let timer = &dashboard.timer;
    let snapshot = match command {
        TimerCommand::Status => timer.restore().await,
        TimerCommand::Start => timer.start().await,
        TimerCommand::Pause => timer.pause().await,
        TimerCommand::Reset => timer.reset().await,
        TimerCommand::Mode { mode } => timer.switch_mode(mode).await,
        TimerCommand::Tags { tags } => {
            let known = dashboard.tags.list_tags().await;
            if let Some(tag) = tags.iter().find(|tag| !known.contains(tag)) {
                bail!("Unknown tag {tag}, add it with `focusboard tag add`");
            }
            timer.select_tags(tags).await
        }
        TimerCommand::Length { minutes: None } => {
            println!("Work sessions last {} minutes", timer.work_minutes().await);
            return Ok(());
        }
        TimerCommand::Length {
            minutes: Some(minutes),
        } => timer.set_work_minutes(minutes).await?,
    };
    print_snapshot(dashboard, &snapshot).await;
    Ok(())
}

async fn print_snapshot<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    snapshot: &TimerSnapshot,
) {
    let progress = dashboard.timer.progress(snapshot).await;
    println!(
        "{}\t{}\t{}\t{:.0}% left",
        snapshot.mode,
        format_countdown(snapshot.time_left),
        if snapshot.running { "running" } else { "paused" },
        *progress
    );
    if !snapshot.selected_tags.is_empty() {
        println!("Tags: {}", snapshot.selected_tags.join(", "));
    }
    if let Some(session) = dashboard.timer.active_session().await {
        println!(
            "Session started {} ago",
            format_minutes(session.duration as f64)
        );
    }
    println!(
        "Sessions completed: {}",
        dashboard.timer.sessions_completed().await
    );
}

pub async fn process_session_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: SessionCommand,
) -> Result<()> {
    match command {
        SessionCommand::List { tag } => {
            let sessions = match tag {
                Some(tag) => dashboard.history.sessions_by_tag(&tag).await,
                None => dashboard.history.all_sessions().await,
            };
            for session in sessions {
                println!("{}", session_line(&session));
            }
        }
        SessionCommand::Link {
            session_id,
            task_id,
        } => {
            dashboard
                .recorder
                .sync_session_with_task(&session_id, &task_id)
                .await?;
            println!("Linked session {session_id} to task {task_id}");
        }
        SessionCommand::Unlinked => {
            for session in dashboard.history.unlinked_sessions_today().await {
                println!("{}", session_line(&session));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use crate::{
        productivity::Dashboard,
        storage::{kv::JsonStore, memory_store::MemoryStore},
        timer::state::TimerMode,
        utils::clock::test_clock::ManualClock,
    };

    use super::{process_timer_command, TimerCommand};

    fn dashboard() -> Dashboard<Arc<MemoryStore>> {
        Dashboard::new(
            JsonStore::new(Arc::new(MemoryStore::new())),
            Arc::new(ManualClock::new()),
        )
    }

    #[tokio::test]
    async fn test_start_then_pause() -> Result<()> {
        let dashboard = dashboard();

        process_timer_command(&dashboard, TimerCommand::Start).await?;
        assert!(dashboard.timer.restore().await.running);

        process_timer_command(&dashboard, TimerCommand::Pause).await?;
        assert!(!dashboard.timer.restore().await.running);
        Ok(())
    }

    #[tokio::test]
    async fn test_mode_and_length() -> Result<()> {
        let dashboard = dashboard();

        process_timer_command(&dashboard, TimerCommand::Length { minutes: Some(50) }).await?;
        assert_eq!(dashboard.timer.restore().await.time_left, 50 * 60);

        process_timer_command(
            &dashboard,
            TimerCommand::Mode {
                mode: TimerMode::Break,
            },
        )
        .await?;
        assert_eq!(dashboard.timer.restore().await.mode, TimerMode::Break);

        let invalid = process_timer_command(&dashboard, TimerCommand::Length { minutes: Some(0) });
        assert!(invalid.await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_tags_must_be_registered() -> Result<()> {
        let dashboard = dashboard();

        let unknown = process_timer_command(
            &dashboard,
            TimerCommand::Tags {
                tags: vec!["Gardening".into()],
            },
        )
        .await;
        assert!(unknown.is_err());

        process_timer_command(
            &dashboard,
            TimerCommand::Tags {
                tags: vec!["Learning".into()],
            },
        )
        .await?;
        assert_eq!(
            dashboard.timer.restore().await.selected_tags,
            vec!["Learning".to_string()]
        );
        Ok(())
    }
}
