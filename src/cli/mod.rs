pub mod output;
pub mod process;
pub mod stats;
pub mod tag;
pub mod task;
pub mod timer;
pub mod transfer;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_servers, restart_server, server_executables};
use stats::{process_stats_command, StatsCommand};
use tag::{process_idle_command, process_tag_command, IdleCommand, TagCommand};
use task::{process_task_command, TaskCommand};
use timer::{process_session_command, process_timer_command, SessionCommand, TimerCommand};
use tracing::{debug, level_filters::LevelFilter};
use transfer::{process_export_command, process_import_command};

use crate::{
    daemon::start_daemon,
    productivity::{open_dashboard, Dashboard},
    storage::kv::KeyValueStore,
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "focusboard", version, long_about = None)]
#[command(about = "Tasks, a pomodoro timer and daily productivity statistics in the terminal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon that runs the timer and counts idle time")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon.")]
    Stop,
    #[command(about = "Manage the todo list")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    #[command(about = "Control the pomodoro countdown")]
    Timer {
        #[command(subcommand)]
        command: TimerCommand,
    },
    #[command(about = "Recorded pomodoro sessions")]
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    #[command(about = "Manage tags")]
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
    #[command(about = "Display statistics of a day, week or month")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Export all data as json")]
    Export {
        #[arg(long, short, help = "File to write into. Prints to stdout by default")]
        output: Option<PathBuf>,
    },
    #[command(about = "Replace all data with a previously exported json file")]
    Import { file: PathBuf },
    #[command(about = "Idle time detection")]
    Idle {
        #[command(subcommand)]
        command: IdleCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = if matches!(args.commands, Commands::Serve) {
        DAEMON_PREFIX
    } else {
        CLI_PREFIX
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init => {
            restart_server(&app_dir)?;
            Ok(())
        }
        Commands::Stop => {
            kill_previous_servers(&server_executables()?)?;
            Ok(())
        }
        Commands::Serve => {
            start_daemon(app_dir).await?;
            Ok(())
        }
        command => {
            let dashboard = open_dashboard(&app_dir)?;
            process_command(&dashboard, command).await
        }
    }
}

/// Every command starts by catching the countdown up with the time that passed since the last
/// invocation, and counts as a visit for the streak.
async fn process_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: Commands,
) -> Result<()> {
    let snapshot = dashboard.timer.restore().await;
    debug!("Timer restored {snapshot:?}");
    dashboard.streak.record_visit().await;

    match command {
        Commands::Task { command } => process_task_command(dashboard, command).await,
        Commands::Timer { command } => process_timer_command(dashboard, command).await,
        Commands::Session { command } => process_session_command(dashboard, command).await,
        Commands::Tag { command } => process_tag_command(dashboard, command).await,
        Commands::Stats { command } => process_stats_command(dashboard, command).await,
        Commands::Export { output } => process_export_command(dashboard, output).await,
        Commands::Import { file } => process_import_command(dashboard, file).await,
        Commands::Idle { command } => process_idle_command(dashboard, command).await,
        Commands::Init | Commands::Serve | Commands::Stop => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::Duration;
    use clap::Parser;

    use crate::{
        productivity::Dashboard,
        storage::{entities::decode_sessions, keys, kv::JsonStore, memory_store::MemoryStore},
        timer::state::TimerMode,
        utils::clock::test_clock::ManualClock,
    };

    use super::{process_command, Args, Commands};

    #[test]
    fn test_parse_nested_commands() {
        let args = Args::parse_from(["focusboard", "--dir", "/tmp/x", "task", "adjust", "1", "-5"]);
        assert!(matches!(args.commands, Commands::Task { .. }));
        assert_eq!(args.dir.unwrap().to_string_lossy(), "/tmp/x");

        let args = Args::parse_from(["focusboard", "stats", "--range", "week", "-p", "5%"]);
        assert!(matches!(args.commands, Commands::Stats { .. }));

        assert!(Args::try_parse_from(["focusboard", "timer", "mode", "nap"]).is_err());
    }

    #[tokio::test]
    async fn test_any_command_catches_up_the_timer() -> Result<()> {
        let clock = ManualClock::new();
        let store = JsonStore::new(Arc::new(MemoryStore::new()));
        let dashboard = Dashboard::new(store.clone(), Arc::new(clock.clone()));
        dashboard.timer.start().await;
        clock.advance(Duration::minutes(30));

        let command = Args::parse_from(["focusboard", "tag", "list"]).commands;
        process_command(&dashboard, command).await?;

        let sessions = decode_sessions(store.read_value(keys::POMODORO_SESSIONS).await);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration, 30);
        assert_eq!(dashboard.timer.restore().await.mode, TimerMode::Break);
        Ok(())
    }

    #[tokio::test]
    async fn test_commands_count_towards_streak() -> Result<()> {
        let clock = ManualClock::new();
        let dashboard = Dashboard::new(
            JsonStore::new(Arc::new(MemoryStore::new())),
            Arc::new(clock.clone()),
        );

        for _ in 0..2 {
            let command = Args::parse_from(["focusboard", "task", "list"]).commands;
            process_command(&dashboard, command).await?;
        }
        assert_eq!(dashboard.streak.current().await, 1);

        clock.advance(Duration::days(1));
        let command = Args::parse_from(["focusboard", "idle", "status"]).commands;
        process_command(&dashboard, command).await?;
        assert_eq!(dashboard.streak.current().await, 2);
        Ok(())
    }
}
