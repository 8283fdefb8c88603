use anyhow::{bail, Result};
use clap::Subcommand;

use crate::{productivity::Dashboard, storage::kv::KeyValueStore};

use super::output::format_minutes;

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    #[command(about = "List tags with their colors")]
    List,
    #[command(about = "Add a tag")]
    Add { name: String },
    #[command(about = "Remove a tag. Recorded history keeps it")]
    Remove { name: String },
    #[command(about = "Show or set the color of a tag, as #rrggbb")]
    Color { tag: String, color: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum IdleCommand {
    #[command(about = "Count idle time while the daemon runs")]
    On,
    #[command(about = "Stop counting idle time")]
    Off,
    #[command(about = "Show whether idle time is counted and how much was counted today")]
    Status,
}

pub async fn process_tag_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: TagCommand,
) -> Result<()> {
    let tags = &dashboard.tags;
    match command {
        TagCommand::List => {
            for (tag, color) in tags.colors().await {
                println!("{color}\t{tag}");
            }
        }
        TagCommand::Add { name } => {
            if !tags.add_tag(name.trim()).await? {
                println!("Tag {name} already exists");
            }
        }
        TagCommand::Remove { name } => {
            if !tags.remove_tag(&name).await {
                println!("No tag {name}");
            }
        }
        TagCommand::Color { tag, color: None } => {
            println!("{}", tags.get_color(&tag).await);
        }
        TagCommand::Color {
            tag,
            color: Some(color),
        } => {
            if !is_hex_color(&color) {
                bail!("{color} isn't a #rrggbb color");
            }
            tags.set_color(&tag, &color).await;
        }
    }
    Ok(())
}

pub async fn process_idle_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    command: IdleCommand,
) -> Result<()> {
    match command {
        IdleCommand::On => dashboard.idle.set_enabled(true).await,
        IdleCommand::Off => dashboard.idle.set_enabled(false).await,
        IdleCommand::Status => {
            let enabled = dashboard.idle.is_enabled().await;
            println!(
                "Idle detection is {}",
                if enabled { "on" } else { "off" }
            );
            println!(
                "Idle today: {}",
                format_minutes(dashboard.aggregates.today().await.idle_time as f64)
            );
        }
    }
    Ok(())
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .filter(|v| v.len() == 6)
        .is_some_and(|v| v.chars().all(|c| c.is_ascii_hexdigit()))
}
