//! Tea profile commands for CLI.

use clap::Subcommand;
use teaflow_core::{Config, TeaProfile, TeaType};

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum TeaAction {
    /// List built-in and user teas
    List,
    /// Show one tea
    Show {
        /// Tea id
        id: String,
    },
    /// Add or replace a user tea
    Add {
        /// Tea id
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// green, black, oolong, white, puerh, herbal or custom
        #[arg(long = "type", default_value = "custom")]
        tea_type: TeaType,
        /// Ideal water temperature in °C
        #[arg(long)]
        temp: f64,
        /// Grams of leaf per ml of water, e.g. 0.0667
        #[arg(long)]
        ratio: f64,
        /// Comma-separated steep durations in seconds
        #[arg(long, value_delimiter = ',')]
        schedule: Vec<u32>,
    },
    /// Remove a user tea
    Remove {
        /// Tea id
        id: String,
    },
}

pub fn run(action: TeaAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        TeaAction::List => {
            let teas = engine.library().all_teas()?;
            for tea in &teas {
                let marker = if tea.is_user() { " (user)" } else { "" };
                println!(
                    "{:<12} {:<20} {:<7} {:>5} °C  {} steeps{marker}",
                    tea.id,
                    tea.name,
                    tea.tea_type,
                    tea.base_temp_c,
                    tea.schedule_or_fallback().len()
                );
            }
        }
        TeaAction::Show { id } => {
            print_json(&engine.tea(&id)?)?;
        }
        TeaAction::Add {
            id,
            name,
            tea_type,
            temp,
            ratio,
            schedule,
        } => {
            let saved = engine.library().save_user_tea(TeaProfile {
                id,
                name,
                tea_type,
                base_temp_c: temp,
                default_ratio: ratio,
                base_schedule_sec: schedule,
                user: Some(true),
            })?;
            println!("Tea saved: {}", saved.id);
        }
        TeaAction::Remove { id } => {
            if engine.library().delete_user_tea(&id)? {
                println!("Tea removed: {id}");
            } else {
                return Err(format!("no user tea with id '{id}'").into());
            }
        }
    }
    Ok(())
}
