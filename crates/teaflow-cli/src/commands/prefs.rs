use clap::Subcommand;
use teaflow_core::{Config, TeaPrefs};

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show saved settings for a tea
    Get {
        /// Tea id
        tea: String,
    },
    /// Save settings for a tea; omitted fields keep their value
    Set {
        /// Tea id
        tea: String,
        /// Vessel volume in ml
        #[arg(long)]
        vessel: Option<f64>,
        /// Water temperature in °C
        #[arg(long)]
        temp: Option<f64>,
    },
}

pub fn run(action: PrefsAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        PrefsAction::Get { tea } => {
            print_json(&engine.library().tea_prefs(&tea)?)?;
        }
        PrefsAction::Set { tea, vessel, temp } => {
            let merged = engine.library().set_tea_prefs(
                &tea,
                TeaPrefs {
                    vessel_ml: vessel,
                    temp_c: temp,
                },
            )?;
            print_json(&merged)?;
        }
    }
    Ok(())
}
