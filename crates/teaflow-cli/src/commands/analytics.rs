use clap::Subcommand;
use teaflow_core::Config;

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum AnalyticsAction {
    /// Rolling statistics for a tea
    Show {
        /// Tea id
        tea: String,
    },
    /// Suggested time and temperature changes
    Recommend {
        /// Tea id
        tea: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: AnalyticsAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        AnalyticsAction::Show { tea } => {
            let analytics = engine.feedback().tea_analytics(&tea)?;
            print_json(&analytics)?;
        }
        AnalyticsAction::Recommend { tea, json } => {
            let rec = engine.feedback().recommended_adjustments(&tea)?;
            if json {
                return print_json(&rec);
            }
            println!("Time: {}", rec.time_adjustment);
            println!("Temperature: {}", rec.temp_adjustment);
            println!("Confidence: {}%", rec.confidence);
        }
    }
    Ok(())
}
