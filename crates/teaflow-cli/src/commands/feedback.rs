use clap::Subcommand;
use teaflow_core::{Config, NewBrewFeedback, Strength};

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum FeedbackAction {
    /// Rate a finished steep
    Add {
        /// Tea id
        #[arg(long)]
        tea: String,
        /// Zero-based steep index
        #[arg(long)]
        steep: usize,
        /// Vessel volume in ml
        #[arg(long)]
        vessel: f64,
        /// Water temperature in °C
        #[arg(long)]
        temp: f64,
        /// How long the steep actually ran, in seconds
        #[arg(long)]
        actual: f64,
        /// weak, perfect or strong
        #[arg(long)]
        strength: Strength,
        /// 1 (disliked) to 5 (loved)
        #[arg(long, default_value = "3")]
        enjoyment: u8,
    },
    /// List recorded feedback, newest first
    List {
        /// Only this tea
        #[arg(long)]
        tea: Option<String>,
    },
}

pub fn run(action: FeedbackAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        FeedbackAction::Add {
            tea,
            steep,
            vessel,
            temp,
            actual,
            strength,
            enjoyment,
        } => {
            // reject typos before anything is learned
            engine.tea(&tea)?;
            let saved = engine.feedback().save_brew_feedback(NewBrewFeedback {
                tea_id: tea,
                steep_index: steep,
                vessel_ml: vessel,
                temp_c: temp,
                actual_sec: actual,
                strength,
                enjoyment,
            })?;
            print_json(&saved)?;
        }
        FeedbackAction::List { tea } => {
            let records = match tea {
                Some(tea_id) => engine.feedback().feedback_for(&tea_id)?,
                None => {
                    let mut all = engine.feedback().brew_feedbacks()?;
                    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                    all
                }
            };
            print_json(&records)?;
        }
    }
    Ok(())
}
