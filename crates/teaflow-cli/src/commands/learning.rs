use clap::Subcommand;
use teaflow_core::{bucket, Config};

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum LearningAction {
    /// Learned offsets for a tea and vessel
    Show {
        /// Tea id
        tea: String,
        /// Vessel volume in ml
        #[arg(long)]
        vessel: f64,
        /// Number of steeps (default: the tea's schedule length)
        #[arg(long)]
        count: Option<usize>,
    },
    /// Forget everything learned for a tea
    Reset {
        /// Tea id
        tea: String,
    },
}

pub fn run(action: LearningAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        LearningAction::Show { tea, vessel, count } => {
            let count = match count {
                Some(n) => n,
                None => engine.tea(&tea)?.schedule_or_fallback().len(),
            };
            let vessel_bucket = bucket(vessel);
            let offsets = engine.personalization().offsets(&tea, vessel_bucket, count)?;
            print_json(&serde_json::json!({
                "teaId": tea,
                "bucket": vessel_bucket,
                "offsets": offsets,
            }))?;
        }
        LearningAction::Reset { tea } => {
            if engine.personalization().reset(&tea)? {
                println!("cleared learned offsets for {tea}");
            } else {
                println!("nothing learned for {tea}");
            }
        }
    }
    Ok(())
}
