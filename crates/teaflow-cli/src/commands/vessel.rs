use clap::Subcommand;
use teaflow_core::{bucket, snap_vessel};

use super::CmdResult;

#[derive(Subcommand)]
pub enum VesselAction {
    /// Which learning bucket a volume falls into
    Bucket {
        /// Vessel volume in ml
        ml: f64,
    },
    /// Nearest standard vessel size
    Snap {
        /// Vessel volume in ml
        ml: f64,
    },
}

pub fn run(action: VesselAction) -> CmdResult {
    match action {
        VesselAction::Bucket { ml } => println!("{}", bucket(ml)),
        VesselAction::Snap { ml } => println!("{}", snap_vessel(ml)),
    }
    Ok(())
}
