pub mod analytics;
pub mod cache;
pub mod config;
pub mod feedback;
pub mod learning;
pub mod prefs;
pub mod schedule;
pub mod sync;
pub mod tea;
pub mod vessel;

use serde::Serialize;
use teaflow_core::{Config, TeaFlow};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the engine over the on-disk store.
pub fn engine(config: Config) -> Result<TeaFlow, Box<dyn std::error::Error>> {
    Ok(TeaFlow::open(config)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
