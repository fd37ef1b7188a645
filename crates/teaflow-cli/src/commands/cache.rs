use clap::Subcommand;
use teaflow_core::Config;

use super::{engine, CmdResult};

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop learned offsets, feedback, user teas and prefs (keeps the sync queue)
    Clear,
    /// Bytes stored under teaflow keys
    Size,
}

pub fn run(action: CacheAction, config: Config) -> CmdResult {
    let engine = engine(config)?;

    match action {
        CacheAction::Clear => {
            let removed = engine.sync().clear_cache()?;
            println!("cleared {removed} cached entries");
        }
        CacheAction::Size => println!("{}", engine.sync().cache_size()?),
    }
    Ok(())
}
