use clap::Subcommand;
use teaflow_core::Config;

use super::{engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Pending actions, last sync and whether a sync can run
    Status,
    /// Mark the device online and flush the queue
    Online,
    /// Mark the device offline; changes are queued
    Offline,
    /// Run a sync pass now
    Flush,
}

pub fn run(action: SyncAction, config: Config) -> CmdResult {
    let engine = engine(config)?;
    let sync = engine.sync();

    match action {
        SyncAction::Status => print_json(&sync.sync_info()?)?,
        SyncAction::Online => match sync.set_connected(true)? {
            Some(report) => print_json(&report)?,
            None => println!("online"),
        },
        SyncAction::Offline => {
            sync.set_connected(false)?;
            println!("offline");
        }
        SyncAction::Flush => {
            if !sync.is_connected() {
                return Err("offline: nothing can be synced".into());
            }
            match sync.sync_pending()? {
                Some(report) => print_json(&report)?,
                None => println!("sync already in progress"),
            }
        }
    }
    Ok(())
}
