//! Offline-first synchronization of local changes.
//!
//! Nothing here talks to a network yet: [`SyncSink`] is the seam where a
//! remote backend plugs in, and [`LogSink`] records what would be sent.

mod queue;
mod sink;
mod types;

pub use queue::OfflineSync;
pub use sink::{LogSink, SyncSink};
pub use types::{
    ActionType, CacheKind, CacheStatus, OfflineAction, OfflineState, SyncInfo, SyncReport,
};
