use super::types::OfflineAction;
use crate::error::SyncError;

/// Destination for queued actions. A remote backend implements this;
/// until one exists, [`LogSink`] stands in.
pub trait SyncSink: Send + Sync {
    /// Deliver one action. Errors leave the action queued for a retry.
    fn perform(&self, action: &OfflineAction) -> Result<(), SyncError>;
}

/// Accepts every action and records it in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SyncSink for LogSink {
    fn perform(&self, action: &OfflineAction) -> Result<(), SyncError> {
        tracing::info!(
            action_id = %action.id,
            action_type = action.action_type.as_str(),
            retry_count = action.retry_count,
            "syncing action"
        );
        Ok(())
    }
}
