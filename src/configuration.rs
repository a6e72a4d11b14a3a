use serde::{Deserialize, Serialize};

const SYNC_ON_COMMIT: bool = false;

/// Durability policy of the log.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogConfiguration {
    /// Flush the log file to disk after every committed batch. Off by
    /// default: the file is append-only and a torn trailing write is
    /// discarded on recovery, so batching flushes is safe.
    #[serde(default)]
    pub sync_on_commit: bool,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            sync_on_commit: SYNC_ON_COMMIT,
        }
    }
}
