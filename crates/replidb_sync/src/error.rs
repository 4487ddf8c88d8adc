//! Error types for the sync target surface.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while serving a sync exchange.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The underlying database operation failed.
    #[error("database error: {0}")]
    Db(#[from] replidb_core::DbError),

    /// The source claims the target acknowledged a generation it never
    /// reached.
    #[error("source {source_replica_uid} claims generation {claimed}, target is at {actual}")]
    InvalidGeneration {
        /// The replica driving the sync.
        source_replica_uid: String,
        /// The generation the source believes this target had confirmed.
        claimed: u64,
        /// The target's actual generation.
        actual: u64,
    },
}
