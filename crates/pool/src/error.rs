use thiserror::Error;

/// Errors raised while building a `ThreadPool`.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The OS refused to start a worker thread.
    #[error("failed to spawn pool worker {slot}: {source}")]
    Spawn {
        /// Worker slot that failed to start
        slot: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}
