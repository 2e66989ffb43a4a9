//! Store configuration: a plain struct with a `Default` impl, constructed
//! explicitly by the embedding application rather than read from the
//! process environment (this is a library, not a standalone binary, so
//! IMAP credentials are out of scope here).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Delay after `open()` before the background indexer's first run.
    pub indexer_initial_delay: Duration,
    /// Rows processed per background-indexer batch.
    pub indexer_batch_size: u32,
    /// Cooperative sleep between indexer batches.
    pub indexer_batch_yield: Duration,
    /// Busy timeout applied to the underlying SQLite connection.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            indexer_initial_delay: Duration::from_secs(30),
            indexer_batch_size: 100,
            indexer_batch_yield: Duration::from_millis(50),
            busy_timeout: Duration::from_secs(5),
        }
    }
}
