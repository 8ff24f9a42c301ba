use thiserror::Error;

/// Errors while building a [`MetricCollection`](crate::MetricCollection).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The histogram bounds or precision were rejected by the estimator.
    #[error("invalid histogram bounds (lowest {lowest}, highest {highest}, {sigfig} significant figures): {reason:?}")]
    HistogramBounds {
        lowest: u64,
        highest: u64,
        sigfig: u8,
        reason: hdrhistogram::CreationError,
    },

    /// Histogram samples must be folded in batches of at least one.
    #[error("histogram batch size must be at least 1")]
    HistogramBatchSize,
}

/// Errors while writing metrics to a backend.
///
/// Batches that failed are dropped; the values they carried are not put back.
#[derive(Debug, Error)]
#[error("{errors} errors occurred during send ({dropped} measurements dropped), last error: {last}")]
pub struct WriteError {
    pub errors: usize,
    pub dropped: usize,
    #[source]
    pub last: Box<dyn std::error::Error + Send + Sync>,
}
