use super::{snapshot::SummarizedHistogram, Percentile};
use crossbeam_channel::{unbounded, Receiver, Sender};
use hdrhistogram::Histogram as HdrHistogram;
use parking_lot::Mutex;
use std::{fmt, sync::Arc};

/// Approximate-quantile histogram storage.
///
/// Observations are pushed onto a lock-free queue and folded into the underlying
/// `HdrHistogram` in batches: by whichever observer notices the queue has reached `batch_size`
/// and manages to grab the estimator uncontended, or by a reader.  Recording never waits on a
/// lock.
pub struct AtomicHistogram {
    samples_tx: Sender<u64>,
    samples_rx: Receiver<u64>,
    inner: Mutex<HdrHistogram<u64>>,
    batch_size: usize,
    percentiles: Arc<Vec<Percentile>>,
}

impl AtomicHistogram {
    /// Creates an empty histogram with the same bounds and precision as `prototype`.
    pub fn from_prototype(prototype: &HdrHistogram<u64>, batch_size: usize, percentiles: Arc<Vec<Percentile>>) -> Self {
        let (samples_tx, samples_rx) = unbounded();
        AtomicHistogram {
            samples_tx,
            samples_rx,
            inner: Mutex::new(HdrHistogram::new_from(prototype)),
            batch_size: batch_size.max(1),
            percentiles,
        }
    }

    /// Records a single sample.
    ///
    /// `NaN` is ignored, negative values are recorded as zero, and values above the highest
    /// trackable value are recorded as that value.
    pub fn observe(&self, value: f64) {
        if value.is_nan() {
            return;
        }

        // Float to int casts saturate.
        let sample = value.max(0.0).round() as u64;
        let _ = self.samples_tx.send(sample);

        if self.samples_rx.len() >= self.batch_size {
            if let Some(mut histogram) = self.inner.try_lock() {
                self.fold(&mut histogram);
            }
        }
    }

    /// Summarizes everything recorded so far.
    pub fn summary(&self) -> SummarizedHistogram {
        let mut histogram = self.inner.lock();
        self.fold(&mut histogram);
        SummarizedHistogram::from_histogram(&histogram, &self.percentiles)
    }

    /// Summarizes everything recorded so far, and clears the histogram.
    ///
    /// Samples recorded while the summary is being taken are kept for the next one.
    pub fn summary_reset(&self) -> SummarizedHistogram {
        let mut histogram = self.inner.lock();
        self.fold(&mut histogram);
        let summary = SummarizedHistogram::from_histogram(&histogram, &self.percentiles);
        histogram.reset();
        summary
    }

    /// A copy of the underlying histogram, including any queued samples.
    pub fn to_hdr(&self) -> HdrHistogram<u64> {
        let mut histogram = self.inner.lock();
        self.fold(&mut histogram);
        histogram.clone()
    }

    fn fold(&self, histogram: &mut HdrHistogram<u64>) {
        // Bounded so a steady stream of observers can't keep a reader here forever.
        let pending = self.samples_rx.len();
        for sample in self.samples_rx.try_iter().take(pending) {
            histogram.saturating_record(sample);
        }
    }
}

impl fmt::Debug for AtomicHistogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AtomicHistogram")
            .field("pending", &self.samples_rx.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::AtomicHistogram;
    use crate::data::{default_percentiles, Percentile};
    use hdrhistogram::Histogram as HdrHistogram;
    use std::{sync::Arc, thread};

    fn histogram(batch_size: usize) -> AtomicHistogram {
        let prototype = HdrHistogram::<u64>::new_with_bounds(1, u64::max_value(), 3).unwrap();
        AtomicHistogram::from_prototype(&prototype, batch_size, Arc::new(default_percentiles()))
    }

    #[test]
    fn test_histogram_simple_update() {
        let histogram = histogram(128);
        histogram.observe(1245.0);

        let summary = histogram.summary();
        assert_eq!(summary.count(), 1);
        assert_eq!(summary.max(), 1245);
        assert_eq!(summary.min(), 1245);
    }

    #[test]
    fn test_histogram_clamps_values() {
        let histogram = histogram(1);
        histogram.observe(f64::NAN);
        histogram.observe(-5.0);
        histogram.observe(f64::INFINITY);

        let hdr = histogram.to_hdr();
        assert_eq!(hdr.len(), 2);
        assert_eq!(hdr.min(), 0);
        assert!(hdr.max() > 1_000_000_000_000);
    }

    #[test]
    fn test_histogram_percentiles() {
        let histogram = histogram(16);
        for value in 1..=100 {
            histogram.observe(value as f64);
        }

        let summary = histogram.summary();
        assert_eq!(summary.count(), 100);
        assert_eq!(summary.measurements().get(&Percentile::from(50.0)), Some(&50));
        assert_eq!(summary.measurements().get(&Percentile::from(99.0)), Some(&99));
        assert!(summary.measurements().get(&Percentile::from(63.0)).is_none());
    }

    #[test]
    fn test_histogram_summary_reset() {
        let histogram = histogram(4);
        histogram.observe(10.0);
        histogram.observe(20.0);

        assert_eq!(histogram.summary_reset().count(), 2);
        assert_eq!(histogram.summary().count(), 0);

        histogram.observe(30.0);
        assert_eq!(histogram.summary_reset().count(), 1);
    }

    #[test]
    fn test_histogram_concurrent_observers() {
        let histogram = Arc::new(histogram(32));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let histogram = Arc::clone(&histogram);
                thread::spawn(move || {
                    for value in 0..5_000u64 {
                        histogram.observe((value + i) as f64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(histogram.summary().count(), 40_000);
    }
}
