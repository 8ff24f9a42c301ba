use crate::{
    collection::MetricCollection,
    data::{default_percentiles, Percentile},
    error::ConfigError,
    label::LabelOrdering,
};
use hdrhistogram::Histogram as HdrHistogram;

/// A configuration builder for [`MetricCollection`].
#[derive(Clone, Debug)]
pub struct Configuration {
    pub(crate) ordering: LabelOrdering,
    pub(crate) histogram_lowest: u64,
    pub(crate) histogram_highest: u64,
    pub(crate) histogram_sigfig: u8,
    pub(crate) histogram_batch_size: usize,
    pub(crate) percentiles: Vec<Percentile>,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            ordering: LabelOrdering::Canonical,
            histogram_lowest: 1,
            histogram_highest: u64::max_value(),
            histogram_sigfig: 3,
            histogram_batch_size: 128,
            percentiles: default_percentiles(),
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration { Default::default() }

    /// Sets how labels added to a metric resolve to an instance.
    ///
    /// Defaults to [`LabelOrdering::Canonical`], where the order labels are added in does not
    /// matter.  [`LabelOrdering::Insertion`] makes the order part of an instance's identity, and
    /// saves a sort on every `with`.
    pub fn ordering(mut self, ordering: LabelOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the range and precision of histograms.
    ///
    /// Defaults to a lowest discernible value of `1`, a highest trackable value of `u64::MAX`
    /// and `3` significant figures.
    ///
    /// Values above `highest` are recorded as `highest`.  Higher precision and wider ranges cost
    /// more memory per histogram; the bounds are checked when the collection is built.
    pub fn histogram_bounds(mut self, lowest: u64, highest: u64, sigfig: u8) -> Self {
        self.histogram_lowest = lowest;
        self.histogram_highest = highest;
        self.histogram_sigfig = sigfig;
        self
    }

    /// Sets the histogram batch size.
    ///
    /// Defaults to `128`.
    ///
    /// Observations are queued and folded into the histogram once this many are pending, or
    /// whenever the histogram is read.  Larger batches mean fewer trips into the estimator, at the
    /// cost of memory held by the queue.
    pub fn histogram_batch_size(mut self, batch_size: usize) -> Self {
        self.histogram_batch_size = batch_size;
        self
    }

    /// Sets the percentiles reported for histograms.
    ///
    /// Defaults to p50, p90, p95 and p99.  Values are clamped to `[0, 100]`.
    pub fn percentiles(mut self, percentiles: &[f64]) -> Self {
        self.percentiles = percentiles.iter().cloned().map(Percentile::from).collect();
        self
    }

    /// Create a [`MetricCollection`] based on this configuration.
    pub fn build(self) -> Result<MetricCollection, ConfigError> {
        let prototype = self.histogram_prototype()?;
        if self.histogram_batch_size == 0 {
            return Err(ConfigError::HistogramBatchSize);
        }

        Ok(MetricCollection::from_config(self, prototype))
    }

    fn histogram_prototype(&self) -> Result<HdrHistogram<u64>, ConfigError> {
        HdrHistogram::new_with_bounds(self.histogram_lowest, self.histogram_highest, self.histogram_sigfig).map_err(
            |reason| ConfigError::HistogramBounds {
                lowest: self.histogram_lowest,
                highest: self.histogram_highest,
                sigfig: self.histogram_sigfig,
                reason,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Configuration;
    use crate::{error::ConfigError, label::LabelOrdering};

    #[test]
    fn test_defaults_build() {
        let config = Configuration::new();
        assert_eq!(config.ordering, LabelOrdering::Canonical);
        assert_eq!(config.histogram_batch_size, 128);
        assert_eq!(config.percentiles.len(), 4);
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_invalid_histogram_bounds() {
        match Configuration::new().histogram_bounds(10, 15, 3).build() {
            Err(ConfigError::HistogramBounds { lowest, highest, .. }) => {
                assert_eq!(lowest, 10);
                assert_eq!(highest, 15);
            },
            other => panic!("expected histogram bounds error, got {:?}", other.map(|_| ())),
        }

        assert!(Configuration::new().histogram_bounds(1, 10_000, 6).build().is_err());
        assert!(Configuration::new().histogram_bounds(1, 10_000, 5).build().is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        match Configuration::new().histogram_batch_size(0).build() {
            Err(ConfigError::HistogramBatchSize) => {},
            other => panic!("expected batch size error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_percentiles() {
        let config = Configuration::new().percentiles(&[0.0, 99.9, 150.0]);
        let labels: Vec<&str> = config.percentiles.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["min", "p999", "max"]);
    }
}
