use super::Percentile;
use crate::label::{FlatKey, LabelPath};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use hdrhistogram::Histogram as HdrHistogram;
use std::fmt::{self, Display};

/// The value half of a [`Measurement`].
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValue {
    /// Counter delta since the previous collection.
    Counter(f64),
    /// Gauge value at collection time.
    Gauge(f64),
    /// Histogram summary for the samples since the previous collection.
    Histogram(SummarizedHistogram),
}

/// A single labelled value read from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    name: String,
    dimensions: LabelPath,
    value: MeasurementValue,
}

impl Measurement {
    pub fn new(name: impl Into<String>, dimensions: LabelPath, value: MeasurementValue) -> Self {
        Measurement {
            name: name.into(),
            dimensions,
            value,
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn dimensions(&self) -> &LabelPath { &self.dimensions }

    pub fn value(&self) -> &MeasurementValue { &self.value }
}

impl Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            MeasurementValue::Counter(v) => write!(f, "counter {}{} {}", self.name, self.dimensions, v),
            MeasurementValue::Gauge(v) => write!(f, "gauge {}{} {}", self.name, self.dimensions, v),
            MeasurementValue::Histogram(h) => write!(f, "histogram {}{} {}", self.name, self.dimensions, h),
        }
    }
}

/// A point-in-time view of metric data.
#[derive(Default, Debug)]
pub struct Snapshot {
    measurements: Vec<Measurement>,
}

impl Snapshot {
    /// Stores a counter value for the given metric.
    pub(crate) fn set_count(&mut self, name: &str, dimensions: LabelPath, value: f64) {
        self.measurements
            .push(Measurement::new(name, dimensions, MeasurementValue::Counter(value)));
    }

    /// Stores a gauge value for the given metric.
    pub(crate) fn set_gauge(&mut self, name: &str, dimensions: LabelPath, value: f64) {
        self.measurements
            .push(Measurement::new(name, dimensions, MeasurementValue::Gauge(value)));
    }

    /// Stores a histogram summary for the given metric.
    pub(crate) fn set_histogram(&mut self, name: &str, dimensions: LabelPath, summary: SummarizedHistogram) {
        self.measurements
            .push(Measurement::new(name, dimensions, MeasurementValue::Histogram(summary)));
    }

    pub fn len(&self) -> usize { self.measurements.len() }

    pub fn is_empty(&self) -> bool { self.measurements.is_empty() }

    /// Converts this [`Snapshot`] into [`SimpleSnapshot`].
    ///
    /// [`SimpleSnapshot`] provides a programmatic interface to more easily sift through the
    /// metrics within, without needing to evaluate all of them.
    ///
    /// Series are looked up by name and label set, so instances that only differ in label order
    /// (see [`LabelOrdering::Insertion`](crate::LabelOrdering::Insertion)) share an entry: their
    /// counter values are summed, and for gauges and histograms the last one in the snapshot wins.
    pub fn into_simple(self) -> SimpleSnapshot { SimpleSnapshot::from_snapshot(self) }

    /// Converts this [`Snapshot`] to the underlying vector of measurements.
    pub fn into_vec(self) -> Vec<Measurement> { self.measurements }
}

type SeriesMap<V> = HashMap<(String, FlatKey), V, FnvBuildHasher>;

/// A user-friendly metric snapshot that allows easy retrieval of values.
///
/// This is good for programmatic exploration of values, whereas [`Snapshot`] is designed around
/// being consumed by writers that send metrics to external collection systems.
#[derive(Default, Debug)]
pub struct SimpleSnapshot {
    counters: SeriesMap<f64>,
    gauges: SeriesMap<f64>,
    histograms: SeriesMap<SummarizedHistogram>,
}

impl SimpleSnapshot {
    pub(crate) fn from_snapshot(s: Snapshot) -> Self {
        let mut ss = SimpleSnapshot::default();
        for metric in s.into_vec() {
            let key = (metric.name, metric.dimensions.flatten());
            match metric.value {
                MeasurementValue::Counter(value) => {
                    *ss.counters.entry(key).or_insert(0.0) += value;
                },
                MeasurementValue::Gauge(value) => {
                    ss.gauges.insert(key, value);
                },
                MeasurementValue::Histogram(value) => {
                    ss.histograms.insert(key, value);
                },
            }
        }
        ss
    }

    /// Gets the counter value for the given metric name and labels.
    ///
    /// Returns `None` if the series has no counter value in this snapshot.
    pub fn count(&self, name: &str, labels: &LabelPath) -> Option<f64> {
        self.counters.get(&(name.to_owned(), labels.flatten())).cloned()
    }

    /// Gets the gauge value for the given metric name and labels.
    ///
    /// Returns `None` if the series has no gauge value in this snapshot.
    pub fn gauge(&self, name: &str, labels: &LabelPath) -> Option<f64> {
        self.gauges.get(&(name.to_owned(), labels.flatten())).cloned()
    }

    /// Gets the given percentile for the given metric name and labels.
    ///
    /// Returns `None` if the series has no value at the given percentile in this snapshot.
    pub fn histogram(&self, name: &str, labels: &LabelPath, percentile: f64) -> Option<u64> {
        let p = Percentile::from(percentile);
        self.histograms
            .get(&(name.to_owned(), labels.flatten()))
            .and_then(|s| s.measurements().get(&p))
            .cloned()
    }
}

/// Count, extremes and percentiles extracted from a histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizedHistogram {
    count: u64,
    min: u64,
    max: u64,
    mean: f64,
    measurements: HashMap<Percentile, u64, FnvBuildHasher>,
}

impl SummarizedHistogram {
    pub fn from_histogram(histogram: &HdrHistogram<u64>, percentiles: &[Percentile]) -> Self {
        let mut measurements = HashMap::default();
        let count = histogram.len();

        for percentile in percentiles {
            let value = histogram.value_at_percentile(percentile.percentile());
            measurements.insert(percentile.clone(), value);
        }

        // An empty HdrHistogram reports u64::MAX as its minimum.
        let (min, max, mean) = if count == 0 {
            (0, 0, 0.0)
        } else {
            (histogram.min(), histogram.max(), histogram.mean())
        };

        SummarizedHistogram {
            count,
            min,
            max,
            mean,
            measurements,
        }
    }

    pub fn count(&self) -> u64 { self.count }

    pub fn min(&self) -> u64 { self.min }

    pub fn max(&self) -> u64 { self.max }

    pub fn mean(&self) -> f64 { self.mean }

    pub fn measurements(&self) -> &HashMap<Percentile, u64, FnvBuildHasher> { &self.measurements }
}

impl Display for SummarizedHistogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "count={} min={} max={}", self.count, self.min, self.max)?;

        let mut measurements: Vec<(&Percentile, &u64)> = self.measurements.iter().collect();
        measurements.sort_by(|a, b| {
            a.0.percentile()
                .partial_cmp(&b.0.percentile())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (percentile, value) in measurements {
            write!(f, " {}={}", percentile.label(), value)?;
        }
        Ok(())
    }
}
