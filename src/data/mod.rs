use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

pub mod atomic;
pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod snapshot;

pub use self::{
    atomic::AtomicF64,
    counter::AtomicCounter,
    gauge::AtomicGauge,
    histogram::AtomicHistogram,
    snapshot::{Measurement, MeasurementValue, SimpleSnapshot, Snapshot, SummarizedHistogram},
};

/// The kinds of metric a collection holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Histogram => write!(f, "histogram"),
        }
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::AtomicCounter {}
    impl Sealed for super::AtomicGauge {}
    impl Sealed for super::AtomicHistogram {}
}

/// Storage behind one metric instance.
///
/// Implemented for exactly [`AtomicCounter`], [`AtomicGauge`] and [`AtomicHistogram`].
pub trait MetricCell: private::Sealed + Send + Sync + 'static {
    const KIND: MetricKind;
}

impl MetricCell for AtomicCounter {
    const KIND: MetricKind = MetricKind::Counter;
}

impl MetricCell for AtomicGauge {
    const KIND: MetricKind = MetricKind::Gauge;
}

impl MetricCell for AtomicHistogram {
    const KIND: MetricKind = MetricKind::Histogram;
}

/// A labeled percentile.
///
/// This represents a floating-point value from 0 to 100, with a string label to be used for
/// displaying the given percentile.
#[derive(Clone, Debug)]
pub struct Percentile {
    label: String,
    value: f64,
}

impl Percentile {
    /// Gets the label of this percentile.
    pub fn label(&self) -> &str { self.label.as_str() }

    /// Gets the raw percentile value.
    pub fn percentile(&self) -> f64 { self.value }
}

impl PartialEq for Percentile {
    fn eq(&self, other: &Self) -> bool { self.label == other.label }
}

impl Eq for Percentile {}

impl Hash for Percentile {
    fn hash<H: Hasher>(&self, state: &mut H) { self.label.hash(state); }
}

impl From<f64> for Percentile {
    fn from(p: f64) -> Self {
        // Force our value between +0.0 and +100.0.
        let clamped = p.max(0.0);
        let clamped = clamped.min(100.0);

        let raw_label = format!("{}", clamped);
        let label = match raw_label.as_str() {
            "0" => "min".to_string(),
            "100" => "max".to_string(),
            _ => {
                let raw = format!("p{}", clamped);
                raw.replace(".", "")
            },
        };

        Percentile { label, value: clamped }
    }
}

/// The percentiles reported for histograms unless configured otherwise: p50, p90, p95 and p99.
pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile::from(50.0),
        Percentile::from(90.0),
        Percentile::from(95.0),
        Percentile::from(99.0),
    ]
}
