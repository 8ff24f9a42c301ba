//! Dimensioned metrics: named counters, gauges and histograms that can be narrowed down by labels.
//!
//! Every metric lives in a [`MetricCollection`].  Asking the collection for a metric by name gives
//! back its instance with no labels, and [`with`](Dimensioned::with) gives back a more specific
//! instance:
//!
//! ```
//! use metricspace::MetricCollection;
//!
//! let collection = MetricCollection::new();
//! let requests = collection.counter("requests");
//!
//! let ok = requests.with([("status", "ok")]);
//! ok.increment();
//! ok.increment();
//! requests.with([("status", "error"), ("caller", "johnnie")]).increment();
//!
//! for counter in collection.counters() {
//!     println!("{}{} = {}", counter.name(), counter.dimensions(), counter.value_reset());
//! }
//! ```
//!
//! Instances are created on first use and live as long as the collection, so asking for the same
//! labels twice always lands on the same instance, from any thread.  A [`Writer`] periodically
//! drains the collection into a [`Backend`].
mod collection;
mod configuration;
mod data;
mod error;
mod handle;
mod label;
mod node;
mod vector;
mod writer;

pub use self::{
    collection::MetricCollection,
    configuration::Configuration,
    data::{
        default_percentiles, AtomicCounter, AtomicF64, AtomicGauge, AtomicHistogram, Measurement, MeasurementValue,
        MetricCell, MetricKind, Percentile, SimpleSnapshot, Snapshot, SummarizedHistogram,
    },
    error::{ConfigError, WriteError},
    handle::{Counter, Dimensioned, Gauge, Histogram, Metric},
    label::{flatten, merge, FlatKey, IntoLabels, Label, LabelOrdering, LabelPath, LabelSet, UNKNOWN_LABEL_VALUE},
    node::Factory,
    vector::{MetricVector, VectorSet},
    writer::{Backend, LogBackend, WriteReport, Writer, DEFAULT_BATCH_SIZE},
};
