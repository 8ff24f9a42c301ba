use crate::{
    configuration::Configuration,
    data::{AtomicCounter, AtomicGauge, AtomicHistogram},
    handle::{Counter, Gauge, Histogram, Metric},
    label::LabelPath,
    node::Factory,
    vector::{MetricVector, VectorSet},
};
use hdrhistogram::Histogram as HdrHistogram;
use std::{fmt, sync::Arc};

struct Inner {
    counters: VectorSet<AtomicCounter>,
    gauges: VectorSet<AtomicGauge>,
    histograms: VectorSet<AtomicHistogram>,
}

/// Every metric of an application, by kind and name.
///
/// A collection is cheap to clone: clones share the same metrics, so one can be handed to each
/// thread that records, and one to whatever exports them.
///
/// ```
/// # use metricspace::MetricCollection;
/// let collection = MetricCollection::new();
/// let requests = collection.counter("requests");
///
/// requests.with([("status", "ok")]).increment();
/// requests.with([("status", "error")]).increment();
/// assert_eq!(collection.counters().len(), 2);
/// ```
#[derive(Clone)]
pub struct MetricCollection {
    inner: Arc<Inner>,
}

impl MetricCollection {
    /// Creates a collection with the default configuration.
    pub fn new() -> MetricCollection {
        Configuration::default()
            .build()
            .expect("default histogram bounds and batch size are valid")
    }

    /// Gets a builder to configure a `MetricCollection` with.
    pub fn builder() -> Configuration { Configuration::default() }

    pub(crate) fn from_config(config: Configuration, prototype: HdrHistogram<u64>) -> MetricCollection {
        let counter_factory: Factory<AtomicCounter> = Arc::new(|_: &LabelPath| AtomicCounter::new());
        let gauge_factory: Factory<AtomicGauge> = Arc::new(|_: &LabelPath| AtomicGauge::new());

        let batch_size = config.histogram_batch_size;
        let percentiles = Arc::new(config.percentiles);
        let histogram_factory: Factory<AtomicHistogram> = Arc::new(move |_: &LabelPath| {
            AtomicHistogram::from_prototype(&prototype, batch_size, Arc::clone(&percentiles))
        });

        MetricCollection {
            inner: Arc::new(Inner {
                counters: VectorSet::new(counter_factory, config.ordering),
                gauges: VectorSet::new(gauge_factory, config.ordering),
                histograms: VectorSet::new(histogram_factory, config.ordering),
            }),
        }
    }

    /// Gets the counter called `name` with no labels, creating it if needed.
    pub fn counter(&self, name: &str) -> Counter { self.counter_vector(name).root_metric() }

    /// Gets the gauge called `name` with no labels, creating it if needed.
    pub fn gauge(&self, name: &str) -> Gauge { self.gauge_vector(name).root_metric() }

    /// Gets the histogram called `name` with no labels, creating it if needed.
    pub fn histogram(&self, name: &str) -> Histogram { self.histogram_vector(name).root_metric() }

    pub fn counter_vector(&self, name: &str) -> Arc<MetricVector<AtomicCounter>> {
        self.inner.counters.get_or_create(name)
    }

    pub fn gauge_vector(&self, name: &str) -> Arc<MetricVector<AtomicGauge>> { self.inner.gauges.get_or_create(name) }

    pub fn histogram_vector(&self, name: &str) -> Arc<MetricVector<AtomicHistogram>> {
        self.inner.histograms.get_or_create(name)
    }

    /// Every registered counter, across all names and labels.
    pub fn counters(&self) -> Vec<Counter> { self.inner.counters.metrics() }

    /// Every registered gauge, across all names and labels.
    pub fn gauges(&self) -> Vec<Gauge> { self.inner.gauges.metrics() }

    /// Every registered histogram, across all names and labels.
    pub fn histograms(&self) -> Vec<Histogram> { self.inner.histograms.metrics() }

    /// Every registered metric of every kind.
    pub fn metrics(&self) -> Vec<Metric> {
        let counters = self.counters().into_iter().map(Metric::from);
        let gauges = self.gauges().into_iter().map(Metric::from);
        let histograms = self.histograms().into_iter().map(Metric::from);
        counters.chain(gauges).chain(histograms).collect()
    }

    /// Swaps every counter vector for an empty one, returning what they held.
    ///
    /// See [`MetricVector::reset`] for what happens to handles resolved before the reset.
    pub fn reset_counters(&self) -> Vec<MetricVector<AtomicCounter>> { self.inner.counters.reset_all() }
}

impl Default for MetricCollection {
    fn default() -> Self { MetricCollection::new() }
}

impl fmt::Debug for MetricCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MetricCollection")
            .field("counters", &self.inner.counters.len())
            .field("gauges", &self.inner.gauges.len())
            .field("histograms", &self.inner.histograms.len())
            .finish()
    }
}
