use crate::{
    data::{AtomicCounter, AtomicGauge, AtomicHistogram, MetricCell, MetricKind, SummarizedHistogram},
    label::{FlatKey, IntoLabels, LabelPath, LabelSet},
    node::Node,
    vector::Shared,
};
use std::{fmt, sync::Arc};

/// A metric instance: one metric name narrowed down to one combination of labels.
///
/// Handles are cheap to clone, and any number of threads can record into the same instance.  Use
/// [`with`](Dimensioned::with) to get an instance with more labels; asking for the same labels
/// twice always gives back the same instance.
pub struct Dimensioned<M> {
    shared: Arc<Shared<M>>,
    root: Arc<Node<M>>,
    node: Arc<Node<M>>,
}

/// A counter: an accumulating value, reported and reset by exporters.
pub type Counter = Dimensioned<AtomicCounter>;

/// A gauge: a value that is set, and read in place.
pub type Gauge = Dimensioned<AtomicGauge>;

/// A histogram: a distribution of observed values, summarized as percentiles.
pub type Histogram = Dimensioned<AtomicHistogram>;

impl<M: MetricCell> Dimensioned<M> {
    pub(crate) fn new(shared: Arc<Shared<M>>, root: Arc<Node<M>>, node: Arc<Node<M>>) -> Self {
        Dimensioned { shared, root, node }
    }

    /// Name of the metric.
    pub fn name(&self) -> &str { &self.shared.name }

    /// Labels of this instance.
    ///
    /// The order is the order in which the labels were resolved: sorted by key unless the
    /// collection uses [`LabelOrdering::Insertion`](crate::LabelOrdering::Insertion).
    pub fn dimensions(&self) -> &LabelPath { self.node.labels() }

    /// Labels of this instance, as a set.
    pub fn label_set(&self) -> LabelSet { self.node.labels().to_set() }

    /// Canonical encoding of the labels of this instance.
    pub fn flat_key(&self) -> FlatKey { self.node.labels().flatten() }

    pub fn kind(&self) -> MetricKind { M::KIND }

    /// Gets the instance with the labels of this one plus `labels`.
    ///
    /// A label whose key is already present replaces the existing value.  The instance is always
    /// resolved in the vector's current tree, even if this handle predates a reset.
    ///
    /// ```
    /// # use metricspace::MetricCollection;
    /// let collection = MetricCollection::new();
    /// let requests = collection.counter("requests");
    ///
    /// let ok = requests.with([("status", "ok")]);
    /// let johnnie = ok.with([("caller", "johnnie")]);
    /// assert!(johnnie.same_instance(&requests.with([("caller", "johnnie"), ("status", "ok")])));
    /// ```
    pub fn with<L: IntoLabels>(&self, labels: L) -> Self {
        let current = self.node.labels();
        let target = current.specialize(labels.into_labels(), self.shared.ordering);
        let root = self.shared.current_root();

        let node = if Arc::ptr_eq(&root, &self.root) && target.starts_with(current) {
            self.node.descend(&target[current.len()..], &self.shared.factory)
        } else {
            root.descend(&target, &self.shared.factory)
        };
        node.register();

        Dimensioned::new(Arc::clone(&self.shared), root, node)
    }

    /// Gets the instance with the labels of this one plus an alternating list of keys and values.
    ///
    /// A list of odd length has its last key paired with `"unknown"`.
    pub fn with_values<S: AsRef<str>>(&self, values: &[S]) -> Self { self.with(LabelPath::from_values(values)) }

    /// Whether `other` is the very same instance as this one.
    pub fn same_instance(&self, other: &Self) -> bool { Arc::ptr_eq(&self.node, &other.node) }

    #[inline]
    fn touch(&self) -> &M {
        self.node.register();
        self.node.metric()
    }
}

impl Dimensioned<AtomicCounter> {
    /// Adds `delta` to the counter.
    pub fn add(&self, delta: f64) { self.touch().add(delta) }

    /// Adds one to the counter.
    pub fn increment(&self) { self.add(1.0) }

    /// Current value of the counter.
    pub fn value(&self) -> f64 { self.node.metric().value() }

    /// Returns the current value of the counter and resets it to zero, atomically.
    pub fn value_reset(&self) -> f64 { self.node.metric().value_reset() }
}

impl Dimensioned<AtomicGauge> {
    pub fn set(&self, value: f64) { self.touch().set(value) }

    pub fn increment(&self, delta: f64) { self.touch().increment(delta) }

    pub fn decrement(&self, delta: f64) { self.touch().decrement(delta) }

    pub fn value(&self) -> f64 { self.node.metric().value() }
}

impl Dimensioned<AtomicHistogram> {
    /// Records a single value.
    pub fn observe(&self, value: f64) { self.touch().observe(value) }

    /// Summarizes every value recorded so far.
    pub fn summary(&self) -> SummarizedHistogram { self.node.metric().summary() }

    /// Summarizes every value recorded so far, and clears the histogram in place.
    pub fn summary_reset(&self) -> SummarizedHistogram { self.node.metric().summary_reset() }
}

impl<M> Clone for Dimensioned<M> {
    fn clone(&self) -> Self {
        Dimensioned {
            shared: Arc::clone(&self.shared),
            root: Arc::clone(&self.root),
            node: Arc::clone(&self.node),
        }
    }
}

impl<M: MetricCell> fmt::Debug for Dimensioned<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dimensioned")
            .field("kind", &M::KIND)
            .field("name", &self.shared.name)
            .field("dimensions", self.node.labels())
            .finish()
    }
}

/// Any metric instance, whatever its kind.
#[derive(Clone, Debug)]
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Counter(m) => m.name(),
            Metric::Gauge(m) => m.name(),
            Metric::Histogram(m) => m.name(),
        }
    }

    pub fn dimensions(&self) -> &LabelPath {
        match self {
            Metric::Counter(m) => m.dimensions(),
            Metric::Gauge(m) => m.dimensions(),
            Metric::Histogram(m) => m.dimensions(),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
        }
    }
}

impl From<Counter> for Metric {
    fn from(m: Counter) -> Self { Metric::Counter(m) }
}

impl From<Gauge> for Metric {
    fn from(m: Gauge) -> Self { Metric::Gauge(m) }
}

impl From<Histogram> for Metric {
    fn from(m: Histogram) -> Self { Metric::Histogram(m) }
}
