use crate::{
    data::{AtomicCounter, MetricCell},
    handle::Dimensioned,
    label::{IntoLabels, LabelOrdering},
    node::{Factory, Node},
};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::{fmt, sync::Arc};

/// What every node and handle of one vector has in common.
pub(crate) struct Shared<M> {
    pub(crate) name: String,
    pub(crate) factory: Factory<M>,
    pub(crate) ordering: LabelOrdering,
    root: RwLock<Arc<Node<M>>>,
}

impl<M> Shared<M> {
    fn new(name: String, factory: Factory<M>, ordering: LabelOrdering, root: Arc<Node<M>>) -> Self {
        Shared {
            name,
            factory,
            ordering,
            root: RwLock::new(root),
        }
    }

    /// Root of the tree new instances are resolved in.
    pub(crate) fn current_root(&self) -> Arc<Node<M>> { self.root.read().clone() }
}

/// Every labelled instance of one metric name and kind.
///
/// The instances are organized as a tree: the root holds the metric with no labels, and each level
/// down adds one label.
pub struct MetricVector<M> {
    shared: Arc<Shared<M>>,
}

impl<M: MetricCell> MetricVector<M> {
    /// Creates an empty vector whose metrics are built by `factory`.
    pub fn new(name: impl Into<String>, factory: Factory<M>, ordering: LabelOrdering) -> Self {
        let root = Node::root(&factory);
        MetricVector {
            shared: Arc::new(Shared::new(name.into(), factory, ordering, root)),
        }
    }

    pub fn name(&self) -> &str { &self.shared.name }

    pub fn ordering(&self) -> LabelOrdering { self.shared.ordering }

    /// The metric with no labels.
    pub fn root_metric(&self) -> Dimensioned<M> {
        let root = self.shared.current_root();
        Dimensioned::new(Arc::clone(&self.shared), Arc::clone(&root), root)
    }

    /// The metric with exactly `labels`.
    pub fn with<L: IntoLabels>(&self, labels: L) -> Dimensioned<M> { self.root_metric().with(labels) }

    /// Every registered metric currently in this vector.
    ///
    /// A metric is registered once it was resolved through `with`, or once it recorded a value.
    pub fn metrics(&self) -> Vec<Dimensioned<M>> {
        let root = self.shared.current_root();
        root.nodes()
            .into_iter()
            .filter(|node| node.is_registered())
            .map(|node| Dimensioned::new(Arc::clone(&self.shared), Arc::clone(&root), node))
            .collect()
    }
}

impl MetricVector<AtomicCounter> {
    /// Swaps in an empty tree, returning everything recorded so far as a detached vector.
    ///
    /// Every `with` after the swap resolves in the new tree, including `with` on handles obtained
    /// before it, while the returned vector can be drained at leisure.  Updates made directly on an
    /// instance resolved before the swap still land in that instance, and only show up in the
    /// detached vector.
    ///
    /// Only counters can be reset this way.  Gauges and histograms are read in place.
    pub fn reset(&self) -> MetricVector<AtomicCounter> {
        let fresh = Node::root(&self.shared.factory);
        let old = std::mem::replace(&mut *self.shared.root.write(), fresh);
        log::debug!("reset counter vector {}", self.shared.name);

        let detached = Shared::new(
            self.shared.name.clone(),
            Arc::clone(&self.shared.factory),
            self.shared.ordering,
            old,
        );
        MetricVector {
            shared: Arc::new(detached),
        }
    }
}

impl<M> fmt::Debug for MetricVector<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MetricVector")
            .field("name", &self.shared.name)
            .field("ordering", &self.shared.ordering)
            .finish()
    }
}

type Vectors<M> = HashMap<String, Arc<MetricVector<M>>, FnvBuildHasher>;

/// Metric vectors of one kind, by name.
pub struct VectorSet<M> {
    vectors: RwLock<Vectors<M>>,
    factory: Factory<M>,
    ordering: LabelOrdering,
}

impl<M: MetricCell> VectorSet<M> {
    /// Creates an empty set whose vectors build their metrics with `factory`.
    pub fn new(factory: Factory<M>, ordering: LabelOrdering) -> Self {
        VectorSet {
            vectors: RwLock::new(Vectors::default()),
            factory,
            ordering,
        }
    }

    /// Gets the vector called `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<Arc<MetricVector<M>>> { self.vectors.read().get(name).cloned() }

    /// Gets the vector called `name`, creating it if needed.
    ///
    /// Creation is double-checked under an upgradable lock, so concurrent callers always agree on
    /// a single vector per name.
    pub fn get_or_create(&self, name: &str) -> Arc<MetricVector<M>> {
        if let Some(vector) = self.get(name) {
            return vector;
        }

        let vectors = self.vectors.upgradable_read();
        if let Some(vector) = vectors.get(name) {
            return Arc::clone(vector);
        }

        let vector = Arc::new(MetricVector::new(name, Arc::clone(&self.factory), self.ordering));
        let mut vectors = RwLockUpgradableReadGuard::upgrade(vectors);
        vectors.insert(name.to_owned(), Arc::clone(&vector));
        log::debug!("registered {} vector {}", M::KIND, name);
        vector
    }

    /// Names of every vector in this set.
    pub fn names(&self) -> Vec<String> { self.vectors.read().keys().cloned().collect() }

    pub fn len(&self) -> usize { self.vectors.read().len() }

    pub fn is_empty(&self) -> bool { self.vectors.read().is_empty() }

    /// Every registered metric of every vector in this set.
    ///
    /// The result is a snapshot: the name map is only locked while the vectors are listed.
    pub fn metrics(&self) -> Vec<Dimensioned<M>> {
        let vectors: Vec<Arc<MetricVector<M>>> = self.vectors.read().values().cloned().collect();
        vectors.iter().flat_map(|vector| vector.metrics()).collect()
    }
}

impl VectorSet<AtomicCounter> {
    /// Resets every counter vector, returning the detached vectors.
    pub fn reset_all(&self) -> Vec<MetricVector<AtomicCounter>> {
        let vectors: Vec<Arc<MetricVector<AtomicCounter>>> = self.vectors.read().values().cloned().collect();
        vectors.iter().map(|vector| vector.reset()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricVector, VectorSet};
    use crate::{
        data::AtomicCounter,
        label::{LabelOrdering, LabelPath},
        node::Factory,
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
    };

    fn counter_factory() -> Factory<AtomicCounter> { Arc::new(|_: &LabelPath| AtomicCounter::new()) }

    #[test]
    fn test_root_metric_is_stable() {
        let vector = MetricVector::new("requests", counter_factory(), LabelOrdering::Canonical);
        assert_eq!(vector.name(), "requests");
        assert!(vector.root_metric().same_instance(&vector.root_metric()));
        assert!(vector.root_metric().dimensions().is_empty());
    }

    #[test]
    fn test_metrics_lists_registered_only() {
        let vector = MetricVector::new("requests", counter_factory(), LabelOrdering::Canonical);
        assert!(vector.metrics().is_empty());

        vector.with([("status", "ok"), ("caller", "x")]);
        let metrics = vector.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].dimensions(), &LabelPath::from_values(&["caller", "x", "status", "ok"]));

        vector.root_metric().add(1.0);
        assert_eq!(vector.metrics().len(), 2);
    }

    #[test]
    fn test_reset_swaps_tree() {
        let vector = MetricVector::new("requests", counter_factory(), LabelOrdering::Canonical);
        let ok = vector.with([("status", "ok")]);
        ok.add(3.0);

        let detached = vector.reset();
        assert_eq!(detached.name(), "requests");
        assert!(vector.metrics().is_empty());

        let drained = detached.metrics();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].value(), 3.0);

        // New writers land in the new tree.
        let fresh = vector.with([("status", "ok")]);
        assert!(!fresh.same_instance(&ok));
        fresh.add(1.0);
        assert_eq!(vector.metrics()[0].value(), 1.0);
        assert_eq!(detached.metrics()[0].value(), 3.0);
    }

    #[test]
    fn test_get_or_create_is_unique_under_races() {
        let created = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&created);
        let factory: Factory<AtomicCounter> = Arc::new(move |_: &LabelPath| {
            counted.fetch_add(1, Ordering::SeqCst);
            AtomicCounter::new()
        });
        let set = Arc::new(VectorSet::new(factory, LabelOrdering::Canonical));
        let workers = 16;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let set = Arc::clone(&set);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    set.get_or_create("requests")
                })
            })
            .collect();
        let vectors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for vector in &vectors[1..] {
            assert!(Arc::ptr_eq(&vectors[0], vector));
        }
        assert_eq!(set.len(), 1);
        // Only the winning vector built a root metric.
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_metrics_and_reset_all() {
        let set = VectorSet::new(counter_factory(), LabelOrdering::Canonical);
        assert!(set.is_empty());
        assert!(set.get("requests").is_none());

        set.get_or_create("requests").with([("status", "ok")]).add(1.0);
        set.get_or_create("errors").root_metric().add(2.0);

        let mut names = set.names();
        names.sort();
        assert_eq!(names, vec!["errors", "requests"]);
        assert_eq!(set.metrics().len(), 2);

        let detached = set.reset_all();
        assert_eq!(detached.len(), 2);
        assert!(set.metrics().is_empty());
        let total: f64 = detached.iter().flat_map(|v| v.metrics()).map(|c| c.value()).sum();
        assert_eq!(total, 3.0);
    }
}
