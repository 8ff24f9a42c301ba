use crate::label::{Label, LabelPath};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Builds the metric owned by a new node, given the node's labels.
pub type Factory<M> = Arc<dyn Fn(&LabelPath) -> M + Send + Sync>;

type Children<M> = HashMap<Label, Arc<Node<M>>, FnvBuildHasher>;

/// A point in the space of every label combination of one metric.
///
/// Each node owns exactly one metric, and children that are one label more specific.  Nodes are
/// only ever added, never removed, so a metric resolved from a node stays valid for as long as
/// anything holds it.
pub(crate) struct Node<M> {
    labels: LabelPath,
    metric: M,
    registered: AtomicBool,
    children: RwLock<Children<M>>,
}

impl<M> Node<M> {
    /// Creates a node for `labels`, building its metric with `factory`.
    pub(crate) fn new(labels: LabelPath, factory: &Factory<M>) -> Self {
        let metric = factory(&labels);
        Node {
            labels,
            metric,
            registered: AtomicBool::new(false),
            children: RwLock::new(Children::default()),
        }
    }

    pub(crate) fn root(factory: &Factory<M>) -> Arc<Self> { Arc::new(Node::new(LabelPath::new(), factory)) }

    /// Labels on the path from the root of the tree to this node.
    pub(crate) fn labels(&self) -> &LabelPath { &self.labels }

    /// The metric owned by this node.
    pub(crate) fn metric(&self) -> &M { &self.metric }

    /// Marks this node as a series callers have asked for, so enumeration reports it.
    #[inline]
    pub(crate) fn register(&self) {
        if !self.registered.load(Ordering::Relaxed) {
            self.registered.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn is_registered(&self) -> bool { self.registered.load(Ordering::Relaxed) }

    /// Gets the child one `label` more specific than this node, creating it if needed.
    ///
    /// Racing callers asking for the same missing child all get the same node: the child is only
    /// created while holding the upgradable lock, after checking again that nobody created it
    /// in the meantime.
    pub(crate) fn child(&self, label: &Label, factory: &Factory<M>) -> Arc<Node<M>> {
        if let Some(child) = self.children.read().get(label) {
            return Arc::clone(child);
        }

        let children = self.children.upgradable_read();
        if let Some(child) = children.get(label) {
            return Arc::clone(child);
        }

        let mut labels = self.labels.clone();
        labels.push(label.clone());
        let child = Arc::new(Node::new(labels, factory));

        let mut children = RwLockUpgradableReadGuard::upgrade(children);
        children.insert(label.clone(), Arc::clone(&child));
        child
    }

    /// Walks down the tree one child per label in `labels`, creating nodes along the way.
    pub(crate) fn descend(self: &Arc<Self>, labels: &[Label], factory: &Factory<M>) -> Arc<Node<M>> {
        let mut node = Arc::clone(self);
        for label in labels {
            node = node.child(label, factory);
        }
        node
    }

    /// Lists this node and every node below it, depth first.
    ///
    /// Each children map is only locked while its entries are copied out, so creating new nodes
    /// is never blocked for the duration of the walk.
    pub(crate) fn nodes(self: &Arc<Self>) -> Vec<Arc<Node<M>>> {
        let mut found = Vec::new();
        let mut pending = vec![Arc::clone(self)];
        while let Some(node) = pending.pop() {
            pending.extend(node.children.read().values().cloned());
            found.push(node);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::{Factory, Node};
    use crate::label::{Label, LabelPath};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
    };

    fn counting_factory() -> (Factory<usize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&created);
        let factory: Factory<usize> = Arc::new(move |_: &LabelPath| inner.fetch_add(1, Ordering::SeqCst));
        (factory, created)
    }

    #[test]
    fn test_root_owns_one_metric() {
        let (factory, created) = counting_factory();
        let root = Node::root(&factory);
        assert_eq!(*root.metric(), 0);
        assert!(root.labels().is_empty());
        assert!(!root.is_registered());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_child_is_created_once() {
        let (factory, created) = counting_factory();
        let root = Node::root(&factory);
        let ok = Label::new("status", "ok");

        let first = root.child(&ok, &factory);
        let second = root.child(&ok, &factory);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.labels(), &LabelPath::from_values(&["status", "ok"]));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_descend_builds_paths() {
        let (factory, created) = counting_factory();
        let root = Node::root(&factory);
        let path = LabelPath::from_values(&["a", "1", "b", "2"]);

        let leaf = root.descend(&path, &factory);
        assert_eq!(leaf.labels(), &path);
        assert_eq!(created.load(Ordering::SeqCst), 3);

        let again = root.descend(&path, &factory);
        assert!(Arc::ptr_eq(&leaf, &again));

        // A path sharing a prefix reuses the intermediate node.
        let sibling = root.descend(&LabelPath::from_values(&["a", "1", "b", "3"]), &factory);
        assert!(!Arc::ptr_eq(&leaf, &sibling));
        assert_eq!(created.load(Ordering::SeqCst), 4);

        // Same labels in a different order is a different path.
        let swapped = root.descend(&LabelPath::from_values(&["b", "2", "a", "1"]), &factory);
        assert!(!Arc::ptr_eq(&leaf, &swapped));
        assert_eq!(created.load(Ordering::SeqCst), 6);

        assert!(Arc::ptr_eq(&root.descend(&[], &factory), &root));
    }

    #[test]
    fn test_nodes_lists_whole_tree() {
        let (factory, _) = counting_factory();
        let root = Node::root(&factory);
        root.descend(&LabelPath::from_values(&["a", "1", "b", "2"]), &factory);
        root.descend(&LabelPath::from_values(&["a", "2"]), &factory);

        let mut labels: Vec<String> = root.nodes().iter().map(|n| n.labels().to_string()).collect();
        labels.sort();
        assert_eq!(labels, vec!["{a=1,b=2}", "{a=1}", "{a=2}", "{}"]);
    }

    #[test]
    fn test_racing_creators_converge() {
        let (factory, created) = counting_factory();
        let root = Node::root(&factory);
        let workers = 16;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let root = Arc::clone(&root);
                let factory = Arc::clone(&factory);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    root.descend(&LabelPath::from_values(&["status", "ok", "caller", "x"]), &factory)
                })
            })
            .collect();

        let nodes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for node in &nodes[1..] {
            assert!(Arc::ptr_eq(&nodes[0], node));
        }

        // Root plus the two nodes along the path, whoever won the races.
        assert_eq!(created.load(Ordering::SeqCst), 3);
    }
}
