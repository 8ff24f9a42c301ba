use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use std::{
    fmt::{self, Display},
    ops::Deref,
};

/// Separator terminating every key and value in a [`FlatKey`].
pub const SEPARATOR: char = '|';

const ESCAPE: char = '\\';

/// Value used to pad an odd-length list of label keys and values.
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

/// An unordered set of label keys mapped to their values.
pub type LabelSet = HashMap<String, String, FnvBuildHasher>;

/// A single dimension of a metric: an immutable key/value pair.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub struct Label(String, String);

impl Label {
    /// Creates a [`Label`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Label(key.into(), value.into())
    }

    /// Key of this label.
    pub fn key(&self) -> &str { &self.0 }

    /// Value of this label.
    pub fn value(&self) -> &str { &self.1 }

    /// Consumes this [`Label`], returning the key and value.
    pub fn into_parts(self) -> (String, String) { (self.0, self.1) }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}={}", self.0, self.1) }
}

impl<K, V> From<(K, V)> for Label
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pair: (K, V)) -> Label { Label::new(pair.0, pair.1) }
}

impl<K, V> From<&(K, V)> for Label
where
    K: Into<String> + Clone,
    V: Into<String> + Clone,
{
    fn from(pair: &(K, V)) -> Label { Label::new(pair.0.clone(), pair.1.clone()) }
}

/// How a metric handle resolves additional labels to a node in its tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelOrdering {
    /// The full label set is merged and sorted by key before the tree is walked from the root.
    ///
    /// Adding `a` then `b` resolves to the same metric as adding `b` then `a`.
    Canonical,

    /// Labels are appended in the order they were given, and that order is part of a metric's
    /// identity.
    ///
    /// Adding `a` then `b` resolves to a different metric than adding `b` then `a`.  Callers
    /// must always add labels in one consistent order.
    Insertion,
}

impl Default for LabelOrdering {
    fn default() -> Self { LabelOrdering::Canonical }
}

/// An ordered sequence of labels: the path from the root of a metric tree to one of its nodes.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct LabelPath(Vec<Label>);

impl LabelPath {
    /// Creates an empty path.
    pub fn new() -> Self { LabelPath(Vec::new()) }

    /// Builds a path from an alternating list of keys and values.
    ///
    /// A list of odd length has its last key paired with [`UNKNOWN_LABEL_VALUE`].
    ///
    /// ```
    /// # use metricspace::LabelPath;
    /// let path = LabelPath::from_values(&["status", "ok", "caller"]);
    /// assert_eq!(path[1].value(), "unknown");
    /// ```
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        LabelPath(
            values
                .chunks(2)
                .map(|pair| {
                    let key: &str = pair[0].as_ref();
                    let value: &str = pair.get(1).map_or(UNKNOWN_LABEL_VALUE, |v| v.as_ref());
                    Label::new(key, value)
                })
                .collect(),
        )
    }

    /// Appends a label to the end of this path.
    pub fn push(&mut self, label: Label) { self.0.push(label) }

    /// Gets the value for `key`, if this path contains it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|label| label.key() == key).map(Label::value)
    }

    /// Whether `prefix` is the leading part of this path.
    pub fn starts_with(&self, prefix: &LabelPath) -> bool { self.0.starts_with(&prefix.0) }

    /// Converts this path into an unordered [`LabelSet`].
    ///
    /// Later labels win if a key appears more than once.
    pub fn to_set(&self) -> LabelSet {
        self.0
            .iter()
            .map(|label| (label.key().to_owned(), label.value().to_owned()))
            .collect()
    }

    /// Flattens the labels of this path into their canonical key.
    pub fn flatten(&self) -> FlatKey { flatten(&self.to_set()) }

    /// Resolves the path reached by adding `extra` to this path.
    ///
    /// With [`LabelOrdering::Canonical`] the merged labels are sorted by key. With
    /// [`LabelOrdering::Insertion`] keys already on the path keep their position and take the new
    /// value, and unseen keys are appended in the order given.
    pub fn specialize(&self, extra: Vec<Label>, ordering: LabelOrdering) -> LabelPath {
        let mut labels = self.0.clone();
        for label in extra {
            match labels.iter_mut().find(|existing| existing.key() == label.key()) {
                Some(existing) => *existing = label,
                None => labels.push(label),
            }
        }

        if ordering == LabelOrdering::Canonical {
            labels.sort_by(|a, b| a.key().cmp(b.key()));
        }

        LabelPath(labels)
    }

    /// Consumes this path, returning the underlying labels.
    pub fn into_vec(self) -> Vec<Label> { self.0 }
}

impl Deref for LabelPath {
    type Target = [Label];

    fn deref(&self) -> &[Label] { &self.0 }
}

impl Display for LabelPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, "}}")
    }
}

impl From<Vec<Label>> for LabelPath {
    fn from(labels: Vec<Label>) -> Self { LabelPath(labels) }
}

/// A value that can be converted to [`Label`]s.
pub trait IntoLabels {
    /// Consumes this value, turning it into a vector of [`Label`]s.
    fn into_labels(self) -> Vec<Label>;
}

impl IntoLabels for Vec<Label> {
    fn into_labels(self) -> Vec<Label> { self }
}

impl IntoLabels for LabelPath {
    fn into_labels(self) -> Vec<Label> { self.0 }
}

impl<L: Into<Label>, const N: usize> IntoLabels for [L; N] {
    fn into_labels(self) -> Vec<Label> { IntoIterator::into_iter(self).map(Into::into).collect() }
}

impl<T, L> IntoLabels for &T
where
    T: ?Sized,
    Self: IntoIterator<Item = L>,
    L: Into<Label>,
{
    fn into_labels(self) -> Vec<Label> { self.into_iter().map(Into::into).collect() }
}

/// The canonical encoding of a label set, usable as a map key.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug, Default)]
pub struct FlatKey(String);

impl FlatKey {
    /// The encoded key.
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for FlatKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(&self.0) }
}

/// Flattens a label set into its [`FlatKey`].
///
/// Keys are sorted, so any two sets holding the same pairs flatten identically.  Every key and
/// value is terminated by [`SEPARATOR`]; occurrences of the separator or of `\` inside a key or
/// value are escaped with `\`, so no two distinct sets share a key.
pub fn flatten(labels: &LabelSet) -> FlatKey {
    let mut keys: Vec<&String> = labels.keys().collect();
    keys.sort();

    let mut buf = String::new();
    for key in keys {
        push_escaped(&mut buf, key);
        push_escaped(&mut buf, &labels[key]);
    }

    FlatKey(buf)
}

fn push_escaped(buf: &mut String, part: &str) {
    for c in part.chars() {
        if c == SEPARATOR || c == ESCAPE {
            buf.push(ESCAPE);
        }
        buf.push(c);
    }
    buf.push(SEPARATOR);
}

/// Merges two label sets; `overrides` wins when both hold the same key.
pub fn merge(base: &LabelSet, overrides: &LabelSet) -> LabelSet {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{flatten, merge, IntoLabels, Label, LabelOrdering, LabelPath, LabelSet};
    use quickcheck_macros::quickcheck;

    fn set(pairs: &[(&str, &str)]) -> LabelSet {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_flatten_is_order_independent() {
        let mut ab = LabelSet::default();
        ab.insert("a".to_owned(), "1".to_owned());
        ab.insert("b".to_owned(), "2".to_owned());

        let mut ba = LabelSet::default();
        ba.insert("b".to_owned(), "2".to_owned());
        ba.insert("a".to_owned(), "1".to_owned());

        assert_eq!(flatten(&ab), flatten(&ba));
        assert_eq!(flatten(&ab).as_str(), "a|1|b|2|");
    }

    #[test]
    fn test_flatten_terminates_parts() {
        assert_ne!(flatten(&set(&[("a", "bc")])), flatten(&set(&[("ab", "c")])));
        assert_eq!(flatten(&LabelSet::default()).as_str(), "");
    }

    #[test]
    fn test_flatten_escapes_separator() {
        let sneaky = set(&[("a", "1|b|2")]);
        let honest = set(&[("a", "1"), ("b", "2")]);
        assert_ne!(flatten(&sneaky), flatten(&honest));
        assert_eq!(flatten(&sneaky).as_str(), "a|1\\|b\\|2|");

        let escaped = set(&[("k", "v\\|")]);
        let plain = set(&[("k", "v\\"), ("|", "")]);
        assert_ne!(flatten(&escaped), flatten(&plain));
    }

    #[test]
    fn test_merge_overrides_win() {
        let base = set(&[("status", "ok"), ("caller", "johnnie")]);
        let overrides = set(&[("status", "error"), ("region", "eu")]);

        let merged = merge(&base, &overrides);
        assert_eq!(merged, set(&[("status", "error"), ("caller", "johnnie"), ("region", "eu")]));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_from_values_pads_odd_lists() {
        let path = LabelPath::from_values(&["status", "ok", "caller"]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.get("status"), Some("ok"));
        assert_eq!(path.get("caller"), Some("unknown"));

        let empty: [&str; 0] = [];
        assert!(LabelPath::from_values(&empty).is_empty());
    }

    #[test]
    fn test_specialize_canonical_sorts_and_overrides() {
        let base = LabelPath::from_values(&["status", "ok", "caller", "johnnie"]);
        let extra = vec![Label::new("status", "error"), Label::new("b", "2")];
        let path = base.specialize(extra, LabelOrdering::Canonical);

        let keys: Vec<&str> = path.iter().map(Label::key).collect();
        assert_eq!(keys, vec!["b", "caller", "status"]);
        assert_eq!(path.get("status"), Some("error"));
    }

    #[test]
    fn test_specialize_insertion_keeps_order() {
        let base = LabelPath::from_values(&["z", "1"]);
        let extra = vec![Label::new("b", "2"), Label::new("z", "3")];
        let path = base.specialize(extra, LabelOrdering::Insertion);

        assert_eq!(path, LabelPath::from_values(&["z", "3", "b", "2"]));
        assert!(!path.starts_with(&base));
        assert!(path.starts_with(&LabelPath::new()));
    }

    #[test]
    fn test_into_labels_conversions() {
        let expected = vec![Label::new("a", "1"), Label::new("b", "2")];

        assert_eq!([("a", "1"), ("b", "2")].into_labels(), expected);
        assert_eq!((&[("a", "1"), ("b", "2")][..]).into_labels(), expected);
        assert_eq!(vec![Label::new("a", "1"), Label::new("b", "2")].into_labels(), expected);
        assert_eq!(LabelPath::from(expected.clone()).into_labels(), expected);

        let from_set = set(&[("a", "1")]);
        assert_eq!((&from_set).into_labels(), vec![Label::new("a", "1")]);
    }

    #[test]
    fn test_path_display() {
        let path = LabelPath::from_values(&["status", "ok", "caller", "johnnie"]);
        assert_eq!(path.to_string(), "{status=ok,caller=johnnie}");
        assert_eq!(LabelPath::new().to_string(), "{}");
    }

    #[quickcheck]
    fn prop_flatten_ignores_insertion_order(pairs: Vec<(String, String)>) -> bool {
        let forward: LabelSet = pairs.into_iter().collect();

        let mut entries: Vec<(&String, &String)> = forward.iter().collect();
        entries.sort();
        let reversed: LabelSet = entries.into_iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();

        flatten(&forward) == flatten(&reversed)
    }

    #[quickcheck]
    fn prop_flatten_distinguishes_sets(a: Vec<(String, String)>, b: Vec<(String, String)>) -> bool {
        let a: LabelSet = a.into_iter().collect();
        let b: LabelSet = b.into_iter().collect();
        (a == b) == (flatten(&a) == flatten(&b))
    }
}
