use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

pub type LabelPairs = SmallVec<[(String, String); 8]>;

/// Identity of one metric series: an unordered set of `(name, value)` pairs.
///
/// Pairs are kept sorted and deduplicated, so two label sets built from the
/// same pairs in any order are equal and hash the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelSet {
    pairs: LabelPairs,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let unique: BTreeSet<(String, String)> = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self {
            pairs: unique.into_iter().collect(),
        }
    }

    /// Value of the first pair with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.get("__name__")
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.pairs
            .binary_search_by(|(k, v)| (k.as_str(), v.as_str()).cmp(&(name, value)))
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Selector-like rendering, e.g. `{__name__="up", job="foo"}`.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "{}=\"{}\"", name, escaped)?;
        }
        f.write_str("}")
    }
}
