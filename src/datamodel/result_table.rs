use super::{LabelSet, SampleValue, Series, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// A decoded query result: rows indexed by time, one column per series.
///
/// The row index is the sorted union of every timestamp of every column, so
/// series that were sampled at different instants share one index. A cell
/// with no sample is `None`, never a default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    index: Vec<Timestamp>,
    columns: BTreeMap<LabelSet, Series>,
}

impl ResultTable {
    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    /// Columns ordered by label set.
    pub fn columns(&self) -> impl Iterator<Item = (&LabelSet, &Series)> {
        self.columns.iter()
    }

    pub fn label_sets(&self) -> impl Iterator<Item = &LabelSet> {
        self.columns.keys()
    }

    pub fn column(&self, labels: &LabelSet) -> Option<&Series> {
        self.columns.get(labels)
    }

    pub fn get(&self, timestamp: Timestamp, labels: &LabelSet) -> Option<&SampleValue> {
        self.columns.get(labels)?.get(timestamp)
    }

    /// Cells of one row in column order, or `None` if the timestamp is not
    /// part of the index.
    pub fn row(&self, timestamp: Timestamp) -> Option<Vec<Option<&SampleValue>>> {
        self.index.binary_search(&timestamp).ok()?;
        Some(
            self.columns
                .values()
                .map(|series| series.get(timestamp))
                .collect(),
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = (Timestamp, Vec<Option<&SampleValue>>)> + '_ {
        self.index.iter().map(move |&timestamp| {
            let cells = self
                .columns
                .values()
                .map(|series| series.get(timestamp))
                .collect();
            (timestamp, cells)
        })
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Accumulates decoded series; `build` performs the outer join.
#[derive(Debug, Default)]
pub struct ResultTableBuilder {
    columns: BTreeMap<LabelSet, Series>,
}

impl ResultTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series with an already known label set are merged into the existing
    /// column rather than duplicated.
    pub fn add(&mut self, labels: LabelSet, series: Series) {
        let merged = match self.columns.remove(&labels) {
            Some(existing) => existing.merge(series),
            None => series,
        };
        self.columns.insert(labels, merged);
    }

    pub fn build(self) -> ResultTable {
        let index: BTreeSet<Timestamp> = self
            .columns
            .values()
            .flat_map(|series| series.timestamps())
            .collect();
        ResultTable {
            index: index.into_iter().collect(),
            columns: self.columns,
        }
    }
}
