//! Ordered, case-insensitive column sets.
//!
//! A node's open columns are displayed in insertion order, but merging two
//! fragments must never produce `WEEK_VER` next to `week_ver`. The first
//! spelling seen wins.

use serde::{Deserialize, Serialize};

/// The columns currently open on a node.
///
/// Behaves like a set under case-insensitive comparison while keeping
/// insertion order and the original casing of each first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSet {
    columns: Vec<String>,
}

fn same_column(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

impl ColumnSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a column with this name (any casing) is present.
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Index of the column, compared case-insensitively.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| same_column(c, column))
    }

    /// Appends a column unless an equal one is already present.
    ///
    /// Returns whether the column was added.
    pub fn insert(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        if self.contains(&column) {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Removes a column (any casing). Returns whether it was present.
    pub fn remove(&mut self, column: &str) -> bool {
        match self.position(column) {
            Some(index) => {
                self.columns.remove(index);
                true
            }
            None => false,
        }
    }

    /// Adds every column of `other` not already present, in `other`'s order.
    pub fn extend_from(&mut self, other: &ColumnSet) {
        for column in &other.columns {
            self.insert(column.clone());
        }
    }

    /// Returns the union of both sets: `self`'s columns first, then the
    /// columns only `other` has.
    pub fn union(&self, other: &ColumnSet) -> ColumnSet {
        let mut merged = self.clone();
        merged.extend_from(other);
        merged
    }

    /// Keeps only the columns for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.columns.retain(|c| keep(c));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.columns
    }
}

impl From<Vec<String>> for ColumnSet {
    fn from(columns: Vec<String>) -> Self {
        let mut set = ColumnSet::new();
        for column in columns {
            if !set.insert(column) {
                tracing::trace!("dropping duplicate column from incoming list");
            }
        }
        set
    }
}

impl From<ColumnSet> for Vec<String> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ColumnSet::new();
        for column in iter {
            set.insert(column);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
