use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Ordered list of file paths returned for one query.
///
/// Every entry is a string; the decoder drops anything else before a
/// `ResultSet` is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<String>);

impl ResultSet {
    /// An empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Borrow the paths.
    pub fn paths(&self) -> &[String] {
        &self.0
    }

    /// Consume the set and return the paths.
    pub fn into_paths(self) -> Vec<String> {
        self.0
    }
}

impl Deref for ResultSet {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ResultSet {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}

impl FromIterator<String> for ResultSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
