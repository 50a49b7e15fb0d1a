use std::slice;

use crate::error::Result;
use crate::pack::pair::DataPair;

/// Ordered pairs, several may share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<DataPair>);

impl Headers {
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    pub fn add(&mut self, name: &str, value: &str) -> Result<()> {
        self.0.push(DataPair::with_value(name, value)?);
        Ok(())
    }

    pub fn add_pair(&mut self, pair: DataPair) {
        self.0.push(pair);
    }

    pub fn with(mut self, name: &str, value: &str) -> Result<Self> {
        self.add(name, value)?;
        Ok(self)
    }

    /// Returns false when a header with that name is already present.
    pub fn add_if_not_exists(&mut self, name: &str, value: &str) -> Result<bool> {
        if self.contains_name(name) {
            return Ok(false);
        }
        self.add(name, value)?;
        Ok(true)
    }

    /// Returns false when the exact pair is already present.
    pub fn add_pair_if_not_exists(&mut self, pair: DataPair) -> bool {
        if self.contains(pair.name(), pair.value()) {
            return false;
        }
        self.0.push(pair);
        true
    }

    /// Returns false and drops `pair` when `index` is past the end.
    pub fn insert(&mut self, index: usize, pair: DataPair) -> bool {
        if index > self.0.len() {
            return false;
        }
        self.0.insert(index, pair);
        true
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str, value: Option<&str>) -> bool {
        self.0.iter().any(|p| p.name() == name && p.value() == value)
    }

    /// First value stored under `name`.
    pub fn first(&self, name: &str) -> Option<&DataPair> {
        self.0.iter().find(|p| p.name() == name)
    }

    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DataPair> + 'a {
        self.0.iter().filter(move |p| p.name() == name)
    }

    /// Drops every header named `name`, returns how many went.
    pub fn remove_name(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|p| p.name() != name);
        before - self.0.len()
    }

    pub fn remove(&mut self, name: &str, value: Option<&str>) -> usize {
        let before = self.0.len();
        self.0.retain(|p| !(p.name() == name && p.value() == value));
        before - self.0.len()
    }

    pub fn remove_at(&mut self, index: usize) -> Option<DataPair> {
        if index < self.0.len() {
            Some(self.0.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&DataPair> {
        self.0.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, DataPair> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a DataPair;
    type IntoIter = slice::Iter<'a, DataPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<DataPair> for Headers {
    fn extend<I: IntoIterator<Item = DataPair>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
