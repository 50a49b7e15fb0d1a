use std::collections::HashMap;
use std::slice;

use crate::error::Result;
use crate::pack::pair::DataPair;

/// Pairs keyed by name, a later write replaces the earlier value in place.
#[derive(Debug, Clone, Default)]
pub struct Properties(Vec<DataPair>);

impl Properties {
    pub fn new() -> Self {
        Properties(Vec::new())
    }

    /// Returns the pair it replaced, if any.
    pub fn add_or_replace(&mut self, pair: DataPair) -> Option<DataPair> {
        match self.0.iter().position(|p| p.name() == pair.name()) {
            Some(idx) => Some(std::mem::replace(&mut self.0[idx], pair)),
            None => {
                self.0.push(pair);
                None
            },
        }
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.add_or_replace(DataPair::with_value(name, value)?);
        Ok(())
    }

    pub fn with(mut self, name: &str, value: &str) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&DataPair> {
        self.0.iter().find(|p| p.name() == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(DataPair::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn exists(&self, name: &str, value: Option<&str>) -> bool {
        self.get(name).map_or(false, |p| p.value() == value)
    }

    pub fn remove(&mut self, name: &str) -> Option<DataPair> {
        let idx = self.0.iter().position(|p| p.name() == name)?;
        Some(self.0.remove(idx))
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

    pub fn to_map(&self) -> HashMap<String, Option<String>> {
        self.0
            .iter()
            .map(|p| (p.name().to_string(), p.value().map(str::to_string)))
            .collect()
    }
}

// Set semantics, order does not matter
impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|p| other.get(p.name()) == Some(p))
    }
}

impl Eq for Properties {}

impl<'a> IntoIterator for &'a Properties {
    type Item = &'a DataPair;
    type IntoIter = slice::Iter<'a, DataPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<DataPair> for Properties {
    fn extend<I: IntoIterator<Item = DataPair>>(&mut self, iter: I) {
        for pair in iter {
            self.add_or_replace(pair);
        }
    }
}
