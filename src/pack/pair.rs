use std::fmt;

use crate::error::{PackError, Result};

/// Immutable name/value pair, the unit of headers and properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPair {
    name: String,
    value: Option<String>,
}

impl DataPair {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PackError::EmptyName);
        }
        Ok(DataPair { name, value })
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        DataPair::new(name, Some(value.into()))
    }

    pub fn named(name: impl Into<String>) -> Result<Self> {
        DataPair::new(name, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for DataPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}
