use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

use crate::error::EkgError;

/// Header descriptors of an export, kept in file order.
///
/// Re-inserting a key replaces its value but keeps the position of the first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let existing = self.positions.get(&key).copied();
        match existing {
            Some(pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.positions
            .get(key)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Parsed contents of one uploaded EKG export.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct EkgExport {
    pub metadata: Metadata,
    /// Samples in file order (µV for Apple Watch exports).
    pub signal: Vec<f64>,
    /// Sampling frequency in Hz, when the header declared a usable one.
    pub sampling_rate: Option<f64>,
}

impl EkgExport {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Recording length in seconds, if the sampling rate is known.
    pub fn duration(&self) -> Option<f64> {
        self.sampling_rate.map(|fs| self.signal.len() as f64 / fs)
    }

    pub fn require_signal(&self) -> Result<&[f64], EkgError> {
        if self.signal.is_empty() {
            return Err(EkgError::NoData);
        }
        Ok(&self.signal)
    }

    pub fn into_signal(self) -> Result<Vec<f64>, EkgError> {
        if self.signal.is_empty() {
            return Err(EkgError::NoData);
        }
        Ok(self.signal)
    }
}
