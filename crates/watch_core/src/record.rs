use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured output of extraction: a mapping from field name to value.
///
/// Fields are kept sorted by name, so two records with the same fields always
/// serialize to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter. Records are not mutated after they leave the
    /// extractor, so there is no `&mut self` setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical serialization: a JSON object with keys in sorted order.
    pub fn fingerprint(&self) -> Fingerprint {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        Fingerprint(serde_json::Value::Object(map).to_string())
    }

    /// Rebuilds a record from a stored fingerprint.
    pub fn from_fingerprint(fingerprint: &Fingerprint) -> Result<Self, serde_json::Error> {
        serde_json::from_str(fingerprint.as_str())
    }
}

/// Dedup key of a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a fingerprint previously produced by [`Record::fingerprint`] and
    /// read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
