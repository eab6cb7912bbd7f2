//! Parser for Landsat MTL metadata files.
//!
//! MTL files are nested `GROUP = NAME` / `END_GROUP = NAME` blocks of
//! `KEY = VALUE` lines. The nesting carries no information we need, so the
//! parser flattens everything into one map.

use futures::TryStreamExt;
use std::collections::HashMap;

use crate::error::{IngestionError, Result};
use crate::fetcher::LineStream;

const GROUP: &str = "GROUP";
const END_GROUP: &str = "END_GROUP";

/// Flat `KEY -> VALUE` view of an MTL file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    fields: HashMap<String, String>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse MTL lines. Later duplicates overwrite earlier ones.
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for line in lines {
            map.push_line(line.as_ref());
        }
        map
    }

    /// Parse a remote line stream to completion.
    pub async fn parse_stream(mut lines: LineStream) -> Result<Self> {
        let mut map = Self::new();
        while let Some(line) = lines.try_next().await? {
            map.push_line(&line);
        }
        Ok(map)
    }

    fn push_line(&mut self, line: &str) {
        if let Some((key, value)) = parse_line(line) {
            self.fields.insert(key, value);
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Value of a field every scene must have.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| IngestionError::MissingField(key.to_string()))
    }

    /// Required field parsed as a float.
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        let raw = self.require(key)?;
        raw.parse::<f64>()
            .map_err(|_| IngestionError::Parse(format!("{} is not a number: '{}'", key, raw)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Split one MTL line into key and value.
///
/// Quotes are removed and both sides trimmed. Lines without `=`, with an
/// empty key, or that open/close a group yield `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let cleaned = line.replace('"', "");
    let (key, value) = cleaned.trim().split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key == GROUP || key == END_GROUP {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}
