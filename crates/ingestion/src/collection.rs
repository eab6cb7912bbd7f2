//! Collection template: the collection document plus its asset defaults.
//!
//! Built once at startup and shared by the synthesizer (asset defaults) and
//! the merger (collection document for lazy creation).

use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use storage::CatalogDocument;

use crate::entry::Asset;
use crate::error::{IngestionError, Result};

const LANDSAT_8_L1: &str = include_str!("../data/landsat-8-l1.json");

/// Collection-level configuration for the entries of one collection.
#[derive(Debug, Clone)]
pub struct CollectionTemplate {
    document: CatalogDocument,
    assets: BTreeMap<String, Asset>,
}

impl CollectionTemplate {
    /// The compiled-in Landsat-8 L1 collection.
    pub fn landsat8_l1() -> Result<Self> {
        Self::from_json_str(LANDSAT_8_L1)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        if document.id.trim().is_empty() {
            return Err(IngestionError::InvalidConfig(
                "collection template has an empty id".to_string(),
            ));
        }

        let assets = match document.extra.get("assets") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => BTreeMap::new(),
        };

        Ok(Self { document, assets })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let template = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            collection = %template.id(),
            assets = template.assets.len(),
            "Loaded collection template"
        );
        Ok(template)
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }

    /// Asset defaults keyed by asset name.
    pub fn assets(&self) -> &BTreeMap<String, Asset> {
        &self.assets
    }

    /// Collection document to attach under the root catalog.
    pub fn document(&self) -> CatalogDocument {
        self.document.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_template() {
        let template = CollectionTemplate::landsat8_l1().unwrap();
        assert_eq!(template.id(), "landsat-8-l1");

        let assets = template.assets();
        for key in ["index", "thumbnail", "B1", "B11", "ANG", "MTL", "BQA"] {
            assert!(assets.contains_key(key), "missing asset {}", key);
        }
        assert!(assets["B4"].href.is_none());
        assert_eq!(assets["B4"].extra["type"], "image/x.geotiff");
    }

    #[test]
    fn test_template_without_assets() {
        let template =
            CollectionTemplate::from_json_str(r#"{"id": "bare", "links": []}"#).unwrap();
        assert!(template.assets().is_empty());
        assert_eq!(template.document().id, "bare");
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = CollectionTemplate::from_json_str(r#"{"id": " "}"#).unwrap_err();
        assert!(matches!(err, IngestionError::InvalidConfig(_)));
    }
}
