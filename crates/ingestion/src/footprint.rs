//! Scene footprints and the static WRS-2 path/row footprint table.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use stac_common::BoundingBox;

use crate::error::{IngestionError, Result};

/// Closed ring of image corners: UL, UR, LR, LL, UL as `[lon, lat]`.
pub type Ring = [[f64; 2]; 5];

/// Resolved geometry of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub ring: Ring,
    /// Always derived from the MTL product corners, whichever tier produced the ring.
    pub bbox: BoundingBox,
}

impl Footprint {
    pub fn new(ring: Ring, bbox: BoundingBox) -> Self {
        Self { ring, bbox }
    }

    /// GeoJSON polygon coordinates (one outer ring).
    pub fn coordinates(&self) -> Vec<Vec<[f64; 2]>> {
        vec![self.ring.to_vec()]
    }
}

/// Build a closed ring from four corners.
pub fn close_ring(corners: [[f64; 2]; 4]) -> Ring {
    [corners[0], corners[1], corners[2], corners[3], corners[0]]
}

static SHARED: OnceCell<Arc<FootprintTable>> = OnceCell::new();

/// Precomputed path/row footprints, keyed by `PPPRRR` (zero-padded path then row).
#[derive(Debug, Clone, Default)]
pub struct FootprintTable {
    rings: HashMap<String, Ring>,
}

impl FootprintTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rings<I>(rings: I) -> Self
    where
        I: IntoIterator<Item = (String, Ring)>,
    {
        Self {
            rings: rings.into_iter().collect(),
        }
    }

    /// Parse the table JSON: `{"044034": [[[lon, lat], ... 5 points]], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<Vec<[f64; 2]>>> = serde_json::from_str(json)?;

        let mut rings = HashMap::with_capacity(raw.len());
        for (key, polygon) in raw {
            let outer = polygon
                .into_iter()
                .next()
                .ok_or_else(|| IngestionError::Parse(format!("footprint {} has no ring", key)))?;
            let ring: Ring = outer.try_into().map_err(|pts: Vec<[f64; 2]>| {
                IngestionError::Parse(format!(
                    "footprint {} has {} points, expected 5",
                    key,
                    pts.len()
                ))
            })?;
            rings.insert(key, ring);
        }

        Ok(Self { rings })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&json)?;
        info!(path = %path.display(), entries = table.len(), "Loaded footprint table");
        Ok(table)
    }

    /// Process-wide table, loaded from `path` on first call.
    ///
    /// Later calls return the same table and ignore `path`.
    pub fn shared(path: &Path) -> Result<Arc<Self>> {
        SHARED
            .get_or_try_init(|| Self::from_path(path).map(Arc::new))
            .cloned()
    }

    /// Ring for zero-padded 3-digit path and row codes.
    pub fn lookup(&self, path: &str, row: &str) -> Option<Ring> {
        self.rings.get(&format!("{}{}", path, row)).copied()
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "044033": [[[-122.0, 38.0], [-120.0, 38.0], [-120.0, 36.0], [-122.0, 36.0], [-122.0, 38.0]]]
    }"#;

    #[test]
    fn test_lookup_by_padded_codes() {
        let table = FootprintTable::from_json_str(TABLE).unwrap();
        assert_eq!(table.len(), 1);
        let ring = table.lookup("044", "033").unwrap();
        assert_eq!(ring[0], ring[4]);
        assert!(table.lookup("044", "034").is_none());
    }

    #[test]
    fn test_rejects_short_ring() {
        let err = FootprintTable::from_json_str(r#"{"001001": [[[0.0, 0.0], [1.0, 1.0]]]}"#)
            .unwrap_err();
        assert!(matches!(err, IngestionError::Parse(_)));
    }

    #[test]
    fn test_close_ring() {
        let ring = close_ring([[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
        assert_eq!(ring[4], [0.0, 1.0]);
    }
}
