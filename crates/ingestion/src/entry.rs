//! Catalog entry synthesis.
//!
//! [`synthesize`] is a pure function of the scene's metadata URL, its parsed
//! MTL fields, its resolved footprint and the collection template. It does no
//! I/O.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use stac_common::BoundingBox;

use crate::collection::CollectionTemplate;
use crate::error::{IngestionError, Result};
use crate::footprint::Footprint;
use crate::geolocation::wrs_code;
use crate::mtl::MetadataMap;
use crate::scene_list::Tier;

const MTL_SUFFIX: &str = "_MTL.txt";
const INDEX_FILE: &str = "index.html";
const BAND_COUNT: u8 = 11;
/// Revision (2 chars) plus ground station (3 chars) at the end of a scene id.
const SCENE_ID_SUFFIX_LEN: usize = 5;

const EPSG_UTM_NORTH: u32 = 32600;
const EPSG_UTM_SOUTH: u32 = 32700;

/// One asset of an entry. Template fields (title, type, bands) are carried
/// through untouched; `href` is filled in per scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    fn with_href(mut self, href: String) -> Self {
        self.href = Some(href);
        self
    }
}

/// GeoJSON polygon geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl From<&Footprint> for Geometry {
    fn from(footprint: &Footprint) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: footprint.coordinates(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryProperties {
    pub collection: String,
    pub datetime: DateTime<Utc>,
    #[serde(rename = "eo:sun_azimuth")]
    pub sun_azimuth: f64,
    #[serde(rename = "eo:sun_elevation")]
    pub sun_elevation: f64,
    #[serde(rename = "eo:cloud_cover")]
    pub cloud_cover: i64,
    #[serde(rename = "eo:row")]
    pub row: String,
    #[serde(rename = "eo:column")]
    pub column: String,
    #[serde(rename = "landsat:product_id")]
    pub product_id: Option<String>,
    #[serde(rename = "landsat:scene_id")]
    pub scene_id: String,
    #[serde(rename = "landsat:processing_level")]
    pub processing_level: String,
    #[serde(rename = "landsat:tier")]
    pub tier: Tier,
    #[serde(rename = "landsat:revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(rename = "eo:epsg", default, skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
}

/// A STAC item for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub bbox: BoundingBox,
    pub geometry: Geometry,
    pub properties: EntryProperties,
    pub assets: BTreeMap<String, Asset>,
}

impl CatalogEntry {
    /// Acquisition date, `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        self.properties.datetime.format("%Y-%m-%d").to_string()
    }

    /// Value of a path template placeholder.
    ///
    /// `id` and `date` are built in. Any other name matches a property key
    /// exactly or by its unprefixed part (`row` matches `eo:row`).
    pub fn template_value(&self, name: &str) -> Option<String> {
        match name {
            "id" => return Some(self.id.clone()),
            "date" => return Some(self.date()),
            _ => {}
        }

        let Ok(Value::Object(props)) = serde_json::to_value(&self.properties) else {
            return None;
        };
        let value = props.get(name).or_else(|| {
            props
                .iter()
                .find(|(key, _)| key.rsplit_once(':').map(|(_, n)| n) == Some(name))
                .map(|(_, value)| value)
        })?;

        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// How an entry id is derived from the scene identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRule {
    /// Product id when the MTL carries one, else the stripped scene id.
    ProductId,
    /// Scene id without its revision and ground station suffix.
    SceneId,
}

impl IdRule {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::PreCollection => IdRule::SceneId,
            _ => IdRule::ProductId,
        }
    }

    pub fn entry_id(&self, scene_id: &str, product_id: Option<&str>) -> Result<String> {
        match (self, product_id) {
            (IdRule::ProductId, Some(product_id)) => Ok(product_id.to_string()),
            _ => strip_revision(scene_id),
        }
    }
}

/// Drop the trailing revision and ground station (`LGN00`) from a scene id.
pub fn strip_revision(scene_id: &str) -> Result<String> {
    let count = scene_id.chars().count();
    if count <= SCENE_ID_SUFFIX_LEN {
        return Err(IngestionError::Parse(format!(
            "scene id '{}' is too short",
            scene_id
        )));
    }
    Ok(scene_id.chars().take(count - SCENE_ID_SUFFIX_LEN).collect())
}

/// UTM EPSG code for a zone, hemisphere chosen by the bbox's mean latitude.
pub fn utm_epsg(zone: u32, bbox: &BoundingBox) -> u32 {
    if bbox.center_lat() > 0.0 {
        EPSG_UTM_NORTH + zone
    } else {
        EPSG_UTM_SOUTH + zone
    }
}

/// Scene file prefix: the metadata URL without `_MTL.txt`.
pub fn root_url(metadata_url: &str) -> Result<&str> {
    metadata_url
        .strip_suffix(MTL_SUFFIX)
        .ok_or_else(|| IngestionError::Parse(format!("not an MTL url: {}", metadata_url)))
}

/// Per-scene asset hrefs, keyed like the template assets.
pub fn scene_hrefs(root: &str) -> Vec<(String, String)> {
    let dir = match root.rfind('/') {
        Some(i) => &root[..=i],
        None => "",
    };

    let mut hrefs = vec![
        ("index".to_string(), format!("{}{}", dir, INDEX_FILE)),
        ("thumbnail".to_string(), format!("{}_thumb_large.jpg", root)),
    ];
    for band in 1..=BAND_COUNT {
        hrefs.push((format!("B{}", band), format!("{}_B{}.TIF", root, band)));
    }
    hrefs.push(("ANG".to_string(), format!("{}_ANG.txt", root)));
    hrefs.push(("MTL".to_string(), format!("{}{}", root, MTL_SUFFIX)));
    hrefs.push(("BQA".to_string(), format!("{}_BQA.TIF", root)));
    hrefs
}

fn merge_assets(
    template: &BTreeMap<String, Asset>,
    hrefs: Vec<(String, String)>,
) -> BTreeMap<String, Asset> {
    let mut assets = template.clone();
    for (key, href) in hrefs {
        let asset = assets.remove(&key).unwrap_or_default().with_href(href);
        assets.insert(key, asset);
    }
    assets
}

/// `DATE_ACQUIRED` + `SCENE_CENTER_TIME` as a UTC instant.
fn acquisition_datetime(md: &MetadataMap) -> Result<DateTime<Utc>> {
    let date_raw = md.require("DATE_ACQUIRED")?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
        .map_err(|e| IngestionError::Parse(format!("DATE_ACQUIRED '{}': {}", date_raw, e)))?;

    let time_raw = md.require("SCENE_CENTER_TIME")?;
    let time = NaiveTime::parse_from_str(time_raw.trim_end_matches('Z'), "%H:%M:%S%.f")
        .map_err(|e| IngestionError::Parse(format!("SCENE_CENTER_TIME '{}': {}", time_raw, e)))?;

    Ok(date.and_time(time).and_utc())
}

fn epsg(md: &MetadataMap, bbox: &BoundingBox) -> Result<Option<u32>> {
    let Some(raw) = md.get("UTM_ZONE") else {
        return Ok(None);
    };
    let zone: u32 = raw
        .trim()
        .parse()
        .map_err(|_| IngestionError::Parse(format!("UTM_ZONE is not a zone: '{}'", raw)))?;
    Ok(Some(utm_epsg(zone, bbox)))
}

/// Build the catalog entry for one scene.
pub fn synthesize(
    metadata_url: &str,
    md: &MetadataMap,
    footprint: &Footprint,
    template: &CollectionTemplate,
    rule: IdRule,
) -> Result<CatalogEntry> {
    let root = root_url(metadata_url)?;

    let scene_id = md.require("LANDSAT_SCENE_ID")?.to_string();
    let product_id = md.get("LANDSAT_PRODUCT_ID").map(str::to_string);
    let tier = Tier::from_category(md.get("COLLECTION_CATEGORY"))?;

    let revision = match tier {
        Tier::PreCollection => None,
        _ => {
            let count = scene_id.chars().count();
            Some(scene_id.chars().skip(count.saturating_sub(2)).collect())
        }
    };

    let properties = EntryProperties {
        collection: template.id().to_string(),
        datetime: acquisition_datetime(md)?,
        sun_azimuth: md.require_f64("SUN_AZIMUTH")?,
        sun_elevation: md.require_f64("SUN_ELEVATION")?,
        cloud_cover: md.require_f64("CLOUD_COVER")?.trunc() as i64,
        row: wrs_code(md, "WRS_ROW")?,
        column: wrs_code(md, "WRS_PATH")?,
        processing_level: md.require("DATA_TYPE")?.to_string(),
        epsg: epsg(md, &footprint.bbox)?,
        product_id: product_id.clone(),
        scene_id: scene_id.clone(),
        tier,
        revision,
    };

    Ok(CatalogEntry {
        kind: "Feature".to_string(),
        id: rule.entry_id(&scene_id, product_id.as_deref())?,
        bbox: footprint.bbox,
        geometry: Geometry::from(footprint),
        properties,
        assets: merge_assets(template.assets(), scene_hrefs(root)),
    })
}
