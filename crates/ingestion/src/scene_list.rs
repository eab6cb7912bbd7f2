//! Streaming reader for the Landsat-8 gzip scene lists.
//!
//! Two list shapes exist:
//!
//! ```text
//! pre-collection (11 fields)
//! entityId,acquisitionDate,cloudCover,processingLevel,path,row,min_lat,min_lon,max_lat,max_lon,download_url
//! collection-1 (12 fields)
//! productId,entityId,acquisitionDate,cloudCover,processingLevel,path,row,min_lat,min_lon,max_lat,max_lon,download_url
//! ```
//!
//! The lists hold millions of rows, so they are downloaded once into a local
//! cache and then decompressed and read one line at a time.

use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use stac_common::time::parse_timestamp;
use stac_common::DateRange;

use crate::error::{IngestionError, Result};

/// Rows scanned between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 10_000;

const COLLECTION1_FIELDS: usize = 12;
const MTL_SUFFIX: &str = "_MTL.txt";
const INDEX_FILE: &str = "index.html";

/// Processing tier of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "pre-collection")]
    PreCollection,
    T1,
    T2,
    RT,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PreCollection => "pre-collection",
            Tier::T1 => "T1",
            Tier::T2 => "T2",
            Tier::RT => "RT",
        }
    }

    /// Tier from a collection-1 product id suffix, e.g. `..._01_RT`.
    pub fn from_product_id(product_id: &str) -> Result<Self> {
        let suffix = product_id.rsplit('_').next().unwrap_or_default();
        suffix.parse()
    }

    /// Tier from MTL `COLLECTION_CATEGORY`; pre-collection scenes lack the field.
    pub fn from_category(category: Option<&str>) -> Result<Self> {
        category.map_or(Ok(Tier::PreCollection), str::parse)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "T1" => Ok(Tier::T1),
            "T2" => Ok(Tier::T2),
            "RT" => Ok(Tier::RT),
            "pre-collection" => Ok(Tier::PreCollection),
            other => Err(IngestionError::Parse(format!("unknown tier '{}'", other))),
        }
    }
}

/// Which scene lists to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionSelector {
    Pre,
    C1,
    #[default]
    All,
}

impl CollectionSelector {
    pub fn includes_pre(&self) -> bool {
        matches!(self, CollectionSelector::Pre | CollectionSelector::All)
    }

    pub fn includes_c1(&self) -> bool {
        matches!(self, CollectionSelector::C1 | CollectionSelector::All)
    }
}

impl FromStr for CollectionSelector {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(CollectionSelector::Pre),
            "c1" => Ok(CollectionSelector::C1),
            "all" => Ok(CollectionSelector::All),
            other => Err(IngestionError::InvalidConfig(format!(
                "collections must be pre, c1 or all, got '{}'",
                other
            ))),
        }
    }
}

/// A remote scene list and the file name it is cached under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneListSource {
    pub filename: String,
    pub url: String,
}

impl SceneListSource {
    pub fn pre_collection() -> Self {
        Self {
            filename: "scene_list.gz".to_string(),
            url: "https://landsat-pds.s3.amazonaws.com/scene_list.gz".to_string(),
        }
    }

    pub fn collection1() -> Self {
        Self {
            filename: "scene_list-c1.gz".to_string(),
            url: "https://landsat-pds.s3.amazonaws.com/c1/L8/scene_list.gz".to_string(),
        }
    }

    /// Default sources for a selector, pre-collection first.
    pub fn for_selector(selector: CollectionSelector) -> Vec<Self> {
        let mut sources = Vec::new();
        if selector.includes_pre() {
            sources.push(Self::pre_collection());
        }
        if selector.includes_c1() {
            sources.push(Self::collection1());
        }
        sources
    }
}

/// One data row of a scene list, shape decided by field count.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneListRow {
    PreCollection {
        entity_id: String,
        acquired: NaiveDateTime,
        url: String,
    },
    Collection1 {
        product_id: String,
        entity_id: String,
        acquired: NaiveDateTime,
        url: String,
        tier: Tier,
    },
}

impl SceneListRow {
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();

        if fields.len() == COLLECTION1_FIELDS {
            let product_id = fields[0].to_string();
            let tier = Tier::from_product_id(&product_id)?;
            return Ok(SceneListRow::Collection1 {
                entity_id: fields[1].to_string(),
                acquired: parse_acquired(fields[2])?,
                url: fields[COLLECTION1_FIELDS - 1].to_string(),
                product_id,
                tier,
            });
        }

        if fields.len() < 3 {
            return Err(IngestionError::Parse(format!(
                "scene list row has {} fields: '{}'",
                fields.len(),
                line
            )));
        }

        Ok(SceneListRow::PreCollection {
            entity_id: fields[0].to_string(),
            acquired: parse_acquired(fields[1])?,
            url: fields[fields.len() - 1].to_string(),
        })
    }

    pub fn tier(&self) -> Tier {
        match self {
            SceneListRow::PreCollection { .. } => Tier::PreCollection,
            SceneListRow::Collection1 { tier, .. } => *tier,
        }
    }
}

fn parse_acquired(s: &str) -> Result<NaiveDateTime> {
    parse_timestamp(s).map_err(|e| IngestionError::Parse(e.to_string()))
}

/// One scene to ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene (entity) id, e.g. `LC80440342015001LGN00`
    pub id: String,
    /// Collection-1 product id, e.g. `LC08_L1TP_044034_20150101_20170415_01_T1`
    pub product_id: Option<String>,
    pub acquired: NaiveDateTime,
    pub source_url: String,
    pub tier: Tier,
}

impl From<SceneListRow> for SceneRecord {
    fn from(row: SceneListRow) -> Self {
        match row {
            SceneListRow::PreCollection {
                entity_id,
                acquired,
                url,
            } => SceneRecord {
                id: entity_id,
                product_id: None,
                acquired,
                source_url: url,
                tier: Tier::PreCollection,
            },
            SceneListRow::Collection1 {
                product_id,
                entity_id,
                acquired,
                url,
                tier,
            } => SceneRecord {
                id: entity_id,
                product_id: Some(product_id),
                acquired,
                source_url: url,
                tier,
            },
        }
    }
}

impl SceneRecord {
    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquired.date()
    }

    /// Name the scene's files are prefixed with.
    pub fn file_stem(&self) -> &str {
        self.product_id.as_deref().unwrap_or(&self.id)
    }

    /// URL of the scene's MTL file.
    ///
    /// Scene list URLs point at the scene's `index.html`.
    pub fn metadata_url(&self) -> String {
        let mtl = format!("{}{}", self.file_stem(), MTL_SUFFIX);
        match self.source_url.strip_suffix(INDEX_FILE) {
            Some(dir) => format!("{}{}", dir, mtl),
            None => format!("{}/{}", self.source_url.trim_end_matches('/'), mtl),
        }
    }

    /// WRS path and row taken from the source URL (`.../PPP/RRR/<scene>/...`).
    pub fn path_row(&self) -> Option<(String, String)> {
        let segments: Vec<&str> = self.source_url.split('/').collect();
        segments.windows(2).rev().find_map(|pair| {
            let is_code = |s: &str| s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit());
            (is_code(pair[0]) && is_code(pair[1])).then(|| (pair[0].to_string(), pair[1].to_string()))
        })
    }
}

/// Row filters applied before any per-record work.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneFilter {
    pub include_realtime: bool,
    pub range: DateRange,
}

impl SceneFilter {
    fn accepts_tier(&self, tier: Tier) -> bool {
        tier != Tier::RT || self.include_realtime
    }
}

type ListLines = Lines<Box<dyn BufRead + Send>>;

/// Lazily decoded records from one or more cached scene lists.
///
/// Rows excluded by the filter are skipped silently. Malformed rows are
/// yielded as errors so the caller can log them and continue.
pub struct SceneRecords {
    pending: VecDeque<PathBuf>,
    current: Option<ListLines>,
    filter: SceneFilter,
    scanned: u64,
}

impl SceneRecords {
    pub fn from_paths(paths: Vec<PathBuf>, filter: SceneFilter) -> Self {
        Self {
            pending: paths.into(),
            current: None,
            filter,
            scanned: 0,
        }
    }

    /// Data rows read so far, across all lists.
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.pending.pop_front()?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return Some(Err(e.into())),
        };
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(MultiGzDecoder::new(file)));
        let mut lines = reader.lines();

        // header
        if let Some(Err(e)) = lines.next() {
            return Some(Err(e.into()));
        }

        info!(path = %path.display(), "Reading scene list");
        self.current = Some(lines);
        Some(Ok(()))
    }

    fn filter_row(&self, row: SceneListRow) -> Option<SceneRecord> {
        if !self.filter.accepts_tier(row.tier()) {
            return None;
        }
        let record = SceneRecord::from(row);
        if !self.filter.range.contains(&record.acquisition_date()) {
            return None;
        }
        Some(record)
    }
}

impl Iterator for SceneRecords {
    type Item = Result<SceneRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(lines) = self.current.as_mut() else {
                match self.open_next()? {
                    Ok(()) => continue,
                    Err(e) => return Some(Err(e)),
                }
            };

            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.current = None;
                    return Some(Err(e.into()));
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            self.scanned += 1;
            if self.scanned % PROGRESS_INTERVAL == 0 {
                info!(scanned = self.scanned, "Scene list progress");
            }

            match SceneListRow::parse(&line) {
                Ok(row) => {
                    if let Some(record) = self.filter_row(row) {
                        return Some(Ok(record));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Downloads scene lists into a local cache and streams their records.
pub struct SceneListReader {
    client: Client,
    cache_dir: PathBuf,
}

impl SceneListReader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local copy of a scene list, downloaded only when not cached yet.
    #[instrument(skip(self), fields(url = %source.url))]
    pub async fn fetch(&self, source: &SceneListSource) -> Result<PathBuf> {
        let path = self.cache_dir.join(&source.filename);
        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Using cached scene list");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        info!(path = %path.display(), "Downloading scene list");

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| IngestionError::Fetch {
                url: source.url.clone(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(IngestionError::FetchNotFound(format!(
                "{} ({})",
                source.url,
                response.status()
            )));
        }

        // Only a complete download is renamed to the cache path.
        let partial = path.with_extension("partial");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| IngestionError::Fetch {
                url: source.url.clone(),
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        tokio::fs::rename(&partial, &path).await?;

        Ok(path)
    }

    /// Stream records from the given lists, downloading any that are missing.
    pub async fn stream(
        &self,
        sources: &[SceneListSource],
        filter: SceneFilter,
    ) -> Result<SceneRecords> {
        let mut paths = Vec::with_capacity(sources.len());
        for source in sources {
            paths.push(self.fetch(source).await?);
        }
        Ok(SceneRecords::from_paths(paths, filter))
    }

    /// Stream records for a collection selector using the default list URLs.
    pub async fn stream_selected(
        &self,
        selector: CollectionSelector,
        filter: SceneFilter,
    ) -> Result<SceneRecords> {
        self.stream(&SceneListSource::for_selector(selector), filter)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRE_ROW: &str = "LC80440342015001LGN00,2015-01-01 18:39:02.123456,12.5,L1T,44,34,36.4,-122.7,38.5,-120.0,https://landsat-pds.s3.amazonaws.com/L8/044/034/LC80440342015001LGN00/index.html";
    const C1_ROW: &str = "LC08_L1TP_044034_20170105_20170105_01_RT,LC80440342017005LGN00,2017-01-05 18:39:02.123456,3.1,L1TP,44,34,36.4,-122.7,38.5,-120.0,https://landsat-pds.s3.amazonaws.com/c1/L8/044/034/LC08_L1TP_044034_20170105_20170105_01_RT/index.html";

    #[test]
    fn test_parse_pre_collection_row() {
        let row = SceneListRow::parse(PRE_ROW).unwrap();
        assert_eq!(row.tier(), Tier::PreCollection);
        let record = SceneRecord::from(row);
        assert_eq!(record.id, "LC80440342015001LGN00");
        assert_eq!(record.product_id, None);
        assert_eq!(
            record.acquisition_date(),
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
        );
        assert_eq!(
            record.metadata_url(),
            "https://landsat-pds.s3.amazonaws.com/L8/044/034/LC80440342015001LGN00/LC80440342015001LGN00_MTL.txt"
        );
    }

    #[test]
    fn test_parse_collection1_row() {
        let row = SceneListRow::parse(C1_ROW).unwrap();
        assert_eq!(row.tier(), Tier::RT);
        let record = SceneRecord::from(row);
        assert_eq!(record.id, "LC80440342017005LGN00");
        assert_eq!(
            record.product_id.as_deref(),
            Some("LC08_L1TP_044034_20170105_20170105_01_RT")
        );
        assert!(record
            .metadata_url()
            .ends_with("/LC08_L1TP_044034_20170105_20170105_01_RT_MTL.txt"));
        assert_eq!(record.path_row(), Some(("044".to_string(), "034".to_string())));
    }

    #[test]
    fn test_short_row_is_error() {
        assert!(SceneListRow::parse("just-an-id").is_err());
        assert!(SceneListRow::parse("id,not-a-date,url").is_err());
    }

    #[test]
    fn test_unknown_product_tier_is_error() {
        let row = C1_ROW.replacen("_01_RT", "_01_XX", 1);
        assert!(SceneListRow::parse(&row).is_err());
    }

    #[test]
    fn test_realtime_filter() {
        let record = SceneRecord::from(SceneListRow::parse(C1_ROW).unwrap());
        assert!(!SceneFilter::default().accepts_tier(record.tier));
        let filter = SceneFilter {
            include_realtime: true,
            ..Default::default()
        };
        assert!(filter.accepts_tier(record.tier));
        assert!(SceneFilter::default().accepts_tier(Tier::PreCollection));
    }

    #[test]
    fn test_tier_from_category() {
        assert_eq!(Tier::from_category(None).unwrap(), Tier::PreCollection);
        assert_eq!(Tier::from_category(Some("T2")).unwrap(), Tier::T2);
        assert!(Tier::from_category(Some("A1")).is_err());
    }

    #[test]
    fn test_selector_sources() {
        assert_eq!(SceneListSource::for_selector(CollectionSelector::All).len(), 2);
        assert_eq!(
            SceneListSource::for_selector(CollectionSelector::C1),
            vec![SceneListSource::collection1()]
        );
        assert_eq!("PRE".parse::<CollectionSelector>().unwrap(), CollectionSelector::Pre);
        assert!("c2".parse::<CollectionSelector>().is_err());
    }
}
