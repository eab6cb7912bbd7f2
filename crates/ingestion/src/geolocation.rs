//! Footprint resolution for a scene.
//!
//! The bounding box always comes from the MTL product corners. The polygon
//! ring comes from the first tier that succeeds:
//!
//! 1. the ANG file's band-1 image corners, mapped into the corner bbox
//!    (collection-1 scenes only)
//! 2. the static WRS-2 path/row footprint table

use futures::TryStreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use stac_common::BoundingBox;

use crate::error::{IngestionError, Result};
use crate::fetcher::{LineSource, LineStream};
use crate::footprint::{close_ring, Footprint, FootprintTable, Ring};
use crate::mtl::MetadataMap;
use crate::scene_list::Tier;

const ANG_SUFFIX: &str = "_ANG.txt";

const NUM_LINES: &str = "BAND01_NUM_L1T_LINES";
const NUM_SAMPS: &str = "BAND01_NUM_L1T_SAMPS";
const CORNER_LINES: &str = "BAND01_L1T_IMAGE_CORNER_LINES";
const CORNER_SAMPS: &str = "BAND01_L1T_IMAGE_CORNER_SAMPS";

/// MTL product corner fields, in ring order.
const CORNERS: [(&str, &str); 4] = [
    ("CORNER_UL_LON_PRODUCT", "CORNER_UL_LAT_PRODUCT"),
    ("CORNER_UR_LON_PRODUCT", "CORNER_UR_LAT_PRODUCT"),
    ("CORNER_LR_LON_PRODUCT", "CORNER_LR_LAT_PRODUCT"),
    ("CORNER_LL_LON_PRODUCT", "CORNER_LL_LAT_PRODUCT"),
];

/// Why the ANG tier did not produce a ring. Every variant means "fall back".
#[derive(Debug)]
pub enum AngFallback {
    Unavailable(String),
    MissingField(&'static str),
    Malformed(String),
}

impl fmt::Display for AngFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngFallback::Unavailable(e) => write!(f, "ANG file unavailable: {}", e),
            AngFallback::MissingField(key) => write!(f, "ANG file lacks {}", key),
            AngFallback::Malformed(e) => write!(f, "ANG file malformed: {}", e),
        }
    }
}

/// Band-1 image extents and corner positions read from an ANG file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AngCorners {
    pub total_lines: f64,
    pub total_samps: f64,
    pub lines: [f64; 4],
    pub samps: [f64; 4],
}

impl AngCorners {
    /// Scan ANG lines, stopping as soon as both corner arrays are read.
    pub async fn scan(mut lines: LineStream) -> std::result::Result<Self, AngFallback> {
        let mut total_lines = None;
        let mut total_samps = None;
        let mut corner_lines = None;
        let mut corner_samps = None;

        while let Some(line) = lines
            .try_next()
            .await
            .map_err(|e| AngFallback::Unavailable(e.to_string()))?
        {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                NUM_LINES => total_lines = Some(parse_number(NUM_LINES, value)?),
                NUM_SAMPS => total_samps = Some(parse_number(NUM_SAMPS, value)?),
                CORNER_LINES => corner_lines = Some(parse_corners(CORNER_LINES, value)?),
                CORNER_SAMPS => corner_samps = Some(parse_corners(CORNER_SAMPS, value)?),
                _ => {}
            }
            if corner_lines.is_some() && corner_samps.is_some() {
                break;
            }
        }

        let corners = Self {
            total_lines: total_lines.ok_or(AngFallback::MissingField(NUM_LINES))?,
            total_samps: total_samps.ok_or(AngFallback::MissingField(NUM_SAMPS))?,
            lines: corner_lines.ok_or(AngFallback::MissingField(CORNER_LINES))?,
            samps: corner_samps.ok_or(AngFallback::MissingField(CORNER_SAMPS))?,
        };
        if corners.total_lines <= 0.0 || corners.total_samps <= 0.0 {
            return Err(AngFallback::Malformed("zero image extent".to_string()));
        }
        Ok(corners)
    }

    /// Map image positions to lon/lat by linear interpolation over `bbox`.
    ///
    /// Image line 0 is the north edge, so latitude runs opposite to line number.
    pub fn to_ring(&self, bbox: &BoundingBox) -> Ring {
        let mut corners = [[0.0; 2]; 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            let lon = self.samps[i] / self.total_samps * bbox.width() + bbox.min_x;
            let lat = (self.total_lines - self.lines[i]) / self.total_lines * bbox.height()
                + bbox.min_y;
            *corner = [lon, lat];
        }
        close_ring(corners)
    }
}

fn parse_number(key: &'static str, value: &str) -> std::result::Result<f64, AngFallback> {
    value
        .trim()
        .parse()
        .map_err(|_| AngFallback::Malformed(format!("{} = {}", key, value.trim())))
}

/// Parse `( a, b, c, d )`.
fn parse_corners(key: &'static str, value: &str) -> std::result::Result<[f64; 4], AngFallback> {
    let inner = value.trim().trim_start_matches('(').trim_end_matches(')');
    let values = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| AngFallback::Malformed(format!("{} = {}", key, value.trim())))?;

    values
        .try_into()
        .map_err(|v: Vec<f64>| AngFallback::Malformed(format!("{} has {} values", key, v.len())))
}

/// Bounding box of the four MTL product corners.
pub fn corner_bbox(md: &MetadataMap) -> Result<BoundingBox> {
    let mut points = Vec::with_capacity(CORNERS.len());
    for (lon_key, lat_key) in CORNERS {
        points.push((md.require_f64(lon_key)?, md.require_f64(lat_key)?));
    }
    BoundingBox::from_points(points)
        .ok_or_else(|| IngestionError::Parse("scene has no corner coordinates".to_string()))
}

/// Zero-padded 3-digit WRS code from an MTL field (`WRS_PATH`, `WRS_ROW`).
pub fn wrs_code(md: &MetadataMap, key: &str) -> Result<String> {
    Ok(format!("{:0>3}", md.require(key)?.trim()))
}

/// Resolves scene footprints.
pub struct GeolocationResolver {
    fetcher: Arc<dyn LineSource>,
    table: Arc<FootprintTable>,
}

impl GeolocationResolver {
    pub fn new(fetcher: Arc<dyn LineSource>, table: Arc<FootprintTable>) -> Self {
        Self { fetcher, table }
    }

    /// Resolve the footprint of a scene whose files share `root_url`
    /// (the MTL URL without `_MTL.txt`).
    #[instrument(skip(self, md), fields(root_url = %root_url, tier = %tier))]
    pub async fn resolve(&self, md: &MetadataMap, root_url: &str, tier: Tier) -> Result<Footprint> {
        let bbox = corner_bbox(md)?;

        if tier != Tier::PreCollection {
            let ang_url = format!("{}{}", root_url, ANG_SUFFIX);
            match self.ang_ring(&ang_url, &bbox).await {
                Ok(ring) => {
                    debug!("Footprint from ANG corners");
                    return Ok(Footprint::new(ring, bbox));
                }
                Err(reason) => {
                    warn!(url = %ang_url, reason = %reason, "Falling back to path/row footprint")
                }
            }
        }

        let path = wrs_code(md, "WRS_PATH")?;
        let row = wrs_code(md, "WRS_ROW")?;
        let ring = self
            .table
            .lookup(&path, &row)
            .ok_or(IngestionError::NoFootprint { path, row })?;

        debug!("Footprint from path/row table");
        Ok(Footprint::new(ring, bbox))
    }

    async fn ang_ring(
        &self,
        url: &str,
        bbox: &BoundingBox,
    ) -> std::result::Result<Ring, AngFallback> {
        let lines = self
            .fetcher
            .fetch_lines(url)
            .await
            .map_err(|e| AngFallback::Unavailable(e.to_string()))?;
        let corners = AngCorners::scan(lines).await?;
        Ok(corners.to_ring(bbox))
    }
}
