//! Landsat-8 metadata fixtures.
//!
//! Text produced here follows the layout of real MTL and ANG files closely
//! enough for the parsers; values are representative, not real scenes.

/// Base URL of the public Landsat-8 bucket.
pub const LANDSAT_PDS: &str = "https://landsat-pds.s3.amazonaws.com";

/// A pre-collection scene over path 44, row 34.
pub const PRE_SCENE_ID: &str = "LC80440342015001LGN00";

/// A collection-1 scene over path 44, row 34.
pub const C1_SCENE_ID: &str = "LC80440342017005LGN00";
pub const C1_PRODUCT_ID: &str = "LC08_L1TP_044034_20170105_20170218_01_T1";

/// Builder for MTL file text.
#[derive(Debug, Clone)]
pub struct MtlFixture {
    pub scene_id: String,
    pub product_id: Option<String>,
    pub collection_category: Option<String>,
    /// `YYYY-MM-DD`
    pub date_acquired: String,
    pub scene_center_time: String,
    pub wrs_path: u32,
    pub wrs_row: u32,
    /// `(min_lon, min_lat, max_lon, max_lat)` spanned by the product corners
    pub bbox: (f64, f64, f64, f64),
    pub utm_zone: Option<u32>,
    pub cloud_cover: f64,
    pub sun_azimuth: f64,
    pub sun_elevation: f64,
    pub data_type: String,
}

impl MtlFixture {
    /// Pre-collection scene `LC80440342015001LGN00`.
    pub fn pre_collection() -> Self {
        Self {
            scene_id: PRE_SCENE_ID.to_string(),
            product_id: None,
            collection_category: None,
            date_acquired: "2015-01-01".to_string(),
            scene_center_time: "18:39:02.1234567Z".to_string(),
            wrs_path: 44,
            wrs_row: 34,
            bbox: (-122.9, 36.4, -120.3, 38.5),
            utm_zone: Some(10),
            cloud_cover: 12.98,
            sun_azimuth: 158.14,
            sun_elevation: 26.51,
            data_type: "L1T".to_string(),
        }
    }

    /// Collection-1 Tier 1 scene `LC08_L1TP_044034_20170105_20170218_01_T1`.
    pub fn collection1() -> Self {
        Self {
            scene_id: C1_SCENE_ID.to_string(),
            product_id: Some(C1_PRODUCT_ID.to_string()),
            collection_category: Some("T1".to_string()),
            date_acquired: "2017-01-05".to_string(),
            data_type: "L1TP".to_string(),
            ..Self::pre_collection()
        }
    }

    pub fn with_bbox(mut self, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        self.bbox = (min_lon, min_lat, max_lon, max_lat);
        self
    }

    pub fn with_path_row(mut self, path: u32, row: u32) -> Self {
        self.wrs_path = path;
        self.wrs_row = row;
        self
    }

    pub fn with_utm_zone(mut self, zone: Option<u32>) -> Self {
        self.utm_zone = zone;
        self
    }

    /// File prefix of the scene: product id if any, else scene id.
    pub fn file_stem(&self) -> &str {
        self.product_id.as_deref().unwrap_or(&self.scene_id)
    }

    /// Render the grouped MTL text.
    pub fn render(&self) -> String {
        let (min_lon, min_lat, max_lon, max_lat) = self.bbox;
        let mut out = String::new();
        let mut line = |s: String| {
            out.push_str(&s);
            out.push('\n');
        };

        line("GROUP = L1_METADATA_FILE".into());
        line("  GROUP = METADATA_FILE_INFO".into());
        line("    ORIGIN = \"Image courtesy of the U.S. Geological Survey\"".into());
        line(format!("    LANDSAT_SCENE_ID = \"{}\"", self.scene_id));
        if let Some(product_id) = &self.product_id {
            line(format!("    LANDSAT_PRODUCT_ID = \"{}\"", product_id));
        }
        if let Some(category) = &self.collection_category {
            line(format!("    COLLECTION_CATEGORY = \"{}\"", category));
        }
        line("  END_GROUP = METADATA_FILE_INFO".into());
        line("  GROUP = PRODUCT_METADATA".into());
        line(format!("    DATA_TYPE = \"{}\"", self.data_type));
        line("    SPACECRAFT_ID = \"LANDSAT_8\"".into());
        line(format!("    WRS_PATH = {}", self.wrs_path));
        line(format!("    WRS_ROW = {}", self.wrs_row));
        line(format!("    DATE_ACQUIRED = {}", self.date_acquired));
        line(format!("    SCENE_CENTER_TIME = \"{}\"", self.scene_center_time));
        for (corner, lon, lat) in [
            ("UL", min_lon, max_lat),
            ("UR", max_lon, max_lat),
            ("LL", min_lon, min_lat),
            ("LR", max_lon, min_lat),
        ] {
            line(format!("    CORNER_{}_LAT_PRODUCT = {:.5}", corner, lat));
            line(format!("    CORNER_{}_LON_PRODUCT = {:.5}", corner, lon));
        }
        line("  END_GROUP = PRODUCT_METADATA".into());
        line("  GROUP = IMAGE_ATTRIBUTES".into());
        line(format!("    CLOUD_COVER = {:.2}", self.cloud_cover));
        line(format!("    SUN_AZIMUTH = {:.8}", self.sun_azimuth));
        line(format!("    SUN_ELEVATION = {:.8}", self.sun_elevation));
        line("  END_GROUP = IMAGE_ATTRIBUTES".into());
        line("  GROUP = PROJECTION_PARAMETERS".into());
        line("    MAP_PROJECTION = \"UTM\"".into());
        if let Some(zone) = self.utm_zone {
            line(format!("    UTM_ZONE = {}", zone));
        }
        line("  END_GROUP = PROJECTION_PARAMETERS".into());
        line("END_GROUP = L1_METADATA_FILE".into());
        line("END".into());
        out
    }
}

/// ANG file text with the given band-1 extents and corner positions.
pub fn ang_text(total_lines: u32, total_samps: u32, lines: [f64; 4], samps: [f64; 4]) -> String {
    let list = |v: [f64; 4]| {
        v.iter()
            .map(|x| format!("{:.1}", x))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "GROUP = FILE_HEADER\n\
         \x20 LANDSAT_SCENE_ID = \"{}\"\n\
         \x20 NUMBER_OF_BANDS = 11\n\
         END_GROUP = FILE_HEADER\n\
         GROUP = RPC_BAND01\n\
         \x20 BAND01_NUM_L1T_LINES = {}\n\
         \x20 BAND01_NUM_L1T_SAMPS = {}\n\
         \x20 BAND01_L1T_IMAGE_CORNER_LINES = ( {} )\n\
         \x20 BAND01_L1T_IMAGE_CORNER_SAMPS = ( {} )\n\
         \x20 BAND01_LINE_NUM_COEF = ( 1.0, 0.0 )\n\
         END_GROUP = RPC_BAND01\n\
         END\n",
        C1_SCENE_ID,
        total_lines,
        total_samps,
        list(lines),
        list(samps)
    )
}

/// Static footprint table JSON holding one closed ring for `PPPRRR`.
pub fn footprint_table_json(path_row: &str, ring: [[f64; 2]; 5]) -> String {
    let points = ring
        .iter()
        .map(|p| format!("[{}, {}]", p[0], p[1]))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{\"{}\": [[{}]]}}", path_row, points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_has_groups_and_corners() {
        let text = MtlFixture::pre_collection().render();
        assert!(text.starts_with("GROUP = L1_METADATA_FILE\n"));
        assert!(text.contains("CORNER_UL_LAT_PRODUCT = 38.50000"));
        assert!(text.contains("UTM_ZONE = 10"));
        assert!(!text.contains("LANDSAT_PRODUCT_ID"));
    }

    #[test]
    fn test_collection1_fixture() {
        let mtl = MtlFixture::collection1();
        assert_eq!(mtl.file_stem(), C1_PRODUCT_ID);
        assert!(mtl.render().contains("COLLECTION_CATEGORY = \"T1\""));
    }

    #[test]
    fn test_ang_text() {
        let text = ang_text(100, 200, [0.0, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]);
        assert!(text.contains("BAND01_L1T_IMAGE_CORNER_LINES = ( 0.0, 1.0, 2.0, 3.0 )"));
        assert!(text.contains("  BAND01_NUM_L1T_SAMPS = 200"));
    }
}
