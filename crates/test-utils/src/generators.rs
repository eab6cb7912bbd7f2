//! Scene list rows and gzip scene list files.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::LANDSAT_PDS;

/// Header of the pre-collection `scene_list.gz`.
pub const PRE_COLLECTION_HEADER: &str =
    "entityId,acquisitionDate,cloudCover,processingLevel,path,row,min_lat,min_lon,max_lat,max_lon,download_url";

/// Header of the collection-1 `scene_list.gz`.
pub const COLLECTION1_HEADER: &str =
    "productId,entityId,acquisitionDate,cloudCover,processingLevel,path,row,min_lat,min_lon,max_lat,max_lon,download_url";

/// An 11-field pre-collection row. `acquired` is `YYYY-MM-DD`.
pub fn pre_collection_row(scene_id: &str, acquired: &str, path: u32, row: u32) -> String {
    format!(
        "{id},{acquired} 18:39:02.123456,12.98,L1T,{path},{row},36.4,-122.9,38.5,-120.3,{base}/L8/{path:03}/{row:03}/{id}/index.html",
        id = scene_id,
        acquired = acquired,
        path = path,
        row = row,
        base = LANDSAT_PDS,
    )
}

/// A 12-field collection-1 row. The tier is the product id's suffix.
pub fn collection1_row(product_id: &str, scene_id: &str, acquired: &str, path: u32, row: u32) -> String {
    format!(
        "{pid},{id},{acquired} 18:39:02.123456,3.1,L1TP,{path},{row},36.4,-122.9,38.5,-120.3,{base}/c1/L8/{path:03}/{row:03}/{pid}/index.html",
        pid = product_id,
        id = scene_id,
        acquired = acquired,
        path = path,
        row = row,
        base = LANDSAT_PDS,
    )
}

/// Write `header` and `rows` gzip-compressed to `path`.
pub fn write_scene_list<S: AsRef<str>>(path: &Path, header: &str, rows: &[S]) -> io::Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::fast());
    writeln!(encoder, "{}", header)?;
    for row in rows {
        writeln!(encoder, "{}", row.as_ref())?;
    }
    encoder.finish()?.sync_all()
}

/// A temporary directory holding one gzip scene list named `filename`.
///
/// Keep the returned [`TempDir`] alive while the file is in use.
pub fn temp_scene_list<S: AsRef<str>>(
    filename: &str,
    header: &str,
    rows: &[S],
) -> io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(filename);
    write_scene_list(&path, header, rows)?;
    Ok((dir, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_row_shapes() {
        let pre = pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34);
        assert_eq!(pre.split(',').count(), 11);
        assert!(pre.ends_with("/L8/044/034/LC80440342015001LGN00/index.html"));

        let c1 = collection1_row(
            "LC08_L1TP_044034_20170105_20170218_01_RT",
            "LC80440342017005LGN00",
            "2017-01-05",
            44,
            34,
        );
        assert_eq!(c1.split(',').count(), 12);
    }

    #[test]
    fn test_temp_scene_list_is_gzip() {
        let rows = [pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34)];
        let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("entityId,"));
    }
}
