//! Scene list streaming: row shapes, real-time filtering, date ranges.

mod common;

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;

use common::{table_044034, Harness};
use ingestion::{
    BatchOptions, CollectionSelector, SceneFilter, SceneListReader, SceneListSource, SceneRecords,
    Tier,
};
use stac_common::DateRange;
use test_utils::{
    collection1_row, pre_collection_row, temp_scene_list, COLLECTION1_HEADER,
    PRE_COLLECTION_HEADER,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn c1_rows() -> Vec<String> {
    vec![
        collection1_row(
            "LC08_L1TP_044034_20170105_20170105_01_RT",
            "LC80440342017005LGN00",
            "2017-01-05",
            44,
            34,
        ),
        collection1_row(
            "LC08_L1TP_044034_20170121_20170218_01_T1",
            "LC80440342017021LGN00",
            "2017-01-21",
            44,
            34,
        ),
    ]
}

#[test]
fn test_realtime_rows_excluded_by_default() {
    let (_dir, path) = temp_scene_list("scene_list-c1.gz", COLLECTION1_HEADER, &c1_rows()).unwrap();

    let records: Vec<_> = SceneRecords::from_paths(vec![path], SceneFilter::default())
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tier, Tier::T1);
    assert_eq!(
        records[0].product_id.as_deref(),
        Some("LC08_L1TP_044034_20170121_20170218_01_T1")
    );
    assert_eq!(records[0].id, "LC80440342017021LGN00");
}

#[test]
fn test_realtime_rows_included_on_request() {
    let (_dir, path) = temp_scene_list("scene_list-c1.gz", COLLECTION1_HEADER, &c1_rows()).unwrap();
    let filter = SceneFilter {
        include_realtime: true,
        ..SceneFilter::default()
    };

    let mut records = SceneRecords::from_paths(vec![path], filter);
    let tiers: Vec<Tier> = records.by_ref().map(|r| r.unwrap().tier).collect();
    assert_eq!(tiers, vec![Tier::RT, Tier::T1]);
    assert_eq!(records.scanned(), 2);
}

#[test]
fn test_eleven_field_rows_never_tier_filtered() {
    // An RT-looking id in the pre-collection shape is still pre-collection.
    let rows = [pre_collection_row(
        "LC08_L1TP_044034_20170105_20170105_01_RT",
        "2017-01-05",
        44,
        34,
    )];
    let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();

    let records: Vec<_> = SceneRecords::from_paths(vec![path], SceneFilter::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tier, Tier::PreCollection);
    assert_eq!(records[0].product_id, None);
}

#[test]
fn test_date_range_is_inclusive() {
    let rows = [
        pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34),
        pre_collection_row("LC80440342015152LGN00", "2015-06-01", 44, 34),
        pre_collection_row("LC80440342016001LGN00", "2016-01-01", 44, 34),
    ];
    let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();
    let filter = SceneFilter {
        include_realtime: false,
        range: DateRange::new(Some(date(2015, 6, 1)), Some(date(2016, 1, 1))),
    };

    let ids: Vec<String> = SceneRecords::from_paths(vec![path], filter)
        .map(|r| r.unwrap().id)
        .collect();
    assert_eq!(ids, vec!["LC80440342015152LGN00", "LC80440342016001LGN00"]);
}

#[test]
fn test_malformed_row_does_not_stop_stream() {
    let rows = [
        "garbage".to_string(),
        pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34),
    ];
    let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();

    let results: Vec<_> = SceneRecords::from_paths(vec![path], SceneFilter::default()).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert_eq!(results[1].as_ref().unwrap().id, "LC80440342015001LGN00");
}

#[test]
fn test_reads_lists_in_order() {
    let pre = [pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34)];
    let (_pre_dir, pre_path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &pre).unwrap();
    let (_c1_dir, c1_path) = temp_scene_list("scene_list-c1.gz", COLLECTION1_HEADER, &c1_rows()).unwrap();

    let tiers: Vec<Tier> = SceneRecords::from_paths(vec![pre_path, c1_path], SceneFilter::default())
        .map(|r| r.unwrap().tier)
        .collect();
    assert_eq!(tiers, vec![Tier::PreCollection, Tier::T1]);
}

#[tokio::test]
async fn test_out_of_range_records_are_never_fetched() {
    let rows = [
        pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34),
        pre_collection_row("LC80440342016001LGN00", "2016-01-01", 44, 34),
    ];
    let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();
    let harness = Harness::new(table_044034()).await;

    let filter = SceneFilter {
        include_realtime: false,
        range: DateRange::new(Some(date(2017, 1, 1)), Some(date(2017, 12, 31))),
    };
    let stats = harness
        .pipeline
        .run_records(SceneRecords::from_paths(vec![path], filter), false)
        .await;

    assert!(harness.fetcher.calls().is_empty());
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.processed, 0);
}

#[tokio::test]
async fn test_only_in_range_record_is_fetched() {
    let rows = [
        pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34),
        pre_collection_row("LC80440342016001LGN00", "2016-01-01", 44, 34),
    ];
    let (_dir, path) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();
    let harness = Harness::new(table_044034()).await;

    let filter = SceneFilter {
        include_realtime: false,
        range: DateRange::new(None, Some(date(2015, 12, 31))),
    };
    let stats = harness
        .pipeline
        .run_records(SceneRecords::from_paths(vec![path], filter), false)
        .await;

    assert_eq!(
        harness.fetcher.calls(),
        vec!["https://landsat-pds.s3.amazonaws.com/L8/044/034/LC80440342015001LGN00/LC80440342015001LGN00_MTL.txt"]
    );
    // The MTL is not served, so the one scene fails without stopping the run.
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_cached_list_is_not_downloaded_again() {
    let rows = [pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34)];
    let (dir, cached) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();

    // Nothing listens here; a download attempt would fail.
    let source = SceneListSource {
        filename: "scene_list.gz".to_string(),
        url: "http://127.0.0.1:9/scene_list.gz".to_string(),
    };
    let reader = SceneListReader::new(dir.path());

    assert_eq!(reader.fetch(&source).await.unwrap(), cached);
    let records: Vec<_> = reader
        .stream(&[source], SceneFilter::default())
        .await
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_batch_reads_selected_cached_list() {
    let rows = [pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34)];
    let (dir, _) = temp_scene_list("scene_list.gz", PRE_COLLECTION_HEADER, &rows).unwrap();
    let harness = Harness::new(table_044034()).await;

    let options = BatchOptions {
        selector: CollectionSelector::Pre,
        ..BatchOptions::default()
    };
    let stats = harness
        .pipeline
        .run_batch(&SceneListReader::new(dir.path()), &options)
        .await
        .unwrap();

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(harness.fetcher.calls().len(), 1);
}

#[test]
fn test_multi_member_gzip_is_read_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene_list.gz");
    let mut file = File::create(&path).unwrap();

    // Two gzip members appended to one file.
    let first = format!(
        "{}\n{}\n",
        PRE_COLLECTION_HEADER,
        pre_collection_row("LC80440342015001LGN00", "2015-01-01", 44, 34)
    );
    let second = format!(
        "{}\n",
        pre_collection_row("LC80440342015017LGN00", "2015-01-17", 44, 34)
    );
    for text in [first, second] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(text.as_bytes()).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
    }
    file.sync_all().unwrap();

    let ids: Vec<String> = SceneRecords::from_paths(vec![path], SceneFilter::default())
        .map(|r| r.unwrap().id)
        .collect();
    assert_eq!(ids, vec!["LC80440342015001LGN00", "LC80440342015017LGN00"]);
}
