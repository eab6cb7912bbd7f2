//! Catalog merger: idempotence, lazy collection creation, failure isolation.

mod common;

use std::sync::Arc;

use common::{table_044034, CATALOG_ROOT};
use ingestion::{
    synthesize, CatalogEntry, CatalogMerger, CollectionTemplate, GeolocationResolver, IdRule,
    IngestionError, MergeOutcome, MetadataMap, Tier,
};
use storage::{Catalog, ObjectStorage};
use test_utils::MtlFixture;

const MTL_URL: &str = "https://landsat-pds.s3.amazonaws.com/L8/044/034/LC80440342015001LGN00/LC80440342015001LGN00_MTL.txt";

async fn open_catalog() -> Arc<Catalog> {
    let storage = Arc::new(ObjectStorage::in_memory("landsat-stac"));
    Arc::new(
        Catalog::open(storage, "", CATALOG_ROOT, "landsat-stac")
            .await
            .unwrap(),
    )
}

async fn pre_collection_entry() -> CatalogEntry {
    let md = MetadataMap::parse(MtlFixture::pre_collection().render().lines());
    let fetcher = Arc::new(common::SpyFetcher::default());
    let resolver = GeolocationResolver::new(fetcher, Arc::new(table_044034()));
    let footprint = resolver
        .resolve(&md, MTL_URL.trim_end_matches("_MTL.txt"), Tier::PreCollection)
        .await
        .unwrap();
    let template = CollectionTemplate::landsat8_l1().unwrap();
    synthesize(MTL_URL, &md, &footprint, &template, IdRule::SceneId).unwrap()
}

fn merger(catalog: Arc<Catalog>, path_template: &str) -> CatalogMerger {
    CatalogMerger::new(
        catalog,
        Arc::new(CollectionTemplate::landsat8_l1().unwrap()),
        path_template,
    )
}

#[tokio::test]
async fn test_merge_twice_stores_once() {
    let catalog = open_catalog().await;
    let merger = merger(catalog.clone(), "{column}/{row}/{date}/{id}.json");
    let entry = pre_collection_entry().await;

    let first = merger.merge(&entry).await;
    let MergeOutcome::Inserted { location } = first else {
        panic!("expected insert, got {:?}", first);
    };
    assert_eq!(
        location,
        format!(
            "{}/landsat-8-l1/044/034/2015-01-01/LC80440342015001.json",
            CATALOG_ROOT
        )
    );

    let second = merger.merge(&entry).await;
    assert!(
        matches!(second, MergeOutcome::AlreadyExists { ref key } if key == "landsat-8-l1/044/034/2015-01-01/LC80440342015001.json"),
        "{:?}",
        second
    );
}

#[tokio::test]
async fn test_collection_created_lazily_once() {
    let catalog = open_catalog().await;
    assert!(catalog.sub_catalogs().await.unwrap().is_empty());

    let merger = merger(catalog.clone(), "{column}/{row}/{date}/{id}.json");
    let entry = pre_collection_entry().await;
    assert!(merger.merge(&entry).await.is_inserted());

    // A second merger over the same catalog reuses the attached collection.
    let other = self::merger(catalog.clone(), "{id}.json");
    assert!(other.merge(&entry).await.is_inserted());

    let subs = catalog.sub_catalogs().await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id(), "landsat-8-l1");
}

#[tokio::test]
async fn test_existence_check_sees_external_writes() {
    let catalog = open_catalog().await;
    let first = merger(catalog.clone(), "{column}/{row}/{date}/{id}.json");
    let second = merger(catalog.clone(), "{column}/{row}/{date}/{id}.json");
    let entry = pre_collection_entry().await;

    assert!(first.merge(&entry).await.is_inserted());
    assert!(matches!(
        second.merge(&entry).await,
        MergeOutcome::AlreadyExists { .. }
    ));
}

#[tokio::test]
async fn test_bad_template_fails_without_panicking() {
    let catalog = open_catalog().await;
    let merger = merger(catalog.clone(), "{column}/{satellite}/{id}.json");
    let entry = pre_collection_entry().await;

    match merger.merge(&entry).await {
        MergeOutcome::Failed { id, error } => {
            assert_eq!(id, "LC80440342015001");
            assert!(matches!(error, IngestionError::Parse(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_entry_key_matches_stored_document() {
    let catalog = open_catalog().await;
    let merger = merger(catalog.clone(), "{column}/{row}/{date}/{id}.json");
    let entry = pre_collection_entry().await;

    let key = merger.entry_key(&entry).unwrap();
    assert!(!catalog.exists(&key).await.unwrap());
    assert!(merger.merge(&entry).await.is_inserted());
    assert!(catalog.exists(&key).await.unwrap());
}
