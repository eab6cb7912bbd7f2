//! Landsat scene ingestion library.
//!
//! Turns Landsat-8 scene metadata into STAC catalog entries and merges them
//! into a path-templated catalog tree without duplicates.
//!
//! # Architecture
//!
//! Records flow through the stages one at a time:
//!
//! - [`scene_list`]: stream scene records from the gzip scene lists
//! - [`fetcher`]: read remote text resources line by line (S3 or HTTP)
//! - [`mtl`]: parse grouped `KEY = VALUE` MTL metadata
//! - [`geolocation`]: derive the footprint ring (ANG file, then path/row table)
//! - [`entry`]: build the catalog entry (assets, properties, geometry)
//! - [`merger`]: place the entry at its templated path exactly once
//!
//! [`pipeline`] wires the stages together for batch backfills and for
//! single storage-event triggers.

pub mod collection;
pub mod config;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod footprint;
pub mod geolocation;
pub mod merger;
pub mod mtl;
pub mod pipeline;
pub mod scene_list;
pub mod trigger;

// Re-exports
pub use collection::CollectionTemplate;
pub use config::PipelineConfig;
pub use entry::{synthesize, Asset, CatalogEntry, EntryProperties, IdRule};
pub use error::{IngestionError, Result};
pub use fetcher::{LineSource, LineStream, RemoteFetcher};
pub use footprint::{Footprint, FootprintTable};
pub use geolocation::GeolocationResolver;
pub use merger::{resolve_path_template, CatalogMerger, MergeOutcome};
pub use mtl::MetadataMap;
pub use pipeline::{BatchOptions, Pipeline, RunStats};
pub use scene_list::{
    CollectionSelector, SceneFilter, SceneListReader, SceneListRow, SceneListSource, SceneRecord,
    SceneRecords, Tier,
};
pub use trigger::StorageEvent;
