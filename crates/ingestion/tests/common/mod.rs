//! Common helpers for ingestion integration tests.
//!
//! Provides:
//! - A spy fetcher serving in-memory text and recording every URL asked for
//! - A notifier recording published messages
//! - A pipeline wired to an in-memory catalog

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ingestion::fetcher::lines_from_str;
use ingestion::{
    CollectionTemplate, FootprintTable, IngestionError, LineSource, LineStream, Pipeline,
    PipelineConfig, Result,
};
use stac_common::{StacError, StacResult};
use storage::{Catalog, Notifier, ObjectStorage};

pub const CATALOG_ROOT: &str = "https://landsat-stac.s3.amazonaws.com";

/// Serves registered URLs; everything else is not found.
#[derive(Default)]
pub struct SpyFetcher {
    resources: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl SpyFetcher {
    pub fn serve(&self, url: impl Into<String>, text: impl Into<String>) {
        self.resources.lock().unwrap().insert(url.into(), text.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LineSource for SpyFetcher {
    async fn fetch_lines(&self, url: &str) -> Result<LineStream> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.resources.lock().unwrap().get(url) {
            Some(text) => Ok(lines_from_str(text)),
            None => Err(IngestionError::FetchNotFound(url.to_string())),
        }
    }
}

/// Records published messages, optionally failing every publish.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, message: &str) -> StacResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), message.to_string()));
        if self.fail {
            return Err(StacError::PublishError {
                topic: topic.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

/// A pipeline over an in-memory catalog.
pub struct Harness {
    pub fetcher: Arc<SpyFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<ObjectStorage>,
    pub catalog: Arc<Catalog>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub async fn new(table: FootprintTable) -> Self {
        Self::with_notifier(table, RecordingNotifier::default()).await
    }

    pub async fn with_notifier(table: FootprintTable, notifier: RecordingNotifier) -> Self {
        let fetcher = Arc::new(SpyFetcher::default());
        let notifier = Arc::new(notifier);
        let storage = Arc::new(ObjectStorage::in_memory("landsat-stac"));
        let catalog = Arc::new(
            Catalog::open(storage.clone(), "", CATALOG_ROOT, "landsat-stac")
                .await
                .unwrap(),
        );
        let template = Arc::new(CollectionTemplate::landsat8_l1().unwrap());

        let pipeline = Pipeline::new(
            fetcher.clone(),
            Arc::new(table),
            catalog.clone(),
            template,
            notifier.clone(),
            &PipelineConfig::default(),
        );

        Self {
            fetcher,
            notifier,
            storage,
            catalog,
            pipeline,
        }
    }

    /// Entry documents stored under the collection.
    pub async fn entry_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .storage
            .list("landsat-8-l1")
            .await
            .unwrap()
            .into_iter()
            .filter(|k| !k.ends_with("catalog.json"))
            .collect();
        keys.sort();
        keys
    }
}

/// Table with one rectangular footprint for path 44 row 34.
pub fn table_044034() -> FootprintTable {
    FootprintTable::from_rings([(
        "044034".to_string(),
        [
            [-122.9, 38.5],
            [-120.3, 38.5],
            [-120.3, 36.4],
            [-122.9, 36.4],
            [-122.9, 38.5],
        ],
    )])
}
