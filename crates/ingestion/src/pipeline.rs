//! Scene-to-entry pipeline.
//!
//! Each scene flows fetch → parse → resolve → synthesize → merge → publish
//! before the next one is pulled. Batch runs isolate per-scene failures;
//! trigger runs surface them.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use stac_common::DateRange;
use storage::{Catalog, Notifier};

use crate::collection::CollectionTemplate;
use crate::config::PipelineConfig;
use crate::entry::{self, synthesize, CatalogEntry, IdRule};
use crate::error::{IngestionError, Result};
use crate::fetcher::LineSource;
use crate::footprint::FootprintTable;
use crate::geolocation::GeolocationResolver;
use crate::merger::{CatalogMerger, MergeOutcome};
use crate::mtl::MetadataMap;
use crate::scene_list::{
    CollectionSelector, SceneFilter, SceneListReader, SceneRecord, SceneRecords, Tier,
    PROGRESS_INTERVAL,
};
use crate::trigger::StorageEvent;

/// Options of a batch backfill.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub selector: CollectionSelector,
    pub include_realtime: bool,
    /// Skip records whose entry key already exists, before fetching metadata
    pub only_missing: bool,
    pub range: DateRange,
}

impl BatchOptions {
    pub fn filter(&self) -> SceneFilter {
        SceneFilter {
            include_realtime: self.include_realtime,
            range: self.range,
        }
    }
}

/// Counters of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Scene list rows read, before filtering
    pub scanned: u64,
    /// Records that went through the pipeline
    pub processed: u64,
    pub inserted: u64,
    pub already_present: u64,
    /// Records skipped by the only-missing check
    pub skipped: u64,
    pub failed: u64,
}

/// The assembled pipeline.
pub struct Pipeline {
    fetcher: Arc<dyn LineSource>,
    resolver: GeolocationResolver,
    merger: CatalogMerger,
    template: Arc<CollectionTemplate>,
    notifier: Arc<dyn Notifier>,
    topic: String,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn LineSource>,
        table: Arc<FootprintTable>,
        catalog: Arc<Catalog>,
        template: Arc<CollectionTemplate>,
        notifier: Arc<dyn Notifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            resolver: GeolocationResolver::new(fetcher.clone(), table),
            merger: CatalogMerger::new(catalog, template.clone(), config.path_template.clone()),
            fetcher,
            template,
            notifier,
            topic: config.publish_topic.clone(),
        }
    }

    pub fn merger(&self) -> &CatalogMerger {
        &self.merger
    }

    /// Fetch, parse and resolve one scene into a catalog entry.
    pub async fn build_entry(&self, metadata_url: &str, rule: IdRule) -> Result<CatalogEntry> {
        let lines = self.fetcher.fetch_lines(metadata_url).await?;
        let md = MetadataMap::parse_stream(lines).await?;
        debug!(fields = md.len(), "Parsed MTL");

        let tier = Tier::from_category(md.get("COLLECTION_CATEGORY"))?;
        let root = entry::root_url(metadata_url)?;
        let footprint = self.resolver.resolve(&md, root, tier).await?;

        synthesize(metadata_url, &md, &footprint, &self.template, rule)
    }

    /// Run one scene through the whole chain.
    ///
    /// Errors before the merge are returned; merge failures come back as
    /// [`MergeOutcome::Failed`].
    #[instrument(skip(self), fields(url = %metadata_url))]
    pub async fn process_scene(&self, metadata_url: &str, rule: IdRule) -> Result<MergeOutcome> {
        let entry = self.build_entry(metadata_url, rule).await?;
        Ok(self.place(&entry).await)
    }

    /// Merge an entry and announce it if it is new.
    async fn place(&self, entry: &CatalogEntry) -> MergeOutcome {
        let outcome = self.merger.merge(entry).await;
        if outcome.is_inserted() {
            self.announce(entry).await;
        }
        outcome
    }

    /// Best-effort publish of a new entry.
    async fn announce(&self, entry: &CatalogEntry) {
        let message = match serde_json::to_string(entry) {
            Ok(message) => message,
            Err(e) => {
                warn!(id = %entry.id, error = %e, "Failed to serialize entry for publish");
                return;
            }
        };
        match self.notifier.publish(&self.topic, &message).await {
            Ok(()) => debug!(id = %entry.id, topic = %self.topic, "Published entry"),
            Err(e) => warn!(id = %entry.id, topic = %self.topic, error = %e, "Failed to publish entry"),
        }
    }

    /// Catalog key a record's entry will have, computed without fetching.
    fn expected_key(&self, record: &SceneRecord) -> Result<String> {
        let (column, row) = record.path_row().ok_or_else(|| {
            IngestionError::Parse(format!("no path/row in {}", record.source_url))
        })?;
        let id = IdRule::for_tier(record.tier).entry_id(&record.id, record.product_id.as_deref())?;
        let date = record.acquisition_date().format("%Y-%m-%d").to_string();

        self.merger.expected_key(|name| match name {
            "id" => Some(id.clone()),
            "date" => Some(date.clone()),
            "column" | "eo:column" => Some(column.clone()),
            "row" | "eo:row" => Some(row.clone()),
            _ => None,
        })
    }

    async fn already_merged(&self, record: &SceneRecord) -> bool {
        let key = match self.expected_key(record) {
            Ok(key) => key,
            Err(e) => {
                debug!(scene_id = %record.id, error = %e, "Cannot precompute entry key");
                return false;
            }
        };
        match self.merger.exists(&key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %key, error = %e, "Existence check failed");
                false
            }
        }
    }

    /// Process cached scene list records one at a time.
    ///
    /// Rows are decompressed on the blocking pool, one pull at a time.
    pub async fn run_records(&self, mut records: SceneRecords, only_missing: bool) -> RunStats {
        let mut stats = RunStats::default();

        loop {
            let pulled = tokio::task::spawn_blocking(move || {
                let next = records.next();
                (next, records)
            })
            .await;
            let next = match pulled {
                Ok((next, rest)) => {
                    records = rest;
                    next
                }
                Err(e) => {
                    error!(error = %e, "Scene list reader stopped");
                    stats.failed += 1;
                    return stats;
                }
            };
            let Some(next) = next else {
                break;
            };

            let record = match next {
                Ok(record) => record,
                Err(e) => {
                    error!(error = %e, "Skipping scene list row");
                    stats.failed += 1;
                    continue;
                }
            };

            if only_missing && self.already_merged(&record).await {
                debug!(scene_id = %record.id, "Entry exists, skipping");
                stats.skipped += 1;
                continue;
            }

            let url = record.metadata_url();
            stats.processed += 1;
            match self.process_scene(&url, IdRule::for_tier(record.tier)).await {
                Ok(MergeOutcome::Inserted { .. }) => stats.inserted += 1,
                Ok(MergeOutcome::AlreadyExists { .. }) => stats.already_present += 1,
                Ok(MergeOutcome::Failed { .. }) => stats.failed += 1,
                Err(e) => {
                    error!(scene_id = %record.id, url = %url, error = %e, "Failed to process scene");
                    stats.failed += 1;
                }
            }

            if stats.processed % PROGRESS_INTERVAL == 0 {
                info!(
                    processed = stats.processed,
                    inserted = stats.inserted,
                    skipped = stats.skipped + stats.already_present,
                    failed = stats.failed,
                    "Batch progress"
                );
            }
        }

        stats.scanned = records.scanned();
        info!(
            scanned = stats.scanned,
            processed = stats.processed,
            inserted = stats.inserted,
            already_present = stats.already_present,
            skipped = stats.skipped,
            failed = stats.failed,
            "Batch complete"
        );
        stats
    }

    /// Backfill from the historical scene lists.
    ///
    /// Only a failure to obtain the lists aborts the run.
    #[instrument(skip(self, reader))]
    pub async fn run_batch(&self, reader: &SceneListReader, options: &BatchOptions) -> Result<RunStats> {
        let records = reader
            .stream_selected(options.selector, options.filter())
            .await?;
        Ok(self.run_records(records, options.only_missing).await)
    }

    /// Process every scene named in one storage-event notification.
    ///
    /// The first failing scene fails the whole invocation, as does a scene
    /// whose product id date disagrees with its `DATE_ACQUIRED`.
    pub async fn handle_event(&self, document: &str) -> Result<Vec<MergeOutcome>> {
        let events = StorageEvent::parse_document(document)?;
        let mut outcomes = Vec::with_capacity(events.len());

        for event in events {
            let url = event.metadata_url()?;
            // Pre-collection ids carry no date.
            let event_date = event.acquisition_date().ok();
            info!(
                bucket = %event.bucket,
                key = %event.key,
                url = %url,
                acquired = ?event_date,
                "Processing storage event"
            );

            let entry = self.build_entry(&url, IdRule::ProductId).await?;
            if let Some(date) = event_date {
                let expected = date.format("%Y-%m-%d").to_string();
                if entry.date() != expected {
                    return Err(IngestionError::Parse(format!(
                        "{} was acquired {} but its metadata says {}",
                        entry.id,
                        expected,
                        entry.date()
                    )));
                }
            }

            match self.place(&entry).await {
                MergeOutcome::Failed { error, .. } => return Err(error),
                outcome => outcomes.push(outcome),
            }
        }
        Ok(outcomes)
    }
}
