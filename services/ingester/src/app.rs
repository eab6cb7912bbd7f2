//! Assembles the pipeline from configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use ingestion::{CollectionTemplate, FootprintTable, Pipeline, RemoteFetcher, SceneListReader};
use storage::{Catalog, NoopNotifier, Notifier, ObjectStorage, RedisNotifier};

use crate::config::IngesterConfig;

/// Identifier of the root catalog document.
pub const ROOT_CATALOG_ID: &str = "landsat-stac";

/// Connect to storage and Redis and build the pipeline.
pub async fn build_pipeline(config: &IngesterConfig) -> Result<Pipeline> {
    let storage = Arc::new(
        ObjectStorage::new(&config.storage).context("Failed to connect to catalog storage")?,
    );
    let catalog = Arc::new(
        Catalog::open(
            storage.clone(),
            &config.catalog_prefix,
            &config.catalog_root_href(),
            ROOT_CATALOG_ID,
        )
        .await
        .context("Failed to open catalog")?,
    );

    let template = match &config.collection_template {
        Some(path) => CollectionTemplate::from_path(path)?,
        None => CollectionTemplate::landsat8_l1()?,
    };
    let table = FootprintTable::shared(&config.footprint_table).with_context(|| {
        format!(
            "Failed to load footprint table {}",
            config.footprint_table.display()
        )
    })?;

    let fetcher = RemoteFetcher::new(config.storage.clone())?
        .with_bucket(&config.storage.bucket, storage);

    let notifier: Arc<dyn Notifier> = match &config.redis_url {
        Some(url) => Arc::new(RedisNotifier::connect(url).await?),
        None => {
            warn!("REDIS_URL not set, new entries will not be announced");
            Arc::new(NoopNotifier)
        }
    };

    info!(
        bucket = %config.storage.bucket,
        collection = %template.id(),
        path_template = %config.pipeline.path_template,
        footprints = table.len(),
        "Pipeline ready"
    );

    Ok(Pipeline::new(
        Arc::new(fetcher),
        table,
        catalog,
        Arc::new(template),
        notifier,
        &config.pipeline,
    ))
}

/// Scene list reader caching under the configured directory.
pub fn scene_list_reader(config: &IngesterConfig) -> SceneListReader {
    SceneListReader::new(&config.scene_list_cache_dir)
}
