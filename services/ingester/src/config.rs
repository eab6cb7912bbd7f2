//! Ingester configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use ingestion::PipelineConfig;
use storage::ObjectStorageConfig;

/// Top-level ingester configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngesterConfig {
    /// Catalog bucket, also the connection settings for `s3://` sources
    pub storage: ObjectStorageConfig,

    /// Key prefix of the root catalog inside the bucket
    pub catalog_prefix: String,

    /// Public base URL of the bucket. Defaults to the bucket's S3 website URL.
    pub catalog_url: Option<String>,

    /// Redis URL for entry notifications. Notifications are dropped when unset.
    pub redis_url: Option<String>,

    /// Path/row footprint table (JSON)
    pub footprint_table: PathBuf,

    /// Collection template replacing the built-in Landsat-8 L1 collection
    pub collection_template: Option<PathBuf>,

    /// Where downloaded scene lists are kept between runs
    pub scene_list_cache_dir: PathBuf,

    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            storage: ObjectStorageConfig::default(),
            catalog_prefix: String::new(),
            catalog_url: None,
            redis_url: None,
            footprint_table: PathBuf::from("data/pr2coords.json"),
            collection_template: None,
            scene_list_cache_dir: PathBuf::from("/tmp/landsat-stac"),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl IngesterConfig {
    /// Load from a YAML file if given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => Self::from_env(),
        }
    }

    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from a variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bucket) = var("CATALOG_BUCKET") {
            config.storage.bucket = bucket;
        }
        if let Some(region) = var("S3_REGION") {
            config.storage.region = region;
        }
        config.storage.endpoint = var("S3_ENDPOINT");
        config.storage.access_key_id = var("S3_ACCESS_KEY");
        config.storage.secret_access_key = var("S3_SECRET_KEY");
        if let Some(allow) = var("S3_ALLOW_HTTP") {
            config.storage.allow_http = allow
                .parse()
                .with_context(|| format!("S3_ALLOW_HTTP must be true or false, got '{}'", allow))?;
        }

        if let Some(prefix) = var("CATALOG_PREFIX") {
            config.catalog_prefix = prefix;
        }
        config.catalog_url = var("CATALOG_URL");
        config.redis_url = var("REDIS_URL");

        if let Some(topic) = var("PUBLISH_TOPIC") {
            config.pipeline.publish_topic = topic;
        }
        if let Some(template) = var("PATH_TEMPLATE") {
            config.pipeline.path_template = template;
        }
        if let Some(table) = var("FOOTPRINT_TABLE") {
            config.footprint_table = PathBuf::from(table);
        }
        config.collection_template = var("COLLECTION_TEMPLATE").map(PathBuf::from);
        if let Some(dir) = var("SCENE_LIST_CACHE_DIR") {
            config.scene_list_cache_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Public URL under which catalog keys are addressable.
    pub fn catalog_root_href(&self) -> String {
        match &self.catalog_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.amazonaws.com", self.storage.bucket),
        }
    }
}
