//! Idempotent placement of entries into the catalog tree.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

use storage::{Catalog, SubCatalog};

use crate::collection::CollectionTemplate;
use crate::entry::CatalogEntry;
use crate::error::{IngestionError, Result};

/// Default entry location inside a collection.
pub const DEFAULT_PATH_TEMPLATE: &str = "{column}/{row}/{date}/{id}.json";

/// Result of merging one entry.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Entry written; `location` is its public URL.
    Inserted { location: String },
    /// An entry already exists at the resolved key.
    AlreadyExists { key: String },
    /// Path resolution or the write failed.
    Failed { id: String, error: IngestionError },
}

impl MergeOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, MergeOutcome::Inserted { .. })
    }
}

/// Substitute `{name}` placeholders using `lookup`.
///
/// Unknown placeholders and unbalanced braces are errors.
pub fn resolve_path_template<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            IngestionError::Parse(format!("unclosed placeholder in path template '{}'", template))
        })?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(IngestionError::Parse(format!(
                "malformed placeholder in path template '{}'",
                template
            )));
        }
        let value = lookup(name).ok_or_else(|| {
            IngestionError::Parse(format!("path template placeholder '{{{}}}' has no value", name))
        })?;
        out.push_str(&value);
        rest = &after[close + 1..];
    }

    if rest.contains('}') {
        return Err(IngestionError::Parse(format!(
            "unbalanced '}}' in path template '{}'",
            template
        )));
    }
    out.push_str(rest);
    Ok(out)
}

/// Merges entries of one collection into a catalog.
pub struct CatalogMerger {
    catalog: Arc<Catalog>,
    template: Arc<CollectionTemplate>,
    path_template: String,
    collection: OnceCell<SubCatalog>,
}

impl CatalogMerger {
    pub fn new(
        catalog: Arc<Catalog>,
        template: Arc<CollectionTemplate>,
        path_template: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            template,
            path_template: path_template.into(),
            collection: OnceCell::new(),
        }
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Catalog key an entry would be stored at.
    pub fn entry_key(&self, entry: &CatalogEntry) -> Result<String> {
        let path = resolve_path_template(&self.path_template, |name| entry.template_value(name))?;
        Ok(self.catalog.entry_key(self.template.id(), &path))
    }

    /// Catalog key for template values known before the entry exists.
    pub fn expected_key<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = resolve_path_template(&self.path_template, lookup)?;
        Ok(self.catalog.entry_key(self.template.id(), &path))
    }

    /// Whether an object exists at `key`. Never cached.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.catalog.exists(key).await?)
    }

    /// The collection sub-catalog, attached to the root on first use.
    async fn collection(&self) -> Result<&SubCatalog> {
        self.collection
            .get_or_try_init(|| self.attach_collection())
            .await
    }

    async fn attach_collection(&self) -> Result<SubCatalog> {
        let id = self.template.id();
        let existing = self.catalog.sub_catalogs().await?;
        if let Some(sub) = existing.into_iter().find(|s| s.id() == id) {
            debug!(collection = %id, "Using existing collection");
            return Ok(sub);
        }
        info!(collection = %id, "Creating collection");
        Ok(self.catalog.add_sub_catalog(self.template.document()).await?)
    }

    async fn try_merge(&self, entry: &CatalogEntry) -> Result<MergeOutcome> {
        let path = resolve_path_template(&self.path_template, |name| entry.template_value(name))?;
        let sub = self.collection().await?;
        let key = self.catalog.entry_key(sub.id(), &path);

        if self.catalog.exists(&key).await? {
            return Ok(MergeOutcome::AlreadyExists { key });
        }

        let location = self
            .catalog
            .add_entry(sub, &path, entry.to_json()?)
            .await
            .map_err(|e| IngestionError::Insertion {
                id: entry.id.clone(),
                message: e.to_string(),
            })?;
        Ok(MergeOutcome::Inserted { location })
    }

    /// Insert `entry` unless an entry already exists at its templated path.
    ///
    /// Failures are logged and returned as [`MergeOutcome::Failed`].
    #[instrument(skip(self, entry), fields(id = %entry.id))]
    pub async fn merge(&self, entry: &CatalogEntry) -> MergeOutcome {
        match self.try_merge(entry).await {
            Ok(outcome) => {
                match &outcome {
                    MergeOutcome::Inserted { location } => {
                        info!(location = %location, "Inserted entry")
                    }
                    MergeOutcome::AlreadyExists { key } => {
                        debug!(key = %key, "Entry already in catalog")
                    }
                    MergeOutcome::Failed { .. } => {}
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "Failed to merge entry");
                MergeOutcome::Failed {
                    id: entry.id.clone(),
                    error: e,
                }
            }
        }
    }
}
