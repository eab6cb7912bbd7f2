//! Catalog tree kept as JSON documents in object storage.
//!
//! Layout under the catalog prefix:
//!
//! ```text
//! catalog.json                      root catalog, one `child` link per collection
//! {collection}/catalog.json         collection document
//! {collection}/{entry path}         one JSON document per entry
//! ```
//!
//! Documents are never cached between calls. Every read goes to the store so
//! that concurrent writers see each other's collections and entries.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use stac_common::{StacError, StacResult};

use crate::object_store::ObjectStorage;

const CATALOG_FILE: &str = "catalog.json";

/// A link between catalog documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.into(),
            extra: Map::new(),
        }
    }
}

/// A catalog or collection document.
///
/// Only `id` and `links` are interpreted; every other field is carried through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub id: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogDocument {
    /// Empty catalog with a description.
    pub fn empty(id: &str, description: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("stac_version".into(), Value::from("0.6.0"));
        extra.insert("description".into(), Value::from(description));
        Self {
            id: id.to_string(),
            links: Vec::new(),
            extra,
        }
    }

    fn set_link(&mut self, link: Link) {
        self.links.retain(|l| l.rel != link.rel);
        self.links.push(link);
    }

    fn has_child(&self, href: &str) -> bool {
        self.links.iter().any(|l| l.rel == "child" && l.href == href)
    }
}

/// A collection attached below the root catalog.
#[derive(Debug, Clone)]
pub struct SubCatalog {
    /// Key prefix of the collection inside the bucket
    pub prefix: String,
    pub document: CatalogDocument,
}

impl SubCatalog {
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// Handle on a catalog tree rooted at `prefix` in one bucket.
pub struct Catalog {
    storage: Arc<ObjectStorage>,
    prefix: String,
    root_href: String,
}

impl Catalog {
    /// Open the catalog rooted at `prefix`, creating an empty root if none exists.
    ///
    /// `root_href` is the public base URL under which keys are addressable;
    /// it is used to build link hrefs and returned locations.
    #[instrument(skip(storage), fields(bucket = %storage.bucket()))]
    pub async fn open(
        storage: Arc<ObjectStorage>,
        prefix: &str,
        root_href: &str,
        root_id: &str,
    ) -> StacResult<Self> {
        let catalog = Self {
            storage,
            prefix: prefix.trim_matches('/').to_string(),
            root_href: root_href.trim_end_matches('/').to_string(),
        };

        let root_key = catalog.key(CATALOG_FILE);
        if !catalog.storage.exists(&root_key).await? {
            info!(key = %root_key, "Creating root catalog");
            let mut root = CatalogDocument::empty(root_id, "Landsat STAC catalog");
            root.set_link(Link::new("self", catalog.href(&root_key)));
            root.set_link(Link::new("root", catalog.href(&root_key)));
            catalog.write_document(&root_key, &root).await?;
        }

        Ok(catalog)
    }

    /// Full object key for a path relative to the catalog root.
    pub fn key(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }

    /// Public URL for an object key.
    pub fn href(&self, key: &str) -> String {
        format!("{}/{}", self.root_href, key)
    }

    /// Key of an entry at `path` inside a collection.
    pub fn entry_key(&self, collection_id: &str, path: &str) -> String {
        self.key(&format!("{}/{}", collection_id, path.trim_start_matches('/')))
    }

    /// Whether an object exists at `key`. Always asks the store.
    pub async fn exists(&self, key: &str) -> StacResult<bool> {
        self.storage.exists(key).await
    }

    /// Read the root catalog document.
    pub async fn root(&self) -> StacResult<CatalogDocument> {
        self.read_document(&self.key(CATALOG_FILE)).await
    }

    /// Collections linked from the root catalog.
    pub async fn sub_catalogs(&self) -> StacResult<Vec<SubCatalog>> {
        let root = self.root().await?;
        let base = format!("{}/", self.root_href);

        let mut subs = Vec::new();
        for link in root.links.iter().filter(|l| l.rel == "child") {
            let key = link.href.strip_prefix(&base).unwrap_or(&link.href);
            let document = self.read_document(key).await?;
            let prefix = key
                .strip_suffix(CATALOG_FILE)
                .unwrap_or(key)
                .trim_end_matches('/')
                .to_string();
            subs.push(SubCatalog { prefix, document });
        }
        Ok(subs)
    }

    /// Write a collection document below the root and link it as a child.
    #[instrument(skip(self, document), fields(collection = %document.id))]
    pub async fn add_sub_catalog(&self, mut document: CatalogDocument) -> StacResult<SubCatalog> {
        let root_key = self.key(CATALOG_FILE);
        let prefix = self.key(&document.id);
        let sub_key = format!("{}/{}", prefix, CATALOG_FILE);

        document.set_link(Link::new("self", self.href(&sub_key)));
        document.set_link(Link::new("root", self.href(&root_key)));
        document.set_link(Link::new("parent", self.href(&root_key)));
        self.write_document(&sub_key, &document).await?;

        let mut root = self.read_document(&root_key).await?;
        let child = self.href(&sub_key);
        if !root.has_child(&child) {
            root.links.push(Link::new("child", child));
            self.write_document(&root_key, &root).await?;
        }

        info!(key = %sub_key, "Added collection to catalog");
        Ok(SubCatalog { prefix, document })
    }

    /// Store an entry document at `path` inside a collection.
    ///
    /// Navigation links are added to the document before writing. Returns the
    /// public location of the stored entry.
    #[instrument(skip(self, sub, entry), fields(collection = %sub.id(), path = %path))]
    pub async fn add_entry(&self, sub: &SubCatalog, path: &str, entry: Value) -> StacResult<String> {
        let Value::Object(mut object) = entry else {
            return Err(StacError::InvalidDocument {
                path: path.to_string(),
                message: "entry must be a JSON object".to_string(),
            });
        };

        let key = self.entry_key(sub.id(), path);
        let collection_href = self.href(&format!("{}/{}", sub.prefix, CATALOG_FILE));
        let links = vec![
            Link::new("self", self.href(&key)),
            Link::new("parent", collection_href.clone()),
            Link::new("collection", collection_href),
            Link::new("root", self.href(&self.key(CATALOG_FILE))),
        ];
        object.insert("links".into(), serde_json::to_value(links)?);

        let body = serde_json::to_vec(&Value::Object(object))?;
        self.storage.put(&key, Bytes::from(body)).await?;

        debug!(key = %key, "Stored entry");
        Ok(self.href(&key))
    }

    async fn read_document(&self, key: &str) -> StacResult<CatalogDocument> {
        let bytes = self.storage.get(key).await?;
        serde_json::from_slice(&bytes).map_err(|e| StacError::InvalidDocument {
            path: key.to_string(),
            message: e.to_string(),
        })
    }

    async fn write_document(&self, key: &str, document: &CatalogDocument) -> StacResult<()> {
        let body = serde_json::to_vec_pretty(document)?;
        self.storage.put(key, Bytes::from(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_memory() -> Catalog {
        let storage = Arc::new(ObjectStorage::in_memory("landsat-stac"));
        Catalog::open(storage, "", "https://landsat-stac.s3.amazonaws.com", "landsat-stac")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let catalog = open_memory().await;
        let root = catalog.root().await.unwrap();
        assert_eq!(root.id, "landsat-stac");
        assert!(catalog.sub_catalogs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_sub_catalog_is_listed_once() {
        let catalog = open_memory().await;
        let doc = CatalogDocument::empty("landsat-8-l1", "Landsat 8 L1");

        catalog.add_sub_catalog(doc.clone()).await.unwrap();
        catalog.add_sub_catalog(doc).await.unwrap();

        let subs = catalog.sub_catalogs().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id(), "landsat-8-l1");
        assert_eq!(subs[0].prefix, "landsat-8-l1");
    }

    #[tokio::test]
    async fn test_add_entry_writes_links() {
        let catalog = open_memory().await;
        let sub = catalog
            .add_sub_catalog(CatalogDocument::empty("landsat-8-l1", "Landsat 8 L1"))
            .await
            .unwrap();

        let location = catalog
            .add_entry(&sub, "044/034/2015-01-01/scene.json", serde_json::json!({"id": "scene"}))
            .await
            .unwrap();
        assert_eq!(
            location,
            "https://landsat-stac.s3.amazonaws.com/landsat-8-l1/044/034/2015-01-01/scene.json"
        );

        let key = catalog.entry_key("landsat-8-l1", "044/034/2015-01-01/scene.json");
        assert!(catalog.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_entry_rejects_non_object() {
        let catalog = open_memory().await;
        let sub = catalog
            .add_sub_catalog(CatalogDocument::empty("c", "c"))
            .await
            .unwrap();
        let err = catalog
            .add_entry(&sub, "x.json", serde_json::json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, StacError::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn test_prefixed_catalog_keys() {
        let storage = Arc::new(ObjectStorage::in_memory("bucket"));
        let catalog = Catalog::open(storage, "/stac/", "https://bucket.example", "root")
            .await
            .unwrap();
        assert_eq!(catalog.key("catalog.json"), "stac/catalog.json");
        assert_eq!(catalog.entry_key("c1", "/a/b.json"), "stac/c1/a/b.json");
    }
}
