//! Storage abstractions for the Landsat STAC services.
//!
//! Provides unified interfaces for:
//! - Object storage (S3 or in-memory) for metadata and catalog documents
//! - The catalog tree (root catalog, collection sub-catalogs, entries)
//! - Publishing notifications about new entries (Redis pub/sub)

pub mod catalog;
pub mod notify;
pub mod object_store;

pub use self::object_store::{ByteStream, ObjectStorage, ObjectStorageConfig};
pub use catalog::{Catalog, CatalogDocument, Link, SubCatalog};
pub use notify::{NoopNotifier, Notifier, RedisNotifier};
