//! Storage-event notifications for newly landed scene objects.
//!
//! Accepts S3 event documents directly or wrapped in an SNS envelope, where
//! the S3 document is a JSON string in `Records[].Sns.Message`.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{IngestionError, Result};

const MTL_SUFFIX: &str = "_MTL.txt";

/// One object-created event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub bucket: String,
    /// Object key, URL-decoded
    pub key: String,
}

#[derive(Deserialize)]
struct EventDocument {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
}

#[derive(Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Deserialize)]
struct S3Object {
    key: String,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Every S3 record in a notification document, in order.
    pub fn parse_document(json: &str) -> Result<Vec<Self>> {
        let doc: EventDocument = serde_json::from_str(json)?;
        if doc.records.is_empty() {
            return Err(IngestionError::Parse("event has no records".to_string()));
        }

        let mut events = Vec::new();
        for record in doc.records {
            if let Some(message) = record.pointer("/Sns/Message").and_then(Value::as_str) {
                events.extend(Self::parse_document(message)?);
                continue;
            }

            let s3: S3Record = serde_json::from_value(record)?;
            events.push(Self::new(s3.s3.bucket.name, url_decode(&s3.s3.object.key)?));
        }
        Ok(events)
    }

    /// Key of the directory holding the object.
    pub fn scene_dir(&self) -> &str {
        self.key.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    /// Scene id: the directory name, without any extension.
    pub fn scene_id(&self) -> Result<&str> {
        let name = self.scene_dir().rsplit('/').next().unwrap_or("");
        let id = name.split_once('.').map_or(name, |(stem, _)| stem);
        if id.is_empty() {
            return Err(IngestionError::Parse(format!(
                "object key has no scene directory: {}",
                self.key
            )));
        }
        Ok(id)
    }

    /// Acquisition date, the 4th `_` field of a collection-1 product id.
    pub fn acquisition_date(&self) -> Result<NaiveDate> {
        let id = self.scene_id()?;
        let field = id.split('_').nth(3).ok_or_else(|| {
            IngestionError::Parse(format!("scene id has no acquisition date: {}", id))
        })?;
        NaiveDate::parse_from_str(field, "%Y%m%d")
            .map_err(|e| IngestionError::Parse(format!("acquisition date '{}': {}", field, e)))
    }

    /// Public HTTPS URL of the scene's MTL file.
    pub fn metadata_url(&self) -> Result<String> {
        Ok(format!(
            "https://{}.s3.amazonaws.com/{}/{}{}",
            self.bucket,
            self.scene_dir(),
            self.scene_id()?,
            MTL_SUFFIX
        ))
    }
}

/// Decode an S3 event key (`+` is a space, `%XX` an escaped byte).
fn url_decode(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = raw
                    .get(i + 1..i + 3)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| IngestionError::Parse(format!("bad escape in key '{}'", raw)))?;
                out.push(hex);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).map_err(|_| IngestionError::Parse(format!("key is not UTF-8: '{}'", raw)))
}
