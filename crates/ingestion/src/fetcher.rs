//! Line-oriented reads of remote text resources.
//!
//! `s3://bucket/key` URLs are read through object storage, everything else
//! over HTTP. Either way the body is consumed lazily, so callers that stop
//! early (the ANG scan) never download the rest of the file.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use storage::{ObjectStorage, ObjectStorageConfig};

use crate::error::{IngestionError, Result};

/// Single forward pass over the lines of a remote resource.
pub type LineStream = BoxStream<'static, Result<String>>;

/// Source of remote text resources.
#[async_trait]
pub trait LineSource: Send + Sync {
    /// Open `url` for line-by-line reading.
    ///
    /// Fails with [`IngestionError::FetchNotFound`] when the resource is absent.
    /// No retries happen at this layer.
    async fn fetch_lines(&self, url: &str) -> Result<LineStream>;
}

/// Fetcher over S3 object storage and plain HTTP.
pub struct RemoteFetcher {
    client: Client,
    s3: ObjectStorageConfig,
    buckets: Mutex<HashMap<String, Arc<ObjectStorage>>>,
}

impl RemoteFetcher {
    /// Create a fetcher; `s3` supplies connection settings for any bucket
    /// named in an `s3://` URL.
    pub fn new(s3: ObjectStorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IngestionError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            s3,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Serve `s3://{bucket}/...` URLs from a given storage client.
    pub fn with_bucket(self, bucket: &str, storage: Arc<ObjectStorage>) -> Self {
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.insert(bucket.to_string(), storage);
        }
        self
    }

    fn storage_for(&self, bucket: &str) -> Result<Arc<ObjectStorage>> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| IngestionError::InvalidConfig("bucket registry poisoned".into()))?;

        if let Some(storage) = buckets.get(bucket) {
            return Ok(storage.clone());
        }

        let storage = Arc::new(ObjectStorage::new(&self.s3.for_bucket(bucket))?);
        buckets.insert(bucket.to_string(), storage.clone());
        Ok(storage)
    }

    async fn fetch_s3(&self, url: &str, bucket: &str, key: &str) -> Result<LineStream> {
        let storage = self.storage_for(bucket)?;
        let body = storage.get_stream(key).await.map_err(|e| {
            if e.is_not_found() {
                IngestionError::FetchNotFound(url.to_string())
            } else {
                IngestionError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let reader = StreamReader::new(body.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        Ok(lines_from_reader(reader, url))
    }

    async fn fetch_http(&self, url: &str) -> Result<LineStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestionError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            // S3 answers 403 for missing keys on public buckets; any non-2xx is absent.
            debug!(status = %status, "Remote resource unavailable");
            return Err(IngestionError::FetchNotFound(format!("{} ({})", url, status)));
        }

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed();
        Ok(lines_from_reader(StreamReader::new(body), url))
    }
}

#[async_trait]
impl LineSource for RemoteFetcher {
    #[instrument(skip(self))]
    async fn fetch_lines(&self, url: &str) -> Result<LineStream> {
        match split_s3_url(url) {
            Some((bucket, key)) => self.fetch_s3(url, bucket, key).await,
            None => self.fetch_http(url).await,
        }
    }
}

/// Split `s3://bucket/key/parts` into `("bucket", "key/parts")`.
pub fn split_s3_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

/// Turn a buffered async reader into a line stream.
///
/// Line terminators (`\n`, `\r\n`) are stripped. The stream ends after the
/// first read error.
pub fn lines_from_reader<R>(reader: R, url: &str) -> LineStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let state = Some((reader.lines(), url.to_string()));
    stream::unfold(state, |state| async move {
        let (mut lines, url) = state?;
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), Some((lines, url)))),
            Ok(None) => None,
            Err(e) => Some((
                Err(IngestionError::Fetch {
                    url,
                    message: e.to_string(),
                }),
                None,
            )),
        }
    })
    .boxed()
}

/// Line stream over text already in memory.
pub fn lines_from_str(text: &str) -> LineStream {
    let lines: Vec<Result<String>> = text.lines().map(|l| Ok(l.to_string())).collect();
    stream::iter(lines).boxed()
}
