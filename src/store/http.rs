//! S3-compatible HTTP object store.
//!
//! Listing uses `ListObjectsV2` with a `/` delimiter so only objects directly
//! under the prefix come back. Object reads are streamed and checked against
//! `Content-Length` and, for single-part uploads, the MD5 carried in the ETag.

use super::{ObjectSink, ObjectStore};
use crate::config::Credentials;
use crate::error::{SyncError, TransferFault};
use crate::types::{RemoteObjectRef, RemotePath};
use async_trait::async_trait;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Option<Credentials>,
}

impl HttpObjectStore {
    /// Creates a store rooted at `endpoint` (e.g. `https://s3.amazonaws.com`).
    pub fn new(endpoint: &str, credentials: Option<Credentials>) -> Result<Self, SyncError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            SyncError::Configuration(format!("invalid store endpoint {}: {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::Configuration(format!(
                "store endpoint {} cannot hold object paths",
                endpoint
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            credentials,
        })
    }

    fn url_for(&self, bucket: &str, key: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket);
            if let Some(key) = key {
                segments.extend(key.split('/'));
            }
        }
        url
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.credentials {
            Some(c) => request.basic_auth(&c.access_key, Some(&c.secret_key)),
            None => request,
        }
    }

    /// Fetches one listing page. `None` means the bucket does not exist.
    async fn list_page(
        &self,
        remote: &RemotePath,
        query: &[(&str, &str)],
    ) -> Result<Option<String>, SyncError> {
        let url = self.url_for(remote.bucket(), None);
        let response = self.get(url).query(query).send().await.map_err(|e| {
            SyncError::Connection(format!("unable to reach {}: {}", remote.store_uri(), e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::Connection(format!(
                "listing {} failed: HTTP {}",
                remote.store_uri(),
                status
            )));
        }

        let body = response.text().await.map_err(|e| {
            SyncError::Connection(format!("reading listing of {}: {}", remote.store_uri(), e))
        })?;
        Ok(Some(body))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, remote: &RemotePath) -> Result<bool, SyncError> {
        let prefix = format!("{}/", remote.prefix());
        let body = self
            .list_page(
                remote,
                &[
                    ("list-type", "2"),
                    ("prefix", prefix.as_str()),
                    ("max-keys", "1"),
                ],
            )
            .await?;
        match body {
            Some(body) => Ok(!parse_listing(remote, &body)?.contents.is_empty()),
            None => Ok(false),
        }
    }

    async fn list(&self, remote: &RemotePath) -> Result<Vec<RemoteObjectRef>, SyncError> {
        let prefix = format!("{}/", remote.prefix());
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type", "2"),
                ("prefix", prefix.as_str()),
                ("delimiter", "/"),
            ];
            if let Some(token) = token.as_deref() {
                query.push(("continuation-token", token));
            }
            let body = self.list_page(remote, &query).await?.ok_or_else(|| {
                SyncError::Connection(format!("bucket {} not found", remote.bucket()))
            })?;

            let page = parse_listing(remote, &body)?;
            objects.extend(
                page.contents
                    .into_iter()
                    .map(|c| c.key)
                    .filter(|key| key.as_str() != prefix)
                    .map(RemoteObjectRef::new),
            );

            token = page.next_continuation_token;
            if !page.is_truncated || token.is_none() {
                break;
            }
            debug!("Continuing listing of {}", remote.store_uri());
        }

        Ok(objects)
    }

    async fn fetch(
        &self,
        bucket: &str,
        object: &RemoteObjectRef,
        sink: &mut ObjectSink,
    ) -> Result<u64, SyncError> {
        let key = object.key();
        let url = self.url_for(bucket, Some(key));

        let response = self
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::transfer(key, e))?;
        let content_length = response.content_length();

        // Get ETag from response headers (this is MD5 for simple S3 uploads)
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_matches('"').to_string())
            .filter(|s| !s.contains('-'));

        let mut hasher = etag.as_ref().map(|_| Md5::new());
        let mut received = 0u64;
        let mut byte_stream = response.bytes_stream();

        while let Some(piece) = byte_stream.next().await {
            let chunk = piece.map_err(|e| SyncError::transfer(key, e))?;
            if let Some(ref mut h) = hasher {
                h.update(&chunk);
            }
            sink.write_all(&chunk)
                .await
                .map_err(|e| SyncError::transfer(key, e))?;
            received += chunk.len() as u64;
        }
        sink.flush()
            .await
            .map_err(|e| SyncError::transfer(key, e))?;

        check_length(key, content_length, received)?;

        if let (Some(expected), Some(hasher)) = (etag, hasher) {
            let computed = format!("{:x}", hasher.finalize());
            if computed != expected {
                return Err(SyncError::transfer(
                    key,
                    TransferFault::Checksum { expected, computed },
                ));
            }
        }

        Ok(received)
    }
}

/// `ListObjectsV2` response body. Elements not named here are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<Contents>,
    #[serde(default)]
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
}

/// Parses a listing page; entity and character references in keys are decoded.
fn parse_listing(remote: &RemotePath, body: &str) -> Result<ListBucketResult, SyncError> {
    quick_xml::de::from_str(body).map_err(|e| {
        SyncError::Connection(format!(
            "malformed listing of {}: {}",
            remote.store_uri(),
            e
        ))
    })
}

/// Compares the received byte count with the advertised `Content-Length`.
fn check_length(key: &str, content_length: Option<u64>, received: u64) -> Result<(), SyncError> {
    match content_length {
        Some(expected) if expected != received => Err(SyncError::transfer(
            key,
            TransferFault::Truncated { expected, received },
        )),
        Some(_) => Ok(()),
        None => {
            warn!(
                "Content-Length header was not present for {}. Cannot verify size.",
                key
            );
            Ok(())
        }
    }
}
