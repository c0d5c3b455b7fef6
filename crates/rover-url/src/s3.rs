//! `s3://` URLs over the AWS SDK
//!
//! Directory listings use delimiter-scoped `ListObjectsV2` calls so they
//! stay non-recursive; `size` and `purge_directory` walk the full prefix.
//! File concatenation prefers server-side multipart copy when every
//! source lives in the destination bucket and clears the multipart
//! minimum part size.

use crate::base::{concatenate_by_streaming, ByteStream, DirectoryUrl, FileUrl};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rover_common::{Result, RoverError};
use std::any::Any;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// Multipart parts below this size are rejected by S3 (except the last).
const MULTIPART_MIN_PART_BYTES: u64 = 5 * 1024 * 1024;

/// Everything except unreserved characters and the path separator.
const COPY_SOURCE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn net_err(context: &str, e: impl std::fmt::Display) -> RoverError {
    RoverError::Network(format!("{context}: {e}"))
}

/// Shared S3 client plus the credentials it was built with. Credentials
/// are captured at construction so the transfer driver can inspect them
/// without re-resolving the provider chain.
#[derive(Clone)]
pub struct S3Context {
    client: Client,
    credentials: Option<Credentials>,
}

impl S3Context {
    pub fn new(client: Client, credentials: Option<Credentials>) -> Self {
        S3Context {
            client,
            credentials,
        }
    }

    /// Build from the ambient AWS environment (env vars, profiles,
    /// instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let credentials = match config.credentials_provider() {
            Some(provider) => provider.provide_credentials().await.ok(),
            None => None,
        };
        S3Context {
            client: Client::new(&config),
            credentials,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

fn parse_s3_url(url: &str) -> Result<(String, String)> {
    let parsed = url::Url::parse(url).map_err(|_| RoverError::InvalidUrl(url.to_string()))?;
    if parsed.scheme() != "s3" {
        return Err(RoverError::InvalidUrl(url.to_string()));
    }
    let bucket = parsed
        .host_str()
        .ok_or_else(|| RoverError::InvalidUrl(url.to_string()))?
        .to_string();
    let key = percent_encoding::percent_decode_str(parsed.path().trim_start_matches('/'))
        .decode_utf8()
        .map_err(|_| RoverError::InvalidUrl(url.to_string()))?
        .into_owned();
    Ok((bucket, key))
}

#[derive(Clone)]
pub struct S3FileUrl {
    context: S3Context,
    url: String,
    bucket: String,
    key: String,
}

impl S3FileUrl {
    pub fn from_url(url: &str, context: S3Context) -> Result<Self> {
        if url.ends_with('/') {
            return Err(RoverError::InvalidUrl(url.to_string()));
        }
        let (bucket, key) = parse_s3_url(url)?;
        Ok(S3FileUrl {
            context,
            url: url.to_string(),
            bucket,
            key,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn copy_source(&self) -> String {
        let raw = format!("{}/{}", self.bucket, self.key);
        utf8_percent_encode(&raw, COPY_SOURCE_SET).to_string()
    }

    /// Server-side multipart concatenation. Every source must live in
    /// this file's bucket and clear the minimum part size (last part
    /// exempt); the caller checks that before calling.
    async fn concatenate_multipart(&self, sources: &[&S3FileUrl]) -> Result<()> {
        let client = &self.context.client;
        let upload = client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| net_err("create_multipart_upload", e))?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| RoverError::Network("multipart upload came back without an id".into()))?
            .to_string();

        let mut completed = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let part_number = (index + 1) as i32;
            let part = client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(source.copy_source())
                .send()
                .await
                .map_err(|e| net_err("upload_part_copy", e))?;
            let e_tag = part
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .unwrap_or_default()
                .to_string();
            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build(),
            );
        }

        client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| net_err("complete_multipart_upload", e))?;
        info!(url = %self.url, parts = sources.len(), "Concatenated via multipart copy");
        Ok(())
    }
}

#[async_trait::async_trait]
impl FileUrl for S3FileUrl {
    fn url(&self) -> &str {
        &self.url
    }

    fn scheme(&self) -> &str {
        "s3"
    }

    fn containing_directory(&self) -> Box<dyn DirectoryUrl> {
        let parent = match self.url.rfind('/') {
            Some(i) => self.url[..=i].to_string(),
            None => self.url.clone(),
        };
        // The parent of a well-formed file URL re-parses by construction.
        Box::new(S3DirectoryUrl {
            context: self.context.clone(),
            bucket: self.bucket.clone(),
            key: parent_key(&self.key),
            url: parent,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn open(&self) -> Result<ByteStream> {
        let resp = self
            .context
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    RoverError::FileNotFound(self.url.clone())
                } else {
                    net_err("get_object", service)
                }
            })?;
        Ok(Box::new(resp.body.into_async_read()))
    }

    async fn upload_from(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let written = bytes.len() as u64;
        self.context
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| net_err("put_object", e))?;
        debug!(url = %self.url, bytes = written, "Uploaded object");
        Ok(written)
    }

    async fn delete(&self) -> Result<()> {
        self.context
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| net_err("delete_object", e))?;
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        let resp = self
            .context
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_not_found() {
                    RoverError::FileNotFound(self.url.clone())
                } else {
                    net_err("head_object", service)
                }
            })?;
        Ok(resp.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn rename_to(&self, other: &dyn FileUrl) -> Result<()> {
        let Some(dest) = other.as_any().downcast_ref::<S3FileUrl>() else {
            return Err(RoverError::CrossSchemeRename {
                from: self.url.clone(),
                to: other.url().to_string(),
            });
        };
        self.context
            .client
            .copy_object()
            .bucket(&dest.bucket)
            .key(&dest.key)
            .copy_source(self.copy_source())
            .send()
            .await
            .map_err(|e| net_err("copy_object", e))?;
        self.delete().await?;
        info!(from = %self.url, to = %dest.url, "Renamed object");
        Ok(())
    }

    async fn copy_to(&self, other: &dyn FileUrl) -> Result<()> {
        // Same-scheme copies stay server-side.
        if let Some(dest) = other.as_any().downcast_ref::<S3FileUrl>() {
            self.context
                .client
                .copy_object()
                .bucket(&dest.bucket)
                .key(&dest.key)
                .copy_source(self.copy_source())
                .send()
                .await
                .map_err(|e| net_err("copy_object", e))?;
            return Ok(());
        }
        let mut reader = self.open().await?;
        other.upload_from(&mut reader).await?;
        Ok(())
    }

    async fn concatenate_from(&self, sources: &[Box<dyn FileUrl>]) -> Result<Option<u64>> {
        let mut same_bucket: Vec<&S3FileUrl> = Vec::with_capacity(sources.len());
        for source in sources {
            match source.as_any().downcast_ref::<S3FileUrl>() {
                Some(s3) if s3.bucket == self.bucket => same_bucket.push(s3),
                _ => {
                    warn!(
                        url = %self.url,
                        "Concatenating through local memory; sources span buckets or schemes"
                    );
                    return concatenate_by_streaming(self, sources).await;
                },
            }
        }
        // All but the last part must clear the multipart floor.
        for source in same_bucket.iter().take(same_bucket.len().saturating_sub(1)) {
            if source.size().await? < MULTIPART_MIN_PART_BYTES {
                warn!(
                    url = %self.url,
                    "Concatenating through local memory; a source is below the multipart floor"
                );
                return concatenate_by_streaming(self, sources).await;
            }
        }
        self.concatenate_multipart(&same_bucket).await?;
        Ok(None)
    }
}

fn parent_key(key: &str) -> String {
    match key.rfind('/') {
        Some(i) => key[..=i].to_string(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct S3DirectoryUrl {
    context: S3Context,
    url: String,
    bucket: String,
    key: String,
}

impl S3DirectoryUrl {
    pub fn from_url(url: &str, context: S3Context) -> Result<Self> {
        if !url.ends_with('/') {
            return Err(RoverError::InvalidUrl(url.to_string()));
        }
        let (bucket, key) = parse_s3_url(url)?;
        Ok(S3DirectoryUrl {
            context,
            url: url.to_string(),
            bucket,
            key,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key within the bucket, always ending in `/` (or empty at the
    /// bucket root).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Credentials backing this URL's client, when the provider chain
    /// produced any. Use promptly; they may be expiring.
    pub fn aws_creds(&self) -> Option<&Credentials> {
        self.context.credentials()
    }

    /// A sibling directory in the same bucket at an arbitrary key.
    pub fn directory_in_this_bucket(&self, key: &str) -> S3DirectoryUrl {
        let key = if key.ends_with('/') || key.is_empty() {
            key.to_string()
        } else {
            format!("{key}/")
        };
        S3DirectoryUrl {
            context: self.context.clone(),
            url: format!("s3://{}/{}", self.bucket, key),
            bucket: self.bucket.clone(),
            key,
        }
    }

    fn file_at_key(&self, key: &str) -> S3FileUrl {
        S3FileUrl {
            context: self.context.clone(),
            url: format!("s3://{}/{}", self.bucket, key),
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<Box<dyn FileUrl>>> {
        let mut out: Vec<Box<dyn FileUrl>> = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .context
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/");
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| net_err("list_objects_v2", e))?;
            for object in resp.contents() {
                if let Some(key) = object.key() {
                    // The directory's own placeholder object is not a file.
                    if key != self.key {
                        out.push(Box::new(self.file_at_key(key)));
                    }
                }
            }
            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => return Ok(out),
            }
        }
    }
}

#[async_trait::async_trait]
impl DirectoryUrl for S3DirectoryUrl {
    fn url(&self) -> &str {
        &self.url
    }

    fn scheme(&self) -> &str {
        "s3"
    }

    fn file_in_this_directory(&self, name: &str) -> Box<dyn FileUrl> {
        Box::new(self.file_at_key(&format!("{}{}", self.key, name)))
    }

    fn directory_in_this_directory(&self, name: &str) -> Box<dyn DirectoryUrl> {
        Box::new(self.directory_in_this_bucket(&format!("{}{}/", self.key, name)))
    }

    fn containing_directory(&self) -> Box<dyn DirectoryUrl> {
        let trimmed = self.key.trim_end_matches('/');
        Box::new(self.directory_in_this_bucket(&parent_key(trimmed)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn files_in_directory(&self) -> Result<Vec<Box<dyn FileUrl>>> {
        self.list_files(&self.key).await
    }

    async fn files_matching_prefix(&self, prefix: &str) -> Result<Vec<Box<dyn FileUrl>>> {
        self.list_files(&format!("{}{}", self.key, prefix)).await
    }

    async fn directories_in_directory(&self) -> Result<Vec<Box<dyn DirectoryUrl>>> {
        let mut out: Vec<Box<dyn DirectoryUrl>> = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .context
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.key)
                .delimiter("/");
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| net_err("list_objects_v2", e))?;
            for common in resp.common_prefixes() {
                if let Some(prefix) = common.prefix() {
                    out.push(Box::new(self.directory_in_this_bucket(prefix)));
                }
            }
            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => return Ok(out),
            }
        }
    }

    async fn purge_directory(&self) -> Result<()> {
        loop {
            let resp = self
                .context
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.key)
                .send()
                .await
                .map_err(|e| net_err("list_objects_v2", e))?;
            let identifiers: Vec<ObjectIdentifier> = resp
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| net_err("object identifier", e))
                })
                .collect::<Result<_>>()?;
            if identifiers.is_empty() {
                return Ok(());
            }
            let count = identifiers.len();
            self.context
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(
                    Delete::builder()
                        .set_objects(Some(identifiers))
                        .build()
                        .map_err(|e| net_err("delete request", e))?,
                )
                .send()
                .await
                .map_err(|e| net_err("delete_objects", e))?;
            debug!(url = %self.url, count, "Purged a batch of objects");
            if !resp.is_truncated().unwrap_or(false) {
                return Ok(());
            }
        }
    }

    async fn size(&self) -> Result<u64> {
        let mut total: u64 = 0;
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .context
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.key);
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| net_err("list_objects_v2", e))?;
            for object in resp.contents() {
                total += object.size().unwrap_or(0).max(0) as u64;
            }
            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => return Ok(total),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Region};

    pub(crate) fn test_context(credentials: Option<Credentials>) -> S3Context {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"));
        if let Some(creds) = credentials.clone() {
            builder = builder.credentials_provider(creds);
        }
        S3Context::new(Client::from_conf(builder.build()), credentials)
    }

    pub(crate) fn wiremock_context(endpoint: &str) -> S3Context {
        let credentials = Credentials::new("AKID", "SECRET", None, None, "test");
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .force_path_style(true)
            .credentials_provider(credentials.clone())
            .build();
        S3Context::new(Client::from_conf(config), Some(credentials))
    }

    #[test]
    fn test_url_parsing() {
        let context = test_context(None);
        let dir = S3DirectoryUrl::from_url("s3://bucket/dir/sub/", context.clone()).unwrap();
        assert_eq!(dir.bucket(), "bucket");
        assert_eq!(dir.key(), "dir/sub/");
        assert_eq!(dir.filename(), "sub");

        let file = S3FileUrl::from_url("s3://bucket/dir/part-01.csv", context.clone()).unwrap();
        assert_eq!(file.key(), "dir/part-01.csv");
        assert_eq!(file.filename(), "part-01.csv");
        assert_eq!(file.containing_directory().url(), "s3://bucket/dir/");

        assert!(S3FileUrl::from_url("s3://bucket/dir/", context.clone()).is_err());
        assert!(S3DirectoryUrl::from_url("s3://bucket/dir", context).is_err());
    }

    #[test]
    fn test_directory_in_this_bucket() {
        let context = test_context(None);
        let dir = S3DirectoryUrl::from_url("s3://first/one/", context).unwrap();
        let sibling = dir.directory_in_this_bucket("two/three");
        assert_eq!(sibling.url(), "s3://first/two/three/");
        assert_eq!(sibling.key(), "two/three/");
    }

    #[test]
    fn test_copy_source_encoding() {
        let context = test_context(None);
        let file = S3FileUrl::from_url("s3://bucket/dir/a b.csv", context).unwrap();
        assert_eq!(file.copy_source(), "bucket/dir/a%20b.csv");
    }

    #[tokio::test]
    async fn test_listing_against_mock_endpoint() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix>dir/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>dir/part-01.csv</Key><Size>70</Size></Contents>
  <Contents><Key>dir/part-02.csv</Key><Size>30</Size></Contents>
</ListBucketResult>"#;
        Mock::given(method("GET"))
            .and(path("/bucket/"))
            .and(query_param("prefix", "dir/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
            .mount(&server)
            .await;

        let context = wiremock_context(&server.uri());
        let dir = S3DirectoryUrl::from_url("s3://bucket/dir/", context).unwrap();

        let files = dir.files_in_directory().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].url(), "s3://bucket/dir/part-01.csv");

        assert_eq!(DirectoryUrl::size(&dir).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_file_listing_paginates() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let page_two = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix>dir/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>dir/part-02.csv</Key><Size>30</Size></Contents>
</ListBucketResult>"#;
        let page_one = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix>dir/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>tok</NextContinuationToken>
  <Contents><Key>dir/part-01.csv</Key><Size>70</Size></Contents>
</ListBucketResult>"#;
        // The continuation mock must be mounted first; the untokened
        // matcher would also accept the second request.
        Mock::given(method("GET"))
            .and(path("/bucket/"))
            .and(query_param("continuation-token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page_two, "application/xml"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bucket/"))
            .and(query_param("prefix", "dir/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page_one, "application/xml"))
            .mount(&server)
            .await;

        let dir =
            S3DirectoryUrl::from_url("s3://bucket/dir/", wiremock_context(&server.uri())).unwrap();
        let files = dir.files_in_directory().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].url(), "s3://bucket/dir/part-02.csv");
    }
}
