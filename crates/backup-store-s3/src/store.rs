use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use backup_core::{
    BucketStatus, ObjectStore, ObjectVersion, StoreError, UploadReceipt, VersionedKey,
};
use chrono::{Local, Timelike};
use tracing::{debug, info, instrument, warn};

use crate::config::S3Config;

/// Base delay for exponential backoff.
const BASE_DELAY_MS: u64 = 200;
/// Fresh keys tried when a versioned key is already taken.
const KEY_COLLISION_RETRIES: u32 = 3;

/// Object store backed by any S3-compatible service.
///
/// Storage layout:
/// ```text
/// {bucket}/
///   {base}_{YYYYMMDD_HHMMSS}{ext}    # one object per backup, never overwritten
/// ```
#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: S3Client,
    bucket_name: String,
    max_retries: u32,
}

impl S3ObjectStore {
    pub fn new(s3_client: S3Client, bucket_name: String, max_retries: u32) -> Self {
        Self {
            s3_client,
            bucket_name,
            max_retries,
        }
    }

    pub fn from_config(config: &S3Config) -> Self {
        Self::new(
            config.build_client(),
            config.bucket.clone(),
            config.max_retries,
        )
    }

    fn destination(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket_name, key)
    }

    // =========================================================================
    // Retry helpers
    // =========================================================================

    /// Sleep with exponential backoff + jitter.
    async fn backoff_sleep(attempt: u32) {
        let base = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
        let jitter = Duration::from_millis(rand_jitter());
        tokio::time::sleep(base + jitter).await;
    }

    /// HTTP status carried by an S3 error, if a response was received.
    fn http_status(err: &SdkError<impl std::fmt::Debug>) -> Option<u16> {
        match err {
            SdkError::ServiceError(e) => Some(e.raw().status().as_u16()),
            SdkError::ResponseError(e) => Some(e.raw().status().as_u16()),
            _ => None,
        }
    }

    /// Check if an S3 error is retryable (429, 5xx, timeouts, dispatch failures).
    fn is_retryable_s3_error(err: &SdkError<impl std::fmt::Debug>) -> bool {
        match err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
            _ => matches!(
                Self::http_status(err),
                Some(status) if status == 429 || (500..=504).contains(&status)
            ),
        }
    }

    /// Run one S3 request, retrying transient errors up to `max_retries` times.
    async fn send_with_retry<T, E, F, Fut>(
        &self,
        operation: &str,
        key: &str,
        mut send: F,
    ) -> Result<T, SdkError<E>>
    where
        E: std::fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError<E>>>,
    {
        let mut attempt = 0;
        loop {
            match send().await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.max_retries && Self::is_retryable_s3_error(&e) => {
                    warn!(attempt, key, "S3 {} retryable error, retrying", operation);
                    Self::backoff_sleep(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Put an object only if the key is still free (`If-None-Match: *`).
    async fn put_new_object(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let result = self
            .send_with_retry("put_object", key, || {
                self.s3_client
                    .put_object()
                    .bucket(&self.bucket_name)
                    .key(key)
                    .body(ByteStream::from(data.to_vec()))
                    .if_none_match("*")
                    .send()
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::http_status(&e) == Some(412) => {
                Err(StoreError::Conflict(key.to_string()))
            }
            Err(e) => Err(StoreError::Service(format!(
                "S3 put_object error: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }
}

/// Simple jitter: random-ish value 0..50ms using timestamp nanos.
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0)
}

/// Sleep until the wall clock moves to the next second, so a new versioned key differs.
async fn sleep_until_next_second() {
    let nanos = Local::now().nanosecond().min(999_999_999) as u64;
    tokio::time::sleep(Duration::from_nanos(1_000_000_000 - nanos)).await;
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn store_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), level = "debug")]
    async fn ensure_bucket_exists(&self) -> Result<BucketStatus, StoreError> {
        let bucket = &self.bucket_name;
        let head = self
            .send_with_retry("head_bucket", bucket, || {
                self.s3_client.head_bucket().bucket(bucket).send()
            })
            .await;

        match head {
            Ok(_) => {
                info!("Bucket '{}' already exists.", bucket);
                Ok(BucketStatus::Existing)
            }
            Err(e) if Self::http_status(&e) == Some(404) => {
                self.send_with_retry("create_bucket", bucket, || {
                    self.s3_client.create_bucket().bucket(bucket).send()
                })
                .await
                .map_err(|e| {
                    StoreError::Bucket(format!(
                        "Error creating bucket '{}': {}",
                        bucket,
                        DisplayErrorContext(&e)
                    ))
                })?;
                warn!("Bucket '{}' created successfully.", bucket);
                Ok(BucketStatus::Created)
            }
            Err(e) => Err(StoreError::Bucket(format!(
                "Error checking bucket '{}': {}",
                bucket,
                DisplayErrorContext(&e)
            ))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, StoreError> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            StoreError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut collisions = 0;
        loop {
            let key = VersionedKey::for_path(path, Local::now().naive_local())?.to_string();
            match self.put_new_object(&key, &data).await {
                Ok(()) => {
                    debug!("Uploaded {} bytes to {}", data.len(), key);
                    return Ok(UploadReceipt {
                        destination: self.destination(&key),
                        key,
                    });
                }
                Err(StoreError::Conflict(taken)) if collisions < KEY_COLLISION_RETRIES => {
                    warn!(key = %taken, "Versioned key already taken, waiting for the next second");
                    collisions += 1;
                    sleep_until_next_second().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn download(&self, key: &str, destination: &Path) -> Result<(), StoreError> {
        let output = match self
            .send_with_retry("get_object", key, || {
                self.s3_client
                    .get_object()
                    .bucket(&self.bucket_name)
                    .key(key)
                    .send()
            })
            .await
        {
            Ok(output) => output,
            Err(e) if Self::http_status(&e) == Some(404) => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StoreError::Service(format!(
                    "S3 get_object error for {}: {}",
                    key,
                    DisplayErrorContext(&e)
                )));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to read S3 object body: {}", e)))?
            .into_bytes();

        tokio::fs::write(destination, &bytes).await.map_err(|e| {
            StoreError::Io(format!(
                "Failed to write {}: {}",
                destination.display(),
                e
            ))
        })?;

        debug!("Downloaded {} ({} bytes) to {}", key, bytes.len(), destination.display());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_versions(&self) -> Result<Vec<ObjectVersion>, StoreError> {
        let mut versions = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.take();
            let output = self
                .send_with_retry("list_objects", &self.bucket_name, || {
                    self.s3_client
                        .list_objects_v2()
                        .bucket(&self.bucket_name)
                        .set_continuation_token(token.clone())
                        .send()
                })
                .await
                .map_err(|e| {
                    StoreError::Service(format!(
                        "S3 list_objects error: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            if let Some(contents) = output.contents {
                for obj in contents {
                    let Some(key) = obj.key else { continue };
                    let last_modified = obj.last_modified.and_then(|dt| {
                        chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
                    });
                    versions.push(ObjectVersion {
                        key,
                        last_modified,
                        size: obj.size.unwrap_or(0).max(0) as u64,
                    });
                }
            }

            if output.is_truncated.unwrap_or(false) {
                continuation_token = output.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_store(server: &MockServer) -> S3ObjectStore {
        let config = S3Config {
            endpoint: server.uri(),
            access_key: "test-access".to_string(),
            secret_key: "test-secret".to_string(),
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
            max_retries: 0,
        };
        S3ObjectStore::from_config(&config)
    }

    #[tokio::test]
    async fn test_ensure_bucket_existing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/test-bucket/?$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let status = test_store(&server).ensure_bucket_exists().await.unwrap();
        assert_eq!(status, BucketStatus::Existing);
    }

    #[tokio::test]
    async fn test_ensure_bucket_creates_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/test-bucket/?$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/test-bucket/?$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let status = test_store(&server).ensure_bucket_exists().await.unwrap();
        assert_eq!(status, BucketStatus::Created);
    }

    #[tokio::test]
    async fn test_ensure_bucket_forbidden_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/test-bucket/?$"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = test_store(&server).ensure_bucket_exists().await.unwrap_err();
        assert!(matches!(err, StoreError::Bucket(_)));
    }

    #[tokio::test]
    async fn test_upload_uses_versioned_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/test-bucket/notes_\d{8}_\d{6}\.txt$"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc\""))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();

        let receipt = test_store(&server).upload(&file).await.unwrap();
        let parsed = VersionedKey::parse(&receipt.key).unwrap();
        assert_eq!(parsed.original_name(), "notes.txt");
        assert_eq!(receipt.destination, format!("s3://test-bucket/{}", receipt.key));
    }

    #[tokio::test]
    async fn test_upload_retries_with_fresh_key_on_collision() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/test-bucket/notes_\d{8}_\d{6}\.txt$"))
            .respond_with(ResponseTemplate::new(412))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/test-bucket/notes_\d{8}_\d{6}\.txt$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();

        let receipt = test_store(&server).upload(&file).await.unwrap();
        assert!(receipt.key.starts_with("notes_"));

        let requests = server.received_requests().await.unwrap();
        let puts: Vec<_> = requests
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(puts.len(), 2);
        assert_ne!(puts[0], puts[1]);
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let err = test_store(&server)
            .upload(&dir.path().join("gone.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_download_writes_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-bucket/notes_20251214_133045.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"stored".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("notes.txt");
        test_store(&server)
            .download("notes_20251214_133045.txt", &target)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"stored");
    }

    #[tokio::test]
    async fn test_download_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-bucket/missing.txt"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>NoSuchKey</Code><Message>missing</Message></Error>",
                "application/xml",
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = test_store(&server)
            .download("missing.txt", &dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_versions() {
        let server = MockServer::start().await;
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>test-bucket</Name>
  <Prefix></Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>notes_20251214_133045.txt</Key>
    <LastModified>2025-12-14T13:30:45.000Z</LastModified>
    <ETag>"abc"</ETag>
    <Size>42</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>notes_20251214_140000.txt</Key>
    <LastModified>2025-12-14T14:00:00.000Z</LastModified>
    <ETag>"def"</ETag>
    <Size>7</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#;
        Mock::given(method("GET"))
            .and(path_regex(r"^/test-bucket/?$"))
            .and(query_param("list-type", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
            .mount(&server)
            .await;

        let versions = test_store(&server).list_versions().await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].key, "notes_20251214_133045.txt");
        assert_eq!(versions[0].size, 42);
        assert_eq!(
            versions[0].last_modified.unwrap().to_rfc3339(),
            "2025-12-14T13:30:45+00:00"
        );
    }
}
