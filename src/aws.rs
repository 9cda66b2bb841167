use crate::entity::ObjectMeta;
use crate::BoxError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use rusoto_core::{ByteStream, Region, RusotoError};
use rusoto_s3::{
    GetObjectError, GetObjectRequest, ListObjectsV2Request, PutObjectRequest, S3Client, S3,
};

/// Object store operations the pipeline needs. Implementations are
/// injected into each step, so tests can run against a double.
#[async_trait]
pub trait Store {
    /// All objects whose key starts with `prefix`, across every listing page.
    async fn list_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, BoxError>;
    /// Full object body, or `None` when the key does not exist.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, BoxError>;
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BoxError>;
    async fn bucket_names(&self) -> Result<Vec<String>, BoxError>;
}

pub struct S3Store {
    s3_client: S3Client,
}

impl S3Store {
    pub fn new(region: Region) -> Self {
        S3Store {
            s3_client: S3Client::new(region),
        }
    }
}

#[async_trait]
impl Store for S3Store {
    async fn list_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, BoxError> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let output = self
                .s3_client
                .list_objects_v2(ListObjectsV2Request {
                    bucket: bucket.to_string(),
                    prefix: Some(prefix.to_string()),
                    continuation_token: token.clone(),
                    ..Default::default()
                })
                .await?;
            for obj in output.contents.unwrap_or_default() {
                let key = match obj.key {
                    Some(k) => k,
                    None => continue,
                };
                let last_modified = obj
                    .last_modified
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                objects.push(ObjectMeta {
                    key,
                    size: obj.size.unwrap_or(0),
                    last_modified,
                });
            }
            token = match output.next_continuation_token {
                Some(t) if output.is_truncated.unwrap_or(false) => Some(t),
                _ => break,
            };
        }
        Ok(objects)
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let output = self
            .s3_client
            .get_object(GetObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                ..Default::default()
            })
            .await;
        match output {
            Ok(out) => {
                let body = match out.body {
                    Some(stream) => {
                        stream
                            .map_ok(|chunk| chunk.to_vec())
                            .try_concat()
                            .await?
                    }
                    None => Vec::new(),
                };
                Ok(Some(body))
            }
            Err(RusotoError::Service(GetObjectError::NoSuchKey(_))) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BoxError> {
        self.s3_client
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body: Some(ByteStream::from(body)),
                content_type: Some(content_type.to_string()),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn bucket_names(&self) -> Result<Vec<String>, BoxError> {
        let output = self.s3_client.list_buckets().await?;
        Ok(output
            .buckets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| b.name)
            .collect())
    }
}
