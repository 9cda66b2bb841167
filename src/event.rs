use crate::aws::Store;
use crate::{feed, index, util, BoxError, FeedLog, FeedLogResult};
use log::{debug, info};
use serde::Deserialize;
use simple_error::SimpleError;
use std::collections::HashSet;

/// Placeholder bucket name the platform's test payload carries.
pub const TEST_BUCKET: &str = "sourcebucket";
const BUCKET_MARKER: &str = "podcast";
pub const FALLBACK_REGION: &str = "eu-west-1";

#[derive(Deserialize, Debug)]
pub struct Request {
    #[serde(rename = "Records", default)]
    pub records: Vec<Record>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub s3: Option<S3Entity>,
}

#[derive(Deserialize, Debug)]
pub struct S3Entity {
    #[serde(default)]
    pub bucket: Option<BucketRef>,
    #[serde(default)]
    pub object: Option<ObjectRef>,
}

#[derive(Deserialize, Debug)]
pub struct BucketRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ObjectRef {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

/// Where the invocation's bucket comes from: the event itself, or
/// account-wide discovery for platform test payloads.
#[derive(Debug, PartialEq)]
pub enum BucketSource {
    Resolved(String),
    TestInvocation,
}

pub fn bucket_source(req: &Request) -> BucketSource {
    let name = req
        .records
        .first()
        .and_then(|r| r.s3.as_ref())
        .and_then(|s| s.bucket.as_ref())
        .and_then(|b| b.name.clone());
    match name {
        Some(name) if name != TEST_BUCKET => BucketSource::Resolved(name),
        _ => BucketSource::TestInvocation,
    }
}

pub async fn resolve_bucket(store: &impl Store, req: &Request) -> Result<String, BoxError> {
    match bucket_source(req) {
        BucketSource::Resolved(name) => Ok(name),
        BucketSource::TestInvocation => {
            info!("event has no usable bucket, discovering one");
            store
                .bucket_names()
                .await?
                .into_iter()
                .find(|name| name.contains(BUCKET_MARKER))
                .ok_or_else(|| {
                    SimpleError::new(format!("no bucket name contains {:?}", BUCKET_MARKER)).into()
                })
        }
    }
}

pub fn region(req: &Request) -> String {
    match bucket_source(req) {
        BucketSource::Resolved(_) => req
            .records
            .first()
            .and_then(|r| r.aws_region.clone())
            .unwrap_or_else(|| FALLBACK_REGION.to_string()),
        BucketSource::TestInvocation => FALLBACK_REGION.to_string(),
    }
}

/// The folders touched by this event: the changed object's folder, or
/// every folder in the bucket when the event carries no folder (root
/// uploads, deletions of a folder's last object, test invocations).
pub async fn folders(
    store: &impl Store,
    req: &Request,
    bucket: &str,
) -> Result<HashSet<String>, BoxError> {
    let key = req
        .records
        .first()
        .and_then(|r| r.s3.as_ref())
        .and_then(|s| s.object.as_ref())
        .and_then(|o| o.key.as_deref())
        .map(util::decode_key);
    if let Some(key) = key {
        debug!("Key={}", key);
        let (folder, _) = feed::split_key(&key);
        if !folder.is_empty() {
            let mut set = HashSet::new();
            set.insert(folder.to_string());
            return Ok(set);
        }
    }
    let objects = store.list_prefix(bucket, "").await?;
    Ok(objects
        .iter()
        .map(|o| feed::split_key(&o.key).0)
        .filter(|folder| !folder.is_empty())
        .map(str::to_string)
        .collect())
}

/// Regenerate the feed and index artifacts for every folder the event
/// touches. Any failure aborts the invocation with no partial result.
pub async fn handle(store: &impl Store, req: &Request) -> FeedLogResult {
    let bucket = resolve_bucket(store, req).await?;
    let region = region(req);
    info!("Region={}, Bucket={}", region, bucket);
    let mut log_data = FeedLog::new();
    for folder in folders(store, req, &bucket).await? {
        debug!("Folder={}", folder);
        let record = feed::write_feed(store, &bucket, &folder, &region).await?;
        index::write_index(store, &bucket, record.clone()).await?;
        log_data.insert(folder, record);
    }
    Ok(log_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::mem::MemStore;
    use chrono::Duration;

    fn make_event(key: &str, bucket: &str) -> Request {
        serde_json::from_value(serde_json::json!({
            "Records": [
                {
                    "eventVersion": "2.0",
                    "eventTime": "1970-01-01T00:00:00.000Z",
                    "awsRegion": "us-east-1",
                    "eventName": "ObjectCreated:Put",
                    "eventSource": "aws:s3",
                    "s3": {
                        "configurationId": "testConfigRule",
                        "object": {
                            "key": key,
                            "size": 1024,
                            "sequencer": "0A1B2C3D4E5F678901"
                        },
                        "bucket": {
                            "name": bucket,
                            "arn": "arn:aws:s3:::mybucket"
                        },
                        "s3SchemaVersion": "1.0"
                    }
                }
            ]
        }))
        .unwrap()
    }

    fn test_console_event() -> Request {
        serde_json::from_value(serde_json::json!({
            "key1": "value1",
            "key2": "value2"
        }))
        .unwrap()
    }

    fn seed_pod_fever(store: &MemStore) {
        let base = MemStore::base_time();
        for i in 1..=10 {
            store.seed_episode(
                "my-bucket",
                &format!("Pod-Fever/episode{}.mp3", i),
                1000 + 100 * i,
                base + Duration::seconds(i as i64),
            );
        }
    }

    #[test]
    fn bucket_from_event_record() {
        let req = make_event("Pod-Fever/episode10.mp3", "my-bucket");
        assert_eq!(bucket_source(&req), BucketSource::Resolved("my-bucket".to_string()));
        assert_eq!(region(&req), "us-east-1");
    }

    #[test]
    fn placeholder_bucket_is_test_invocation() {
        let req = make_event("Pod-Fever/episode10.mp3", TEST_BUCKET);
        assert_eq!(bucket_source(&req), BucketSource::TestInvocation);
        assert_eq!(region(&req), FALLBACK_REGION);
    }

    #[test]
    fn recordless_payload_is_test_invocation() {
        let req = test_console_event();
        assert_eq!(bucket_source(&req), BucketSource::TestInvocation);
        assert_eq!(region(&req), FALLBACK_REGION);
    }

    #[tokio::test]
    async fn discovery_picks_marked_bucket() {
        let store = MemStore::new(&["logs", "my-podcast-archive", "misc"]);
        let bucket = resolve_bucket(&store, &test_console_event()).await.unwrap();
        assert_eq!(bucket, "my-podcast-archive");
    }

    #[tokio::test]
    async fn discovery_without_marked_bucket_fails() {
        let store = MemStore::new(&["logs", "misc"]);
        assert!(resolve_bucket(&store, &test_console_event()).await.is_err());
    }

    #[tokio::test]
    async fn event_folder_wins_over_scan() {
        let store = MemStore::new(&["my-bucket"]);
        seed_pod_fever(&store);
        store.seed_episode("my-bucket", "Other/ep1.mp3", 1000, MemStore::base_time());
        let req = make_event("Pod-Fever/episode10.mp3", "my-bucket");
        let set = folders(&store, &req, "my-bucket").await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("Pod-Fever"));
    }

    #[tokio::test]
    async fn root_key_scans_all_folders() {
        let store = MemStore::new(&["my-bucket"]);
        seed_pod_fever(&store);
        store.seed_episode("my-bucket", "Other/ep1.mp3", 1000, MemStore::base_time());
        store.seed_episode("my-bucket", "stray.mp3", 1000, MemStore::base_time());
        let req = make_event("stray.mp3", "my-bucket");
        let set = folders(&store, &req, "my-bucket").await.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("Pod-Fever"));
        assert!(set.contains("Other"));
    }

    #[tokio::test]
    async fn feed_written_with_all_enclosures() {
        let store = MemStore::new(&["my-bucket"]);
        seed_pod_fever(&store);
        let req = make_event("Pod-Fever/episode10.mp3", "my-bucket");

        let log = handle(&store, &req).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log["Pod-Fever"].path, "Pod-Fever/feed.xml");

        let feed = store.text_of("my-bucket", "Pod-Fever/feed.xml");
        let domain = feed::domain("my-bucket", "us-east-1");
        for i in 1..=10 {
            let enclosure = format!("<enclosure url=\"{}/Pod-Fever/episode{}.mp3\"", domain, i);
            assert!(feed.contains(&enclosure), "missing {}", enclosure);
        }

        let page = store.text_of("my-bucket", index::INDEX_PAGE_KEY);
        let link = format!("<a href=\"{}/Pod-Fever/feed.xml\">Pod-Fever</a>", domain);
        assert!(page.contains(&link));
    }

    #[tokio::test]
    async fn second_folder_keeps_first_index_entry() {
        let store = MemStore::new(&["my-bucket"]);
        seed_pod_fever(&store);
        handle(&store, &make_event("Pod-Fever/episode10.mp3", "my-bucket"))
            .await
            .unwrap();

        store.seed_episode(
            "my-bucket",
            "2nd-podcast & friends/talking-17.mp3",
            3000,
            MemStore::base_time(),
        );
        handle(
            &store,
            &make_event("2nd-podcast+%26+friends/talking-17.mp3", "my-bucket"),
        )
        .await
        .unwrap();

        let domain = feed::domain("my-bucket", "us-east-1");
        let page = store.text_of("my-bucket", index::INDEX_PAGE_KEY);
        let link = format!("<a href=\"{}/Pod-Fever/feed.xml\">Pod-Fever</a>", domain);
        let link2 = format!(
            "<a href=\"{}/2nd-podcast%20%26%20friends/feed.xml\">2nd-podcast &amp; friends</a>",
            domain
        );
        assert!(page.contains(&link));
        assert!(page.contains(&link2));

        let raw = store.body_of("my-bucket", index::INDEX_KEY).unwrap();
        let persisted: index::FeedIndex = serde_json::from_slice(&raw).unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = MemStore::new(&["my-bucket"]);
        seed_pod_fever(&store);
        let req = make_event("Pod-Fever/episode10.mp3", "my-bucket");

        let first = handle(&store, &req).await.unwrap();
        let first_feed = store.body_of("my-bucket", "Pod-Fever/feed.xml").unwrap();
        let first_index = store.body_of("my-bucket", index::INDEX_KEY).unwrap();

        let second = handle(&store, &req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first_feed, store.body_of("my-bucket", "Pod-Fever/feed.xml").unwrap());
        assert_eq!(first_index, store.body_of("my-bucket", index::INDEX_KEY).unwrap());
    }

    #[tokio::test]
    async fn test_invocation_runs_pipeline_on_discovered_bucket() {
        let store = MemStore::new(&["my-podcast-archive"]);
        store.seed_episode(
            "my-podcast-archive",
            "Pod-Fever/episode1.mp3",
            3000,
            MemStore::base_time(),
        );
        let log = handle(&store, &test_console_event()).await.unwrap();
        assert!(log.contains_key("Pod-Fever"));
        assert!(store
            .body_of("my-podcast-archive", "Pod-Fever/feed.xml")
            .is_some());
    }
}
