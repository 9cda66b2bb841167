use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing metadata for one stored object.
#[derive(Debug, PartialEq, Clone)]
pub struct ObjectMeta {
    pub key: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// One feed item, derived from a listed audio object. Title is already
/// escaped for embedding; url is fully percent-encoded.
#[derive(Debug, PartialEq, Clone)]
pub struct Episode {
    pub title: String,
    pub url: String,
    pub filesize: i64,
    pub length_secs: i64,
    pub date: String,
}

/// One folder's feed as recorded in the global index. `encoded_path`
/// is the index lookup field and stays stable across re-renders.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub title: String,
    pub description: String,
    pub url: String,
    pub path: String,
    pub encoded_path: String,
}
