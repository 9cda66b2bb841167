use crate::aws::Store;
use crate::entity::FeedRecord;
use crate::BoxError;
use log::debug;
use std::collections::BTreeMap;

pub const INDEX_KEY: &str = "feeds.json";
pub const INDEX_PAGE_KEY: &str = "index.html";

/// All known feeds, keyed by encoded feed path. BTreeMap keeps the
/// serialized document diffable between runs.
pub type FeedIndex = BTreeMap<String, FeedRecord>;

/// Upsert one folder's record into the persisted index. A missing index
/// document starts an empty one; a malformed document is fatal.
///
/// Read-modify-write without a conditional put: two concurrent
/// invocations racing on this key can drop the losing upsert
/// (last-writer-wins on the whole document).
pub async fn merge_index(
    store: &impl Store,
    bucket: &str,
    record: FeedRecord,
) -> Result<FeedIndex, BoxError> {
    let mut index: FeedIndex = match store.fetch(bucket, INDEX_KEY).await? {
        Some(raw) => serde_json::from_slice(&raw)?,
        None => FeedIndex::new(),
    };
    debug!("index has {} feeds before merge", index.len());
    index.insert(record.encoded_path.clone(), record);
    let body = serde_json::to_vec_pretty(&index)?;
    store.put(bucket, INDEX_KEY, body, "application/json").await?;
    Ok(index)
}

/// Static listing page over the whole index. Record titles are stored
/// escaped, so they embed as-is.
pub fn render_index_page(index: &FeedIndex) -> String {
    let links = index
        .values()
        .map(|f| format!("            <li><a href=\"{}\">{}</a></li>", f.url, f.title))
        .collect::<Vec<String>>()
        .join("\n");
    format!(
        r#"<html>
    <body>
        <ul>
{links}
        </ul>
    </body>
</html>
"#,
        links = links,
    )
}

/// Merge a freshly rendered feed record, then regenerate the listing
/// page from the merged state.
pub async fn write_index(
    store: &impl Store,
    bucket: &str,
    record: FeedRecord,
) -> Result<(), BoxError> {
    let index = merge_index(store, bucket, record).await?;
    let page = render_index_page(&index);
    store
        .put(bucket, INDEX_PAGE_KEY, page.into_bytes(), "text/html")
        .await?;
    Ok(())
}
