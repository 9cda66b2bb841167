use crate::aws::Store;
use crate::entity::{Episode, FeedRecord, ObjectMeta};
use crate::util::{encode_key, escape_text};
use crate::BoxError;
use chrono::Duration;
use log::debug;
use std::cmp::Reverse;

pub const FEED_FILENAME: &str = "feed.xml";

const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "m4a", "m4b"];

pub fn domain(bucket: &str, region: &str) -> String {
    format!("http://{}.s3-website-{}.amazonaws.com", bucket, region)
}

/// Split an object key on its last separator into (folder, filename).
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((folder, filename)) => (folder, filename),
        None => ("", key),
    }
}

/// Filename without its extension.
pub fn title_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

// Episodes are audio files; keys with a leading underscore are
// artwork or sidecar files and never feed items.
fn is_episode_key(key: &str) -> bool {
    let (_, filename) = split_key(key);
    if filename.starts_with('_') {
        return false;
    }
    match filename.rsplit_once('.') {
        Some((_, ext)) => AUDIO_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// An ordering key that compares embedded digit runs numerically,
/// so `episode2` sorts before `episode10`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Number(u64),
    Text(String),
}

fn natural_key(s: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run = String::new();
    let mut run_is_digit = false;
    for ch in s.chars() {
        let is_digit = ch.is_ascii_digit();
        if !run.is_empty() && is_digit != run_is_digit {
            segments.push(to_segment(&run, run_is_digit));
            run.clear();
        }
        run_is_digit = is_digit;
        run.push(ch);
    }
    if !run.is_empty() {
        segments.push(to_segment(&run, run_is_digit));
    }
    segments
}

fn to_segment(run: &str, is_digit: bool) -> Segment {
    if is_digit {
        // digit runs too long for u64 fall back to text comparison
        run.parse::<u64>()
            .map(Segment::Number)
            .unwrap_or_else(|_| Segment::Text(run.to_string()))
    } else {
        Segment::Text(run.to_string())
    }
}

fn normalize_prefix(folder: &str) -> String {
    format!("{}/", folder.trim_end_matches('/'))
        .trim_start_matches('/')
        .to_string()
}

fn episode(i: usize, obj: &ObjectMeta, domain: &str) -> Episode {
    let (_, filename) = split_key(&obj.key);
    // listing timestamps of batch uploads collide to the second; the
    // per-item day offset keeps pubDate a strict total order
    let date = (obj.last_modified + Duration::days(i as i64)).to_rfc2822();
    Episode {
        title: escape_text(title_of(filename)),
        url: format!("{}/{}", domain, encode_key(&obj.key)),
        filesize: obj.size,
        length_secs: obj.size / 1500,
        date,
    }
}

/// List a folder's eligible audio objects, newest first by natural key.
/// An empty or missing folder yields an empty sequence, not an error.
pub async fn episodes(
    store: &impl Store,
    bucket: &str,
    folder: &str,
    region: &str,
) -> Result<Vec<Episode>, BoxError> {
    let prefix = normalize_prefix(folder);
    debug!("list_prefix(bucket={}, prefix={})", bucket, prefix);
    let mut objects: Vec<ObjectMeta> = store
        .list_prefix(bucket, &prefix)
        .await?
        .into_iter()
        .filter(|o| o.key != prefix && is_episode_key(&o.key))
        .collect();
    objects.sort_by_key(|o| Reverse(natural_key(&o.key)));
    let dom = domain(bucket, region);
    Ok(objects
        .iter()
        .enumerate()
        .map(|(i, o)| episode(i, o, &dom))
        .collect())
}

fn render_item(ep: &Episode) -> String {
    format!(
        r#"
        <item>
            <title>{title}</title>
            <description />
            <enclosure url="{url}" type="audio/mpeg" length="{filesize}" />
            <itunes:duration>{length_secs}</itunes:duration>
            <pubDate>{date}</pubDate>
        </item>"#,
        title = ep.title,
        url = ep.url,
        filesize = ep.filesize,
        length_secs = ep.length_secs,
        date = ep.date,
    )
}

/// Render a folder's channel document. Deterministic for fixed inputs.
pub fn render_feed(folder: &str, feed_url: &str, episodes: &[Episode]) -> String {
    let items: String = episodes.iter().map(render_item).collect();
    let title = escape_text(folder);
    format!(
        r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" version="2.0">
    <channel>
        <title>{title}</title>
        <description>{description}</description>
        <link>{url}</link>
        <language>en-us</language>{items}
    </channel>
</rss>
"#,
        title = title,
        description = title,
        url = feed_url,
        items = items,
    )
}

/// Regenerate and store one folder's feed document, returning the
/// folder's index record.
pub async fn write_feed(
    store: &impl Store,
    bucket: &str,
    folder: &str,
    region: &str,
) -> Result<FeedRecord, BoxError> {
    let eps = episodes(store, bucket, folder, region).await?;
    let feed_path = if folder.is_empty() {
        FEED_FILENAME.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), FEED_FILENAME)
    };
    let encoded_path = encode_key(&feed_path);
    let feed_url = format!("{}/{}", domain(bucket, region), encoded_path);
    let feed = render_feed(folder, &feed_url, &eps);
    debug!("{}", feed);
    store
        .put(bucket, &feed_path, feed.into_bytes(), "application/xml")
        .await?;
    let escaped = escape_text(folder);
    Ok(FeedRecord {
        title: escaped.clone(),
        description: escaped,
        url: feed_url,
        path: feed_path,
        encoded_path,
    })
}
