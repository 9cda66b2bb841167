pub mod aws;
pub mod entity;
pub mod event;
pub mod feed;
pub mod index;
pub mod util;

use entity::FeedRecord;
use std::collections::HashMap;
use std::error::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;
// per-invocation result log, one entry per processed folder
pub type FeedLog = HashMap<String, FeedRecord>;
pub type FeedLogResult = Result<FeedLog, BoxError>;
