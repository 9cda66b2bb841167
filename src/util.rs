use crate::BoxError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use simple_error::SimpleError;

pub fn init_log() {
    let _lg = flexi_logger::Logger::try_with_env_or_str("debug")
        .unwrap()
        .log_to_stdout()
        .start()
        .unwrap();
}

pub fn to_simple(e: BoxError) -> SimpleError {
    SimpleError::new(e.to_string())
}

// everything but unreserved characters, with the path separator left alone
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode an object key for use in a URL, keeping `/` intact.
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// Decode an object key as delivered in an S3 event notification,
/// where spaces arrive as `+` and the rest is percent-encoded.
pub fn decode_key(raw: &str) -> String {
    let unplussed = raw.replace('+', " ");
    percent_decode_str(&unplussed).decode_utf8_lossy().into_owned()
}

/// Escape text for embedding in XML or HTML element content.
pub fn escape_text(raw: &str) -> String {
    quick_xml::escape::escape(raw).into_owned()
}
