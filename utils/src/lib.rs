mod credential;

pub use credential::{ConnectionString, SharedKeySigner};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Percent-encoding set for Azure resource names: encode everything except
/// unreserved characters and '/'.
pub const AZURE_PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Percent-encoding set for query string values.
pub const AZURE_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_path(value: &str) -> String {
    utf8_percent_encode(value, &AZURE_PATH_ENCODE_SET).to_string()
}

pub fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, &AZURE_QUERY_ENCODE_SET).to_string()
}

/// Current UTC time in the RFC 1123 form Azure expects in `x-ms-date`.
pub fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
