use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = "InterfaceOficial/0.1.0";

/// Connect timeout shared by every client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata (manifest / version JSON / size probes) gets a short total timeout.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Client used for artifact transfers. No total timeout: the download engine
/// bounds every attempt with an idle timeout between chunks instead, so large
/// files are not cut off while they are still making progress.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    // Byte-range resumption needs the raw representation.
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

/// Client for small JSON documents.
pub fn build_metadata_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
}
