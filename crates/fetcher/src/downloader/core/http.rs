//! HTTP utilities
//!
//! Request issue, response metadata and the streaming write to disk.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use reqwest::{Client, Method, Response};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::files::{FALLBACK_FILENAME, filename_from_url, sanitize_filename};
use crate::downloader::core::speed::TransferState;
use crate::downloader::core::{DownloadError, FileOperation, ResourceDescriptor, Result};

/// `filename=` / `filename*=` parameter, value quoted or bare
static FILENAME_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename(\*?)[^;=\n]*=\s*(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#)
        .expect("filename pattern is valid")
});

/// HTTP client built from the download configuration
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DownloadError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue the descriptor's request and wait for the headers only
    ///
    /// Non-success statuses are errors; the body is left unread.
    pub async fn send(&self, descriptor: &ResourceDescriptor) -> Result<Response> {
        let url = url::Url::parse(descriptor.url.trim()).map_err(|source| DownloadError::InvalidUrl {
            url: descriptor.url.clone(),
            source,
        })?;
        let method = parse_method(&descriptor.method)?;

        debug!("{} {}", method, url);
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| DownloadError::request(&descriptor.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: descriptor.url.clone(),
                status,
            });
        }

        Ok(response)
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| DownloadError::InvalidMethod {
        method: raw.to_string(),
    })
}

/// File name carried by a `Content-Disposition` header value
///
/// The RFC 5987 `filename*=` form wins over plain `filename=` (RFC 6266),
/// which is used when no extended value decodes. Quotes are stripped and the
/// result is reduced to one path component.
pub fn content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain = None;

    for captures in FILENAME_PARAM.captures_iter(header_value) {
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        let is_extended = captures.get(1).is_some_and(|m| !m.as_str().is_empty());

        if is_extended {
            if let Some(name) = decode_extended_value(value) {
                return Some(name);
            }
        } else if plain.is_none() {
            plain = sanitize_filename(&value.replace(['"', '\''], ""));
        }
    }

    plain
}

/// `UTF-8''na%20me.txt` -> `na me.txt`
fn decode_extended_value(value: &str) -> Option<String> {
    let encoded = value.rsplit('\'').next().unwrap_or(value);
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok().and_then(|name| sanitize_filename(&name))
}

/// Pick the local file name for a response
///
/// Explicit name, then `Content-Disposition`, then the URL's last segment.
pub fn resolve_filename(descriptor: &ResourceDescriptor, headers: &HeaderMap) -> String {
    if let Some(name) = descriptor.filename.as_deref().and_then(sanitize_filename) {
        return name;
    }

    let from_header = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(content_disposition_filename);
    if let Some(name) = from_header {
        return name;
    }

    filename_from_url(&descriptor.url).unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Write a body stream into `temp_path`, calling `on_chunk` after every chunk
///
/// The file is created (or truncated), flushed and synced before returning
/// the number of bytes written.
pub async fn stream_to_file<S, F>(
    url: &str,
    mut body: S,
    temp_path: &Path,
    state: &mut TransferState,
    mut on_chunk: F,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
    F: FnMut(&TransferState),
{
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| DownloadError::fs(temp_path, FileOperation::Create, e))?;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| DownloadError::request(url, e))?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;

        state.record_chunk(chunk.len());
        on_chunk(state);
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;

    debug!("Wrote {} bytes to {}", state.downloaded_bytes, temp_path.display());
    Ok(state.downloaded_bytes)
}
