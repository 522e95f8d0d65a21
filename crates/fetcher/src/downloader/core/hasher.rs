//! Streaming content digests
//!
//! Digests are xxHash64 (seed 0) rendered as 16 lowercase hex characters.
//! xxHash64 is not a cryptographic hash: it detects accidental corruption of a
//! previously downloaded file, it does not defend against a hostile server.
//! Both sources are consumed chunk by chunk, nothing is buffered in full.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

use crate::downloader::core::error::{DownloadError, FileOperation, Result};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Incremental digest fed one chunk at a time
pub struct StreamingDigest {
    hasher: Xxh64,
    bytes: u64,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self {
            hasher: Xxh64::new(0),
            bytes: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(&self) -> String {
        hex::encode(self.hasher.digest().to_be_bytes())
    }
}

impl Default for StreamingDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamingDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingDigest")
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Digest of an in-memory slice, same encoding as the streaming variants
pub fn digest_bytes(data: &[u8]) -> String {
    let mut digest = StreamingDigest::new();
    digest.update(data);
    digest.finish()
}

/// Digest a file on disk
pub async fn digest_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| DownloadError::fs(path, FileOperation::Read, e))?;

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut digest = StreamingDigest::new();

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::fs(path, FileOperation::Read, e))?;
        if read == 0 {
            break;
        }
        digest.update(&buffer[..read]);
    }

    let hex = digest.finish();
    debug!("Digest of {} ({} bytes): {}", path.display(), digest.bytes(), hex);
    Ok(hex)
}

/// Digest a stream of chunks, such as a live response body
///
/// The stream is drained completely. The first chunk error aborts the digest.
pub async fn digest_stream<S, E>(mut stream: S) -> std::result::Result<String, E>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    let mut digest = StreamingDigest::new();
    while let Some(chunk) = stream.next().await {
        digest.update(&chunk?);
    }
    Ok(digest.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_digest_is_lowercase_hex() {
        let hex = digest_bytes(b"Hello, World!");
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_digest_of_empty_input_matches_xxh64_seed_zero() {
        assert_eq!(digest_bytes(b""), "ef46db3751d8e999");
    }

    #[test]
    fn test_chunking_does_not_change_digest() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut digest = StreamingDigest::new();
        for chunk in data.chunks(5) {
            digest.update(chunk);
        }
        assert_eq!(digest.finish(), digest_bytes(data));
        assert_eq!(digest.bytes(), data.len() as u64);
    }

    #[tokio::test]
    async fn test_file_and_stream_digests_agree() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        tokio::fs::write(&path, &data).await.unwrap();

        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = data
            .chunks(7_000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let from_file = digest_file(&path).await.unwrap();
        let from_stream = digest_stream(futures::stream::iter(chunks)).await.unwrap();
        assert_eq!(from_file, from_stream);
        assert_eq!(from_file, digest_bytes(&data));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = digest_file(dir.path().join("absent.bin")).await;
        match result {
            Err(DownloadError::FileSystem { operation, .. }) => {
                assert_eq!(operation, FileOperation::Read);
            }
            other => panic!("Expected FileSystem error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_error_is_propagated() {
        let chunks: Vec<std::result::Result<Bytes, &'static str>> =
            vec![Ok(Bytes::from_static(b"abc")), Err("connection reset")];
        let result = digest_stream(futures::stream::iter(chunks)).await;
        assert_eq!(result, Err("connection reset"));
    }
}
