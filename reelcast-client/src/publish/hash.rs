//! Streaming SHA-256 over a local file. Reads in fixed-size
//! blocks so a large video is never fully buffered in memory.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HashedFile {
    pub hash_hex: String,
    pub size_bytes: u64,
}

pub async fn hash_file(path: &Path) -> std::io::Result<HashedFile> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut size_bytes = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size_bytes += n as u64;
    }
    Ok(HashedFile {
        hash_hex: hex_lower(&hasher.finalize()),
        size_bytes,
    })
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut f = tokio::fs::File::create(&path).await.unwrap();
        f.write_all(b"hello world").await.unwrap();
        f.flush().await.unwrap();

        let hashed = hash_file(&path).await.unwrap();
        assert_eq!(hashed.size_bytes, 11);
        // sha256("hello world")
        assert_eq!(
            hashed.hash_hex,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn hashes_content_spanning_multiple_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.mp4");
        let payload = vec![b'x'; BLOCK_SIZE * 3 + 17];
        tokio::fs::write(&path, &payload).await.unwrap();

        let hashed = hash_file(&path).await.unwrap();
        assert_eq!(hashed.size_bytes, payload.len() as u64);

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        assert_eq!(hashed.hash_hex, hex_lower(&hasher.finalize()));
    }
}
