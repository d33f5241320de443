//! Filesystem locations for persisted state
//!
//! All on-disk state lives under the user cache / config dirs so worktrees
//! stay clean. The editor snapshot store is keyed by a hash of the absolute
//! worktree path, which keeps unrelated worktrees isolated from each other.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::constants::app;

/// Root for cached state, `<user-cache>/skipper`
pub fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app::DIR_NAME)
}

/// Root for configuration, `<user-config>/skipper`
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app::DIR_NAME)
}

pub fn config_file() -> PathBuf {
    config_root().join("config.json")
}

pub fn logs_dir() -> PathBuf {
    cache_root().join("logs")
}

/// Hex SHA-256 of an absolute worktree path, the snapshot-store key
pub fn worktree_key(abs_worktree: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abs_worktree.to_string_lossy().as_bytes());
    hex_encode(&hasher.finalize())
}

/// Root for content-addressed file backups
pub fn backups_root() -> PathBuf {
    cache_root().join("file_backups")
}

pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Hex SHA-256 of arbitrary text
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worktree_key_is_stable_and_hex() {
        let a = worktree_key(Path::new("/tmp/project"));
        let b = worktree_key(Path::new("/tmp/project"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
