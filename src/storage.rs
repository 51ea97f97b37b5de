//! Durable storage for rendered formats.
//!
//! Artifacts are keyed by job and format:
//!
//! ```text
//! jobs/{job_id}/{format_id}.{ext}
//! ```
//!
//! Writing the same key twice replaces the earlier artifact. A re-run of a
//! (job, format) pair therefore lands at the same location instead of
//! producing a duplicate.
//!
//! Each [`Location`] carries the SHA-256 of the bytes written, so a poller
//! can tell whether a re-run changed the artifact.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

/// Where a stored artifact can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Storage-relative path.
    pub path: String,
    /// Public URL for clients.
    pub url: String,
    /// SHA-256 of the stored bytes, hex encoded.
    pub sha256: String,
}

/// Outbound storage interface. `put` must be overwrite-safe at a given path.
pub trait ObjectStorage: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<Location, StorageError>;
}

/// Storage key for one format of one job.
pub fn artifact_path(job_id: &str, format_id: &str, extension: &str) -> String {
    format!("jobs/{job_id}/{format_id}.{extension}")
}

/// SHA-256 of `bytes`, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Reject absolute paths and `..` so keys stay under the storage root.
fn check_relative(path: &str) -> Result<(), StorageError> {
    let ok = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

/// Filesystem-backed storage under a root directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    public_base_url: String,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Absolute location of a storage key on disk.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl ObjectStorage for FsStorage {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<Location, StorageError> {
        check_relative(path)?;
        let target = self.resolve(path);
        let io_err = |source| StorageError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write beside the target, then rename over it; readers never see a
        // half-written artifact.
        let tmp = target.with_extension(format!(
            "{}.tmp-{}",
            target
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin"),
            std::process::id()
        ));
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(e));
        }

        Ok(Location {
            path: path.to_string(),
            url: join_url(&self.public_base_url, path),
            sha256: hash_bytes(bytes),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory storage that counts writes per path.
    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub writes: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl MemoryStorage {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn get(&self, path: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(path).cloned()
        }

        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    impl ObjectStorage for MemoryStorage {
        fn put(&self, path: &str, bytes: &[u8]) -> Result<Location, StorageError> {
            self.writes.lock().unwrap().push(path.to_string());
            if self.fail {
                return Err(StorageError::Io {
                    path: path.to_string(),
                    source: io::Error::other("simulated outage"),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.to_vec());
            Ok(Location {
                path: path.to_string(),
                url: join_url("mem://", path),
                sha256: hash_bytes(bytes),
            })
        }
    }

    #[test]
    fn artifact_path_layout() {
        assert_eq!(
            artifact_path("job-1", "instagram_story", "jpg"),
            "jobs/job-1/instagram_story.jpg"
        );
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_bytes(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn url_join_handles_trailing_slash() {
        assert_eq!(join_url("https://cdn/", "a/b.jpg"), "https://cdn/a/b.jpg");
        assert_eq!(join_url("https://cdn", "a/b.jpg"), "https://cdn/a/b.jpg");
    }

    #[test]
    fn fs_put_writes_file_and_returns_location() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::new(tmp.path(), "https://cdn.example.com");
        let path = artifact_path("j1", "twitter_post", "png");

        let location = storage.put(&path, b"pixels").unwrap();

        assert_eq!(location.path, "jobs/j1/twitter_post.png");
        assert_eq!(location.url, "https://cdn.example.com/jobs/j1/twitter_post.png");
        assert_eq!(location.sha256, hash_bytes(b"pixels"));
        assert_eq!(std::fs::read(storage.resolve(&path)).unwrap(), b"pixels");
    }

    #[test]
    fn fs_put_overwrites_same_path() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::new(tmp.path(), "file://out");
        let path = artifact_path("j1", "a", "jpg");

        let first = storage.put(&path, b"first").unwrap();
        let second = storage.put(&path, b"second").unwrap();

        assert_eq!(first.path, second.path);
        assert_ne!(first.sha256, second.sha256);
        assert_eq!(std::fs::read(storage.resolve(&path)).unwrap(), b"second");
        let entries: Vec<_> = std::fs::read_dir(tmp.path().join("jobs/j1"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1, "no temp files or duplicates left behind");
    }

    #[test]
    fn fs_put_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::new(tmp.path(), "file://out");
        assert!(matches!(
            storage.put("../evil.jpg", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(storage.put("/etc/passwd", b"x").is_err());
        assert!(storage.put("", b"x").is_err());
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryStorage::default();
        storage.put("k", b"1").unwrap();
        storage.put("k", b"2").unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("k").unwrap(), b"2");
        assert_eq!(storage.writes.lock().unwrap().len(), 2);
    }
}
