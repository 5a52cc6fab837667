//! # Trolley Storage FS
//!
//! File-backed [`KvStore`] implementation: one file per key under a root
//! directory.
//!
//! This is the durable stand-in for device-local storage. Keys are
//! sanitized into file names (the cart key `@GoMarketPlace` contains `@`,
//! and nothing stops a key from containing `/`), and writes go through a
//! temp-file-then-rename sequence so a crash mid-write never leaves a
//! half-written value behind.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trolley_storage_fs::FileKv;
//!
//! let kv: Arc<dyn KvStore> = Arc::new(FileKv::new("/var/lib/trolley"));
//! kv.set(StorageKey::new("@GoMarketPlace"), payload).await?;
//! ```

use std::fmt::Write as _;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use trolley_core::storage::{KvError, KvStore, StorageKey};

/// Key-value store that keeps each key in its own file
///
/// The root directory is created lazily on first write. Reads of absent
/// keys return `Ok(None)` rather than an error, matching the contract
/// callers rely on for first-run hydration.
///
/// Writes are atomic at the file level: the value is written to a hidden
/// sibling temp file and renamed over the target. Concurrent writes to the
/// *same* key are expected to be serialized upstream (the runtime's write
/// queues do this); writes to different keys never contend.
#[derive(Debug, Clone)]
pub struct FileKv {
    root: PathBuf,
}

impl FileKv {
    /// Create a store rooted at the given directory
    ///
    /// The directory does not need to exist yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory holding the key files
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(sanitize(key.as_str()))
    }
}

/// Map a key to a safe file name.
///
/// ASCII alphanumerics plus `.`, `_` and `-` pass through; every other
/// byte becomes `%XX`. The mapping is injective (a literal `%` is itself
/// escaped), so distinct keys never collide on disk. The dot-only names
/// `.` and `..` are escaped to keep every key inside the root.
fn sanitize(key: &str) -> String {
    if key == "." {
        return "%2E".to_string();
    }
    if key == ".." {
        return "%2E%2E".to_string();
    }

    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                name.push(byte as char);
            }
            _ => {
                // Infallible for String
                let _ = write!(name, "%{byte:02X}");
            }
        }
    }

    if name.is_empty() {
        // Empty keys still need a file name; a bare '%' can never be
        // produced by the escaping above.
        name.push('%');
    }

    name
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "key".to_string(), |n| n.to_string_lossy().into_owned());

    path.with_file_name(format!(".{file_name}.tmp"))
}

impl KvStore for FileKv {
    fn get(
        &self,
        key: StorageKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, KvError>> + Send + '_>> {
        let path = self.path_for(&key);

        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    tracing::trace!(
                        key = %key,
                        path = %path.display(),
                        bytes = bytes.len(),
                        "Read key file"
                    );
                    Ok(Some(bytes))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::trace!(key = %key, "Key file absent");
                    Ok(None)
                }
                Err(e) => Err(KvError::Io(format!("read {}: {e}", path.display()))),
            }
        })
    }

    fn set(
        &self,
        key: StorageKey,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), KvError>> + Send + '_>> {
        let path = self.path_for(&key);
        let tmp = temp_path_for(&path);
        let root = self.root.clone();

        Box::pin(async move {
            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|e| KvError::Io(format!("create {}: {e}", root.display())))?;

            if let Err(e) = tokio::fs::write(&tmp, &value).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(KvError::Io(format!("write {}: {e}", tmp.display())));
            }

            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(KvError::Io(format!(
                    "rename {} -> {}: {e}",
                    tmp.display(),
                    path.display()
                )));
            }

            tracing::trace!(
                key = %key,
                path = %path.display(),
                bytes = value.len(),
                "Wrote key file"
            );

            Ok(())
        })
    }
}
