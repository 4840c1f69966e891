//! Filesystem-backed store for the demo directory.
//!
//! Files are addressed by bare name only; any name that would resolve outside
//! the root is rejected before touching the filesystem. The store overwrites
//! on name collision and never deletes files itself.

use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Fixed demo files written by [`FileStore::generate_samples`].
pub const DEMO_FILES: &[(&str, &str)] = &[
    (
        "virus.txt",
        "This is a benign test file. Warning: malware detected!\nEval and system calls found.",
    ),
    ("program.exe", "Fake executable content for demo purposes only."),
    ("readme.txt", "This is a safe file generated automatically."),
];

/// Errors from file store operations.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    /// Named file does not exist or is not a regular file.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Name would resolve outside the demo directory.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Store rooted at the demo directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created lazily by
    /// [`FileStore::ensure_root`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The demo directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the demo directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), FileStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolve a client-supplied name to a path inside the root.
    ///
    /// Only a single normal path component is accepted: separators, `..`,
    /// absolute paths, and empty names are all rejected.
    fn resolve(&self, name: &str) -> Result<PathBuf, FileStoreError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part.to_str() == Some(name) => {
                Ok(self.root.join(name))
            }
            _ => Err(FileStoreError::InvalidName(name.to_owned())),
        }
    }

    /// File names currently in the demo directory.
    pub async fn list(&self) -> Result<Vec<String>, FileStoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Open a file for streaming reads.
    pub async fn open(&self, name: &str) -> Result<File, FileStoreError> {
        let path = self.resolve(name)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileStoreError::NotFound(name.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(FileStoreError::NotFound(name.to_owned()));
        }
        Ok(File::open(&path).await?)
    }

    /// Create (truncating) a file for streaming writes.
    pub async fn create(&self, name: &str) -> Result<File, FileStoreError> {
        let path = self.resolve(name)?;
        Ok(File::create(&path).await?)
    }

    /// Persist `bytes` under `name`, overwriting any existing file.
    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), FileStoreError> {
        let mut file = self.create(name).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        debug!(name, len = bytes.len(), "stored file");
        Ok(())
    }

    /// (Re)write the fixed demo set. Returns the names written.
    pub async fn generate_samples(&self) -> Result<Vec<String>, FileStoreError> {
        self.ensure_root().await?;
        let mut names = Vec::with_capacity(DEMO_FILES.len());
        for (name, content) in DEMO_FILES {
            self.store(name, content.as_bytes()).await?;
            names.push((*name).to_owned());
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.ensure_root().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn store_and_list() {
        let (store, _dir) = make_store().await;
        store.store("a.txt", b"alpha").await.unwrap();
        store.store("b.txt", b"beta").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn list_empty_dir() {
        let (store, _dir) = make_store().await;
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_subdirectories() {
        let (store, dir) = make_store().await;
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        store.store("top.txt", b"x").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["top.txt"]);
    }

    #[tokio::test]
    async fn store_overwrites() {
        let (store, _dir) = make_store().await;
        store.store("readme.txt", b"first").await.unwrap();
        store.store("readme.txt", b"second").await.unwrap();

        let content = tokio::fs::read(store.root().join("readme.txt")).await.unwrap();
        assert_eq!(content, b"second");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_missing_is_not_found() {
        let (store, _dir) = make_store().await;
        let err = store.open("ghost.txt").await.unwrap_err();
        assert!(matches!(err, FileStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn open_directory_is_not_found() {
        let (store, dir) = make_store().await;
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        let err = store.open("sub").await.unwrap_err();
        assert!(matches!(err, FileStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_names_rejected() {
        let (store, _dir) = make_store().await;
        for name in ["../etc/passwd", "..", "a/b.txt", "/etc/passwd", "", "./x", "trailing/"] {
            let err = store.open(name).await.unwrap_err();
            assert!(
                matches!(err, FileStoreError::InvalidName(_)),
                "name {name:?} should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn traversal_rejected_on_store_too() {
        let (store, _dir) = make_store().await;
        let err = store.store("../escape.txt", b"x").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidName(_)));
    }

    #[tokio::test]
    async fn generate_samples_writes_fixed_set() {
        let (store, _dir) = make_store().await;
        let names = store.generate_samples().await.unwrap();
        assert_eq!(names, vec!["virus.txt", "program.exe", "readme.txt"]);

        for (name, content) in DEMO_FILES {
            let bytes = tokio::fs::read(store.root().join(name)).await.unwrap();
            assert_eq!(bytes, content.as_bytes(), "content mismatch for {name}");
        }
    }

    #[tokio::test]
    async fn generate_samples_is_repeatable() {
        let (store, _dir) = make_store().await;
        store.store("readme.txt", b"user content").await.unwrap();
        let _ = store.generate_samples().await.unwrap();
        let _ = store.generate_samples().await.unwrap();

        let bytes = tokio::fs::read(store.root().join("readme.txt")).await.unwrap();
        assert_eq!(bytes, DEMO_FILES[2].1.as_bytes());
    }

    #[tokio::test]
    async fn generate_samples_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("demo"));
        let _ = store.generate_samples().await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn generate_samples_keeps_prior_files() {
        let (store, _dir) = make_store().await;
        store.store("user-upload.bin", b"data").await.unwrap();
        let _ = store.generate_samples().await.unwrap();
        let names = store.list().await.unwrap();
        assert!(names.contains(&"user-upload.bin".to_owned()));
        assert_eq!(names.len(), 4);
    }

    #[tokio::test]
    async fn list_unreadable_root_errors() {
        let store = FileStore::new("/nonexistent_scanhub_dir_xyz");
        let err = store.list().await.unwrap_err();
        assert!(matches!(err, FileStoreError::Io(_)));
    }
}
