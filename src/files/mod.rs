//! Attachment blob store
//!
//! Disk-backed store for report attachments. Every saved blob gets a
//! uuid-prefixed name so concurrent uploads never collide, and reads refuse
//! anything that is not a bare generated name. Extension whitelisting is the
//! only content validation this service performs.

use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::types::VemsError;

/// Extensions accepted for report attachments
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf", "mp4"];

/// Whether a file name carries a whitelisted extension
pub fn extension_allowed(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Content type for serving a stored attachment
pub fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Strip any path components from a client-supplied file name
fn sanitize_name(suggested: &str) -> String {
    let base = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(suggested)
        .trim();
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Disk-backed blob store
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), VemsError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a blob under a globally-unique generated name.
    ///
    /// The caller has already validated the extension; the suggested name is
    /// only kept as a readable suffix.
    pub async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, VemsError> {
        let safe = sanitize_name(suggested_name);
        if safe.is_empty() {
            return Err(VemsError::Validation("invalid file name".into()));
        }

        let stored_name = format!("{}_{}", Uuid::new_v4(), safe);
        tokio::fs::write(self.root.join(&stored_name), bytes).await?;

        info!("Stored attachment {} ({} bytes)", stored_name, bytes.len());
        Ok(stored_name)
    }

    /// Read back a stored blob by its generated name
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, VemsError> {
        if stored_name.is_empty()
            || stored_name.contains(['/', '\\'])
            || stored_name.contains("..")
        {
            return Err(VemsError::Validation("invalid stored file name".into()));
        }

        let path = self.root.join(stored_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VemsError::NotFound(format!("file {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal, used when rolling back a partially-saved
    /// submission. Failures are ignored; an orphaned blob is harmless.
    pub async fn remove(&self, stored_name: &str) {
        let _ = tokio::fs::remove_file(self.root.join(stored_name)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileStore {
        FileStore::new(std::env::temp_dir().join(format!("vems-test-{}", Uuid::new_v4())))
    }

    #[test]
    fn test_extension_whitelist() {
        assert!(extension_allowed("photo.jpg"));
        assert!(extension_allowed("photo.JPEG"));
        assert!(extension_allowed("doc.pdf"));
        assert!(extension_allowed("clip.mp4"));
        assert!(!extension_allowed("script.sh"));
        assert!(!extension_allowed("binary.exe"));
        assert!(!extension_allowed("noextension"));
        assert!(!extension_allowed(".hidden"));
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("/abs/path/photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_name("win\\style\\pic.png"), "pic.png");
        assert_eq!(sanitize_name("weird name!?.jpg"), "weirdname.jpg");
    }

    #[tokio::test]
    async fn test_save_and_read_round_trip() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        let stored = store.save(b"hello", "photo.jpg").await.unwrap();
        assert!(stored.ends_with("photo.jpg"));

        let bytes = store.read(&stored).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_same_suggested_name_yields_unique_stored_names() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        let a = store.save(b"one", "photo.jpg").await.unwrap();
        let b = store.save(b"two", "photo.jpg").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.read(&a).await.unwrap(), b"one");
        assert_eq!(store.read(&b).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_read_rejects_traversal() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        assert!(store.read("../outside").await.is_err());
        assert!(store.read("a/b").await.is_err());
        assert!(store.read("").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        match store.read("does-not-exist.jpg").await {
            Err(VemsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
