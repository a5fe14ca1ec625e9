//! Blob store client for logos and post-embedded images. Objects are
//! written under a local root and addressed by a url-path reference
//! (`/uploads/<name>`); an external CDN or reverse proxy serves them.
//! Deletes are best-effort: failures are logged and never fail the
//! owning entity mutation.

use std::path::PathBuf;

use regex::Regex;
use uuid::Uuid;

use crate::error::ApiError;

lazy_static::lazy_static! {
    static ref IMG_SRC_REGEX: Regex = Regex::new(r#"<img[^>]+src="([^"]+)""#).unwrap();
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    public_prefix: String,
}

/// Sniff the content type from magic bytes. Unknown content is rejected
/// before anything touches the disk.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

fn safe_object_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
        }
    }

    /// Root and url prefix come from `BLOB_STORE_ROOT` / `BLOB_STORE_PREFIX`.
    pub fn from_env() -> Self {
        let root = std::env::var("BLOB_STORE_ROOT").unwrap_or_else(|_| "uploads".to_string());
        let prefix = std::env::var("BLOB_STORE_PREFIX").unwrap_or_else(|_| "/uploads".to_string());
        Self::new(root, prefix)
    }

    /// Store a validated image and return its public reference.
    pub async fn put(&self, bytes: &[u8]) -> Result<(String, &'static str), ApiError> {
        let mime = sniff_mime(bytes).ok_or_else(|| {
            ApiError::Validation(
                "unsupported file content; expected jpeg, png, gif, or webp".to_string(),
            )
        })?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            tracing::error!("failed to create blob store root: {}", e);
            ApiError::Validation("blob store unavailable".to_string())
        })?;

        let name = format!("{}.{}", Uuid::new_v4(), extension_for(mime));
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            tracing::error!("failed to write blob {}: {}", path.display(), e);
            ApiError::Validation("failed to store file".to_string())
        })?;

        Ok((format!("{}/{}", self.public_prefix, name), mime))
    }

    /// Best-effort delete by reference. References outside this store's
    /// prefix, malformed names, and filesystem failures are logged and
    /// ignored.
    pub async fn delete(&self, reference: &str) {
        let Some(name) = reference
            .strip_prefix(&self.public_prefix)
            .map(|rest| rest.trim_start_matches('/'))
        else {
            tracing::debug!("skipping blob delete for foreign reference: {}", reference);
            return;
        };

        if !safe_object_name(name) {
            tracing::warn!("refusing blob delete for unsafe reference: {}", reference);
            return;
        }

        let path = self.root.join(name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("failed to delete blob {}: {}", path.display(), e);
        }
    }

    /// Extract the references of images embedded in post HTML that belong
    /// to this store. Used to clean up orphaned uploads when post content
    /// is replaced or deleted.
    pub fn embedded_refs(&self, html: &str) -> Vec<String> {
        IMG_SRC_REGEX
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .filter(|src| src.starts_with(&self.public_prefix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_mime_known_formats() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(&[0x89, 0x50, 0x4E, 0x47]), Some("image/png"));
        assert_eq!(sniff_mime(&[0x47, 0x49, 0x46, 0x38]), Some("image/gif"));
        assert_eq!(
            sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some("image/webp")
        );
    }

    #[test]
    fn test_sniff_mime_rejects_unknown_and_short_input() {
        assert_eq!(sniff_mime(b"GET / HTTP/1.1"), None);
        assert_eq!(sniff_mime(&[0xFF, 0xD8]), None);
        assert_eq!(sniff_mime(&[]), None);
    }

    #[test]
    fn test_embedded_refs_keeps_only_store_references() {
        let store = BlobStore::new("uploads", "/uploads");
        let html = r#"<p>hi</p>
            <img src="/uploads/abc.png" alt="">
            <img src="https://elsewhere.example/x.png">
            <img src="/uploads/def.jpg">"#;
        assert_eq!(
            store.embedded_refs(html),
            vec!["/uploads/abc.png".to_string(), "/uploads/def.jpg".to_string()]
        );
    }

    #[test]
    fn test_safe_object_name_rejects_traversal() {
        assert!(safe_object_name("abc.png"));
        assert!(!safe_object_name("../etc/passwd"));
        assert!(!safe_object_name("a/b.png"));
        assert!(!safe_object_name(""));
    }

    #[tokio::test]
    async fn test_put_then_delete_round_trip() {
        let root = std::env::temp_dir().join(format!("blobstore-test-{}", Uuid::new_v4()));
        let store = BlobStore::new(&root, "/uploads");

        let (reference, mime) = store.put(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]).await.unwrap();
        assert_eq!(mime, "image/png");
        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with(".png"));

        let name = reference.strip_prefix("/uploads/").unwrap();
        assert!(root.join(name).exists());

        store.delete(&reference).await;
        assert!(!root.join(name).exists());

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_put_rejects_non_image_payload() {
        let store = BlobStore::new("uploads", "/uploads");
        let result = store.put(b"#!/bin/sh\necho hi").await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_is_silent_for_foreign_and_missing_refs() {
        let store = BlobStore::new("uploads", "/uploads");
        store.delete("https://elsewhere.example/x.png").await;
        store.delete("/uploads/../../etc/passwd").await;
        store.delete("/uploads/no-such-object.png").await;
    }
}
