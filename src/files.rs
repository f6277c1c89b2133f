use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use tokio::fs;
use tokio::sync::RwLock;

use crate::crypto::sha256_hex;
use crate::error::{ChatError, Result};
use crate::models::{new_id, FileAttachment};

pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub attachment: FileAttachment,
    pub sha256: String,
    pub expires_at: SystemTime,
    path: PathBuf,
}

/// Attachment storage on local disk, deduplicated by content hash.
pub struct FileManager {
    files: Arc<RwLock<HashMap<String, StoredFile>>>,
    storage_path: PathBuf,
    ttl: Duration,
}

impl FileManager {
    pub async fn new(storage_path: impl Into<PathBuf>, ttl: Duration) -> std::io::Result<Self> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).await?;

        Ok(FileManager {
            files: Arc::new(RwLock::new(HashMap::new())),
            storage_path,
            ttl,
        })
    }

    pub async fn upload_file(
        &self,
        name: String,
        mime_type: String,
        content: Vec<u8>,
    ) -> Result<FileAttachment> {
        if content.is_empty() {
            return Err(ChatError::InvalidInput("File is empty".to_string()));
        }
        if content.len() > MAX_FILE_SIZE {
            return Err(ChatError::InvalidInput(
                "File size exceeds maximum allowed size".to_string(),
            ));
        }

        let sha256 = sha256_hex(&content);
        {
            // A live copy is reused and kept alive for another full TTL. Expired
            // ones are left for the sweep.
            let mut files = self.files.write().await;
            let now = SystemTime::now();
            if let Some(existing) = files
                .values_mut()
                .find(|f| f.sha256 == sha256 && now <= f.expires_at)
            {
                existing.expires_at = now + self.ttl;
                return Ok(FileAttachment {
                    name,
                    ..existing.attachment.clone()
                });
            }
        }

        let id = new_id();
        let path = self.storage_path.join(&id);
        fs::write(&path, &content)
            .await
            .map_err(|e| ChatError::Internal(format!("writing upload: {e}")))?;

        let attachment = FileAttachment {
            url: format!("/api/files/{id}"),
            id: id.clone(),
            name,
            mime_type,
            size: content.len(),
        };
        debug!("Stored upload {} ({} bytes)", attachment.id, attachment.size);

        let entry = StoredFile {
            attachment: attachment.clone(),
            sha256,
            expires_at: SystemTime::now() + self.ttl,
            path,
        };
        self.files.write().await.insert(id, entry);

        Ok(attachment)
    }

    pub async fn get_file(&self, id: &str) -> Option<(FileAttachment, Vec<u8>)> {
        let entry = {
            let files = self.files.read().await;
            files.get(id)?.clone()
        };

        if SystemTime::now() > entry.expires_at {
            return None;
        }

        match fs::read(&entry.path).await {
            Ok(content) => Some((entry.attachment, content)),
            Err(e) => {
                warn!("Upload {id} is indexed but unreadable: {e}");
                None
            }
        }
    }

    /// Drops expired uploads from the index and from disk. Returns how many
    /// were removed.
    pub async fn cleanup_expired_files(&self) -> usize {
        let expired: Vec<StoredFile> = {
            let mut files = self.files.write().await;
            let now = SystemTime::now();
            let ids: Vec<String> = files
                .iter()
                .filter(|(_, f)| now > f.expires_at)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| files.remove(id)).collect()
        };

        for file in &expired {
            if let Err(e) = fs::remove_file(&file.path).await {
                warn!("Failed to remove expired upload {}: {}", file.attachment.id, e);
            }
        }
        expired.len()
    }

    /// Runs `cleanup_expired_files` forever on the given period.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = manager.cleanup_expired_files().await;
                if removed > 0 {
                    debug!("Removed {removed} expired uploads");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("room_chat_files_{}", new_id()))
    }

    #[tokio::test]
    async fn upload_dedupes_by_content() {
        let dir = scratch_dir();
        let manager = FileManager::new(&dir, Duration::from_secs(60)).await.unwrap();

        let a = manager
            .upload_file("a.txt".into(), "text/plain".into(), b"hello".to_vec())
            .await
            .unwrap();
        let b = manager
            .upload_file("b.txt".into(), "text/plain".into(), b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.url, format!("/api/files/{}", a.id));
        assert_eq!(b.name, "b.txt");

        let (meta, bytes) = manager.get_file(&a.id).await.unwrap();
        assert_eq!(meta.name, "a.txt");
        assert_eq!(bytes, b"hello");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn empty_and_expired_files() {
        let dir = scratch_dir();
        let manager = FileManager::new(&dir, Duration::ZERO).await.unwrap();

        assert!(matches!(
            manager.upload_file("e".into(), "text/plain".into(), Vec::new()).await,
            Err(ChatError::InvalidInput(_))
        ));

        let meta = manager
            .upload_file("x".into(), "text/plain".into(), b"x".to_vec())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(manager.get_file(&meta.id).await.is_none());
        assert_eq!(manager.cleanup_expired_files().await, 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn reupload_after_expiry_stores_a_fresh_copy() {
        let dir = scratch_dir();
        let manager = FileManager::new(&dir, Duration::from_millis(300)).await.unwrap();

        let first = manager
            .upload_file("a".into(), "text/plain".into(), b"hi".to_vec())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let second = manager
            .upload_file("b".into(), "text/plain".into(), b"hi".to_vec())
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.name, "b");
        let (_, bytes) = manager.get_file(&second.id).await.unwrap();
        assert_eq!(bytes, b"hi");

        assert_eq!(manager.cleanup_expired_files().await, 1);
        assert!(manager.get_file(&second.id).await.is_some());

        let _ = std::fs::remove_dir_all(dir);
    }
}
