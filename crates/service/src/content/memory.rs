use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::content::{ContentStore, PublishedFiles, RemoteFile, VersionTag, WriteOutcome};
use crate::credentials::Credential;
use crate::errors::{ConflictKind, ServiceError};

#[derive(Clone, Debug)]
struct Entry {
    content: String,
    tag: VersionTag,
    message: String,
}

/// In-process content store with the same conditional-write rules as the
/// contents API. Every write gets a fresh tag, so an identical rewrite still
/// invalidates older tags.
#[derive(Default)]
pub struct MemoryContents {
    files: Mutex<HashMap<String, Entry>>,
    revision: AtomicU64,
    credential: Option<Credential>,
}

impl MemoryContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject reads and writes with `Auth` while `credential` holds no token.
    pub fn requiring(credential: Credential) -> Self {
        Self { credential: Some(credential), ..Self::default() }
    }

    fn next_tag(&self) -> VersionTag {
        let rev = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        VersionTag::new(format!("{rev:040x}"))
    }

    fn check_auth(&self) -> Result<(), ServiceError> {
        match &self.credential {
            Some(c) if !c.is_configured() => Err(ServiceError::Auth("no access token configured".into())),
            _ => Ok(()),
        }
    }

    /// Seed or overwrite a file without any tag check, as another writer would.
    pub async fn put_unchecked(&self, path: &str, content: &str) -> VersionTag {
        let tag = self.next_tag();
        self.files.lock().await.insert(
            path.to_string(),
            Entry { content: content.to_string(), tag: tag.clone(), message: "seed".into() },
        );
        tag
    }

    pub async fn content(&self, path: &str) -> Option<String> {
        self.files.lock().await.get(path).map(|e| e.content.clone())
    }

    /// Commit message of the last write to `path`.
    pub async fn last_message(&self, path: &str) -> Option<String> {
        self.files.lock().await.get(path).map(|e| e.message.clone())
    }

    /// Number of writes accepted so far, seeds included.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for MemoryContents {
    async fn read(&self, path: &str) -> Result<Option<RemoteFile>, ServiceError> {
        self.check_auth()?;
        Ok(self
            .files
            .lock()
            .await
            .get(path)
            .map(|e| RemoteFile { content: e.content.clone(), tag: e.tag.clone() }))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<WriteOutcome, ServiceError> {
        self.check_auth()?;
        let mut files = self.files.lock().await;
        match (files.get(path), expected) {
            (Some(_), None) => {
                return Err(ServiceError::Conflict { path: path.to_string(), kind: ConflictKind::Stale });
            }
            (Some(current), Some(tag)) if &current.tag != tag => {
                return Err(ServiceError::Conflict { path: path.to_string(), kind: ConflictKind::ChangedRemotely });
            }
            (None, Some(_)) => {
                return Err(ServiceError::Conflict { path: path.to_string(), kind: ConflictKind::Stale });
            }
            _ => {}
        }
        let tag = self.next_tag();
        files.insert(
            path.to_string(),
            Entry { content: content.to_string(), tag: tag.clone(), message: message.to_string() },
        );
        Ok(WriteOutcome { tag, commit_url: None })
    }
}

#[async_trait]
impl PublishedFiles for MemoryContents {
    async fn fetch(&self, path: &str) -> Result<String, ServiceError> {
        self.files
            .lock()
            .await
            .get(path)
            .map(|e| e.content.clone())
            .ok_or_else(|| ServiceError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_writer_with_same_tag_conflicts() {
        let store = MemoryContents::new();
        let created = store.write("v.json", "{}", "create", None).await.unwrap();

        let a = store.read("v.json").await.unwrap().unwrap();
        let b = store.read("v.json").await.unwrap().unwrap();
        assert_eq!(a.tag, created.tag);
        assert_eq!(a.tag, b.tag);

        store.write("v.json", "{\"a\":1}", "first", Some(&a.tag)).await.unwrap();
        let err = store.write("v.json", "{\"b\":1}", "second", Some(&b.tag)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { kind: ConflictKind::ChangedRemotely, .. }));

        let fresh = store.read("v.json").await.unwrap().unwrap();
        store.write("v.json", "{\"b\":1}", "second retry", Some(&fresh.tag)).await.unwrap();
        assert_eq!(store.content("v.json").await.as_deref(), Some("{\"b\":1}"));
        assert_eq!(store.last_message("v.json").await.as_deref(), Some("second retry"));
    }

    #[tokio::test]
    async fn create_over_existing_file_is_stale() {
        let store = MemoryContents::new();
        store.put_unchecked("v.json", "{}").await;
        let err = store.write("v.json", "{}", "create", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { kind: ConflictKind::Stale, .. }));
    }

    #[tokio::test]
    async fn missing_credential_is_auth_error() {
        let credential = Credential::default();
        let store = MemoryContents::requiring(credential.clone());
        assert!(matches!(store.read("v.json").await, Err(ServiceError::Auth(_))));
        credential.set(Some("t".into()));
        assert!(store.read("v.json").await.unwrap().is_none());
    }
}
