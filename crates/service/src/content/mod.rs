//! Remote file store
//!
//! The repository is used as a key-value file store with conditional writes:
//! every read hands out a [`VersionTag`], every update must present the tag it
//! was based on.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub mod github;
pub mod memory;
pub mod published;

pub use github::GithubContents;
pub use memory::MemoryContents;
pub use published::{HttpPublished, SiteDirPublished};

/// Opaque optimistic-concurrency marker (the blob sha on GitHub).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as read from the store, already decoded to text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub tag: VersionTag,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub tag: VersionTag,
    /// Link to the commit that carried the write, when the store reports one.
    pub commit_url: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read `path`. A missing file is `Ok(None)`.
    async fn read(&self, path: &str) -> Result<Option<RemoteFile>, ServiceError>;

    /// Write `content` to `path`. Without `expected` the file is created and
    /// the write fails if it already exists; with `expected` the write fails
    /// if the file changed since that tag was read.
    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<WriteOutcome, ServiceError>;
}

/// Unauthenticated read access to the published site, used to bootstrap
/// listings without a credential.
#[async_trait]
pub trait PublishedFiles: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String, ServiceError>;
}
