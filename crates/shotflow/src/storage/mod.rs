//! Artifact persistence: provider outputs are copied into this system's own
//! storage namespace before they count as durable results.

pub mod artifact;
pub mod fetcher;
pub mod filesystem;

use async_trait::async_trait;

use crate::error::StorageError;

pub use artifact::{ArtifactPayload, ArtifactPersister};
pub use fetcher::HttpFetcher;
pub use filesystem::FileStorage;

/// Upload side of the storage collaborator.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Stores `content` and returns its public URL.
    async fn upload(
        &self,
        content: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Download side: retrieves artifacts the provider only references by URL.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact, StorageError>;
}
