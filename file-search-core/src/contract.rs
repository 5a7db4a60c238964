//! # contract: the remote file search API as seen by the workflows
//!
//! This module defines a single trait ([`FileSearchApi`]) and the plain data
//! types it exchanges: stores, documents inside a store, temporary uploaded
//! files, long-running import operations and grounded answers.
//!
//! ## Interface & Extensibility
//! - Implement [`FileSearchApi`] to plug in a transport (the Gemini REST client
//!   in the binary crate) or a test double.
//! - All methods are async and return [`crate::Error`]; implementors convert
//!   transport and decoding failures into [`crate::Error::Remote`].
//! - Pagination is the implementor's job: list methods return every item.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so `MockFileSearchApi` is available
//!   in unit tests and, through the `test-export-mocks` feature, to dependents.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::error::Result;
use crate::metadata::DocumentMetadata;

/// A named remote container of searchable documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    /// Remote identifier, e.g. `fileSearchStores/demo-file-store-abc123`.
    pub name: String,
    pub display_name: Option<String>,
    pub create_time: Option<String>,
}

/// A file imported into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Remote identifier, e.g. `fileSearchStores/…/documents/…`.
    pub name: String,
    pub display_name: Option<String>,
    pub custom_metadata: Vec<CustomMetadata>,
    pub state: Option<String>,
}

impl Document {
    /// String value of the custom metadata entry `key`, if any.
    pub fn metadata_string(&self, key: &str) -> Option<&str> {
        self.custom_metadata
            .iter()
            .find(|m| m.key == key)
            .and_then(|m| m.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomMetadata {
    pub key: String,
    pub value: CustomMetadataValue,
}

impl CustomMetadata {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: CustomMetadataValue::String(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CustomMetadataValue {
    String(String),
    Numeric(f64),
    StringList(Vec<String>),
}

impl CustomMetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CustomMetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Lifecycle of a temporary upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
    Unspecified,
    Other(String),
}

impl FileState {
    pub fn from_remote(state: &str) -> Self {
        match state {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            "STATE_UNSPECIFIED" | "" => FileState::Unspecified,
            other => FileState::Other(other.to_string()),
        }
    }

    pub fn as_remote(&self) -> &str {
        match self {
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Unspecified => "STATE_UNSPECIFIED",
            FileState::Other(s) => s,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, FileState::Processing)
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_remote())
    }
}

/// Temporary upload handle, used for metadata extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Remote identifier, e.g. `files/abc123`.
    pub name: String,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub uri: Option<String>,
    pub state: FileState,
}

/// Everything needed to import a local file into a store besides the file itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub display_name: String,
    pub custom_metadata: Vec<CustomMetadata>,
    pub mime_type: Option<String>,
}

/// Long-running import into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOperation {
    pub name: String,
    pub done: bool,
    /// Error reported by the service inside a finished operation.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundingChunk {
    pub title: Option<String>,
    pub text: Option<String>,
    pub store: Option<String>,
}

/// Free-text answer of a retrieval-augmented generation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryAnswer {
    pub text: String,
    pub grounding_chunks: Vec<GroundingChunk>,
}

impl QueryAnswer {
    pub fn chunk_count(&self) -> usize {
        self.grounding_chunks.len()
    }
}

/// Operations the workflows need from the hosted file search service.
///
/// The trait is implemented by the real HTTP client and by test doubles.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileSearchApi: Send + Sync {
    /// List every store visible to the credential, in service order.
    async fn list_stores(&self) -> Result<Vec<Store>>;

    /// Create a store with the given display name.
    async fn create_store(&self, display_name: &str) -> Result<Store>;

    /// List every document in a store.
    async fn list_documents(&self, store: &str) -> Result<Vec<Document>>;

    /// Delete a document. `force` also removes its chunks.
    async fn delete_document(&self, name: &str, force: bool) -> Result<()>;

    /// Upload raw file bytes for processing; the handle usually starts as processing.
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile>;

    /// Re-fetch a temporary upload handle.
    async fn get_file(&self, name: &str) -> Result<UploadedFile>;

    /// Ask `model` for title, author and abstract of an active uploaded file.
    async fn extract_metadata(
        &self,
        model: &str,
        file: &UploadedFile,
        prompt: &str,
    ) -> Result<DocumentMetadata>;

    /// Start importing a local file into a store.
    async fn import_file(
        &self,
        store: &str,
        path: &Path,
        request: ImportRequest,
    ) -> Result<ImportOperation>;

    /// Re-fetch an import operation.
    async fn get_operation(&self, name: &str) -> Result<ImportOperation>;

    /// Answer `question` with `model`, retrieving from `store` only.
    async fn query(&self, model: &str, store: &str, question: &str) -> Result<QueryAnswer>;
}
