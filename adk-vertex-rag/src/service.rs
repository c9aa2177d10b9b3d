//! RAG service trait and the records it exchanges.
//!
//! The managed platform owns chunking, embedding, storage, and retrieval.
//! [`RagService`] is the seam between the agent tools and that platform:
//! [`InMemoryRagService`](crate::inmemory::InMemoryRagService) implements it
//! locally, and `VertexRagService` (feature `vertex`) implements it over the
//! Vertex AI REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{LlmParserConfig, RagConfig};
use crate::error::Result;

/// A document collection known to the RAG platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Corpus {
    /// Canonical resource path.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// A file ingested into a corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagFile {
    /// Canonical resource path (`{corpus}/ragFiles/{id}`).
    pub name: String,
    pub display_name: String,
    /// Locator the file was imported from, when known.
    #[serde(default)]
    pub source_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// Parameters of a file import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRequest {
    /// Validated locators (see [`crate::locator::validate_paths`]).
    pub paths: Vec<String>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub max_embedding_requests_per_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_parser: Option<LlmParserConfig>,
}

impl ImportRequest {
    /// Build an import of `paths` using the chunking settings of `config`.
    pub fn new(paths: Vec<String>, config: &RagConfig) -> Self {
        Self {
            paths,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_embedding_requests_per_min: config.max_embedding_requests_per_min,
            llm_parser: config.llm_parser.clone(),
        }
    }
}

/// Outcome counts of a file import.
///
/// An import may be split into several requests. When some of them fail and
/// others succeed, the counts of the successful ones are kept, the files of
/// the failed ones are counted as failed, and `errors` says what went wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_rag_files_count: u64,
    pub failed_rag_files_count: u64,
    pub skipped_rag_files_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ImportResult {
    /// Whether some part of the import failed outright.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parameters of a retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalRequest {
    pub text: String,
    pub top_k: u32,
    /// Contexts farther than this vector distance are dropped.
    pub distance_threshold: f64,
}

/// A passage returned by a retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedContext {
    #[serde(default)]
    pub source_uri: String,
    #[serde(default)]
    pub source_display_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
}

/// Client for a managed RAG platform.
///
/// Every method is a single round trip with no retry; callers own timeout and
/// retry policy. Failures are reported as [`RagError::Service`](crate::RagError::Service).
///
/// # Example
///
/// ```rust,ignore
/// use adk_vertex_rag::{InMemoryRagService, RagService};
///
/// let service = InMemoryRagService::new("my-project", "us-central1");
/// let corpus = service.create_corpus("site_docs", None, "text-embedding-005").await?;
/// let corpora = service.list_corpora().await?;
/// ```
#[async_trait]
pub trait RagService: Send + Sync {
    /// Enumerate every corpus in the configured project and region.
    async fn list_corpora(&self) -> Result<Vec<Corpus>>;

    /// Create a corpus embedding its files with `embedding_model`.
    async fn create_corpus(
        &self,
        display_name: &str,
        description: Option<&str>,
        embedding_model: &str,
    ) -> Result<Corpus>;

    /// Delete a corpus and every file in it.
    async fn delete_corpus(&self, corpus_name: &str) -> Result<()>;

    /// Import the given locators into a corpus.
    async fn import_files(
        &self,
        corpus_name: &str,
        request: &ImportRequest,
    ) -> Result<ImportResult>;

    /// List the files of a corpus.
    async fn list_files(&self, corpus_name: &str) -> Result<Vec<RagFile>>;

    /// Delete one file by its full `{corpus}/ragFiles/{id}` path.
    async fn delete_file(&self, file_name: &str) -> Result<()>;

    /// Retrieve the contexts most relevant to `request.text` from the given corpora.
    async fn retrieval_query(
        &self,
        corpus_names: &[String],
        request: &RetrievalRequest,
    ) -> Result<Vec<RetrievedContext>>;
}
