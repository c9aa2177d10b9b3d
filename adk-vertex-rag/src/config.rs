//! Configuration for corpus resolution, ingestion, and retrieval.
//!
//! Two immutable values are passed explicitly to every component that needs
//! them:
//!
//! - [`CorpusConfig`] identifies the cloud project and the default corpus.
//!   It drives name resolution.
//! - [`RagConfig`] carries chunking, retrieval, and embedding parameters
//!   forwarded to the RAG service.
//!
//! Both are constructed through validating builders.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::resource;

/// Environment variable holding the Google Cloud project id.
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Environment variable holding the Google Cloud region.
pub const ENV_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
/// Environment variable holding the default corpus id.
pub const ENV_DEFAULT_CORPUS_ID: &str = "RAG_DEFAULT_CORPUS_ID";
/// Environment variable holding the display name that maps to the default corpus.
pub const ENV_DEFAULT_DISPLAY_NAME: &str = "RAG_DEFAULT_CORPUS_DISPLAY_NAME";

const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_DISPLAY_NAME: &str = "default";

/// Project, region, and default corpus used to build canonical resource paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Google Cloud region, e.g. `us-central1`.
    pub location: String,
    /// Id of the corpus used when a request names the default display name.
    pub default_corpus_id: String,
    /// Display name that refers to the default corpus.
    pub default_display_name: String,
}

impl CorpusConfig {
    /// Create a new builder for constructing a [`CorpusConfig`].
    pub fn builder() -> CorpusConfigBuilder {
        CorpusConfigBuilder::default()
    }

    /// Load the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required variable is missing or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary key lookup.
    ///
    /// `GOOGLE_CLOUD_PROJECT` and `RAG_DEFAULT_CORPUS_ID` are required;
    /// the location defaults to `us-central1`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RagError::Config(format!("{key} must be set")))
        };

        let mut builder = CorpusConfig::builder()
            .project_id(required(ENV_PROJECT)?)
            .default_corpus_id(required(ENV_DEFAULT_CORPUS_ID)?);
        if let Some(location) = lookup(ENV_LOCATION).filter(|v| !v.trim().is_empty()) {
            builder = builder.location(location);
        }
        if let Some(name) = lookup(ENV_DEFAULT_DISPLAY_NAME).filter(|v| !v.trim().is_empty()) {
            builder = builder.default_display_name(name);
        }
        builder.build()
    }

    /// The `projects/{project}/locations/{location}` parent of every corpus.
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    /// Canonical resource path for the corpus with the given id.
    pub fn corpus_path(&self, corpus_id: &str) -> String {
        resource::corpus_resource_name(&self.project_id, &self.location, corpus_id)
    }

    /// Canonical resource path of the default corpus.
    pub fn default_corpus_path(&self) -> String {
        self.corpus_path(&self.default_corpus_id)
    }

    /// Full publisher model path for a Google model id in this project and region.
    pub fn publisher_model(&self, model_id: &str) -> String {
        format!("{}/publishers/google/models/{model_id}", self.parent())
    }
}

/// Builder for constructing a validated [`CorpusConfig`].
#[derive(Debug, Clone, Default)]
pub struct CorpusConfigBuilder {
    project_id: Option<String>,
    location: Option<String>,
    default_corpus_id: Option<String>,
    default_display_name: Option<String>,
}

impl CorpusConfigBuilder {
    /// Set the Google Cloud project id.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the Google Cloud region. Defaults to `us-central1`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the id of the default corpus.
    pub fn default_corpus_id(mut self, id: impl Into<String>) -> Self {
        self.default_corpus_id = Some(id.into());
        self
    }

    /// Set the display name that maps to the default corpus. Defaults to `default`.
    pub fn default_display_name(mut self, name: impl Into<String>) -> Self {
        self.default_display_name = Some(name.into());
        self
    }

    /// Build the [`CorpusConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - the project id or default corpus id is missing
    /// - the project id or location is empty or contains `/`
    /// - the default corpus id contains characters outside `[a-zA-Z0-9_-]`
    pub fn build(self) -> Result<CorpusConfig> {
        let project_id =
            self.project_id.ok_or_else(|| RagError::Config("project_id is required".into()))?;
        let location = self.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let default_corpus_id = self
            .default_corpus_id
            .ok_or_else(|| RagError::Config("default_corpus_id is required".into()))?;
        let default_display_name =
            self.default_display_name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

        for (field, value) in [("project_id", &project_id), ("location", &location)] {
            if !resource::is_path_segment(value) {
                return Err(RagError::Config(format!(
                    "{field} must be a non-empty path segment, got '{value}'"
                )));
            }
        }
        if !resource::is_simple_token(&default_corpus_id) {
            return Err(RagError::Config(format!(
                "default_corpus_id must match [a-zA-Z0-9_-]+, got '{default_corpus_id}'"
            )));
        }

        Ok(CorpusConfig { project_id, location, default_corpus_id, default_display_name })
    }
}

/// LLM-based document parsing applied by the platform during import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmParserConfig {
    /// Full publisher model path of the parsing model.
    pub model_name: String,
    /// Rate limit for parsing requests.
    pub max_parsing_requests_per_min: u32,
    /// Optional prompt replacing the platform's default parsing prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_parsing_prompt: Option<String>,
}

impl LlmParserConfig {
    /// Model id used by [`LlmParserConfig::for_project`].
    pub const DEFAULT_MODEL_ID: &'static str = "gemini-2.0-flash";

    /// Parse with [`Self::DEFAULT_MODEL_ID`] in the configured project and region,
    /// using [`DEFAULT_PARSING_PROMPT`].
    pub fn for_project(corpus: &CorpusConfig) -> Self {
        Self {
            model_name: corpus.publisher_model(Self::DEFAULT_MODEL_ID),
            max_parsing_requests_per_min: 1000,
            custom_parsing_prompt: Some(DEFAULT_PARSING_PROMPT.to_string()),
        }
    }
}

/// Instructions given to the parsing model when documents are imported.
pub const DEFAULT_PARSING_PROMPT: &str = "\
Extract all textual content from the provided document as clean, structured plain text \
suitable for retrieval. Keep headings, lists, and paragraph order. Render tables as rows \
with clear column separators. Describe charts, diagrams, and images that carry information \
as [IMAGE: description]. Drop repeated page headers, footers, and page numbers. Mark \
illegible or ambiguous passages as [UNCLEAR: description] instead of guessing.";

/// Chunking, retrieval, and embedding parameters for the RAG service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Chunk size in tokens applied at import.
    pub chunk_size: u32,
    /// Overlap in tokens between consecutive chunks.
    pub chunk_overlap: u32,
    /// Number of contexts returned by a retrieval query.
    pub top_k: u32,
    /// Maximum vector distance for retrieved contexts.
    pub distance_threshold: f64,
    /// Embedding model used when creating corpora.
    pub embedding_model: String,
    /// Rate limit for embedding requests during import.
    pub max_embedding_requests_per_min: u32,
    /// Optional LLM parser applied during import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_parser: Option<LlmParserConfig>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
            top_k: 3,
            distance_threshold: 0.5,
            embedding_model: "publishers/google/models/text-embedding-005".to_string(),
            max_embedding_requests_per_min: 1000,
            llm_parser: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunk size.
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks.
    pub fn chunk_overlap(mut self, overlap: u32) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of contexts returned per query.
    pub fn top_k(mut self, k: u32) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum vector distance for retrieved contexts.
    pub fn distance_threshold(mut self, threshold: f64) -> Self {
        self.config.distance_threshold = threshold;
        self
    }

    /// Set the embedding model used for new corpora.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding rate limit applied during import.
    pub fn max_embedding_requests_per_min(mut self, rpm: u32) -> Self {
        self.config.max_embedding_requests_per_min = rpm;
        self
    }

    /// Enable LLM parsing during import.
    pub fn llm_parser(mut self, parser: LlmParserConfig) -> Self {
        self.config.llm_parser = Some(parser);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `distance_threshold` is negative or not finite
    /// - `max_embedding_requests_per_min == 0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if !config.distance_threshold.is_finite() || config.distance_threshold < 0.0 {
            return Err(RagError::Config(format!(
                "distance_threshold must be a non-negative number, got {}",
                config.distance_threshold
            )));
        }
        if config.max_embedding_requests_per_min == 0 {
            return Err(RagError::Config(
                "max_embedding_requests_per_min must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builds_corpus_config_with_defaults() {
        let config = CorpusConfig::builder()
            .project_id("my-project")
            .default_corpus_id("123")
            .build()
            .unwrap();
        assert_eq!(config.location, "us-central1");
        assert_eq!(config.default_display_name, "default");
        assert_eq!(
            config.default_corpus_path(),
            "projects/my-project/locations/us-central1/ragCorpora/123"
        );
    }

    #[test]
    fn rejects_project_with_slash() {
        let err = CorpusConfig::builder()
            .project_id("a/b")
            .default_corpus_id("123")
            .build()
            .unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn rejects_default_corpus_id_with_spaces() {
        let result = CorpusConfig::builder().project_id("p").default_corpus_id("my corpus").build();
        assert!(result.is_err());
    }

    #[test]
    fn loads_corpus_config_from_lookup() {
        let config = CorpusConfig::from_lookup(env(&[
            (ENV_PROJECT, "gen-lang-client-0516570023"),
            (ENV_LOCATION, "europe-west4"),
            (ENV_DEFAULT_CORPUS_ID, "4532873024948404224"),
            (ENV_DEFAULT_DISPLAY_NAME, "test"),
        ]))
        .unwrap();
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.default_display_name, "test");
    }

    #[test]
    fn missing_project_is_reported_by_name() {
        let err = CorpusConfig::from_lookup(env(&[(ENV_DEFAULT_CORPUS_ID, "1")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PROJECT));
    }

    #[test]
    fn rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert!((config.distance_threshold - 0.5).abs() < f64::EPSILON);
        assert!(config.llm_parser.is_none());
    }

    #[test]
    fn rag_config_rejects_overlap_not_below_size() {
        assert!(RagConfig::builder().chunk_size(100).chunk_overlap(100).build().is_err());
        assert!(RagConfig::builder().chunk_size(512).chunk_overlap(100).build().is_ok());
    }

    #[test]
    fn rag_config_rejects_zero_top_k_and_bad_threshold() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().distance_threshold(-0.1).build().is_err());
        assert!(RagConfig::builder().distance_threshold(f64::NAN).build().is_err());
    }

    #[test]
    fn llm_parser_uses_project_model_path() {
        let corpus =
            CorpusConfig::builder().project_id("p").default_corpus_id("1").build().unwrap();
        let parser = LlmParserConfig::for_project(&corpus);
        assert_eq!(
            parser.model_name,
            "projects/p/locations/us-central1/publishers/google/models/gemini-2.0-flash"
        );
    }
}
