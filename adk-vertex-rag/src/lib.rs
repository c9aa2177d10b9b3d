//! # adk-vertex-rag
//!
//! Vertex AI RAG Engine corpus tools for ADK-Rust agents.
//!
//! The managed platform does the chunking, embedding, and retrieval. This
//! crate supplies the pieces an agent needs around it:
//!
//! - **Name resolution**: [`CorpusResolver`] turns whatever the model passes
//!   (a display name, a bare id, a partial or full path) into a canonical
//!   `projects/{project}/locations/{location}/ragCorpora/{id}` path.
//! - **Locator validation**: [`validate_paths`] accepts Google Drive links,
//!   Docs/Sheets/Slides links, and `gs://` URIs, normalizing Docs links to
//!   Drive form and reporting the rest as invalid.
//! - **Session state**: [`SessionState`] remembers confirmed corpora and the
//!   current corpus; [`check_corpus`] memoizes existence lookups in it.
//! - **Tools**: seven [`Tool`]s (query, list, create, add data, info, delete
//!   corpus, delete document) and the [`RagAgent`] that exposes them.
//! - **Backends**: [`InMemoryRagService`] for tests and local runs, and
//!   `VertexRagService` (feature `vertex`) over the Vertex AI REST API.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_vertex_rag::{CorpusConfig, InMemoryRagService, RagAgent, RagConfig, RagContext};
//!
//! let corpus = CorpusConfig::builder()
//!     .project_id("my-project")
//!     .default_corpus_id("4532873024948404224")
//!     .build()?;
//! let service = Arc::new(InMemoryRagService::from_config(&corpus));
//! let agent = RagAgent::new(Arc::new(RagContext::new(service, corpus, RagConfig::default())));
//!
//! let mut session = agent.new_session();
//! let reply = agent
//!     .call_tool(&mut session, "create_corpus", serde_json::json!({ "corpus_name": "site docs" }))
//!     .await?;
//! assert_eq!(reply["status"], "success");
//! ```
//!
//! ## Features
//!
//! - `vertex`: enables `VertexRagService`, backed by `reqwest`.

pub mod agent;
pub mod config;
pub mod error;
pub mod inmemory;
pub mod locator;
pub mod resolver;
pub mod resource;
pub mod service;
pub mod session;
pub mod tools;

#[cfg(feature = "vertex")]
pub mod vertex;

pub use agent::{AgentDefinition, RagAgent};
pub use config::{CorpusConfig, CorpusConfigBuilder, LlmParserConfig, RagConfig, RagConfigBuilder};
pub use error::{RagError, Result};
pub use inmemory::InMemoryRagService;
pub use locator::{Conversion, InvalidPath, Locator, PathValidation, validate_paths};
pub use resolver::CorpusResolver;
pub use resource::{corpus_resource_name, is_canonical_corpus_name, rag_file_name};
pub use service::{
    Corpus, ImportRequest, ImportResult, RagFile, RagService, RetrievalRequest, RetrievedContext,
};
pub use session::{CorpusPresence, SessionState, check_corpus, corpus_exists};
pub use tools::{RagContext, Tool, ToolStatus, corpus_tools};

#[cfg(feature = "vertex")]
pub use vertex::{PollConfig, VertexRagService};
