//! Agent tools for managing and querying RAG corpora.
//!
//! Each tool is a small [`Tool`] implementation that validates its arguments,
//! resolves the target corpus, forwards one or two calls to the
//! [`RagService`], and reshapes the result into a status mapping:
//!
//! ```json
//! { "status": "success" | "warning" | "error", "message": "...", ... }
//! ```
//!
//! Service failures never surface as `Err`; they become `"status": "error"`
//! values the model can read. Only malformed arguments (a required parameter
//! missing or of the wrong type) return [`RagError::InvalidArgument`].
//!
//! An empty or missing `corpus_name` selects the session's current corpus.

mod add_data;
mod corpora;
mod delete_document;
mod info;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::config::{CorpusConfig, RagConfig};
use crate::error::{RagError, Result};
use crate::resolver::CorpusResolver;
use crate::service::RagService;
use crate::session::{CorpusPresence, SessionState, check_corpus};

pub use add_data::AddDataTool;
pub use corpora::{CreateCorpusTool, DeleteCorpusTool, ListCorporaTool};
pub use delete_document::DeleteDocumentTool;
pub use info::GetCorpusInfoTool;
pub use query::RagQueryTool;

/// A function the agent model can call.
///
/// Mirrors the ADK tool shape: a name, a description, an optional JSON
/// schema for the arguments, and an async `execute`. The session state is
/// passed by `&mut` because tools update the current corpus and the
/// existence flags.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Option<Value> {
        None
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value>;
}

/// Shared dependencies of the corpus tools.
pub struct RagContext {
    service: Arc<dyn RagService>,
    corpus: CorpusConfig,
    rag: RagConfig,
}

impl RagContext {
    pub fn new(service: Arc<dyn RagService>, corpus: CorpusConfig, rag: RagConfig) -> Self {
        Self { service, corpus, rag }
    }

    pub fn service(&self) -> &dyn RagService {
        self.service.as_ref()
    }

    pub fn corpus_config(&self) -> &CorpusConfig {
        &self.corpus
    }

    pub fn rag_config(&self) -> &RagConfig {
        &self.rag
    }

    /// Confirm that `name` exists and return its canonical path.
    ///
    /// The path comes from the existence check itself, so a call lists the
    /// corpora at most once. Returns the error response to send when the
    /// corpus does not exist or the lookup failed.
    async fn locate_corpus(
        &self,
        session: &mut SessionState,
        name: &str,
    ) -> std::result::Result<String, Value> {
        match check_corpus(name, session, &self.corpus, self.service()).await {
            CorpusPresence::Present => {}
            CorpusPresence::Absent => {
                return Err(respond(
                    ToolStatus::Error,
                    format!(
                        "Corpus '{name}' does not exist. Please create it first using the create_corpus tool."
                    ),
                    json!({ "corpus_name": name }),
                ));
            }
            CorpusPresence::LookupFailed(message) => {
                return Err(respond(
                    ToolStatus::Error,
                    format!("Could not verify that corpus '{name}' exists: {message}"),
                    json!({ "corpus_name": name }),
                ));
            }
        }

        if let Some(resource_name) = session.confirmed_resource(name) {
            return Ok(resource_name.to_string());
        }
        CorpusResolver::new(&self.corpus).try_resolve(name, self.service()).await.map_err(|e| {
            warn!(corpus = name, error = %e, "corpus resolution failed");
            respond(
                ToolStatus::Error,
                format!("Could not resolve corpus '{name}': {e}"),
                json!({ "corpus_name": name }),
            )
        })
    }
}

/// Outcome reported in the `status` field of every tool response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Warning,
    Error,
}

/// Build a status response; `fields` must be a JSON object or `null`.
pub(crate) fn respond(status: ToolStatus, message: impl Into<String>, fields: Value) -> Value {
    let mut body = Map::new();
    body.insert("status".into(), json!(status));
    body.insert("message".into(), Value::String(message.into()));
    if let Value::Object(extra) = fields {
        body.extend(extra);
    }
    Value::Object(body)
}

/// Read an optional string argument.
fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => {
            Err(RagError::InvalidArgument(format!("'{key}' must be a string, got {other}")))
        }
    }
}

/// Read a required string argument.
fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(args, key)?
        .ok_or_else(|| RagError::InvalidArgument(format!("missing required '{key}' parameter")))
}

/// Pick the corpus a request targets: the named one, or the current corpus.
fn target_corpus(session: &SessionState, args: &Value) -> Result<Option<String>> {
    let named = optional_str(args, "corpus_name")?.map(str::trim).filter(|n| !n.is_empty());
    Ok(named.or(session.current_corpus()).map(str::to_string))
}

/// Response sent when a request names no corpus and none is current.
fn no_corpus_selected() -> Value {
    warn!("no corpus named and no current corpus set");
    respond(
        ToolStatus::Error,
        "No corpus specified and no current corpus is set. Please name the corpus to use.",
        Value::Null,
    )
}

/// Schema fragment shared by tools that take a `corpus_name`.
fn corpus_name_schema() -> Value {
    json!({
        "type": "string",
        "description": "The corpus to use: a display name or full resource name. Leave empty to use the current corpus."
    })
}

/// Every corpus tool, sharing one context.
pub fn corpus_tools(context: Arc<RagContext>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(RagQueryTool::new(context.clone())),
        Arc::new(ListCorporaTool::new(context.clone())),
        Arc::new(CreateCorpusTool::new(context.clone())),
        Arc::new(AddDataTool::new(context.clone())),
        Arc::new(GetCorpusInfoTool::new(context.clone())),
        Arc::new(DeleteCorpusTool::new(context.clone())),
        Arc::new(DeleteDocumentTool::new(context)),
    ]
}
