//! Corpus lifecycle tools: list, create, delete.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};

use super::{
    RagContext, Tool, ToolStatus, corpus_name_schema, no_corpus_selected, required_str, respond,
    target_corpus,
};
use crate::error::{RagError, Result};
use crate::resource::sanitize_id;
use crate::session::{CorpusPresence, SessionState, check_corpus};

/// Lists every corpus in the project.
pub struct ListCorporaTool {
    context: Arc<RagContext>,
}

impl ListCorporaTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for ListCorporaTool {
    fn name(&self) -> &str {
        "list_corpora"
    }

    fn description(&self) -> &str {
        "List all available document corpora with their full resource names"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({ "type": "object", "properties": {} }))
    }

    async fn execute(&self, _session: &mut SessionState, _args: Value) -> Result<Value> {
        let corpora = match self.context.service().list_corpora().await {
            Ok(corpora) => corpora,
            Err(e) => {
                error!(error = %e, "list_corpora failed");
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Error listing corpora: {e}"),
                    Value::Null,
                ));
            }
        };

        info!(count = corpora.len(), "listed corpora");

        let entries: Vec<Value> = corpora
            .iter()
            .map(|c| {
                json!({
                    "resource_name": c.name,
                    "display_name": c.display_name,
                    "create_time": c.create_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    "update_time": c.update_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                })
            })
            .collect();

        Ok(respond(
            ToolStatus::Success,
            format!("Found {} available corpora", entries.len()),
            json!({ "corpora": entries }),
        ))
    }
}

/// Creates a corpus and makes it the session's current corpus.
///
/// The display name is sanitized to `[a-zA-Z0-9_-]`.
pub struct CreateCorpusTool {
    context: Arc<RagContext>,
}

impl CreateCorpusTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for CreateCorpusTool {
    fn name(&self) -> &str {
        "create_corpus"
    }

    fn description(&self) -> &str {
        "Create a new document corpus"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "corpus_name": {
                    "type": "string",
                    "description": "Display name for the new corpus"
                }
            },
            "required": ["corpus_name"]
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let requested = required_str(&args, "corpus_name")?.trim();
        if requested.is_empty() {
            return Err(RagError::InvalidArgument("'corpus_name' must not be empty".into()));
        }
        let display_name = sanitize_id(requested);

        let service = self.context.service();
        match check_corpus(&display_name, session, self.context.corpus_config(), service).await {
            CorpusPresence::Absent => {}
            CorpusPresence::Present => {
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Corpus '{display_name}' already exists"),
                    json!({ "corpus_name": display_name, "corpus_created": false }),
                ));
            }
            CorpusPresence::LookupFailed(message) => {
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Could not check whether corpus '{display_name}' exists: {message}"),
                    json!({ "corpus_name": display_name, "corpus_created": false }),
                ));
            }
        }

        let embedding_model = &self.context.rag_config().embedding_model;
        let corpus = match service.create_corpus(&display_name, None, embedding_model).await {
            Ok(corpus) => corpus,
            Err(e) => {
                error!(corpus = %display_name, error = %e, "create_corpus failed");
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Error creating corpus: {e}"),
                    json!({ "corpus_name": display_name, "corpus_created": false }),
                ));
            }
        };

        session.confirm(&display_name, &corpus.name);
        session.set_current_corpus(&display_name);
        info!(corpus = %corpus.name, display_name = %display_name, "created corpus");

        Ok(respond(
            ToolStatus::Success,
            format!("Successfully created corpus '{display_name}'"),
            json!({
                "corpus_name": corpus.name,
                "display_name": corpus.display_name,
                "corpus_created": true,
            }),
        ))
    }
}

/// Deletes a corpus after explicit confirmation.
pub struct DeleteCorpusTool {
    context: Arc<RagContext>,
}

impl DeleteCorpusTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for DeleteCorpusTool {
    fn name(&self) -> &str {
        "delete_corpus"
    }

    fn description(&self) -> &str {
        "Delete a document corpus and all of its files. Requires confirm=true."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true to actually delete the corpus"
                }
            },
            "required": ["corpus_name", "confirm"]
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let confirm = match args.get("confirm") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(RagError::InvalidArgument(format!(
                    "'confirm' must be a boolean, got {other}"
                )));
            }
        };
        let Some(corpus_name) = target_corpus(session, &args)? else {
            return Ok(no_corpus_selected());
        };
        let resource_name = match self.context.locate_corpus(session, &corpus_name).await {
            Ok(resource_name) => resource_name,
            Err(response) => return Ok(response),
        };

        if !confirm {
            return Ok(respond(
                ToolStatus::Error,
                "Deletion requires explicit confirmation. Set confirm=true to delete this corpus.",
                json!({ "corpus_name": corpus_name }),
            ));
        }

        if let Err(e) = self.context.service().delete_corpus(&resource_name).await {
            error!(corpus = %resource_name, error = %e, "delete_corpus failed");
            return Ok(respond(
                ToolStatus::Error,
                format!("Error deleting corpus: {e}"),
                json!({ "corpus_name": corpus_name }),
            ));
        }

        session.forget(&resource_name);
        info!(corpus = %resource_name, "deleted corpus");

        Ok(respond(
            ToolStatus::Success,
            format!("Successfully deleted corpus '{corpus_name}'"),
            json!({ "corpus_name": corpus_name }),
        ))
    }
}
