use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};

use super::{
    RagContext, Tool, ToolStatus, corpus_name_schema, no_corpus_selected, required_str, respond,
    target_corpus,
};
use crate::error::{RagError, Result};
use crate::resource::{is_simple_token, rag_file_name};
use crate::session::SessionState;

/// Deletes one file from a corpus by its document id.
pub struct DeleteDocumentTool {
    context: Arc<RagContext>,
}

impl DeleteDocumentTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for DeleteDocumentTool {
    fn name(&self) -> &str {
        "delete_document"
    }

    fn description(&self) -> &str {
        "Delete a document from a corpus. The document id is the file_id reported by get_corpus_info."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "document_id": {
                    "type": "string",
                    "description": "The id of the document (file) to delete"
                }
            },
            "required": ["document_id"]
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let document_id = required_str(&args, "document_id")?.trim();
        if !is_simple_token(document_id) {
            return Err(RagError::InvalidArgument(format!(
                "'document_id' must match [a-zA-Z0-9_-]+, got '{document_id}'"
            )));
        }
        let Some(corpus_name) = target_corpus(session, &args)? else {
            return Ok(no_corpus_selected());
        };
        let resource_name = match self.context.locate_corpus(session, &corpus_name).await {
            Ok(resource_name) => resource_name,
            Err(response) => return Ok(response),
        };

        let file_name = rag_file_name(&resource_name, document_id);
        if let Err(e) = self.context.service().delete_file(&file_name).await {
            error!(file = %file_name, error = %e, "delete_document failed");
            return Ok(respond(
                ToolStatus::Error,
                format!("Error deleting document: {e}"),
                json!({ "corpus_name": corpus_name, "document_id": document_id }),
            ));
        }

        info!(file = %file_name, "deleted document");

        Ok(respond(
            ToolStatus::Success,
            format!("Successfully deleted document '{document_id}' from corpus '{corpus_name}'"),
            json!({ "corpus_name": corpus_name, "document_id": document_id }),
        ))
    }
}
