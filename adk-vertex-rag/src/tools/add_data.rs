use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::{
    RagContext, Tool, ToolStatus, corpus_name_schema, no_corpus_selected, respond, target_corpus,
};
use crate::error::{RagError, Result};
use crate::locator::{InvalidPath, validate_paths};
use crate::service::ImportRequest;
use crate::session::SessionState;

const NOT_A_STRING: &str = "not a string";

/// Imports Drive links, Docs/Sheets/Slides links, and Cloud Storage URIs
/// into a corpus.
///
/// Invalid entries are reported individually; the valid remainder is still
/// imported. Chunking parameters come from the [`RagConfig`](crate::RagConfig).
pub struct AddDataTool {
    context: Arc<RagContext>,
}

impl AddDataTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for AddDataTool {
    fn name(&self) -> &str {
        "add_data"
    }

    fn description(&self) -> &str {
        "Add documents to a corpus from Google Drive links, Google Docs/Sheets/Slides links, or gs:// paths"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Locators to import, e.g. https://drive.google.com/file/d/<id>/view or gs://bucket/path"
                }
            },
            "required": ["corpus_name", "paths"]
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let raw_paths = match args.get("paths") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(RagError::InvalidArgument(format!(
                    "'paths' must be an array of strings, got {other}"
                )));
            }
            None => {
                return Err(RagError::InvalidArgument("missing required 'paths' parameter".into()));
            }
        };

        let Some(corpus_name) = target_corpus(session, &args)? else {
            return Ok(no_corpus_selected());
        };
        let resource_name = match self.context.locate_corpus(session, &corpus_name).await {
            Ok(resource_name) => resource_name,
            Err(response) => return Ok(response),
        };

        if raw_paths.is_empty() {
            return Ok(respond(
                ToolStatus::Error,
                "Invalid paths: Please provide a list of Google Drive URLs or gs:// paths",
                json!({ "corpus_name": corpus_name, "paths": [] }),
            ));
        }

        let mut non_strings = Vec::new();
        let strings: Vec<&str> = raw_paths
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => {
                    non_strings.push(InvalidPath {
                        path: other.to_string(),
                        reason: NOT_A_STRING.to_string(),
                    });
                    None
                }
            })
            .collect();

        let mut validation = validate_paths(strings);
        validation.invalid.extend(non_strings);
        if !validation.invalid.is_empty() {
            warn!(corpus = %corpus_name, invalid = validation.invalid.len(), "rejected some paths");
        }

        if validation.is_empty() {
            return Ok(respond(
                ToolStatus::Error,
                "No valid paths provided. Please provide Google Drive URLs or gs:// paths.",
                json!({ "corpus_name": corpus_name, "invalid_paths": validation.invalid }),
            ));
        }

        let request = ImportRequest::new(validation.validated.clone(), self.context.rag_config());
        info!(corpus = %resource_name, count = request.paths.len(), "add_data tool called");

        let result = match self.context.service().import_files(&resource_name, &request).await {
            Ok(result) => result,
            Err(e) => {
                error!(corpus = %resource_name, error = %e, "add_data failed");
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Error adding data to corpus: {e}"),
                    json!({ "corpus_name": corpus_name, "paths": validation.validated }),
                ));
            }
        };

        session.adopt_current_corpus(&corpus_name);

        if result.is_partial() {
            warn!(corpus = %resource_name, errors = ?result.errors, "import partially failed");
            return Ok(respond(
                ToolStatus::Warning,
                format!(
                    "Added {} file(s) to corpus '{corpus_name}', but part of the import failed: {}",
                    result.imported_rag_files_count,
                    result.errors.join("; ")
                ),
                json!({
                    "corpus_name": corpus_name,
                    "files_added": result.imported_rag_files_count,
                    "files_skipped": result.skipped_rag_files_count,
                    "files_failed": result.failed_rag_files_count,
                    "errors": result.errors,
                    "paths": validation.validated,
                    "invalid_paths": validation.invalid,
                    "conversions": validation.conversions,
                }),
            ));
        }

        let conversion_note = if validation.conversions.is_empty() {
            ""
        } else {
            " (Converted Google Docs URLs to Drive format)"
        };

        Ok(respond(
            ToolStatus::Success,
            format!(
                "Successfully added {} file(s) to corpus '{corpus_name}'{conversion_note}",
                result.imported_rag_files_count
            ),
            json!({
                "corpus_name": corpus_name,
                "files_added": result.imported_rag_files_count,
                "files_skipped": result.skipped_rag_files_count,
                "files_failed": result.failed_rag_files_count,
                "paths": validation.validated,
                "invalid_paths": validation.invalid,
                "conversions": validation.conversions,
            }),
        ))
    }
}
