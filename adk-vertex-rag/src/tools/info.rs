use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::{
    RagContext, Tool, ToolStatus, corpus_name_schema, no_corpus_selected, respond, target_corpus,
};
use crate::error::Result;
use crate::resource::resource_id;
use crate::session::SessionState;

/// Describes a corpus: its display name and the files it holds.
pub struct GetCorpusInfoTool {
    context: Arc<RagContext>,
}

impl GetCorpusInfoTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetCorpusInfoTool {
    fn name(&self) -> &str {
        "get_corpus_info"
    }

    fn description(&self) -> &str {
        "Get detailed information about a corpus, including its files and their metadata"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": { "corpus_name": corpus_name_schema() }
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let Some(corpus_name) = target_corpus(session, &args)? else {
            return Ok(no_corpus_selected());
        };
        let resource_name = match self.context.locate_corpus(session, &corpus_name).await {
            Ok(resource_name) => resource_name,
            Err(response) => return Ok(response),
        };
        let service = self.context.service();

        let files = match service.list_files(&resource_name).await {
            Ok(files) => files,
            Err(e) => {
                error!(corpus = %resource_name, error = %e, "listing corpus files failed");
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Error getting corpus information: {e}"),
                    json!({ "corpus_name": corpus_name }),
                ));
            }
        };

        let display_name = match service.list_corpora().await {
            Ok(corpora) => corpora
                .into_iter()
                .find(|c| c.name == resource_name)
                .map(|c| c.display_name)
                .unwrap_or_else(|| corpus_name.clone()),
            Err(e) => {
                warn!(corpus = %resource_name, error = %e, "display name lookup failed");
                corpus_name.clone()
            }
        };

        let details: Vec<Value> = files
            .iter()
            .map(|f| {
                json!({
                    "file_id": resource_id(&f.name),
                    "display_name": f.display_name,
                    "source_uri": f.source_uri,
                    "create_time": f.create_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    "update_time": f.update_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                })
            })
            .collect();

        info!(corpus = %resource_name, file_count = details.len(), "retrieved corpus info");

        Ok(respond(
            ToolStatus::Success,
            format!("Successfully retrieved information for corpus '{corpus_name}'"),
            json!({
                "corpus_name": resource_name,
                "corpus_display_name": display_name,
                "file_count": details.len(),
                "files": details,
            }),
        ))
    }
}
