use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};

use super::{
    RagContext, Tool, ToolStatus, corpus_name_schema, no_corpus_selected, required_str, respond,
    target_corpus,
};
use crate::error::Result;
use crate::service::RetrievalRequest;
use crate::session::SessionState;

/// Answers questions by retrieving passages from a corpus.
///
/// Arguments: `query` (required), `corpus_name` (optional). Top-k and the
/// distance threshold come from the [`RagConfig`](crate::RagConfig).
pub struct RagQueryTool {
    context: Arc<RagContext>,
}

impl RagQueryTool {
    pub fn new(context: Arc<RagContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for RagQueryTool {
    fn name(&self) -> &str {
        "rag_query"
    }

    fn description(&self) -> &str {
        "Query a document corpus to retrieve passages relevant to a question"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "corpus_name": corpus_name_schema(),
                "query": {
                    "type": "string",
                    "description": "The question or search text"
                }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, session: &mut SessionState, args: Value) -> Result<Value> {
        let query = required_str(&args, "query")?;
        let Some(corpus_name) = target_corpus(session, &args)? else {
            return Ok(no_corpus_selected());
        };
        let resource_name = match self.context.locate_corpus(session, &corpus_name).await {
            Ok(resource_name) => resource_name,
            Err(response) => return Ok(response),
        };
        let config = self.context.rag_config();
        let request = RetrievalRequest {
            text: query.to_string(),
            top_k: config.top_k,
            distance_threshold: config.distance_threshold,
        };

        info!(corpus = %resource_name, query, top_k = request.top_k, "rag_query tool called");

        let contexts = match self
            .context
            .service()
            .retrieval_query(std::slice::from_ref(&resource_name), &request)
            .await
        {
            Ok(contexts) => contexts,
            Err(e) => {
                error!(corpus = %resource_name, error = %e, "rag_query failed");
                return Ok(respond(
                    ToolStatus::Error,
                    format!("Error querying corpus: {e}"),
                    json!({ "query": query, "corpus_name": corpus_name }),
                ));
            }
        };

        if contexts.is_empty() {
            return Ok(respond(
                ToolStatus::Warning,
                format!("No results found in corpus '{corpus_name}' for query: '{query}'"),
                json!({
                    "query": query,
                    "corpus_name": corpus_name,
                    "results": [],
                    "results_count": 0,
                }),
            ));
        }

        let results: Vec<Value> = contexts
            .iter()
            .map(|c| {
                json!({
                    "source_uri": c.source_uri,
                    "source_name": c.source_display_name,
                    "text": c.text,
                    "score": c.score,
                })
            })
            .collect();

        Ok(respond(
            ToolStatus::Success,
            format!("Successfully queried corpus '{corpus_name}'"),
            json!({
                "query": query,
                "corpus_name": corpus_name,
                "results_count": results.len(),
                "results": results,
            }),
        ))
    }
}
