//! The RAG agent definition: identity, instruction, and tool dispatch.
//!
//! [`RagAgent`] carries what a model runner needs to host the agent: the
//! [`AgentDefinition`], the Gemini-style function declarations of its tools,
//! and a dispatcher that runs a named tool against a [`SessionState`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_vertex_rag::{CorpusConfig, InMemoryRagService, RagAgent, RagConfig, RagContext};
//!
//! let corpus = CorpusConfig::builder().project_id("my-project").default_corpus_id("1").build()?;
//! let service = Arc::new(InMemoryRagService::from_config(&corpus));
//! let agent = RagAgent::new(Arc::new(RagContext::new(service, corpus, RagConfig::default())));
//!
//! let mut session = agent.new_session();
//! let reply = agent.call_tool(&mut session, "list_corpora", serde_json::json!({})).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::session::SessionState;
use crate::tools::{RagContext, Tool, corpus_tools};

/// Default model the agent runs on.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default agent instruction.
pub const DEFAULT_INSTRUCTION: &str = r#"You are an assistant that answers questions from document corpora stored in Vertex AI RAG.

## What you can do
- Answer questions with `rag_query`. Run several queries when one does not return enough.
- Show what data is available with `list_corpora`.
- Create a corpus with `create_corpus` and add documents to it with `add_data`
  (Google Drive links, Google Docs/Sheets/Slides links, or gs:// paths).
- Describe a corpus and its files with `get_corpus_info`.
- Remove a document with `delete_document`, or a whole corpus with `delete_corpus`
  (only after the user has explicitly confirmed).

## Corpus selection
- The session tracks a current corpus. Creating a corpus or adding data to one makes it current.
- Pass an empty `corpus_name` to use the current corpus. If none is set, ask the user which corpus to use.
- Prefer the full resource names returned by `list_corpora` in tool calls, but show users display names.

## Answering
- Say which corpus an answer came from.
- Only state what the retrieved passages support. If repeated queries find nothing, say so.
- When a tool reports an error, explain what went wrong and suggest a next step."#;

/// Identity and instruction of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instruction: String,
}

impl Default for AgentDefinition {
    fn default() -> Self {
        Self {
            name: "RagAgent".to_string(),
            model: DEFAULT_MODEL.to_string(),
            description: "Vertex AI RAG Agent".to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

/// An agent exposing the corpus tools.
pub struct RagAgent {
    definition: AgentDefinition,
    tools: Vec<Arc<dyn Tool>>,
}

impl RagAgent {
    /// Create the agent with the default definition and every corpus tool.
    pub fn new(context: Arc<RagContext>) -> Self {
        Self::with_definition(AgentDefinition::default(), context)
    }

    pub fn with_definition(definition: AgentDefinition, context: Arc<RagContext>) -> Self {
        Self { definition, tools: corpus_tools(context) }
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Look up a tool by name.
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// A fresh session with no current corpus.
    pub fn new_session(&self) -> SessionState {
        SessionState::new()
    }

    /// Function declarations in the shape Gemini expects:
    /// `{ "name", "description", "parameters" }`.
    pub fn function_declarations(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                let mut declaration = json!({
                    "name": tool.name(),
                    "description": tool.description(),
                });
                if let Some(parameters) = tool.parameters_schema() {
                    declaration["parameters"] = parameters;
                }
                declaration
            })
            .collect()
    }

    /// Execute the tool called `name` against `session`.
    pub async fn call_tool(
        &self,
        session: &mut SessionState,
        name: &str,
        args: Value,
    ) -> Result<Value> {
        let Some(tool) = self.tool(name) else {
            warn!(tool = name, "unknown tool requested");
            return Err(RagError::InvalidArgument(format!("unknown tool '{name}'")));
        };
        debug!(tool = name, "dispatching tool call");
        tool.execute(session, args).await
    }
}
