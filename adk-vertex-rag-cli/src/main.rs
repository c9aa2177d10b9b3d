//! # vertex-rag
//!
//! One-shot administration of Vertex AI RAG corpora through the same tools
//! the RAG agent calls. Every command prints the tool's JSON reply.
//!
//! ## Usage
//!
//! ```bash
//! vertex-rag --project my-project list
//! vertex-rag create "site docs"
//! vertex-rag add site_docs https://docs.google.com/document/d/<id>/edit gs://bucket/plan.pdf
//! vertex-rag query site_docs "When is the slab pour on level 3?"
//! vertex-rag resolve test
//! ```
//!
//! Settings come from `.env`, the environment (`GOOGLE_CLOUD_PROJECT`,
//! `GOOGLE_CLOUD_LOCATION`, `RAG_DEFAULT_CORPUS_ID`,
//! `RAG_DEFAULT_CORPUS_DISPLAY_NAME`, `GOOGLE_CLOUD_ACCESS_TOKEN`), and flags,
//! with flags taking precedence. Logs go to stderr and follow `RUST_LOG`.

use std::sync::Arc;

use adk_vertex_rag::config::{
    ENV_DEFAULT_CORPUS_ID, ENV_DEFAULT_DISPLAY_NAME, ENV_LOCATION, ENV_PROJECT,
};
use adk_vertex_rag::{
    CorpusConfig, CorpusResolver, InMemoryRagService, LlmParserConfig, RagAgent, RagConfig,
    RagContext, RagService, VertexRagService, validate_paths,
};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const ENV_ACCESS_TOKEN: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

/// Manage and query Vertex AI RAG corpora.
#[derive(Parser)]
#[command(name = "vertex-rag", version, about)]
struct Cli {
    /// Google Cloud project id (overrides GOOGLE_CLOUD_PROJECT).
    #[arg(long, global = true)]
    project: Option<String>,

    /// Google Cloud region (overrides GOOGLE_CLOUD_LOCATION).
    #[arg(long, global = true)]
    location: Option<String>,

    /// Id of the default corpus (overrides RAG_DEFAULT_CORPUS_ID).
    #[arg(long, global = true)]
    corpus_id: Option<String>,

    /// Display name that maps to the default corpus (overrides RAG_DEFAULT_CORPUS_DISPLAY_NAME).
    #[arg(long, global = true)]
    display_name: Option<String>,

    /// OAuth access token (overrides GOOGLE_CLOUD_ACCESS_TOKEN).
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Use a throwaway in-memory service instead of Vertex AI.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a corpus identifier to its canonical resource name.
    Resolve {
        identifier: String,
        /// Do not list corpora; resolve from configuration alone.
        #[arg(long)]
        offline: bool,
    },
    /// Validate and normalize document locators without importing them.
    Validate { paths: Vec<String> },
    /// List all corpora.
    List,
    /// Create a corpus.
    Create { name: String },
    /// Delete a corpus and all of its files.
    DeleteCorpus {
        corpus: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Import documents into a corpus.
    ///
    /// Documents are parsed with Gemini during import unless --no-llm-parser is given.
    Add {
        corpus: String,
        #[arg(required = true)]
        paths: Vec<String>,
        /// Import with the platform's default parser instead of Gemini.
        #[arg(long)]
        no_llm_parser: bool,
    },
    /// Show a corpus and its files.
    Info { corpus: String },
    /// Retrieve passages relevant to a question.
    Query {
        corpus: String,
        text: String,
        /// Number of passages to return.
        #[arg(long)]
        top_k: Option<u32>,
        /// Maximum vector distance of returned passages.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Delete one document from a corpus.
    DeleteDocument { corpus: String, document_id: String },
    /// Print the agent definition and its tool declarations.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let corpus_config = corpus_config(&cli)?;
    debug!(
        project = %corpus_config.project_id,
        location = %corpus_config.location,
        "loaded configuration"
    );

    match &cli.command {
        Command::Resolve { identifier, offline } => {
            let resolver = CorpusResolver::new(&corpus_config);
            let resolved = if *offline {
                resolver.resolve_with(identifier, None)
            } else {
                let service = service(&cli, &corpus_config)?;
                resolver.resolve(identifier, Some(service.as_ref())).await
            };
            print(&json!({ "identifier": identifier, "resource_name": resolved }))
        }
        Command::Validate { paths } => print(&serde_json::to_value(validate_paths(paths))?),
        Command::Tools => print(&tool_declarations(corpus_config)),
        command => {
            let (tool, args, rag_config) = tool_call(command, &corpus_config)?;
            let agent = agent(&cli, corpus_config, rag_config)?;
            let mut session = agent.new_session();
            info!(tool, "running tool");
            let reply = agent.call_tool(&mut session, tool, args).await?;
            print(&reply)?;
            if reply["status"] == "error" {
                bail!("{} failed: {}", tool, reply["message"].as_str().unwrap_or("unknown error"));
            }
            Ok(())
        }
    }
}

/// Map a tool-backed command onto a tool name, its arguments, and the
/// import and retrieval settings to use.
fn tool_call(
    command: &Command,
    corpus_config: &CorpusConfig,
) -> anyhow::Result<(&'static str, Value, RagConfig)> {
    let defaults = RagConfig::default();
    let call = match command {
        Command::List => ("list_corpora", json!({}), defaults),
        Command::Create { name } => ("create_corpus", json!({ "corpus_name": name }), defaults),
        Command::DeleteCorpus { corpus, yes } => {
            ("delete_corpus", json!({ "corpus_name": corpus, "confirm": yes }), defaults)
        }
        Command::Add { corpus, paths, no_llm_parser } => {
            let rag_config = if *no_llm_parser {
                defaults
            } else {
                RagConfig::builder()
                    .llm_parser(LlmParserConfig::for_project(corpus_config))
                    .build()
                    .context("invalid import settings")?
            };
            ("add_data", json!({ "corpus_name": corpus, "paths": paths }), rag_config)
        }
        Command::Info { corpus } => ("get_corpus_info", json!({ "corpus_name": corpus }), defaults),
        Command::Query { corpus, text, top_k, threshold } => {
            let mut builder = RagConfig::builder();
            if let Some(top_k) = top_k {
                builder = builder.top_k(*top_k);
            }
            if let Some(threshold) = threshold {
                builder = builder.distance_threshold(*threshold);
            }
            let rag_config = builder.build().context("invalid retrieval settings")?;
            ("rag_query", json!({ "corpus_name": corpus, "query": text }), rag_config)
        }
        Command::DeleteDocument { corpus, document_id } => (
            "delete_document",
            json!({ "corpus_name": corpus, "document_id": document_id }),
            defaults,
        ),
        Command::Resolve { .. } | Command::Validate { .. } | Command::Tools => {
            bail!("command does not run a tool")
        }
    };
    Ok(call)
}

/// The agent definition and its function declarations.
///
/// Declarations are static, so an inert in-memory backend stands in for Vertex
/// and no access token is needed.
fn tool_declarations(corpus_config: CorpusConfig) -> Value {
    let service = Arc::new(InMemoryRagService::from_config(&corpus_config));
    let agent =
        RagAgent::new(Arc::new(RagContext::new(service, corpus_config, RagConfig::default())));
    json!({
        "agent": agent.definition(),
        "function_declarations": agent.function_declarations(),
    })
}

/// Build the corpus configuration, preferring flags over the environment.
fn corpus_config(cli: &Cli) -> anyhow::Result<CorpusConfig> {
    CorpusConfig::from_lookup(|key| {
        let flag = match key {
            ENV_PROJECT => cli.project.clone(),
            ENV_LOCATION => cli.location.clone(),
            ENV_DEFAULT_CORPUS_ID => cli.corpus_id.clone(),
            ENV_DEFAULT_DISPLAY_NAME => cli.display_name.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
    .context("failed to load corpus configuration")
}

fn service(cli: &Cli, config: &CorpusConfig) -> anyhow::Result<Arc<dyn RagService>> {
    if cli.in_memory {
        return Ok(Arc::new(InMemoryRagService::from_config(config)));
    }
    let token = cli
        .access_token
        .clone()
        .or_else(|| std::env::var(ENV_ACCESS_TOKEN).ok())
        .with_context(|| {
            format!("no access token: pass --access-token or set {ENV_ACCESS_TOKEN}, or use --in-memory")
        })?;
    Ok(Arc::new(VertexRagService::new(config.clone(), token)?))
}

fn agent(
    cli: &Cli,
    corpus_config: CorpusConfig,
    rag_config: RagConfig,
) -> anyhow::Result<RagAgent> {
    let service = service(cli, &corpus_config)?;
    Ok(RagAgent::new(Arc::new(RagContext::new(service, corpus_config, rag_config))))
}

fn print(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_config() -> CorpusConfig {
        CorpusConfig::builder().project_id("proj").default_corpus_id("1").build().unwrap()
    }

    #[test]
    fn add_parses_with_gemini_by_default() {
        let cli = Cli::parse_from(["vertex-rag", "add", "docs", "gs://b/a.pdf"]);
        let (tool, args, rag) = tool_call(&cli.command, &corpus_config()).unwrap();
        assert_eq!(tool, "add_data");
        assert_eq!(args["paths"], json!(["gs://b/a.pdf"]));
        let parser = rag.llm_parser.expect("llm parser enabled");
        assert_eq!(
            parser.model_name,
            "projects/proj/locations/us-central1/publishers/google/models/gemini-2.0-flash"
        );
    }

    #[test]
    fn add_can_skip_llm_parsing() {
        let cli = Cli::parse_from(["vertex-rag", "add", "--no-llm-parser", "docs", "gs://b/a.pdf"]);
        let (_, _, rag) = tool_call(&cli.command, &corpus_config()).unwrap();
        assert!(rag.llm_parser.is_none());
    }

    #[test]
    fn tool_declarations_need_no_backend() {
        let output = tool_declarations(corpus_config());
        assert_eq!(output["agent"]["name"], "RagAgent");
        assert_eq!(output["function_declarations"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn query_flags_override_retrieval_settings() {
        let cli = Cli::parse_from(["vertex-rag", "query", "docs", "slab", "--top-k", "5"]);
        let (tool, _, rag) = tool_call(&cli.command, &corpus_config()).unwrap();
        assert_eq!(tool, "rag_query");
        assert_eq!(rag.top_k, 5);
        assert!(rag.llm_parser.is_none());
    }
}
