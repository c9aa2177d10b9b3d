//! In-memory RAG service.
//!
//! This module provides [`InMemoryRagService`], a [`RagService`] backed by a
//! `Vec` protected by a `tokio::sync::RwLock`. It is suitable for development,
//! tests, and dry runs of the CLI. Retrieval scores files by the share of
//! query terms their text contains; it is not a vector search.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::CorpusConfig;
use crate::error::{RagError, Result};
use crate::locator::Locator;
use crate::resource::{corpus_resource_name, rag_file_name, resource_id};
use crate::service::{
    Corpus, ImportRequest, ImportResult, RagFile, RagService, RetrievalRequest, RetrievedContext,
};

const FIRST_ID: u64 = 1_000_000_000_000_000_000;

#[derive(Debug)]
struct StoredFile {
    file: RagFile,
    text: String,
}

#[derive(Debug)]
struct StoredCorpus {
    corpus: Corpus,
    files: Vec<StoredFile>,
}

/// A [`RagService`] that keeps corpora and files in process memory.
///
/// Corpora are listed in creation order. Ids are 19-digit numbers, like the
/// ones the managed platform assigns.
///
/// # Example
///
/// ```rust,ignore
/// use adk_vertex_rag::{InMemoryRagService, RagService};
///
/// let service = InMemoryRagService::new("my-project", "us-central1");
/// let corpus = service.insert_corpus("4532873024948404224", "test").await;
/// service.add_document(&corpus.name, "gs://b/plan.pdf", "Concrete grade C30").await?;
/// ```
#[derive(Debug)]
pub struct InMemoryRagService {
    project_id: String,
    location: String,
    corpora: RwLock<Vec<StoredCorpus>>,
    next_id: AtomicU64,
}

impl InMemoryRagService {
    /// Create an empty service for the given project and region.
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            corpora: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(FIRST_ID),
        }
    }

    /// Create an empty service for the project and region of `config`.
    pub fn from_config(config: &CorpusConfig) -> Self {
        Self::new(&config.project_id, &config.location)
    }

    /// Insert a corpus with a caller-chosen id.
    pub async fn insert_corpus(&self, corpus_id: &str, display_name: &str) -> Corpus {
        let now = Utc::now();
        let corpus = Corpus {
            name: corpus_resource_name(&self.project_id, &self.location, corpus_id),
            display_name: display_name.to_string(),
            description: None,
            create_time: Some(now),
            update_time: Some(now),
        };
        let mut corpora = self.corpora.write().await;
        corpora.retain(|c| c.corpus.name != corpus.name);
        corpora.push(StoredCorpus { corpus: corpus.clone(), files: Vec::new() });
        corpus
    }

    /// Add a file with searchable text to a corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Service`] if the corpus does not exist.
    pub async fn add_document(
        &self,
        corpus_name: &str,
        source_uri: &str,
        text: &str,
    ) -> Result<RagFile> {
        let mut corpora = self.corpora.write().await;
        let stored = find_mut(&mut corpora, corpus_name, "add_document")?;
        let file = self.new_file(corpus_name, source_uri);
        stored.files.push(StoredFile { file: file.clone(), text: text.to_string() });
        Ok(file)
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn new_file(&self, corpus_name: &str, source_uri: &str) -> RagFile {
        let now = Utc::now();
        let display_name = match Locator::parse(source_uri) {
            Some(locator) => match locator.drive_file_id() {
                Some(id) => id.to_string(),
                None => resource_id(source_uri).to_string(),
            },
            None => resource_id(source_uri).to_string(),
        };
        RagFile {
            name: rag_file_name(corpus_name, &self.next_id()),
            display_name,
            source_uri: source_uri.to_string(),
            create_time: Some(now),
            update_time: Some(now),
        }
    }
}

fn not_found(operation: &'static str, name: &str) -> RagError {
    RagError::service(operation, format!("corpus '{name}' not found"))
}

fn find_mut<'a>(
    corpora: &'a mut [StoredCorpus],
    name: &str,
    operation: &'static str,
) -> Result<&'a mut StoredCorpus> {
    corpora.iter_mut().find(|c| c.corpus.name == name).ok_or_else(|| not_found(operation, name))
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl RagService for InMemoryRagService {
    async fn list_corpora(&self) -> Result<Vec<Corpus>> {
        let corpora = self.corpora.read().await;
        Ok(corpora.iter().map(|c| c.corpus.clone()).collect())
    }

    async fn create_corpus(
        &self,
        display_name: &str,
        description: Option<&str>,
        _embedding_model: &str,
    ) -> Result<Corpus> {
        let id = self.next_id();
        let mut corpus = self.insert_corpus(&id, display_name).await;
        if let Some(description) = description {
            corpus.description = Some(description.to_string());
            let mut corpora = self.corpora.write().await;
            if let Some(stored) = corpora.iter_mut().find(|c| c.corpus.name == corpus.name) {
                stored.corpus.description = corpus.description.clone();
            }
        }
        Ok(corpus)
    }

    async fn delete_corpus(&self, corpus_name: &str) -> Result<()> {
        let mut corpora = self.corpora.write().await;
        let before = corpora.len();
        corpora.retain(|c| c.corpus.name != corpus_name);
        if corpora.len() == before {
            return Err(not_found("delete_corpus", corpus_name));
        }
        Ok(())
    }

    async fn import_files(
        &self,
        corpus_name: &str,
        request: &ImportRequest,
    ) -> Result<ImportResult> {
        let mut corpora = self.corpora.write().await;
        let stored = find_mut(&mut corpora, corpus_name, "import_files")?;

        let mut result = ImportResult::default();
        for path in &request.paths {
            if Locator::parse(path).is_none() {
                result.failed_rag_files_count += 1;
                continue;
            }
            if stored.files.iter().any(|f| f.file.source_uri == *path) {
                result.skipped_rag_files_count += 1;
                continue;
            }
            let file = self.new_file(corpus_name, path);
            stored.files.push(StoredFile { file, text: String::new() });
            result.imported_rag_files_count += 1;
        }
        stored.corpus.update_time = Some(Utc::now());

        debug!(corpus = corpus_name, ?result, "imported files");
        Ok(result)
    }

    async fn list_files(&self, corpus_name: &str) -> Result<Vec<RagFile>> {
        let corpora = self.corpora.read().await;
        let stored = corpora
            .iter()
            .find(|c| c.corpus.name == corpus_name)
            .ok_or_else(|| not_found("list_files", corpus_name))?;
        Ok(stored.files.iter().map(|f| f.file.clone()).collect())
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        let mut corpora = self.corpora.write().await;
        for stored in corpora.iter_mut() {
            let before = stored.files.len();
            stored.files.retain(|f| f.file.name != file_name);
            if stored.files.len() != before {
                return Ok(());
            }
        }
        Err(RagError::service("delete_file", format!("file '{file_name}' not found")))
    }

    async fn retrieval_query(
        &self,
        corpus_names: &[String],
        request: &RetrievalRequest,
    ) -> Result<Vec<RetrievedContext>> {
        let query_terms = terms(&request.text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let corpora = self.corpora.read().await;
        let mut scored = Vec::new();
        for name in corpus_names {
            let stored = corpora
                .iter()
                .find(|c| &c.corpus.name == name)
                .ok_or_else(|| not_found("retrieval_query", name))?;
            for file in &stored.files {
                let file_terms = terms(&file.text);
                let hits = query_terms.iter().filter(|t| file_terms.contains(*t)).count();
                if hits == 0 {
                    continue;
                }
                let score = hits as f64 / query_terms.len() as f64;
                if 1.0 - score > request.distance_threshold {
                    continue;
                }
                scored.push(RetrievedContext {
                    source_uri: file.file.source_uri.clone(),
                    source_display_name: file.file.display_name.clone(),
                    text: file.text.clone(),
                    score,
                });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.top_k as usize);
        Ok(scored)
    }
}
