//! Vertex AI RAG Engine client over the REST API.
//!
//! Enable the `vertex` feature to use [`VertexRagService`]. Requests go to
//! `https://{location}-aiplatform.googleapis.com/v1/` with a caller-supplied
//! OAuth access token. Long-running operations (corpus creation and deletion,
//! file import and deletion) are polled until done.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_vertex_rag::{CorpusConfig, RagService, VertexRagService};
//!
//! let config = CorpusConfig::from_env()?;
//! let service = VertexRagService::new(config, std::env::var("GOOGLE_CLOUD_ACCESS_TOKEN")?)?;
//! for corpus in service.list_corpora().await? {
//!     println!("{} ({})", corpus.display_name, corpus.name);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{CorpusConfig, LlmParserConfig};
use crate::error::{RagError, Result};
use crate::locator::{Locator, drive_file_url};
use crate::service::{
    Corpus, ImportRequest, ImportResult, RagFile, RagService, RetrievalRequest, RetrievedContext,
};

/// How long-running operations are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two polls.
    pub interval: Duration,
    /// Polls attempted before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(2), max_attempts: 300 }
    }
}

/// [`RagService`] backed by the Vertex AI RAG Engine.
pub struct VertexRagService {
    http: Client,
    base_url: Url,
    config: CorpusConfig,
    access_token: String,
    poll: PollConfig,
}

impl VertexRagService {
    /// Create a client for the regional Vertex AI endpoint of `config.location`.
    pub fn new(config: CorpusConfig, access_token: impl Into<String>) -> Result<Self> {
        let base_url = format!("https://{}-aiplatform.googleapis.com/v1/", config.location);
        Self::with_base_url(config, access_token, &base_url)
    }

    /// Create a client against an explicit API root such as `http://127.0.0.1:8080/v1/`.
    pub fn with_base_url(
        config: CorpusConfig,
        access_token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RagError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            config,
            access_token: access_token.into(),
            poll: PollConfig::default(),
        })
    }

    /// Override how long-running operations are polled.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    fn url(&self, operation: &'static str, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            RagError::service(operation, format!("invalid resource path '{path}': {e}"))
        })
    }

    /// Send a request and fail on a non-success status.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RagError::service(operation, format!("request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or(body);
        Err(RagError::service(operation, format!("HTTP {}: {message}", status.as_u16())))
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T> {
        let body = response
            .bytes()
            .await
            .map_err(|e| RagError::service(operation, format!("failed to read response: {e}")))?;
        if body.is_empty() {
            return Ok(serde_json::from_value(json!({}))?);
        }
        serde_json::from_slice(&body)
            .map_err(|e| RagError::service(operation, format!("unexpected response: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &'static str, url: Url) -> Result<T> {
        debug!(operation, %url, "GET");
        let response = self.send(operation, self.http.get(url)).await?;
        Self::read_json(operation, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        body: &Value,
    ) -> Result<T> {
        debug!(operation, %url, "POST");
        let response = self.send(operation, self.http.post(url).json(body)).await?;
        Self::read_json(operation, response).await
    }

    async fn delete_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T> {
        debug!(operation, %url, "DELETE");
        let response = self.send(operation, self.http.delete(url)).await?;
        Self::read_json(operation, response).await
    }

    /// Fetch every page of a list endpoint.
    async fn list_pages<T, F>(
        &self,
        operation: &'static str,
        path: &str,
        mut extract: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(Value) -> Result<(Vec<T>, Option<String>)>,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.url(operation, path)?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let page: Value = self.get_json(operation, url).await?;
            let (batch, next) = extract(page)?;
            items.extend(batch);
            match next.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(items),
            }
        }
    }

    /// Poll `operation` until it is done and return its response payload.
    async fn wait(&self, operation: &'static str, mut op: Operation) -> Result<Option<Value>> {
        let mut attempts = 0;
        loop {
            if op.done {
                if let Some(status) = op.error {
                    return Err(RagError::service(
                        operation,
                        format!("{} (code {})", status.message, status.code),
                    ));
                }
                return Ok(op.response);
            }
            if op.name.is_empty() {
                return Err(RagError::service(operation, "operation has no name to poll"));
            }
            if attempts >= self.poll.max_attempts {
                warn!(operation, name = %op.name, attempts, "operation still running");
                return Err(RagError::service(
                    operation,
                    format!("operation {} not done after {attempts} polls", op.name),
                ));
            }
            tokio::time::sleep(self.poll.interval).await;
            attempts += 1;
            let url = self.url(operation, &op.name)?;
            op = self.get_json(operation, url).await?;
        }
    }

    fn embedding_endpoint(&self, embedding_model: &str) -> String {
        if embedding_model.starts_with("projects/") {
            embedding_model.to_string()
        } else if embedding_model.starts_with("publishers/") {
            format!("{}/{embedding_model}", self.config.parent())
        } else {
            self.config.publisher_model(embedding_model)
        }
    }

    /// Run one `ragFiles:import` request for a single source kind.
    async fn import_source(
        &self,
        corpus_name: &str,
        source: (&str, Value),
        request: &ImportRequest,
    ) -> Result<ImportResult> {
        const OP: &str = "import_files";
        let (source_key, source_value) = source;
        let mut config = json!({
            source_key: source_value,
            "ragFileTransformationConfig": {
                "ragFileChunkingConfig": {
                    "fixedLengthChunking": {
                        "chunkSize": request.chunk_size,
                        "chunkOverlap": request.chunk_overlap,
                    }
                }
            },
            "maxEmbeddingRequestsPerMin": request.max_embedding_requests_per_min,
        });
        if let Some(parser) = &request.llm_parser {
            config["ragFileParsingConfig"] = llm_parser_body(parser);
        }

        let url = self.url(OP, &format!("{corpus_name}/ragFiles:import"))?;
        let op: Operation =
            self.post_json(OP, url, &json!({ "importRagFilesConfig": config })).await?;
        let response = self.wait(OP, op).await?.unwrap_or_else(|| json!({}));
        let counts: ImportCounts = serde_json::from_value(response)
            .map_err(|e| RagError::service(OP, format!("unexpected import response: {e}")))?;
        Ok(ImportResult {
            imported_rag_files_count: counts.imported_rag_files_count,
            failed_rag_files_count: counts.failed_rag_files_count,
            skipped_rag_files_count: counts.skipped_rag_files_count,
            errors: Vec::new(),
        })
    }
}

#[async_trait]
impl RagService for VertexRagService {
    async fn list_corpora(&self) -> Result<Vec<Corpus>> {
        const OP: &str = "list_corpora";
        let path = format!("{}/ragCorpora", self.config.parent());
        let corpora = self
            .list_pages(OP, &path, |page| {
                let page: ListCorporaPage = serde_json::from_value(page)
                    .map_err(|e| RagError::service(OP, format!("unexpected response: {e}")))?;
                Ok((page.rag_corpora.into_iter().map(Corpus::from).collect(), page.next_page_token))
            })
            .await?;
        debug!(count = corpora.len(), "listed corpora");
        Ok(corpora)
    }

    async fn create_corpus(
        &self,
        display_name: &str,
        description: Option<&str>,
        embedding_model: &str,
    ) -> Result<Corpus> {
        const OP: &str = "create_corpus";
        let mut body = json!({
            "displayName": display_name,
            "vectorDbConfig": {
                "ragEmbeddingModelConfig": {
                    "vertexPredictionEndpoint": {
                        "endpoint": self.embedding_endpoint(embedding_model),
                    }
                }
            }
        });
        if let Some(description) = description {
            body["description"] = json!(description);
        }

        let url = self.url(OP, &format!("{}/ragCorpora", self.config.parent()))?;
        let op: Operation = self.post_json(OP, url, &body).await?;
        let response = self
            .wait(OP, op)
            .await?
            .ok_or_else(|| RagError::service(OP, "operation finished without a corpus"))?;
        let corpus: ApiCorpus = serde_json::from_value(response)
            .map_err(|e| RagError::service(OP, format!("unexpected corpus payload: {e}")))?;
        info!(corpus = %corpus.name, display_name, "created corpus");
        Ok(corpus.into())
    }

    async fn delete_corpus(&self, corpus_name: &str) -> Result<()> {
        const OP: &str = "delete_corpus";
        let mut url = self.url(OP, corpus_name)?;
        url.query_pairs_mut().append_pair("force", "true");
        let op: Operation = self.delete_json(OP, url).await?;
        self.wait(OP, op).await?;
        info!(corpus = corpus_name, "deleted corpus");
        Ok(())
    }

    async fn import_files(
        &self,
        corpus_name: &str,
        request: &ImportRequest,
    ) -> Result<ImportResult> {
        let mut gcs_uris = Vec::new();
        let mut drive_ids = Vec::new();
        let mut unrecognized = 0;
        for path in &request.paths {
            match Locator::parse(path) {
                Some(Locator::CloudStorage { uri }) => gcs_uris.push(uri),
                Some(locator) => {
                    if let Some(id) = locator.drive_file_id() {
                        drive_ids.push(id.to_string());
                    }
                }
                None => {
                    warn!(path = %path, "skipping unrecognized locator");
                    unrecognized += 1;
                }
            }
        }

        // The import API accepts one source kind per request.
        let mut sources = Vec::new();
        if !gcs_uris.is_empty() {
            let count = gcs_uris.len() as u64;
            sources.push(("gcsSource", json!({ "uris": gcs_uris }), count));
        }
        if !drive_ids.is_empty() {
            let resource_ids: Vec<Value> = drive_ids
                .iter()
                .map(|id| json!({ "resourceId": id, "resourceType": "RESOURCE_TYPE_FILE" }))
                .collect();
            let count = drive_ids.len() as u64;
            sources.push(("googleDriveSource", json!({ "resourceIds": resource_ids }), count));
        }

        let attempted = sources.len();
        let mut total = ImportResult { failed_rag_files_count: unrecognized, ..Default::default() };
        let mut first_error = None;
        for (key, value, count) in sources {
            match self.import_source(corpus_name, (key, value), request).await {
                Ok(result) => total = sum(total, result),
                Err(e) => {
                    warn!(corpus = corpus_name, source = key, error = %e, "import request failed");
                    total.failed_rag_files_count += count;
                    total.errors.push(format!("{key}: {e}"));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        // Nothing committed: report the failure itself.
        if let Some(e) = first_error.filter(|_| total.errors.len() == attempted) {
            return Err(e);
        }

        info!(
            corpus = corpus_name,
            imported = total.imported_rag_files_count,
            skipped = total.skipped_rag_files_count,
            failed = total.failed_rag_files_count,
            "imported files"
        );
        Ok(total)
    }

    async fn list_files(&self, corpus_name: &str) -> Result<Vec<RagFile>> {
        const OP: &str = "list_files";
        let path = format!("{corpus_name}/ragFiles");
        self.list_pages(OP, &path, |page| {
            let page: ListFilesPage = serde_json::from_value(page)
                .map_err(|e| RagError::service(OP, format!("unexpected response: {e}")))?;
            Ok((page.rag_files.into_iter().map(RagFile::from).collect(), page.next_page_token))
        })
        .await
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        const OP: &str = "delete_file";
        let url = self.url(OP, file_name)?;
        let op: Operation = self.delete_json(OP, url).await?;
        self.wait(OP, op).await?;
        info!(file = file_name, "deleted file");
        Ok(())
    }

    async fn retrieval_query(
        &self,
        corpus_names: &[String],
        request: &RetrievalRequest,
    ) -> Result<Vec<RetrievedContext>> {
        const OP: &str = "retrieval_query";
        let resources: Vec<Value> =
            corpus_names.iter().map(|name| json!({ "ragCorpus": name })).collect();
        let body = json!({
            "vertexRagStore": { "ragResources": resources },
            "query": {
                "text": request.text,
                "ragRetrievalConfig": {
                    "topK": request.top_k,
                    "filter": { "vectorDistanceThreshold": request.distance_threshold },
                }
            }
        });

        let url = self.url(OP, &format!("{}:retrieveContexts", self.config.parent()))?;
        let response: RetrieveContextsResponse = self.post_json(OP, url, &body).await?;
        let contexts: Vec<RetrievedContext> = response
            .contexts
            .map(|c| c.contexts)
            .unwrap_or_default()
            .into_iter()
            .map(RetrievedContext::from)
            .collect();
        debug!(count = contexts.len(), "retrieved contexts");
        Ok(contexts)
    }
}

fn sum(a: ImportResult, b: ImportResult) -> ImportResult {
    let mut errors = a.errors;
    errors.extend(b.errors);
    ImportResult {
        imported_rag_files_count: a.imported_rag_files_count + b.imported_rag_files_count,
        failed_rag_files_count: a.failed_rag_files_count + b.failed_rag_files_count,
        skipped_rag_files_count: a.skipped_rag_files_count + b.skipped_rag_files_count,
        errors,
    }
}

fn llm_parser_body(parser: &LlmParserConfig) -> Value {
    let mut llm_parser = json!({
        "modelName": parser.model_name,
        "maxParsingRequestsPerMin": parser.max_parsing_requests_per_min,
    });
    if let Some(prompt) = &parser.custom_parsing_prompt {
        llm_parser["customParsingPrompt"] = json!(prompt);
    }
    json!({ "llmParser": llm_parser })
}

/// Pull `error.message` out of a Google API error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("error")?.get("message")?.as_str().map(str::to_string)
}

/// int64 fields arrive as JSON strings in proto3 JSON.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(n),
        Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportCounts {
    #[serde(default, deserialize_with = "int64")]
    imported_rag_files_count: u64,
    #[serde(default, deserialize_with = "int64")]
    failed_rag_files_count: u64,
    #[serde(default, deserialize_with = "int64")]
    skipped_rag_files_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCorporaPage {
    #[serde(default)]
    rag_corpora: Vec<ApiCorpus>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCorpus {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
}

impl From<ApiCorpus> for Corpus {
    fn from(c: ApiCorpus) -> Self {
        Self {
            name: c.name,
            display_name: c.display_name,
            description: c.description.filter(|d| !d.is_empty()),
            create_time: c.create_time,
            update_time: c.update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesPage {
    #[serde(default)]
    rag_files: Vec<ApiRagFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRagFile {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    gcs_source: Option<GcsSource>,
    #[serde(default)]
    google_drive_source: Option<DriveSource>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GcsSource {
    #[serde(default)]
    uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveSource {
    #[serde(default)]
    resource_ids: Vec<DriveResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveResourceId {
    #[serde(default)]
    resource_id: String,
}

impl From<ApiRagFile> for RagFile {
    fn from(f: ApiRagFile) -> Self {
        let source_uri = f
            .gcs_source
            .and_then(|s| s.uris.into_iter().next())
            .or_else(|| {
                f.google_drive_source
                    .and_then(|s| s.resource_ids.into_iter().next())
                    .map(|r| drive_file_url(&r.resource_id))
            })
            .unwrap_or_default();
        Self {
            name: f.name,
            display_name: f.display_name,
            source_uri,
            create_time: f.create_time,
            update_time: f.update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveContextsResponse {
    #[serde(default)]
    contexts: Option<ContextList>,
}

#[derive(Debug, Deserialize)]
struct ContextList {
    #[serde(default)]
    contexts: Vec<ApiContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiContext {
    #[serde(default)]
    source_uri: String,
    #[serde(default)]
    source_display_name: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    score: Option<f64>,
}

impl From<ApiContext> for RetrievedContext {
    fn from(c: ApiContext) -> Self {
        Self {
            source_uri: c.source_uri,
            source_display_name: c.source_display_name,
            text: c.text,
            score: c.score.unwrap_or_default(),
        }
    }
}
