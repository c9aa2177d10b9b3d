//! Tests for the Vertex AI REST client against a local fake of the RAG API.

#![cfg(feature = "vertex")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use adk_vertex_rag::{
    CorpusConfig, ImportRequest, LlmParserConfig, PollConfig, RagConfig, RagError, RagService, RetrievalRequest,
    VertexRagService,
};
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

const PARENT: &str = "projects/proj/locations/us-central1";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Fake {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Fake {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn find(&self, method: Method, suffix: &str) -> Recorded {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path.ends_with(suffix))
            .unwrap_or_else(|| panic!("no {method} request ending in {suffix}"))
    }
}

fn corpus(id: &str, display_name: &str) -> Value {
    json!({
        "name": format!("{PARENT}/ragCorpora/{id}"),
        "displayName": display_name,
        "createTime": "2025-05-01T10:00:00.000Z",
        "updateTime": "2025-05-02T10:00:00Z",
    })
}

fn operation(id: &str, done: bool) -> Value {
    json!({ "name": format!("{PARENT}/operations/{id}"), "done": done })
}

async fn fake_api(
    State(fake): State<Fake>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/v1/").to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let corpora = format!("{PARENT}/ragCorpora");
    let reply = match (method.as_str(), path.as_str()) {
        ("GET", p) if p == corpora => match uri.query() {
            Some(q) if q.contains("pageToken=page-2") => {
                json!({ "ragCorpora": [corpus("2", "plans")] })
            }
            _ => json!({ "ragCorpora": [corpus("1", "docs")], "nextPageToken": "page-2" }),
        },
        ("POST", p) if p == corpora => {
            if body["displayName"] == "stuck" {
                operation("stuck", false)
            } else {
                operation("create", false)
            }
        }
        ("GET", p) if p.ends_with("/operations/create") => json!({
            "name": format!("{PARENT}/operations/create"),
            "done": true,
            "response": corpus("3", "site_docs"),
        }),
        ("GET", p) if p.ends_with("/operations/stuck") => operation("stuck", false),
        ("DELETE", p) if p.contains("/ragFiles/") => operation("delete-file", true),
        ("DELETE", p) if p.starts_with(&corpora) => operation("delete-corpus", true),
        ("POST", p) if p.ends_with("ragCorpora/forbidden/ragFiles:import") => {
            let error = json!({ "error": { "code": 403, "message": "Permission denied on corpus" } });
            return (StatusCode::FORBIDDEN, Json(error)).into_response();
        }
        ("POST", p) if p.ends_with("ragCorpora/quota/ragFiles:import") => json!({
            "name": format!("{PARENT}/operations/import"),
            "done": true,
            "error": { "code": 8, "message": "quota exhausted" },
        }),
        ("POST", p)
            if p.ends_with("ragCorpora/drive-down/ragFiles:import")
                && !body["importRagFilesConfig"]["googleDriveSource"].is_null() =>
        {
            let error = json!({ "error": { "code": 503, "message": "drive backend down" } });
            return (StatusCode::SERVICE_UNAVAILABLE, Json(error)).into_response();
        }
        ("POST", p) if p.ends_with("/ragFiles:import") => {
            let config = &body["importRagFilesConfig"];
            let count = config["gcsSource"]["uris"]
                .as_array()
                .or_else(|| config["googleDriveSource"]["resourceIds"].as_array())
                .map_or(0, Vec::len);
            json!({
                "name": format!("{PARENT}/operations/import"),
                "done": true,
                "response": {
                    "importedRagFilesCount": count.to_string(),
                    "skippedRagFilesCount": "0",
                },
            })
        }
        ("GET", p) if p.ends_with("/ragFiles") => json!({
            "ragFiles": [
                {
                    "name": format!("{p}/55"),
                    "displayName": "plan.pdf",
                    "gcsSource": { "uris": ["gs://bucket/plan.pdf"] },
                    "createTime": "2025-05-01T10:00:00Z",
                },
                {
                    "name": format!("{p}/56"),
                    "displayName": "Budget",
                    "googleDriveSource": {
                        "resourceIds": [{ "resourceId": "XYZ", "resourceType": "RESOURCE_TYPE_FILE" }]
                    },
                },
            ]
        }),
        ("POST", p) if p == format!("{PARENT}:retrieveContexts") => json!({
            "contexts": {
                "contexts": [
                    { "sourceUri": "gs://bucket/plan.pdf", "sourceDisplayName": "plan.pdf", "text": "Slab pour on level 3", "score": 0.82 },
                    { "sourceUri": "gs://bucket/log.pdf", "text": "Crane inspection" },
                ]
            }
        }),
        _ => return (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    };

    Json(reply).into_response()
}

async fn spawn_fake() -> (VertexRagService, Fake, tokio::task::JoinHandle<()>) {
    let fake = Fake::default();
    let app = Router::new().fallback(fake_api).with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    let config =
        CorpusConfig::builder().project_id("proj").default_corpus_id("1").build().unwrap();
    let service = VertexRagService::with_base_url(config, "test-token", &format!("http://{addr}/v1/"))
        .unwrap()
        .with_poll_config(PollConfig { interval: Duration::from_millis(1), max_attempts: 3 });

    (service, fake, handle)
}

#[tokio::test]
async fn list_corpora_follows_pages_with_bearer_auth() {
    let (service, fake, handle) = spawn_fake().await;

    let corpora = service.list_corpora().await.unwrap();
    assert_eq!(corpora.len(), 2);
    assert_eq!(corpora[0].name, format!("{PARENT}/ragCorpora/1"));
    assert_eq!(corpora[0].display_name, "docs");
    assert!(corpora[0].create_time.is_some());
    assert_eq!(corpora[1].display_name, "plans");

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-token"));
    assert_eq!(requests[1].query.as_deref(), Some("pageToken=page-2"));

    handle.abort();
}

#[tokio::test]
async fn create_corpus_polls_operation_and_sends_embedding_endpoint() {
    let (service, fake, handle) = spawn_fake().await;

    let corpus = service
        .create_corpus("site_docs", Some("Site documents"), "publishers/google/models/text-embedding-005")
        .await
        .unwrap();
    assert_eq!(corpus.name, format!("{PARENT}/ragCorpora/3"));
    assert_eq!(corpus.display_name, "site_docs");

    let create = fake.find(Method::POST, "/ragCorpora");
    assert_eq!(create.body["displayName"], "site_docs");
    assert_eq!(create.body["description"], "Site documents");
    assert_eq!(
        create.body["vectorDbConfig"]["ragEmbeddingModelConfig"]["vertexPredictionEndpoint"]["endpoint"],
        format!("{PARENT}/publishers/google/models/text-embedding-005")
    );
    fake.find(Method::GET, "/operations/create");

    handle.abort();
}

#[tokio::test]
async fn unfinished_operation_gives_up_after_max_attempts() {
    let (service, fake, handle) = spawn_fake().await;

    let err = service.create_corpus("stuck", None, "text-embedding-005").await.unwrap_err();
    assert!(matches!(err, RagError::Service { operation: "create_corpus", .. }));
    assert!(err.to_string().contains("not done after 3 polls"));
    let polls = fake.requests().iter().filter(|r| r.path.ends_with("/operations/stuck")).count();
    assert_eq!(polls, 3);

    handle.abort();
}

#[tokio::test]
async fn delete_corpus_forces_cascade() {
    let (service, fake, handle) = spawn_fake().await;

    service.delete_corpus(&format!("{PARENT}/ragCorpora/1")).await.unwrap();
    let delete = fake.find(Method::DELETE, "/ragCorpora/1");
    assert_eq!(delete.query.as_deref(), Some("force=true"));

    handle.abort();
}

#[tokio::test]
async fn import_splits_sources_and_sums_counts() {
    let (service, fake, handle) = spawn_fake().await;
    let request = ImportRequest::new(
        vec![
            "gs://bucket/a.pdf".into(),
            "https://drive.google.com/file/d/ABC123/view".into(),
            "gs://bucket/b.pdf".into(),
            "not a locator".into(),
        ],
        &RagConfig::default(),
    );

    let result = service.import_files(&format!("{PARENT}/ragCorpora/1"), &request).await.unwrap();
    assert_eq!(result.imported_rag_files_count, 3);
    assert_eq!(result.skipped_rag_files_count, 0);
    assert_eq!(result.failed_rag_files_count, 1);

    let imports: Vec<_> =
        fake.requests().into_iter().filter(|r| r.path.ends_with("/ragFiles:import")).collect();
    assert_eq!(imports.len(), 2);
    let gcs = &imports[0].body["importRagFilesConfig"];
    assert_eq!(gcs["gcsSource"]["uris"], json!(["gs://bucket/a.pdf", "gs://bucket/b.pdf"]));
    assert_eq!(gcs["ragFileTransformationConfig"]["ragFileChunkingConfig"]["fixedLengthChunking"]["chunkSize"], 1024);
    assert_eq!(gcs["ragFileTransformationConfig"]["ragFileChunkingConfig"]["fixedLengthChunking"]["chunkOverlap"], 200);
    assert_eq!(gcs["maxEmbeddingRequestsPerMin"], 1000);
    assert!(gcs.get("ragFileParsingConfig").is_none());
    let drive = &imports[1].body["importRagFilesConfig"]["googleDriveSource"]["resourceIds"];
    assert_eq!(drive, &json!([{ "resourceId": "ABC123", "resourceType": "RESOURCE_TYPE_FILE" }]));

    handle.abort();
}

#[tokio::test]
async fn import_surfaces_http_and_operation_errors() {
    let (service, _fake, handle) = spawn_fake().await;
    let request = ImportRequest::new(vec!["gs://bucket/a.pdf".into()], &RagConfig::default());

    let err = service.import_files(&format!("{PARENT}/ragCorpora/forbidden"), &request).await.unwrap_err();
    assert_eq!(err.to_string(), "import_files failed: HTTP 403: Permission denied on corpus");

    let err = service.import_files(&format!("{PARENT}/ragCorpora/quota"), &request).await.unwrap_err();
    assert_eq!(err.to_string(), "import_files failed: quota exhausted (code 8)");

    handle.abort();
}

#[tokio::test]
async fn failed_source_keeps_counts_of_committed_imports() {
    let (service, fake, handle) = spawn_fake().await;
    let request = ImportRequest::new(
        vec![
            "gs://bucket/a.pdf".into(),
            "gs://bucket/b.pdf".into(),
            "https://drive.google.com/file/d/ABC123/view".into(),
        ],
        &RagConfig::default(),
    );

    let result =
        service.import_files(&format!("{PARENT}/ragCorpora/drive-down"), &request).await.unwrap();
    assert_eq!(result.imported_rag_files_count, 2);
    assert_eq!(result.failed_rag_files_count, 1);
    assert!(result.is_partial());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("googleDriveSource: "));
    assert!(result.errors[0].contains("HTTP 503: drive backend down"));

    let imports = fake.requests().iter().filter(|r| r.path.ends_with("/ragFiles:import")).count();
    assert_eq!(imports, 2);

    handle.abort();
}

#[tokio::test]
async fn import_sends_llm_parser_settings() {
    let (service, fake, handle) = spawn_fake().await;
    let corpus = CorpusConfig::builder().project_id("proj").default_corpus_id("1").build().unwrap();
    let rag = RagConfig::builder().llm_parser(LlmParserConfig::for_project(&corpus)).build().unwrap();
    let request = ImportRequest::new(vec!["gs://bucket/a.pdf".into()], &rag);

    service.import_files(&format!("{PARENT}/ragCorpora/1"), &request).await.unwrap();

    let import = fake.find(Method::POST, "/ragFiles:import");
    let parser = &import.body["importRagFilesConfig"]["ragFileParsingConfig"]["llmParser"];
    assert_eq!(parser["modelName"], format!("{PARENT}/publishers/google/models/gemini-2.0-flash"));
    assert_eq!(parser["maxParsingRequestsPerMin"], 1000);
    assert!(parser["customParsingPrompt"].as_str().is_some_and(|p| !p.is_empty()));

    handle.abort();
}

#[tokio::test]
async fn list_files_maps_sources() {
    let (service, _fake, handle) = spawn_fake().await;

    let files = service.list_files(&format!("{PARENT}/ragCorpora/1")).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, format!("{PARENT}/ragCorpora/1/ragFiles/55"));
    assert_eq!(files[0].source_uri, "gs://bucket/plan.pdf");
    assert_eq!(files[1].source_uri, "https://drive.google.com/file/d/XYZ/view");
    assert!(files[1].create_time.is_none());

    handle.abort();
}

#[tokio::test]
async fn delete_file_targets_file_path() {
    let (service, fake, handle) = spawn_fake().await;

    service.delete_file(&format!("{PARENT}/ragCorpora/1/ragFiles/55")).await.unwrap();
    fake.find(Method::DELETE, "/ragCorpora/1/ragFiles/55");

    handle.abort();
}

#[tokio::test]
async fn retrieval_sends_resources_and_filters() {
    let (service, fake, handle) = spawn_fake().await;
    let request = RetrievalRequest { text: "When is the slab pour?".into(), top_k: 3, distance_threshold: 0.5 };

    let contexts =
        service.retrieval_query(&[format!("{PARENT}/ragCorpora/1")], &request).await.unwrap();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[0].source_display_name, "plan.pdf");
    assert_eq!(contexts[0].score, 0.82);
    assert_eq!(contexts[1].source_display_name, "");
    assert_eq!(contexts[1].score, 0.0);

    let sent = fake.find(Method::POST, ":retrieveContexts").body;
    assert_eq!(sent["vertexRagStore"]["ragResources"][0]["ragCorpus"], format!("{PARENT}/ragCorpora/1"));
    assert_eq!(sent["query"]["text"], "When is the slab pour?");
    assert_eq!(sent["query"]["ragRetrievalConfig"]["topK"], 3);
    assert_eq!(sent["query"]["ragRetrievalConfig"]["filter"]["vectorDistanceThreshold"], 0.5);

    handle.abort();
}
