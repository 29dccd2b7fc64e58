//! HTTP surface of the document QA service.
//!
//! - `POST /upload` – store PDFs (multipart) and rebuild the index.
//! - `POST /query` – answer `{ "question": ... }` from the indexed documents.
//! - `GET /status` – document count and initialization state.
//! - `GET /health` – readiness probe.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiError;
use crate::query_payload::QueryPayload;
use crate::rag_response::{HealthResponse, QueryAnswer, StatusResponse, UploadResponse};
use crate::state::AppState;
use crate::uploads;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload_documents))
        .route("/query", post(query_documents))
        .route("/status", get(status))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let name = uploads::sanitize_file_name(&raw_name)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid file name: {}", raw_name)))?;
        if !uploads::has_pdf_extension(&name) {
            return Err(ApiError::BadRequest(format!(
                "File {} is not a PDF. Only PDF files are allowed.",
                name
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Ingestion(format!("Failed to read {}: {}", name, e)))?;
        // Same name twice in one request: the later part wins.
        match files.iter_mut().find(|(existing, _)| *existing == name) {
            Some(file) => {
                log::warn!("Duplicate upload of {} in one request, keeping the last copy", name);
                file.1 = data;
            }
            None => files.push((name, data)),
        }
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    let uploaded_at = chrono::Local::now().naive_local();
    let mut uploaded_files = Vec::with_capacity(files.len());
    for (name, data) in &files {
        let stored = uploads::store_upload(state.data_dir(), name, data, uploaded_at).map_err(|e| {
            log::error!("Failed to save {}: {:#}", name, e);
            ApiError::Ingestion(format!("Failed to save {}: {}", name, e))
        })?;
        uploaded_files.push(stored);
    }

    if let Err(e) = state.reinitialize().await {
        for stored in &uploaded_files {
            let path = state.data_dir().join(stored);
            match std::fs::remove_file(&path) {
                Ok(()) => log::warn!("Removed {} after failed rebuild", stored),
                Err(err) => log::error!("Failed to remove {}: {}", path.display(), err),
            }
        }
        return Err(e.into());
    }

    Ok(Json(UploadResponse {
        message: format!(
            "Successfully uploaded {} file(s) and rebuilt the index",
            uploaded_files.len()
        ),
        uploaded_files,
        data_directory: state.data_dir().display().to_string(),
    }))
}

async fn query_documents(
    State(state): State<AppState>,
    Json(payload): Json<QueryPayload>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }

    let engine = state
        .ensure_engine()
        .await?
        .ok_or_else(|| ApiError::NotReady(state.data_dir().display().to_string()))?;

    let answer = engine.query(question).await.map_err(|e| {
        log::error!("Query error: {:#}", e);
        ApiError::Query
    })?;

    Ok(Json(QueryAnswer { answer }))
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let stored = uploads::stored_documents(state.data_dir())
        .map_err(|e| ApiError::Ingestion(format!("Failed to list documents: {:#}", e)))?;
    let document_names: Vec<String> = stored
        .iter()
        .map(|name| uploads::original_name(name).to_string())
        .collect();

    Ok(Json(StatusResponse {
        status: if document_names.is_empty() {
            "waiting_for_documents"
        } else {
            "ready"
        },
        documents_loaded: document_names.len(),
        document_names,
        system_initialized: state.is_initialized().await,
        data_directory: state.data_dir().display().to_string(),
        storage_directory: state.storage_dir().display().to_string(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ready = match state.ensure_engine().await {
        Ok(engine) => engine.is_some(),
        Err(e) => {
            log::warn!("Health check could not initialize the RAG system: {}", e);
            false
        }
    };

    Json(if ready {
        HealthResponse {
            status: "healthy",
            message: "System is ready for queries",
        }
    } else {
        HealthResponse {
            status: "not_ready",
            message: "System is initializing",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use docqa::{
        DocumentRecord, EmbeddingModel, IndexBuilder, LanguageModel, QueryEngine, RagPipeline,
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    struct CountingEmbedder;

    #[async_trait]
    impl EmbeddingModel for CountingEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, t.matches(' ').count() as f32, 0.5])
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            Ok("The notice period is thirty days.\nIt applies to both parties.".to_string())
        }
    }

    const FAKE_PDF_HEADER: &str = "%PDF-fake\n";

    /// Reads test uploads as text, failing on anything without the fake header.
    fn fake_pdf_text(path: &Path) -> Result<String> {
        let contents = std::fs::read_to_string(path)?;
        match contents.strip_prefix(FAKE_PDF_HEADER) {
            Some(text) => Ok(text.to_string()),
            None => bail!("not a PDF"),
        }
    }

    fn fake_pdf(text: &str) -> Vec<u8> {
        format!("{}{}", FAKE_PDF_HEADER, text).into_bytes()
    }

    struct Harness {
        data: TempDir,
        _storage: TempDir,
        state: AppState,
        llm: Arc<RecordingModel>,
    }

    impl Harness {
        fn new() -> Self {
            let data = tempfile::tempdir().unwrap();
            let storage = tempfile::tempdir().unwrap();
            let llm = Arc::new(RecordingModel::default());
            let pipeline = RagPipeline::new(
                Arc::new(CountingEmbedder),
                llm.clone(),
                data.path(),
                storage.path(),
            )
            .with_extractor(fake_pdf_text);
            Self {
                data,
                _storage: storage,
                state: AppState::new(pipeline),
                llm,
            }
        }

        fn data_dir(&self) -> &Path {
            self.data.path()
        }

        async fn install_lease_engine(&self) {
            let records = vec![DocumentRecord::new(
                "Either party may terminate the lease with thirty days notice.".to_string(),
                "20240301_120000_lease.pdf".to_string(),
                true,
            )];
            let embedder = Arc::new(CountingEmbedder);
            let index = IndexBuilder::new(embedder.clone()).build(&records, None).await.unwrap();
            let engine = QueryEngine::new(Arc::new(index), embedder, self.llm.clone()).unwrap();
            self.state.install_engine(engine).await;
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&body).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
        }

        async fn post_json(&self, uri: &str, payload: Value) -> (StatusCode, Value) {
            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn upload(&self, files: &[(&str, &[u8])]) -> (StatusCode, Value) {
            let boundary = "docqa-test-boundary";
            let mut body = Vec::new();
            for (name, bytes) in files {
                body.extend_from_slice(
                    format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }
    }

    #[tokio::test]
    async fn status_without_documents_is_waiting() {
        let harness = Harness::new();

        let (code, body) = harness.get("/status").await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "waiting_for_documents");
        assert_eq!(body["documents_loaded"], 0);
        assert_eq!(body["system_initialized"], false);
        assert_eq!(body["document_names"], json!([]));
    }

    #[tokio::test]
    async fn query_without_documents_is_not_ready() {
        let harness = Harness::new();

        let (code, body) = harness
            .post_json("/query", json!({ "question": "What is the termination clause?" }))
            .await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not initialized"));
        assert!(harness.llm.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn health_without_documents_is_not_ready() {
        let harness = Harness::new();

        let (code, body) = harness.get("/health").await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "not_ready");
    }

    #[tokio::test]
    async fn status_strips_upload_timestamps() {
        let harness = Harness::new();
        std::fs::write(harness.data_dir().join("20240301_120000_lease.pdf"), b"%PDF").unwrap();
        std::fs::write(harness.data_dir().join("20240302_080000_invoice.pdf"), b"%PDF").unwrap();

        let (_, body) = harness.get("/status").await;

        assert_eq!(body["status"], "ready");
        assert_eq!(body["documents_loaded"], 2);
        assert_eq!(body["document_names"], json!(["invoice.pdf", "lease.pdf"]));
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected() {
        let harness = Harness::new();

        let (code, body) = harness
            .upload(&[("a.pdf", &b"%PDF-1.4"[..]), ("notes.txt", &b"plain text"[..])])
            .await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("notes.txt"));
        assert_eq!(std::fs::read_dir(harness.data_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unparseable_upload_reports_the_file() {
        let harness = Harness::new();

        let (code, body) = harness.upload(&[("broken.pdf", &b"not really a pdf"[..])]).await;

        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("broken.pdf"));
        assert!(!harness.state.is_initialized().await);
        assert_eq!(std::fs::read_dir(harness.data_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_rebuilds_and_replaces_previous_copy() {
        let harness = Harness::new();
        let first = fake_pdf("The lease runs for twelve months.");
        let second = fake_pdf("Either party may terminate with thirty days notice.");

        let (code, body) = harness.upload(&[("lease.pdf", first.as_slice())]).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["uploaded_files"].as_array().unwrap().len(), 1);
        assert!(body["uploaded_files"][0].as_str().unwrap().ends_with("_lease.pdf"));
        assert_eq!(
            body["data_directory"],
            harness.data_dir().display().to_string()
        );
        assert!(body["message"].as_str().unwrap().contains("1 file(s)"));

        let (code, _) = harness.upload(&[("lease.pdf", second.as_slice())]).await;
        assert_eq!(code, StatusCode::OK);

        let (_, status) = harness.get("/status").await;
        assert_eq!(status["system_initialized"], true);
        assert_eq!(status["documents_loaded"], 1);
        assert_eq!(status["document_names"], json!(["lease.pdf"]));

        let (code, _) = harness
            .post_json("/query", json!({ "question": "How much notice is needed?" }))
            .await;
        assert_eq!(code, StatusCode::OK);
        let prompts = harness.llm.prompts.lock().await;
        assert!(prompts.last().unwrap().contains("thirty days notice"));
    }

    #[tokio::test]
    async fn duplicate_names_in_one_request_store_once() {
        let harness = Harness::new();
        let old = fake_pdf("Draft terms.");
        let new = fake_pdf("Final terms.");

        let (code, body) = harness
            .upload(&[("terms.pdf", old.as_slice()), ("terms.pdf", new.as_slice())])
            .await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["uploaded_files"].as_array().unwrap().len(), 1);
        let stored = body["uploaded_files"][0].as_str().unwrap();
        let contents = std::fs::read_to_string(harness.data_dir().join(stored)).unwrap();
        assert!(contents.ends_with("Final terms."));
    }

    #[tokio::test]
    async fn query_is_answered_and_formatted() {
        let harness = Harness::new();
        harness.install_lease_engine().await;

        let (code, body) = harness
            .post_json("/query", json!({ "question": "What is the termination clause?" }))
            .await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(
            body["answer"],
            "The notice period is thirty days. It applies to both parties."
        );
        let prompts = harness.llm.prompts.lock().await;
        assert!(prompts[0].contains("What is the termination clause?"));
    }

    #[tokio::test]
    async fn query_accepts_text_field() {
        let harness = Harness::new();
        harness.install_lease_engine().await;

        let (code, _) = harness.post_json("/query", json!({ "text": "Who can terminate?" })).await;

        assert_eq!(code, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_status_report_initialized_engine() {
        let harness = Harness::new();
        harness.install_lease_engine().await;

        let (_, health) = harness.get("/health").await;
        let (_, status) = harness.get("/status").await;

        assert_eq!(health["status"], "healthy");
        assert_eq!(status["system_initialized"], true);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let harness = Harness::new();
        harness.install_lease_engine().await;

        let (code, _) = harness.post_json("/query", json!({ "question": "   " })).await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
    }
}
