use serde::Serialize;

#[derive(Serialize)]
pub struct QueryAnswer {
    pub answer: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub uploaded_files: Vec<String>,
    pub data_directory: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub documents_loaded: usize,
    pub document_names: Vec<String>,
    pub system_initialized: bool,
    pub data_directory: String,
    pub storage_directory: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}
