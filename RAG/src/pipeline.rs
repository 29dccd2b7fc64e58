use crate::config::Config;
use crate::document_loader::{
    extract_pdf_text, list_pdf_files, load_documents_in_background, TextExtractor,
};
use crate::embedding_service::{EmbeddingModel, GeminiEmbedder};
use crate::gemini_service::{GeminiService, LanguageModel};
use crate::index_builder::IndexBuilder;
use crate::query_engine::QueryEngine;
use crate::vector_index::IndexStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load documents: {0:#}")]
    Ingestion(anyhow::Error),
    #[error("failed to build index: {0:#}")]
    Build(anyhow::Error),
}

/// Loader, index builder and query engine wired to one data directory.
pub struct RagPipeline {
    embedding_model: Arc<dyn EmbeddingModel>,
    llm: Arc<dyn LanguageModel>,
    extract: TextExtractor,
    data_dir: PathBuf,
    storage: IndexStorage,
}

impl RagPipeline {
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        llm: Arc<dyn LanguageModel>,
        data_dir: impl Into<PathBuf>,
        storage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedding_model,
            llm,
            extract: Arc::new(extract_pdf_text),
            data_dir: data_dir.into(),
            storage: IndexStorage::new(storage_dir),
        }
    }

    /// Pipeline backed by the hosted Gemini models.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(GeminiEmbedder::new(config)),
            Arc::new(GeminiService::new(config)),
            config.data_dir.clone(),
            config.storage_dir.clone(),
        )
    }

    /// Replaces the PDF text extractor.
    pub fn with_extractor<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.extract = Arc::new(extract);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn storage(&self) -> &IndexStorage {
        &self.storage
    }

    /// Builds a query engine over the current PDFs.
    ///
    /// `Ok(None)` means there is nothing to index yet.
    pub async fn initialize(&self) -> Result<Option<QueryEngine>, PipelineError> {
        let pdf_files = list_pdf_files(&self.data_dir).map_err(PipelineError::Ingestion)?;
        if pdf_files.is_empty() {
            log::warn!("No PDF files found in {}", self.data_dir.display());
            return Ok(None);
        }

        log::info!("Loading documents...");
        let documents = load_documents_in_background(self.data_dir.clone(), self.extract.clone())
            .await
            .map_err(PipelineError::Ingestion)?;
        if documents.is_empty() {
            log::warn!("No documents were successfully loaded.");
            return Ok(None);
        }

        log::info!("Creating index...");
        let index = IndexBuilder::new(self.embedding_model.clone())
            .build(&documents, Some(&self.storage))
            .await
            .map_err(PipelineError::Build)?;

        log::info!("Initializing query engine...");
        let engine = QueryEngine::new(Arc::new(index), self.embedding_model.clone(), self.llm.clone())
            .map_err(PipelineError::Build)?;

        log::info!("RAG system initialized successfully!");
        Ok(Some(engine))
    }
}
