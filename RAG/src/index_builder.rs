use crate::chunker::Chunker;
use crate::embedding_service::EmbeddingModel;
use crate::models::DocumentRecord;
use crate::vector_index::{IndexStorage, VectorIndex};
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds a [`VectorIndex`] from document records, reusing a persisted copy when
/// it still describes the same set of files.
pub struct IndexBuilder {
    embedding_model: Arc<dyn EmbeddingModel>,
    chunker: Chunker,
}

impl IndexBuilder {
    pub fn new(embedding_model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            embedding_model,
            chunker: Chunker::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub async fn build(
        &self,
        documents: &[DocumentRecord],
        storage: Option<&IndexStorage>,
    ) -> Result<VectorIndex> {
        if let Some(storage) = storage {
            if let Some(index) = self.try_load(storage, documents) {
                return Ok(index);
            }
        }

        let index = self.build_fresh(documents).await?;

        if let Some(storage) = storage {
            if let Err(e) = storage.persist(&index) {
                log::error!(
                    "Failed to persist index to {}: {:#}",
                    storage.dir().display(),
                    e
                );
            }
        }

        Ok(index)
    }

    fn try_load(&self, storage: &IndexStorage, documents: &[DocumentRecord]) -> Option<VectorIndex> {
        if !storage.exists() {
            return None;
        }

        let index = match storage.load() {
            Ok(index) => index,
            Err(e) => {
                log::warn!("Could not load persisted index, rebuilding: {:#}", e);
                return None;
            }
        };

        if index.dimension() != self.embedding_model.dimension() {
            log::warn!(
                "Persisted index has dimension {}, embedding model produces {}; rebuilding",
                index.dimension(),
                self.embedding_model.dimension()
            );
            return None;
        }

        let current: BTreeSet<&str> = documents
            .iter()
            .map(|d| d.metadata.file_name.as_str())
            .collect();
        if index.docstore().source_files() != current {
            log::info!("Document set changed since the index was persisted; rebuilding");
            return None;
        }

        log::info!(
            "Loaded persisted index ({} nodes) from {}",
            index.len(),
            storage.dir().display()
        );
        Some(index)
    }

    async fn build_fresh(&self, documents: &[DocumentRecord]) -> Result<VectorIndex> {
        if documents.is_empty() {
            bail!("cannot build an index from an empty document set");
        }

        log::info!("Building index from {} documents...", documents.len());
        let nodes = self.chunker.split_documents(documents);
        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedding_model.embed(&texts).await?
        };

        if embeddings.len() != nodes.len() {
            bail!(
                "embedding model returned {} vectors for {} nodes",
                embeddings.len(),
                nodes.len()
            );
        }

        let mut index = VectorIndex::new(self.embedding_model.dimension());
        for document in documents {
            index.add_document(document.metadata.clone());
        }
        for (node, embedding) in nodes.into_iter().zip(embeddings) {
            index.insert(node, embedding)?;
        }

        log::info!("Index built with {} nodes", index.len());
        Ok(index)
    }
}
