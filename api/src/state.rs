use docqa::{PipelineError, QueryEngine, RagPipeline};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared service state handed to every handler.
///
/// The engine slot is only replaced while `rebuild` is held, so at most one
/// (re)initialization runs at a time. A failed rebuild keeps the previous
/// engine.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: RagPipeline,
    engine: RwLock<Option<Arc<QueryEngine>>>,
    rebuild: Mutex<()>,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline,
                engine: RwLock::new(None),
                rebuild: Mutex::new(()),
            }),
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.inner.pipeline.data_dir()
    }

    pub fn storage_dir(&self) -> &Path {
        self.inner.pipeline.storage().dir()
    }

    pub async fn engine(&self) -> Option<Arc<QueryEngine>> {
        self.inner.engine.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.engine.read().await.is_some()
    }

    /// Returns the current engine, making one build attempt if there is none.
    pub async fn ensure_engine(&self) -> Result<Option<Arc<QueryEngine>>, PipelineError> {
        if let Some(engine) = self.engine().await {
            return Ok(Some(engine));
        }

        let _guard = self.inner.rebuild.lock().await;
        // Another request may have finished a build while we waited.
        if let Some(engine) = self.engine().await {
            return Ok(Some(engine));
        }
        self.rebuild_locked().await
    }

    /// Rebuilds from scratch after the document set changed.
    pub async fn reinitialize(&self) -> Result<Option<Arc<QueryEngine>>, PipelineError> {
        let _guard = self.inner.rebuild.lock().await;
        if let Err(e) = self.inner.pipeline.storage().clear() {
            log::error!("Failed to clear persisted index: {:#}", e);
        }
        self.rebuild_locked().await
    }

    async fn rebuild_locked(&self) -> Result<Option<Arc<QueryEngine>>, PipelineError> {
        match self.inner.pipeline.initialize().await {
            Ok(Some(engine)) => {
                let engine = Arc::new(engine);
                *self.inner.engine.write().await = Some(engine.clone());
                Ok(Some(engine))
            }
            Ok(None) => Ok(self.engine().await),
            Err(e) => {
                log::error!("RAG system initialization failed: {}", e);
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub async fn install_engine(&self, engine: QueryEngine) {
        *self.inner.engine.write().await = Some(Arc::new(engine));
    }
}
