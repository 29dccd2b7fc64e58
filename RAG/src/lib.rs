pub mod chunker;
pub mod config;
pub mod document_loader;
pub mod embedding_service;
pub mod gemini_service;
pub mod index_builder;
pub mod models;
pub mod pipeline;
pub mod query_engine;
pub mod synthesis;
pub mod vector_index;

pub use config::Config;
pub use embedding_service::{EmbeddingModel, GeminiEmbedder};
pub use gemini_service::{GeminiService, LanguageModel};
pub use index_builder::IndexBuilder;
pub use models::*;
pub use pipeline::{PipelineError, RagPipeline};
pub use query_engine::{process_response, QueryEngine, QueryKind};
pub use vector_index::{IndexStorage, VectorIndex};
