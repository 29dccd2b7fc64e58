use crate::config::{Config, API_KEY_HEADER};
use crate::models::*;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Length of every vector this model returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding model returned no vector for the query"))
    }
}

// batchEmbedContents rejects more than 100 requests per call.
const MAX_BATCH: usize = 100;

/// Hosted Gemini embeddings (`batchEmbedContents`).
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    dimension: usize,
}

impl GeminiEmbedder {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.embedding_model.trim_start_matches("models/").to_string(),
            dimension: config.embedding_dimension,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", self.model);
        let request = GeminiEmbedRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedContentRequest {
                    model: model.clone(),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let url = format!("{}/{}:batchEmbedContents", self.api_base, model);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Gemini embedding request failed: {}", e.without_url()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.map_err(|e| e.without_url())?;
            return Err(anyhow!("Gemini embedding API error: {}", error_text));
        }

        let body: GeminiEmbedResponse = response.json().await.map_err(|e| e.without_url())?;
        if body.embeddings.len() != texts.len() {
            bail!(
                "Gemini returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            );
        }

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingModel for GeminiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        log::debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}

pub fn calculate_similarity(embedding1: &[f32], embedding2: &[f32]) -> f32 {
    let min_len = embedding1.len().min(embedding2.len());

    let dot_product: f32 = embedding1[..min_len]
        .iter()
        .zip(embedding2[..min_len].iter())
        .map(|(a, b)| a * b)
        .sum();

    let norm1: f32 = embedding1[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm2: f32 = embedding2[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm1 == 0.0 || norm2 == 0.0 {
        0.0
    } else {
        dot_product / (norm1 * norm2)
    }
}
