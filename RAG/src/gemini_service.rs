use crate::config::{Config, API_KEY_HEADER, LLM_MAX_OUTPUT_TOKENS, LLM_TEMPERATURE};
use crate::models::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Single-shot text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiService {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.llm_model.trim_start_matches("models/").to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: LLM_TEMPERATURE,
                max_output_tokens: LLM_MAX_OUTPUT_TOKENS,
            }),
        };

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Gemini request failed: {}", e.without_url()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.map_err(|e| e.without_url())?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| e.without_url())?;

        let answer = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "No response generated".to_string());

        Ok(answer)
    }
}
