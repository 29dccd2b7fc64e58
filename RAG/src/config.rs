use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_HEADER: &str = "x-goog-api-key";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
/// Output size of `text-embedding-004`; every stored vector must match it.
pub const EMBEDDING_DIMENSION: usize = 768;
pub const LLM_TEMPERATURE: f32 = 0.1;
pub const LLM_MAX_OUTPUT_TOKENS: u32 = 1024;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STORAGE_DIR: &str = "storage";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Runtime settings, read from the process environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub data_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            api_key,
            api_base: var_or("GEMINI_API_BASE", DEFAULT_API_BASE),
            llm_model: var_or("GEMINI_MODEL", DEFAULT_LLM_MODEL),
            embedding_model: var_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: EMBEDDING_DIMENSION,
            data_dir: PathBuf::from(var_or("DATA_DIR", DEFAULT_DATA_DIR)),
            storage_dir: PathBuf::from(var_or("STORAGE_DIR", DEFAULT_STORAGE_DIR)),
            bind_addr: var_or("BIND_ADDR", DEFAULT_BIND_ADDR),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
