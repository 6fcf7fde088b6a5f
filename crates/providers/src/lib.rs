//! LLM provider implementations for ChatPTK.
//!
//! All providers implement the `chatptk_core::Provider` trait.
//! [`build_from_config`] picks the endpoint named in configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use chatptk_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
///
/// `api_key` comes from [`chatptk_config::AppConfig::require_secrets`], so the
/// caller has already refused to start without one.
pub fn build_from_config(config: &chatptk_config::AppConfig, api_key: &str) -> Arc<dyn Provider> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    tracing::info!(provider = %config.provider, base_url = %base_url, "Completion provider configured");
    Arc::new(OpenAiCompatProvider::new(&config.provider, base_url, api_key))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "groq" => "https://api.groq.com/openai/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
