//! LLM Provider implementations for sleuth.
//!
//! All providers implement the `sleuth_core::Provider` trait.
//! `build_from_config` selects and constructs the configured backend.

pub mod openai_compat;
pub mod sse;
pub mod think;

use sleuth_config::AppConfig;
use sleuth_core::Provider;
use sleuth_core::error::ProviderError;
use std::sync::Arc;
use tracing::debug;

pub use openai_compat::OpenAiCompatProvider;
pub use think::ThinkTagSplitter;

/// Providers that run locally and accept requests without a key.
const KEYLESS_PROVIDERS: &[&str] = &["lmstudio", "ollama", "vllm", "llamacpp", "llama.cpp"];

/// Build the configured provider.
///
/// Hosted providers require an API key; local servers do not.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = &config.provider;
    let keyless = KEYLESS_PROVIDERS.contains(&provider.name.as_str()) || provider.api_url.is_some();
    if !keyless && provider.api_key.as_deref().is_none_or(str::is_empty) {
        return Err(ProviderError::NotConfigured(format!(
            "provider '{}' needs an API key (set SLEUTH_API_KEY or provider.api_key)",
            provider.name
        )));
    }

    let built = OpenAiCompatProvider::from_config(provider)?;
    debug!(provider = %provider.name, base_url = %built.base_url(), model = %provider.model, "Provider ready");
    Ok(Arc::new(built))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "lmstudio" => "http://localhost:1234/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("lmstudio").contains("localhost:1234"));
    }

    #[test]
    fn hosted_provider_without_key_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn local_provider_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider.name = "lmstudio".into();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "lmstudio");
    }

    #[test]
    fn hosted_provider_with_key_builds() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-test".into());
        assert_eq!(build_from_config(&config).unwrap().name(), "openrouter");
    }
}
