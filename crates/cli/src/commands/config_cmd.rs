//! `sleuth config`: Configuration management commands.

use sleuth_config::AppConfig;
use std::path::Path;

pub fn show(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", render_redacted(&config)?);
    Ok(())
}

pub fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating {}...", path.display());

    match AppConfig::load_with_env(path) {
        Ok(config) => {
            println!("   ✅ Config parsed and validated");
            if !config.has_api_key() {
                println!("   ⚠️  No API key set (only local providers will work)");
            }
            println!();
            println!("   Provider:   {}", config.provider.name);
            println!("   Model:      {}", config.provider.model);
            println!("   Knowledge:  {}", config.knowledge_path().display());
            println!("   Reports:    {}", config.paths.reports_dir.display());
            println!("   Max turns:  {} per round", config.agent.max_rounds);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn path(path: &Path) {
    println!("{}", path.display());
}

pub fn default_config() {
    print!("{}", AppConfig::default_toml());
}

fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("***".into());
    }
    toml::to_string_pretty(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn api_key_is_redacted() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let rendered = render_redacted(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
