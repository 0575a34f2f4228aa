// Configuration management module
// TOML settings loaded once at startup and passed into each component

pub mod settings;

pub use settings::{
    CompletionConfig, Config, ConfigError, EmbeddingConfig, EmbeddingProvider, OllamaConfig,
    RetrievalConfig,
};

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let rendered = config.to_toml()?;
    println!("# {}", config.config_file_path().display());
    print!("{}", rendered);
    Ok(())
}
