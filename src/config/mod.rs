// Configuration management module
// Handles the TOML configuration file and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig, LlmProvider,
    OllamaConfig, PathsConfig, RetrievalConfig, SearchConfig, SessionConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
