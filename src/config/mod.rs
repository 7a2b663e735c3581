// Configuration management module
// TOML settings for the Ollama connection, chunking, retrieval and storage

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, OllamaConfig, RetrievalConfig, SessionConfig, StorageConfig,
};

