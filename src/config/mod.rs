//! Configuration and CLI handling

pub mod cli;
pub mod engine;
pub mod settings;

pub use cli::Cli;
pub use engine::{
    AlignConfig, EngineConfig, KeyConfig, MixConfig, SnippetConfig, TempoConfig,
    CANONICAL_SAMPLE_RATE,
};
pub use settings::{BackendSettings, Settings};
