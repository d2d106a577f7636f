mod config;
mod prompts;
mod trace;
mod translator;

pub use config::{init_default_config, CliOverrides, PipelineConfig};
pub use translator::{ChunkState, DriverSettings, RunSummary, TranslationDriver};
