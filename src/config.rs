use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::budget::BudgetLimits;
use crate::pacing::RetryPolicy;

pub const CONFIG_FILENAME: &str = "game-loc-translator.toml";
pub const CONFIG_ENV: &str = "GAME_LOC_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub translator: TranslatorSection,
    #[serde(default)]
    pub chunking: BudgetLimits,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Older config layout: `[local] CLAUDE_API_KEY = "..."`.
    #[serde(default)]
    pub local: LocalSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ApiSection {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when no key is configured.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TranslatorSection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub save_dir: Option<String>,

    /// System instruction file; relative paths resolve against the config directory.
    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub id_prefixes: Vec<String>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_requests: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LocalSection {
    #[serde(rename = "CLAUDE_API_KEY", default)]
    pub claude_api_key: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    toml::from_str(text).context("parse config toml")
}
