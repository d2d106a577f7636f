use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::backend::{MessagesClientConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::budget::BudgetLimits;
use crate::config::{find_default_config, load_config, AppConfig, CONFIG_ENV, CONFIG_FILENAME};
use crate::fragments::FragmentFilter;
use crate::pacing::RetryPolicy;
use crate::pipeline::prompts::{default_prompt_files, load_system_prompt, DEFAULT_PROMPTS_DIR};

const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Values given on the command line; each one wins over the config file.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub id_prefixes: Vec<String>,
    pub max_fragments: Option<usize>,
    pub trace: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub save_dir: PathBuf,

    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,

    pub budget: BudgetLimits,
    pub retry: RetryPolicy,
    pub filter: FragmentFilter,

    pub trace_dir: PathBuf,
    pub trace_requests: bool,

    pub system_prompt: String,
}

impl PipelineConfig {
    pub fn from_input_and_args(input: Option<&Path>, args: CliOverrides) -> anyhow::Result<Self> {
        let workdir = input
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        let cfg_file = args
            .config
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if args.config.is_some() {
                return Err(anyhow!("config not found: {}", p.display()));
            }
        }
        let config_path = cfg_file.filter(|p| p.exists());
        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::resolve(file_cfg, config_path, &config_dir, args)
    }

    /// Merges file values, command-line values and defaults.
    pub fn resolve(
        file_cfg: AppConfig,
        config_path: Option<PathBuf>,
        config_dir: &Path,
        args: CliOverrides,
    ) -> anyhow::Result<Self> {
        let relative_to_config = |p: PathBuf| {
            if p.is_relative() {
                config_dir.join(p)
            } else {
                p
            }
        };

        let save_dir = args.save_dir.clone().unwrap_or_else(|| {
            relative_to_config(PathBuf::from(
                file_cfg
                    .translator
                    .save_dir
                    .clone()
                    .unwrap_or_else(|| "translation_data".to_string()),
            ))
        });

        let model = args
            .model
            .or_else(|| file_cfg.translator.model.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let key_env = file_cfg
            .api
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = args
            .api_key
            .or_else(|| file_cfg.api.api_key.clone())
            .or_else(|| file_cfg.local.claude_api_key.clone())
            .or_else(|| std::env::var(&key_env).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let base_url = file_cfg
            .api
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = Duration::from_secs(file_cfg.api.timeout_secs.unwrap_or(300).max(1));
        let max_tokens = file_cfg.translator.max_tokens.unwrap_or(8192).max(1);
        let temperature = file_cfg.translator.temperature.unwrap_or(0.0);

        let id_prefixes = if args.id_prefixes.is_empty() {
            file_cfg.translator.id_prefixes.clone()
        } else {
            args.id_prefixes
        };
        let filter = FragmentFilter {
            id_prefixes,
            max_fragments: args.max_fragments,
        };

        let budget = file_cfg.chunking;
        if budget.min > budget.max || budget.grow < 1.0 || budget.shrink <= 0.0 || budget.shrink > 1.0 {
            return Err(anyhow!(
                "invalid [chunking]: need min <= max, grow >= 1, 0 < shrink <= 1 (got {budget:?})"
            ));
        }

        let trace_dir = file_cfg
            .translator
            .trace_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| save_dir.join("_trace"));
        let trace_dir = relative_to_config(trace_dir);
        let trace_requests = args.trace || file_cfg.translator.trace_requests.unwrap_or(false);

        let system_prompt =
            load_system_prompt(config_dir, file_cfg.translator.system_prompt.as_deref())
                .context("load system prompt")?;

        Ok(Self {
            config_path,
            save_dir,
            model,
            api_key,
            base_url,
            timeout,
            max_tokens,
            temperature,
            budget,
            retry: file_cfg.retry,
            filter,
            trace_dir,
            trace_requests,
            system_prompt,
        })
    }

    /// Settings for the HTTP backend; fails when no API key was found.
    pub fn messages_client_config(&self) -> anyhow::Result<MessagesClientConfig> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            anyhow!(
                "no API key: pass --api-key, set [api].api_key in {CONFIG_FILENAME}, or export {DEFAULT_API_KEY_ENV}"
            )
        })?;
        Ok(MessagesClientConfig {
            api_key,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        })
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;
    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[api]
# api_key = "sk-..."
api_key_env = "ANTHROPIC_API_KEY"
base_url = "https://api.anthropic.com"
timeout_secs = 300

[translator]
model = "claude-3-5-sonnet-20241022"
max_tokens = 8192
temperature = 0.0
save_dir = "translation_data"
system_prompt = "prompts/system.txt"
# Only translate ids starting with one of these (empty = everything).
# id_prefixes = ["PN", "Skill", "TimeEcho", "TimeTalent"]
trace_requests = false
# trace_dir = "translation_data/_trace"

[chunking]
# Target characters per request. Starts at `initial`, then moves within [min, max].
initial = 1000.0
min = 1200.0
max = 2400.0
grow = 1.2
shrink = 0.8

[retry]
max_attempts = 3
backoff_step_secs = 2
success_pause_secs = 1
"#;
