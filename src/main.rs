use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use game_loc_translator::backend::MessagesClient;
use game_loc_translator::budget::ChunkBudget;
use game_loc_translator::chunker::plan_chunks;
use game_loc_translator::fragments::{export_csv, read_fragments_csv};
use game_loc_translator::ir::TranslatedSet;
use game_loc_translator::logging;
use game_loc_translator::pacing::ThreadSleeper;
use game_loc_translator::pipeline::{
    init_default_config, CliOverrides, DriverSettings, PipelineConfig, TranslationDriver,
};
use game_loc_translator::store::{JsonStore, TRANSLATIONS_FILE};

#[derive(Parser, Debug)]
#[command(name = "game-loc-translator")]
#[command(about = "Batch translator for game localization tables with a shared glossary and resumable progress", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input CSV with Name and CHT columns
    #[arg(value_name = "CSV")]
    input: Option<PathBuf>,

    /// Config file path (default: search for game-loc-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding glossary, translations, failures and the log
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Model name sent with every request
    #[arg(long)]
    model: Option<String>,

    /// API key (default: config file, then the configured env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Only translate ids starting with this prefix (repeatable)
    #[arg(long = "id-prefix", value_name = "PREFIX")]
    id_prefixes: Vec<String>,

    /// Process at most N fragments after filtering
    #[arg(long)]
    max_fragments: Option<usize>,

    /// Write Name,CHT,KOR from the saved translations to this CSV, then exit
    #[arg(long, value_name = "CSV")]
    export: Option<PathBuf>,

    /// Log the chunk plan for the remaining fragments without calling the API
    #[arg(long)]
    dry_run: bool,

    /// Dump every request payload and raw reply under the trace dir
    #[arg(long)]
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  game-loc-translator <input.csv>\n\nTIPS:\n  - Re-running with the same save dir resumes where the last run stopped.\n  - Default config search: game-loc-translator.toml (upwards), or set GAME_LOC_TRANSLATOR_CONFIG.\n"
            );
            return Ok(());
        }
    };

    let cfg = PipelineConfig::from_input_and_args(
        Some(&input),
        CliOverrides {
            config: args.config,
            save_dir: args.save_dir,
            model: args.model,
            api_key: args.api_key,
            id_prefixes: args.id_prefixes,
            max_fragments: args.max_fragments,
            trace: args.trace,
        },
    )
    .context("build config")?;
    let _log_guard = logging::init(&cfg.save_dir);
    if let Some(p) = cfg.config_path.as_ref() {
        tracing::info!(config = %p.display(), "loaded config");
    }

    let fragments = cfg.filter.apply(read_fragments_csv(&input)?);
    let store = JsonStore::open(&cfg.save_dir)?;

    if let Some(out) = args.export.as_ref() {
        let translated: TranslatedSet = store.load(TRANSLATIONS_FILE, TranslatedSet::new());
        let done = export_csv(out, &fragments, &translated)?;
        tracing::info!(
            "Exported {done}/{} translations to {}",
            fragments.len(),
            out.display()
        );
        return Ok(());
    }

    if args.dry_run {
        let translated: TranslatedSet = store.load(TRANSLATIONS_FILE, TranslatedSet::new());
        let budget = ChunkBudget::new(cfg.budget).target_chars();
        let plan = plan_chunks(&fragments, budget, &translated, &HashSet::new());
        tracing::info!(
            fragments = fragments.len(),
            already_translated = translated.len(),
            chunks = plan.len(),
            budget,
            "dry run"
        );
        for (i, chunk) in plan.iter().enumerate() {
            tracing::info!(
                chunk = i + 1,
                texts = chunk.len(),
                chars = chunk.char_len(),
                first = chunk.ids().next().unwrap_or(""),
                "planned chunk"
            );
        }
        return Ok(());
    }

    let backend = MessagesClient::new(cfg.messages_client_config()?)?;
    let settings = DriverSettings::from_config(&cfg)?;
    let mut driver = TranslationDriver::new(backend, ThreadSleeper, store, settings);
    let summary = driver.translate_all(&fragments);
    if summary.abandoned > 0 {
        tracing::warn!(
            "{} texts could not be translated this run; rerun to retry them",
            summary.abandoned
        );
    }
    Ok(())
}
