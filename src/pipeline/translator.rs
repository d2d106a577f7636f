use std::collections::HashSet;

use anyhow::Context;

use crate::backend::TranslationBackend;
use crate::budget::ChunkBudget;
use crate::chunker::{next_chunk, remaining};
use crate::ir::{Chunk, Fragment, TranslatedSet};
use crate::pacing::{RetryPolicy, Sleeper};
use crate::progress::ProgressTracker;
use crate::protocol::{parse_response, TranslationRequest};
use crate::store::{JsonStore, FAILED_FILE, GLOSSARY_FILE, TRANSLATIONS_FILE};
use crate::terminology::{Glossary, TermApplyEvent};

use super::trace::TraceWriter;
use super::PipelineConfig;


/// Lifecycle of one chunk inside [`TranslationDriver::translate_all`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight { attempt: u32 },
    Retry { failed_attempts: u32 },
    Success,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub attempts: usize,
    pub translated: usize,
    pub total: usize,
    pub abandoned: usize,
    pub glossary_terms: usize,
}

pub struct DriverSettings {
    pub system_prompt: String,
    pub budget: ChunkBudget,
    pub retry: RetryPolicy,
    pub trace: TraceWriter,
}

impl DriverSettings {
    pub fn from_config(cfg: &PipelineConfig) -> anyhow::Result<Self> {
        let trace = TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_requests)
            .context("open trace dir")?;
        Ok(Self {
            system_prompt: cfg.system_prompt.clone(),
            budget: ChunkBudget::new(cfg.budget),
            retry: cfg.retry,
            trace,
        })
    }
}

/// Sequential translate loop: one chunk in flight, results persisted after every
/// successful chunk so a restart resumes where the last run stopped.
pub struct TranslationDriver<B, S> {
    backend: B,
    sleeper: S,
    store: JsonStore,
    trace: TraceWriter,
    system_prompt: String,
    retry: RetryPolicy,
    budget: ChunkBudget,
    glossary: Glossary,
    translated: TranslatedSet,
    /// Ids of chunks that exhausted their attempts during this run.
    abandoned: HashSet<String>,
}

impl<B: TranslationBackend, S: Sleeper> TranslationDriver<B, S> {
    /// Restores the glossary and translated set from `store`.
    pub fn new(backend: B, sleeper: S, store: JsonStore, settings: DriverSettings) -> Self {
        let glossary: Glossary = store.load(GLOSSARY_FILE, Glossary::new());
        let translated: TranslatedSet = store.load(TRANSLATIONS_FILE, TranslatedSet::new());
        tracing::info!(
            dir = %store.dir().display(),
            glossary = glossary.len(),
            translated = translated.len(),
            backend = backend.name(),
            "restored state"
        );
        Self {
            backend,
            sleeper,
            store,
            trace: settings.trace,
            system_prompt: settings.system_prompt,
            retry: settings.retry,
            budget: settings.budget,
            glossary,
            translated,
            abandoned: HashSet::new(),
        }
    }

    pub fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    pub fn translated(&self) -> &TranslatedSet {
        &self.translated
    }

    pub fn abandoned(&self) -> &HashSet<String> {
        &self.abandoned
    }

    pub fn budget(&self) -> &ChunkBudget {
        &self.budget
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    #[must_use]
    pub fn remaining_count(&self, fragments: &[Fragment]) -> usize {
        remaining(fragments, &self.translated, &self.abandoned).count()
    }

    /// Translates every fragment not yet in the translated set.
    ///
    /// Returns once each fragment is either translated or abandoned.
    pub fn translate_all(&mut self, fragments: &[Fragment]) -> RunSummary {
        let total = fragments.len();
        let progress = ProgressTracker::new(total);
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        tracing::info!(
            "Starting translation: {total} total texts, {} already translated",
            self.done_count(fragments)
        );

        let mut seq = 0usize;
        while let Some(outcome) = self.step(fragments, &mut seq, &mut summary) {
            if outcome == ChunkState::Success {
                progress.report(self.done_count(fragments), self.glossary.len());
                self.sleeper.sleep(self.retry.success_pause());
            }
        }

        summary.translated = self.done_count(fragments);
        summary.abandoned = self.abandoned.len();
        summary.glossary_terms = self.glossary.len();
        tracing::info!(
            chunks_ok = summary.chunks_succeeded,
            chunks_failed = summary.chunks_failed,
            attempts = summary.attempts,
            translated = summary.translated,
            total = summary.total,
            abandoned = summary.abandoned,
            glossary = summary.glossary_terms,
            "Translation completed"
        );
        summary
    }

    /// Drives one chunk to `Success` or `Failed`. Returns `None` when nothing is left.
    fn step(
        &mut self,
        fragments: &[Fragment],
        seq: &mut usize,
        summary: &mut RunSummary,
    ) -> Option<ChunkState> {
        let chunk = next_chunk(
            fragments,
            self.budget.target_chars(),
            &self.translated,
            &self.abandoned,
        )?;
        *seq += 1;

        let mut state = ChunkState::Pending;
        loop {
            state = match state {
                ChunkState::Pending => {
                    tracing::info!("Processing chunk size: {}", chunk.len());
                    ChunkState::InFlight { attempt: 1 }
                }
                ChunkState::InFlight { attempt } => {
                    summary.attempts += 1;
                    match self.attempt(*seq, attempt, &chunk) {
                        Ok(()) => {
                            self.budget.on_success();
                            ChunkState::Success
                        }
                        Err(e) => {
                            let max = self.retry.max_attempts();
                            tracing::error!(
                                "Error processing chunk (attempt {attempt}/{max}): {e:#}"
                            );
                            self.budget.on_failure();
                            if attempt < max {
                                ChunkState::Retry {
                                    failed_attempts: attempt,
                                }
                            } else {
                                ChunkState::Failed
                            }
                        }
                    }
                }
                ChunkState::Retry { failed_attempts } => {
                    self.sleeper.sleep(self.retry.backoff(failed_attempts));
                    ChunkState::InFlight {
                        attempt: failed_attempts + 1,
                    }
                }
                ChunkState::Success => {
                    summary.chunks_succeeded += 1;
                    return Some(state);
                }
                ChunkState::Failed => {
                    summary.chunks_failed += 1;
                    self.abandon(&chunk);
                    return Some(state);
                }
            };
        }
    }

    /// One request/response round for `chunk`. Terms and payload are rebuilt each time.
    fn attempt(&mut self, seq: usize, attempt: u32, chunk: &Chunk) -> anyhow::Result<()> {
        let terms = self.glossary.relevant_for_texts(chunk.texts());
        let payload = TranslationRequest::new(&terms, chunk).to_payload()?;
        tracing::info!(
            "Preparing request with terms dictionary size: {}",
            terms.len()
        );
        tracing::info!("Full request data: {payload}");
        if let Err(e) = self.trace.write_attempt_text(seq, attempt, "request", &payload) {
            tracing::warn!(error = %format!("{e:#}"), "trace write failed");
        }

        let reply = self
            .backend
            .complete(&self.system_prompt, &payload)
            .context("backend call")?;
        let raw = reply.first_text();
        tracing::info!("Raw API response: {raw}");
        if let Err(e) = self.trace.write_attempt_text(seq, attempt, "response", raw) {
            tracing::warn!(error = %format!("{e:#}"), "trace write failed");
        }

        let parsed = parse_response(raw).map_err(|e| {
            tracing::error!("Raw response: {raw}");
            e
        })?;
        let accepted = parsed.translations_for(chunk).map_err(|e| {
            tracing::error!("Raw response: {raw}");
            e
        })?;

        if !accepted.unknown_ids.is_empty() {
            tracing::warn!(ids = ?accepted.unknown_ids, "ignored translations for ids outside the chunk");
        }
        if !accepted.non_text_ids.is_empty() {
            tracing::warn!(ids = ?accepted.non_text_ids, "ignored non-string translations");
        }
        if !accepted.missing_ids.is_empty() {
            tracing::warn!(ids = ?accepted.missing_ids, "response left texts untranslated; they stay queued");
        }

        let count = accepted.translations.len();
        self.translated.extend(accepted.translations);
        let _ = self.store.save(TRANSLATIONS_FILE, &self.translated);
        tracing::info!("Translated {count} texts");

        let (new_terms, dropped_terms) = parsed.text_terms();
        if !dropped_terms.is_empty() {
            tracing::warn!(terms = ?dropped_terms, "ignored non-string glossary entries");
        }
        if !new_terms.is_empty() {
            let events = self.glossary.apply_updates(new_terms);
            if !events.is_empty() {
                let _ = self.store.save(GLOSSARY_FILE, &self.glossary);
            }
            log_term_events(&events);
        }

        if let Some(comment) = parsed.comment() {
            tracing::info!("Translation comment: {comment}");
        }
        Ok(())
    }

    fn abandon(&mut self, chunk: &Chunk) {
        tracing::error!(
            "Failed to process chunk after {} attempts",
            self.retry.max_attempts()
        );
        let _ = self.store.save(FAILED_FILE, chunk);
        self.abandoned.extend(chunk.ids().map(str::to_string));
        tracing::warn!(
            ids = ?chunk.ids().collect::<Vec<_>>(),
            "chunk abandoned for this run; texts recorded in {FAILED_FILE}"
        );
    }

    fn done_count(&self, fragments: &[Fragment]) -> usize {
        fragments
            .iter()
            .filter(|f| self.translated.contains_key(&f.id))
            .count()
    }
}

fn log_term_events(events: &[TermApplyEvent]) {
    let mut added = Vec::new();
    for ev in events {
        match ev {
            TermApplyEvent::Added { src, tgt } => added.push(format!("{src} => {tgt}")),
            TermApplyEvent::Replaced {
                src,
                previous_tgt,
                tgt,
            } => {
                tracing::warn!(term = %src, previous = %previous_tgt, new = %tgt, "glossary term replaced");
            }
        }
    }
    if !added.is_empty() {
        tracing::info!("Added new terms to glossary: {}", added.join(", "));
    }
}
