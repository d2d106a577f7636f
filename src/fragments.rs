use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context};
use encoding_rs::UTF_8;

use crate::ir::{Fragment, TranslatedSet};

pub const ID_COLUMN: &str = "Name";
pub const SOURCE_COLUMN: &str = "CHT";
pub const TARGET_COLUMN: &str = "KOR";

#[derive(Clone, Debug, Default)]
pub struct FragmentFilter {
    /// Keep only ids starting with one of these; empty keeps everything.
    pub id_prefixes: Vec<String>,
    pub max_fragments: Option<usize>,
}

impl FragmentFilter {
    #[must_use]
    pub fn apply(&self, fragments: Vec<Fragment>) -> Vec<Fragment> {
        let mut out: Vec<Fragment> = fragments
            .into_iter()
            .filter(|f| {
                self.id_prefixes.is_empty()
                    || self.id_prefixes.iter().any(|p| f.id.starts_with(p.as_str()))
            })
            .collect();
        if let Some(max) = self.max_fragments.filter(|n| *n > 0) {
            out.truncate(max);
        }
        out
    }
}

pub fn read_fragments_csv(path: &Path) -> anyhow::Result<Vec<Fragment>> {
    let bytes = std::fs::read(path).with_context(|| format!("read csv: {}", path.display()))?;
    parse_fragments_csv(&bytes).with_context(|| format!("parse csv: {}", path.display()))
}

/// Reads `Name`/`CHT` rows, in file order.
///
/// A leading UTF-8 byte-order mark is dropped. Rows with an empty id or text are
/// skipped; a repeated id keeps its first row.
pub fn parse_fragments_csv(bytes: &[u8]) -> anyhow::Result<Vec<Fragment>> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if had_errors {
        tracing::warn!("csv contains invalid UTF-8; replaced with U+FFFD");
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers().context("read csv header")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| anyhow!("missing csv column: {name}"))
    };
    let id_idx = column(ID_COLUMN)?;
    let src_idx = column(SOURCE_COLUMN)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (row, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("read csv row {}", row + 2))?;
        let id = rec.get(id_idx).unwrap_or("").trim();
        let src = rec.get(src_idx).unwrap_or("");
        if id.is_empty() || src.trim().is_empty() {
            continue;
        }
        if !seen.insert(id.to_string()) {
            tracing::warn!(id, row = row + 2, "duplicate fragment id; keeping first");
            continue;
        }
        out.push(Fragment::new(id, src));
    }
    Ok(out)
}

/// Writes `Name,CHT,KOR` for every fragment; untranslated rows get an empty `KOR`.
///
/// Only loaded fragments are written: rows skipped at load time and columns other
/// than `Name`/`CHT` do not appear in the output.
pub fn export_csv(
    path: &Path,
    fragments: &[Fragment],
    translated: &TranslatedSet,
) -> anyhow::Result<usize> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([ID_COLUMN, SOURCE_COLUMN, TARGET_COLUMN])
        .context("write csv header")?;
    let mut done = 0usize;
    for f in fragments {
        let tgt = translated.get(&f.id).map(String::as_str).unwrap_or("");
        if !tgt.is_empty() {
            done += 1;
        }
        w.write_record([f.id.as_str(), f.text.as_str(), tgt])
            .with_context(|| format!("write csv row: {}", f.id))?;
    }
    let body = w.into_inner().map_err(|e| anyhow!("flush csv: {e}"))?;
    let mut buf = Vec::with_capacity(body.len() + 3);
    buf.extend_from_slice("\u{FEFF}".as_bytes());
    buf.extend_from_slice(&body);
    std::fs::write(path, buf).with_context(|| format!("write csv: {}", path.display()))?;
    Ok(done)
}
