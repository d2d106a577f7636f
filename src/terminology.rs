use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TermApplyEvent {
    Added {
        src: String,
        tgt: String,
    },
    Replaced {
        src: String,
        previous_tgt: String,
        tgt: String,
    },
}

/// Source term -> target term dictionary shared across runs.
///
/// Merge-only: updates may overwrite a target but never remove a term.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
}

impl Glossary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn get(&self, src: &str) -> Option<&str> {
        self.terms.get(src).map(String::as_str)
    }

    pub fn apply_updates(
        &mut self,
        updates: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<TermApplyEvent> {
        let mut events = Vec::new();
        for (src, tgt) in updates {
            let src = src.trim();
            let tgt = tgt.trim();
            // An empty source term would match every text.
            if src.is_empty() || tgt.is_empty() {
                continue;
            }
            match self.terms.get_mut(src) {
                None => {
                    self.terms.insert(src.to_string(), tgt.to_string());
                    events.push(TermApplyEvent::Added {
                        src: src.to_string(),
                        tgt: tgt.to_string(),
                    });
                }
                Some(existing) if existing.as_str() != tgt => {
                    let previous_tgt = std::mem::replace(existing, tgt.to_string());
                    events.push(TermApplyEvent::Replaced {
                        src: src.to_string(),
                        previous_tgt,
                        tgt: tgt.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        events
    }

    /// Terms worth attaching to a request for `texts`.
    ///
    /// A term qualifies when it occurs in at least one text and is not contained in a
    /// longer term that was already selected. Candidates are visited longest-first;
    /// equal lengths keep glossary order.
    #[must_use]
    pub fn relevant_for_texts<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> RelevantTerms {
        let texts: Vec<&str> = texts.into_iter().collect();
        if self.terms.is_empty() || texts.is_empty() {
            return RelevantTerms::default();
        }

        let mut candidates: Vec<(&String, &String)> = self
            .terms
            .iter()
            .filter(|(src, _)| texts.iter().any(|t| t.contains(src.as_str())))
            .collect();
        candidates.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let mut selected: Vec<(String, String)> = Vec::new();
        for (src, tgt) in candidates {
            let covered = selected
                .iter()
                .any(|(kept, _)| kept != src && kept.contains(src.as_str()));
            if !covered {
                selected.push((src.clone(), tgt.clone()));
            }
        }
        RelevantTerms { entries: selected }
    }
}

impl FromIterator<(String, String)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

/// Glossary subset sent with one request, longest term first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelevantTerms {
    entries: Vec<(String, String)>,
}

impl RelevantTerms {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, src: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == src)
            .map(|(_, v)| v.as_str())
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for RelevantTerms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (src, tgt) in &self.entries {
            map.serialize_entry(src, tgt)?;
        }
        map.end()
    }
}
