use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Completed translations keyed by fragment id. Doubles as the resume checkpoint.
pub type TranslatedSet = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub text: String,
}

impl Fragment {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Length in characters, the unit the chunk budget is expressed in.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// An ordered, non-empty batch of fragments sent in one request.
///
/// Serializes as a JSON object (`id -> text`) that keeps input order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    fragments: Vec<Fragment>,
}

impl Chunk {
    /// Returns `None` for an empty fragment list; a chunk is never empty.
    #[must_use]
    pub fn new(fragments: Vec<Fragment>) -> Option<Self> {
        if fragments.is_empty() {
            None
        } else {
            Some(Self { fragments })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.fragments.iter().map(|f| f.id.as_str())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.fragments.iter().map(|f| f.text.as_str())
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.fragments.iter().any(|f| f.id == id)
    }

    #[must_use]
    pub fn char_len(&self) -> usize {
        self.fragments.iter().map(Fragment::char_len).sum()
    }
}

impl Serialize for Chunk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fragments.len()))?;
        for f in &self.fragments {
            map.serialize_entry(&f.id, &f.text)?;
        }
        map.end()
    }
}
