use std::collections::HashSet;

use crate::ir::{Chunk, Fragment, TranslatedSet};

/// Fragments still waiting for a translation, in input order.
pub fn remaining<'a>(
    fragments: &'a [Fragment],
    translated: &'a TranslatedSet,
    abandoned: &'a HashSet<String>,
) -> impl Iterator<Item = &'a Fragment> + 'a {
    fragments
        .iter()
        .filter(move |f| !translated.contains_key(&f.id) && !abandoned.contains(&f.id))
}

/// Builds the next chunk from the remaining fragments.
///
/// Fragments are taken greedily in input order until the next one would push the
/// total over `budget` characters. The first fragment is always taken, so an
/// oversized fragment still makes progress. Returns `None` once nothing remains.
#[must_use]
pub fn next_chunk(
    fragments: &[Fragment],
    budget: usize,
    translated: &TranslatedSet,
    abandoned: &HashSet<String>,
) -> Option<Chunk> {
    let mut picked: Vec<Fragment> = Vec::new();
    let mut total = 0usize;
    for frag in remaining(fragments, translated, abandoned) {
        let len = frag.char_len();
        if !picked.is_empty() && total + len > budget {
            break;
        }
        total += len;
        picked.push(frag.clone());
    }
    Chunk::new(picked)
}

/// Partitions every remaining fragment into consecutive chunks under a fixed budget.
///
/// Used for dry runs; the driver itself asks for one chunk at a time because the
/// budget and the translated set change between chunks.
#[must_use]
pub fn plan_chunks(
    fragments: &[Fragment],
    budget: usize,
    translated: &TranslatedSet,
    abandoned: &HashSet<String>,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<Fragment> = Vec::new();
    let mut total = 0usize;
    for frag in remaining(fragments, translated, abandoned) {
        let len = frag.char_len();
        if !current.is_empty() && total + len > budget {
            chunks.extend(Chunk::new(std::mem::take(&mut current)));
            total = 0;
        }
        total += len;
        current.push(frag.clone());
    }
    chunks.extend(Chunk::new(current));
    chunks
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{next_chunk, plan_chunks, remaining};
    use crate::ir::{Fragment, TranslatedSet};

    fn frags(pairs: &[(&str, &str)]) -> Vec<Fragment> {
        pairs.iter().map(|(id, t)| Fragment::new(*id, *t)).collect()
    }

    #[test]
    fn stops_before_overflowing_fragment() {
        let fs = frags(&[("a", "一二三"), ("b", "四五"), ("c", "六七八九")]);
        let chunk = next_chunk(&fs, 5, &TranslatedSet::new(), &HashSet::new()).expect("chunk");
        assert_eq!(chunk.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(chunk.char_len(), 5);
    }

    #[test]
    fn oversized_single_fragment_still_forms_a_chunk() {
        let fs = frags(&[("big", "很长很长很长的一段文字"), ("next", "短")]);
        let chunk = next_chunk(&fs, 3, &TranslatedSet::new(), &HashSet::new()).expect("chunk");
        assert_eq!(chunk.ids().collect::<Vec<_>>(), vec!["big"]);
    }

    #[test]
    fn skips_translated_and_abandoned_ids() {
        let fs = frags(&[("a", "甲"), ("b", "乙"), ("c", "丙"), ("d", "丁")]);
        let translated = TranslatedSet::from([("a".to_string(), "갑".to_string())]);
        let abandoned = HashSet::from(["c".to_string()]);
        let chunk = next_chunk(&fs, 100, &translated, &abandoned).expect("chunk");
        assert_eq!(chunk.ids().collect::<Vec<_>>(), vec!["b", "d"]);
        assert_eq!(remaining(&fs, &translated, &abandoned).count(), 2);
    }

    #[test]
    fn returns_none_when_everything_is_done() {
        let fs = frags(&[("a", "甲")]);
        let translated = TranslatedSet::from([("a".to_string(), "갑".to_string())]);
        assert!(next_chunk(&fs, 100, &translated, &HashSet::new()).is_none());
        assert!(next_chunk(&[], 100, &TranslatedSet::new(), &HashSet::new()).is_none());
    }

    #[test]
    fn non_empty_remainder_always_yields_non_empty_chunk() {
        let fs = frags(&[("a", "一"), ("b", "二三四五六七八九十")]);
        for budget in 0..12 {
            let chunk = next_chunk(&fs, budget, &TranslatedSet::new(), &HashSet::new())
                .expect("chunk");
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn plan_is_a_disjoint_ordered_partition() {
        let fs = frags(&[
            ("a", "一二"),
            ("b", "三四五"),
            ("c", "六"),
            ("d", "七八九十"),
            ("e", "十一"),
        ]);
        let translated = TranslatedSet::from([("c".to_string(), "육".to_string())]);
        let plan = plan_chunks(&fs, 5, &translated, &HashSet::new());
        let ids: Vec<Vec<&str>> = plan.iter().map(|c| c.ids().collect()).collect();
        assert_eq!(ids, vec![vec!["a", "b"], vec!["d"], vec!["e"]]);

        let mut seen = HashSet::new();
        for id in plan.iter().flat_map(|c| c.ids()) {
            assert!(seen.insert(id), "{id} planned twice");
        }
    }
}
