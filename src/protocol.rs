use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::Chunk;
use crate::terminology::RelevantTerms;

static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("fence regex"));

/// Payload sent as the single user message of a request.
#[derive(Debug, Serialize)]
pub struct TranslationRequest<'a> {
    pub terms_dictionary: &'a RelevantTerms,
    pub texts: &'a Chunk,
}

impl<'a> TranslationRequest<'a> {
    pub fn new(terms_dictionary: &'a RelevantTerms, texts: &'a Chunk) -> Self {
        Self {
            terms_dictionary,
            texts,
        }
    }

    pub fn to_payload(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("serialize request")
    }
}

/// Decoded reply. Map values stay untyped so one `null` does not sink the rest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ParsedResponse {
    #[serde(default)]
    pub result: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub new_terms: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Why a reply could not be used.
#[derive(Debug)]
pub enum ParseFailure {
    Empty,
    NoJsonObject,
    Malformed(serde_json::Error),
    NoTranslations { unknown_ids: Vec<String> },
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty response"),
            Self::NoJsonObject => f.write_str("no JSON object in response"),
            Self::Malformed(e) => write!(f, "malformed response JSON: {e}"),
            Self::NoTranslations { unknown_ids } if unknown_ids.is_empty() => {
                f.write_str("response translated none of the chunk's texts")
            }
            Self::NoTranslations { unknown_ids } => write!(
                f,
                "response translated none of the chunk's texts (unknown ids: {})",
                unknown_ids.join(", ")
            ),
        }
    }
}

impl std::error::Error for ParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

/// Translations in a reply that belong to the chunk it answers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AcceptedTranslations {
    pub translations: BTreeMap<String, String>,
    pub unknown_ids: Vec<String>,
    /// Chunk ids whose value was not a string. Also listed in `missing_ids`.
    pub non_text_ids: Vec<String>,
    pub missing_ids: Vec<String>,
}

impl ParsedResponse {
    /// Splits `result` against `chunk`. Fails when nothing in it answers the chunk.
    pub fn translations_for(&self, chunk: &Chunk) -> Result<AcceptedTranslations, ParseFailure> {
        let mut accepted = AcceptedTranslations::default();
        if let Some(result) = &self.result {
            for (id, value) in result {
                if !chunk.contains_id(id) {
                    accepted.unknown_ids.push(id.clone());
                    continue;
                }
                match value.as_str() {
                    Some(text) => {
                        accepted.translations.insert(id.clone(), text.to_string());
                    }
                    None => accepted.non_text_ids.push(id.clone()),
                }
            }
        }
        if accepted.translations.is_empty() {
            return Err(ParseFailure::NoTranslations {
                unknown_ids: accepted.unknown_ids,
            });
        }
        accepted.missing_ids = chunk
            .ids()
            .filter(|id| !accepted.translations.contains_key(*id))
            .map(str::to_string)
            .collect();
        Ok(accepted)
    }

    /// String-valued `new_terms` entries, plus the source terms whose value was not a string.
    #[must_use]
    pub fn text_terms(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let mut terms = BTreeMap::new();
        let mut dropped = Vec::new();
        for (src, value) in self.new_terms.iter().flatten() {
            match value.as_str() {
                Some(tgt) => {
                    terms.insert(src.clone(), tgt.to_string());
                }
                None => dropped.push(src.clone()),
            }
        }
        (terms, dropped)
    }

    fn has_known_field(&self) -> bool {
        self.result.is_some() || self.new_terms.is_some() || self.comment.is_some()
    }

    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Decodes the backend's reply text.
///
/// Tolerates a surrounding Markdown code fence and leading chatter. Decoding is tried
/// from each `{` in turn until an object carrying a reply field decodes; anything
/// after that object is ignored. A decode error wins over objects without reply fields.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ParseFailure> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseFailure::Empty);
    }
    let text = match CODE_FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str()),
        None => text,
    };

    let mut first_err = None;
    let mut fieldless = None;
    for (start, _) in text.match_indices('{') {
        let mut de = serde_json::Deserializer::from_str(&text[start..]);
        match ParsedResponse::deserialize(&mut de) {
            Ok(parsed) if parsed.has_known_field() => return Ok(parsed),
            Ok(parsed) => {
                fieldless.get_or_insert(parsed);
            }
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    match (first_err, fieldless) {
        (Some(e), _) => Err(ParseFailure::Malformed(e)),
        (None, Some(parsed)) => Ok(parsed),
        (None, None) => Err(ParseFailure::NoJsonObject),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_response, ParseFailure, TranslationRequest};
    use crate::ir::{Chunk, Fragment};
    use crate::terminology::Glossary;

    fn chunk() -> Chunk {
        Chunk::new(vec![Fragment::new("A", "你好"), Fragment::new("B", "世界")]).expect("chunk")
    }

    #[test]
    fn request_payload_has_both_fields() {
        let glossary: Glossary = [("世界".to_string(), "세계".to_string())].into_iter().collect();
        let c = chunk();
        let terms = glossary.relevant_for_texts(c.texts());
        let payload = TranslationRequest::new(&terms, &c).to_payload().expect("payload");
        assert_eq!(
            payload,
            r#"{"terms_dictionary":{"世界":"세계"},"texts":{"A":"你好","B":"世界"}}"#
        );
    }

    #[test]
    fn parses_plain_reply() {
        let r = parse_response(r#"{"result":{"A":"안녕","B":"세계"},"new_terms":{}}"#)
            .expect("parse");
        let accepted = r.translations_for(&chunk()).expect("accepted");
        assert_eq!(accepted.translations.len(), 2);
        assert!(accepted.missing_ids.is_empty());
        assert_eq!(r.new_terms.map(|t| t.len()), Some(0));
        assert_eq!(r.comment, None);
    }

    #[test]
    fn parses_fenced_reply_with_comment() {
        let raw = "```json\n{\"result\":{\"A\":\"안녕\"},\"comment\":\"B는 생략\"}\n```";
        let r = parse_response(raw).expect("parse");
        assert_eq!(r.comment(), Some("B는 생략"));
        let accepted = r.translations_for(&chunk()).expect("accepted");
        assert_eq!(accepted.missing_ids, vec!["B".to_string()]);
    }

    #[test]
    fn skips_leading_chatter_and_trailing_text() {
        let r = parse_response("Here you go: {\"result\":{\"B\":\"세계\"}} hope it helps")
            .expect("parse");
        let accepted = r.translations_for(&chunk()).expect("accepted");
        assert_eq!(accepted.translations.get("B").map(String::as_str), Some("세계"));
    }

    #[test]
    fn placeholder_in_chatter_does_not_hide_the_object() {
        let raw = r#"Kept {player_name} as-is: {"result":{"A":"{player_name}님"}}"#;
        let r = parse_response(raw).expect("parse");
        let accepted = r.translations_for(&chunk()).expect("accepted");
        assert_eq!(
            accepted.translations.get("A").map(String::as_str),
            Some("{player_name}님")
        );
    }

    #[test]
    fn non_string_values_are_set_aside() {
        let r = parse_response(
            r#"{"result":{"A":"안녕","B":null},"new_terms":{"你好":"안녕","世界":7}}"#,
        )
        .expect("parse");
        let accepted = r.translations_for(&chunk()).expect("accepted");
        assert_eq!(accepted.translations.len(), 1);
        assert_eq!(accepted.non_text_ids, vec!["B".to_string()]);
        assert_eq!(accepted.missing_ids, vec!["B".to_string()]);

        let (terms, dropped) = r.text_terms();
        assert_eq!(terms.get("你好").map(String::as_str), Some("안녕"));
        assert_eq!(terms.len(), 1);
        assert_eq!(dropped, vec!["世界".to_string()]);
    }

    #[test]
    fn only_null_translations_is_a_failure() {
        let r = parse_response(r#"{"result":{"A":null}}"#).expect("parse");
        assert!(matches!(
            r.translations_for(&chunk()),
            Err(ParseFailure::NoTranslations { .. })
        ));
    }

    #[test]
    fn rejects_empty_and_non_json() {
        assert!(matches!(parse_response("  \n"), Err(ParseFailure::Empty)));
        assert!(matches!(parse_response("sorry, no"), Err(ParseFailure::NoJsonObject)));
        assert!(matches!(
            parse_response(r#"{"result":{"A":"안녕"#),
            Err(ParseFailure::Malformed(_))
        ));
    }

    #[test]
    fn reply_for_other_ids_is_not_accepted() {
        let r = parse_response(r#"{"result":{"Z":"무관"}}"#).expect("parse");
        match r.translations_for(&chunk()) {
            Err(ParseFailure::NoTranslations { unknown_ids }) => {
                assert_eq!(unknown_ids, vec!["Z".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let r = parse_response(r#"{"comment":"nothing"}"#).expect("parse");
        assert!(r.translations_for(&chunk()).is_err());
    }
}
