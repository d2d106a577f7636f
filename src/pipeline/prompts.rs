use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_SYSTEM_PROMPT_FILE: &str = "system.txt";

/// Loads the system instruction.
///
/// An explicitly configured file must exist. Without one, `prompts/system.txt` next to
/// the config is used when present, else the built-in instruction.
pub fn load_system_prompt(config_dir: &Path, configured: Option<&str>) -> anyhow::Result<String> {
    if let Some(rel) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        let mut p = PathBuf::from(rel);
        if p.is_relative() {
            p = config_dir.join(&p);
        }
        if !p.exists() {
            return Err(anyhow!(
                "system prompt file not found: {} (run: game-loc-translator --init-config)",
                p.display()
            ));
        }
        return read_prompt(&p);
    }

    let p = config_dir
        .join(DEFAULT_PROMPTS_DIR)
        .join(DEFAULT_SYSTEM_PROMPT_FILE);
    if p.exists() {
        return read_prompt(&p);
    }
    Ok(DEFAULT_SYSTEM_PROMPT.to_string())
}

fn read_prompt(path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read prompt: {}", path.display()))?;
    let text = text.trim_start_matches('\u{FEFF}').trim();
    if text.is_empty() {
        return Err(anyhow!("prompt file is empty: {}", path.display()));
    }
    Ok(text.to_string())
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![(DEFAULT_SYSTEM_PROMPT_FILE, DEFAULT_SYSTEM_PROMPT)]
}

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a Chinese to Korean translator specializing in wuxia game localization. Follow these guidelines for translation:

1. Markup and placeholder handling:
- Keep {placeholder} unchanged and add appropriate Korean particles
  e.g.) "{player_name}获得了{item_count}个{item_name}"
        → "{player_name}이(가) {item_name}을(를) {item_count}개 획득했습니다"
- Preserve <tag></tag> structure and only translate the text inside
  e.g.) "<color>获得{item_count}个{item_name}</color>"
        → "<color>{item_name}을(를) {item_count}개 획득했습니다</color>"

2. Translation principles:
- Consider meaning and rhythm when translating faction names, character names, and martial arts skills
- Translate UI concisely and story text with appropriate style
- Follow Korean wuxia conventions for genre terms (기공, 내공, etc.)
- Keep commonly used Chinese idioms in Korean hanja form, localize unfamiliar ones
- Choose contextually appropriate translations for single-character words
  e.g.) "魂" can be "혼" or "넋" depending on context
  e.g.) "气" can be "기" or "공기" depending on context

3. Terms extraction:
- Add source text and translated terms to new_terms:
  * Complete item and skill names
  * Full character/faction names
  * System features and mechanics
  * Recurring multi-character game terms
  * Special effects and states
- Do NOT add:
  * Single characters that form parts of longer terms
  * Generic single-character words with multiple contextual meanings

4. Input/Output format:
Input: {
    "terms_dictionary": {"chinese": "korean"},     // optional, existing translations
    "texts": {"id": "source text"}                // required
}

Output: {
    "result": {"id": "translated text with escaped quotes"},
    "comment": "review notes",                    // optional, only include if review or clarification needed
    "new_terms": {"chinese": "korean"}            // only add complete terms, not components
}

Note: Always escape quotes in text content with backslash: \"example\""#;

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{load_system_prompt, DEFAULT_SYSTEM_PROMPT};

    #[test]
    fn falls_back_to_builtin() {
        let dir = TempDir::new().expect("tempdir");
        let p = load_system_prompt(dir.path(), None).expect("prompt");
        assert_eq!(p, DEFAULT_SYSTEM_PROMPT);
        assert!(p.contains("terms_dictionary"));
        assert!(p.contains("new_terms"));
    }

    #[test]
    fn prefers_prompt_file_next_to_config() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("prompts")).expect("mkdir");
        std::fs::write(dir.path().join("prompts/system.txt"), "\u{FEFF}custom\n").expect("write");
        assert_eq!(load_system_prompt(dir.path(), None).expect("prompt"), "custom");
    }

    #[test]
    fn configured_file_must_exist() {
        let dir = TempDir::new().expect("tempdir");
        assert!(load_system_prompt(dir.path(), Some("nope.txt")).is_err());
    }
}
