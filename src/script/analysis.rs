//! Анализ текста и приведение результата к рабочему виду
//!
//! Сам анализ выполняет внешний сервис (см. [`ScriptAnalyzer`]). Здесь
//! нормализуются имена рассказчика, отбрасываются персонажи без реплик и
//! добавляются профили для говорящих, которых сервис забыл перечислить.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{AnalysisResult, CharacterProfile, NARRATOR, ScriptSegment};
use crate::credentials::Credential;
use crate::error::ProviderError;

/// Внешний сервис, превращающий текст в список персонажей и сценарий
#[async_trait]
pub trait ScriptAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str, credential: &Credential) -> Result<AnalysisResult, ProviderError>;
}

// Варианты имени рассказчика на разных языках
static NARRATOR_ALIASES: &[&str] = &[
    "narrator",
    "narration",
    "the narrator",
    "narrador",
    "narradora",
    "narrateur",
    "narratrice",
    "narratore",
    "erzähler",
    "erzählerin",
    "verteller",
    "рассказчик",
    "повествователь",
    "автор",
    "оповідач",
    "旁白",
    "叙述者",
    "ナレーター",
    "語り手",
    "내레이터",
    "해설",
];

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\(\[].*?[\)\]]\s*").unwrap());

/// Является ли имя одним из вариантов имени рассказчика
pub fn is_narrator_alias(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    if NARRATOR_ALIASES.contains(&lowered.as_str()) {
        return true;
    }
    let stripped = PARENTHESIZED.replace_all(&lowered, " ");
    NARRATOR_ALIASES.contains(&stripped.trim())
}

/// Обрезать текст до `max_chars` символов по границе символа
pub fn truncate_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Привести результат анализа к согласованному виду
///
/// * все варианты имени рассказчика заменяются на `Narrator`;
/// * пустые реплики удаляются;
/// * персонажи без реплик отбрасываются, повторы по имени схлопываются;
/// * для говорящих без профиля создаётся минимальный профиль.
pub fn normalize_analysis(raw: AnalysisResult) -> AnalysisResult {
    let script: Vec<ScriptSegment> = raw
        .script
        .into_iter()
        .filter_map(|segment| {
            let text = segment.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(ScriptSegment::new(canonical_speaker(&segment.speaker), text))
        })
        .collect();

    let mut characters: Vec<CharacterProfile> = Vec::new();
    for mut character in raw.characters {
        character.name = canonical_speaker(&character.name);
        let speaks = script.iter().any(|segment| segment.speaker == character.name);
        if !speaks {
            log::debug!("Dropping character without lines: {}", character.name);
            continue;
        }
        if characters.iter().any(|existing| existing.name == character.name) {
            continue;
        }
        characters.push(character);
    }

    for segment in &script {
        if characters.iter().any(|character| character.name == segment.speaker) {
            continue;
        }
        let profile = if segment.speaker == NARRATOR {
            CharacterProfile::new(NARRATOR, "neutral", "Narrator of the story")
        } else {
            log::debug!("Synthesizing profile for unlisted speaker: {}", segment.speaker);
            CharacterProfile::new(segment.speaker.clone(), "unknown", "")
        };
        characters.push(profile);
    }

    AnalysisResult { characters, script }
}

fn canonical_speaker(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || is_narrator_alias(trimmed) {
        NARRATOR.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrator_aliases() {
        assert!(is_narrator_alias("Narrator"));
        assert!(is_narrator_alias("  NARRADOR "));
        assert!(is_narrator_alias("Рассказчик"));
        assert!(is_narrator_alias("旁白"));
        assert!(is_narrator_alias("Narrator (voice)"));
        assert!(!is_narrator_alias("Alice"));
    }

    #[test]
    fn test_truncate_input_respects_char_boundaries() {
        assert_eq!(truncate_input("привет", 3), "при");
        assert_eq!(truncate_input("short", 100), "short");
        assert_eq!(truncate_input("", 5), "");
    }

    #[test]
    fn test_normalize_analysis() {
        let raw = AnalysisResult {
            characters: vec![
                CharacterProfile::new("Alice", "female", "young girl"),
                CharacterProfile::new("Ghost", "male", "never speaks"),
                CharacterProfile::new("Alice", "female", "duplicate"),
            ],
            script: vec![
                ScriptSegment::new("Narrador", "Once upon a time."),
                ScriptSegment::new("Alice", "Hello!"),
                ScriptSegment::new("Bob", "  Hi.  "),
                ScriptSegment::new("Alice", "   "),
                ScriptSegment::new("", "And so it went."),
            ],
        };

        let result = normalize_analysis(raw);

        let speakers: Vec<&str> = result.script.iter().map(|s| s.speaker.as_str()).collect();
        assert_eq!(speakers, vec![NARRATOR, "Alice", "Bob", NARRATOR]);
        assert_eq!(result.script[2].text, "Hi.");

        let names: Vec<&str> = result.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", NARRATOR, "Bob"]);
        assert_eq!(result.characters[0].description, "young girl");
        assert_eq!(result.characters[2].gender, "unknown");
    }

    #[test]
    fn test_narrator_profile_kept_when_listed_under_alias() {
        let raw = AnalysisResult {
            characters: vec![CharacterProfile::new("Erzähler", "male", "calm old voice")],
            script: vec![ScriptSegment::new("narrator", "Text.")],
        };
        let result = normalize_analysis(raw);
        assert_eq!(result.characters.len(), 1);
        assert_eq!(result.characters[0].name, NARRATOR);
        assert_eq!(result.characters[0].description, "calm old voice");
    }
}
