use serde::{Deserialize, Serialize};

/// Зарезервированное имя рассказчика
pub const NARRATOR: &str = "Narrator";

/// Персонаж, найденный анализом текста
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    /// Пол в свободной форме ("female", "male", "unknown", ...)
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub description: String,
}

impl CharacterProfile {
    pub fn new(name: impl Into<String>, gender: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            description: description.into(),
        }
    }

    pub fn is_narrator(&self) -> bool {
        self.name == NARRATOR
    }
}

/// Одна реплика сценария
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub speaker: String,
    pub text: String,
}

impl ScriptSegment {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Результат анализа текста: список персонажей и сценарий
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub characters: Vec<CharacterProfile>,
    #[serde(default)]
    pub script: Vec<ScriptSegment>,
}
