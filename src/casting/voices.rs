//! Каталог голосов провайдера

use serde::{Deserialize, Serialize};

/// Пол голоса или персонажа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

const FEMALE_WORDS: &[&str] = &[
    "female", "woman", "women", "girl", "lady", "she", "her", "mother", "daughter", "sister", "queen",
    "princess", "wife", "feminine", "женщина", "женский", "девушка", "девочка", "мать",
];

const MALE_WORDS: &[&str] = &[
    "male", "man", "men", "boy", "gentleman", "he", "him", "his", "father", "son", "brother", "king",
    "prince", "husband", "masculine", "мужчина", "мужской", "парень", "мальчик", "отец",
];

impl Gender {
    /// Определить пол по свободному тексту; при отсутствии признаков `Neutral`
    pub fn from_text(text: &str) -> Self {
        let words = tokenize(text);
        if words.iter().any(|word| FEMALE_WORDS.contains(&word.as_str())) {
            Gender::Female
        } else if words.iter().any(|word| MALE_WORDS.contains(&word.as_str())) {
            Gender::Male
        } else {
            Gender::Neutral
        }
    }

    pub fn is_neutral(self) -> bool {
        self == Gender::Neutral
    }
}

/// Высота голоса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pitch {
    Low,
    Medium,
    High,
}

/// Голос из каталога провайдера
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub name: String,
    pub gender: Gender,
    pub pitch: Pitch,
    /// Характеристики голоса в нижнем регистре
    pub tags: Vec<String>,
}

impl VoiceProfile {
    pub fn new(name: &str, gender: Gender, pitch: Pitch, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            gender,
            pitch,
            tags: tags.iter().map(|tag| tag.to_lowercase()).collect(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Разбить текст на слова в нижнем регистре
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Встроенный каталог готовых голосов
pub fn builtin_catalog() -> Vec<VoiceProfile> {
    use Gender::{Female, Male};
    use Pitch::{High, Low, Medium};

    vec![
        VoiceProfile::new("Charon", Male, Low, &["informative", "deep", "calm"]),
        VoiceProfile::new("Zephyr", Female, High, &["bright", "youthful"]),
        VoiceProfile::new("Puck", Male, Medium, &["upbeat", "lively"]),
        VoiceProfile::new("Kore", Female, Medium, &["firm", "confident"]),
        VoiceProfile::new("Fenrir", Male, Medium, &["excitable", "energetic"]),
        VoiceProfile::new("Leda", Female, High, &["youthful", "bright"]),
        VoiceProfile::new("Orus", Male, Low, &["firm", "deep"]),
        VoiceProfile::new("Aoede", Female, Medium, &["breezy", "light"]),
        VoiceProfile::new("Callirrhoe", Female, Medium, &["easy-going", "relaxed"]),
        VoiceProfile::new("Autonoe", Female, High, &["bright", "cheerful"]),
        VoiceProfile::new("Enceladus", Male, Low, &["breathy", "soft"]),
        VoiceProfile::new("Iapetus", Male, Medium, &["clear"]),
        VoiceProfile::new("Umbriel", Male, Medium, &["easy-going", "relaxed"]),
        VoiceProfile::new("Algieba", Male, Low, &["smooth", "warm"]),
        VoiceProfile::new("Despina", Female, Medium, &["smooth", "warm"]),
        VoiceProfile::new("Erinome", Female, Medium, &["clear"]),
        VoiceProfile::new("Algenib", Male, Low, &["gravelly", "rough", "mature"]),
        VoiceProfile::new("Rasalgethi", Male, Medium, &["informative"]),
        VoiceProfile::new("Laomedeia", Female, High, &["upbeat", "lively"]),
        VoiceProfile::new("Achernar", Female, High, &["soft", "gentle"]),
        VoiceProfile::new("Alnilam", Male, Low, &["firm", "stern"]),
        VoiceProfile::new("Schedar", Male, Medium, &["even", "calm"]),
        VoiceProfile::new("Gacrux", Female, Low, &["mature", "deep"]),
        VoiceProfile::new("Pulcherrima", Female, Medium, &["forward", "confident"]),
        VoiceProfile::new("Achird", Male, Medium, &["friendly", "warm"]),
        VoiceProfile::new("Zubenelgenubi", Male, Medium, &["casual"]),
        VoiceProfile::new("Vindemiatrix", Female, Medium, &["gentle", "soft"]),
        VoiceProfile::new("Sadachbia", Male, High, &["lively", "youthful"]),
        VoiceProfile::new("Sadaltager", Male, Low, &["knowledgeable", "mature"]),
        VoiceProfile::new("Sulafat", Female, Medium, &["warm"]),
    ]
}
