//! Подбор голосов для персонажей
//!
//! Каждой паре (персонаж, голос) назначается оценка, персонаж получает голос
//! с максимальной оценкой. Рассказчик назначается первым и не участвует в
//! подборе. Равные оценки разрешаются небольшой случайной добавкой; при
//! заданном зерне результат воспроизводим.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::voices::{Gender, Pitch, VoiceProfile, tokenize};
use crate::error::{Result, StoryvoxError};
use crate::script::models::{CharacterProfile, NARRATOR, ScriptSegment};

/// Штраф за несовпадение явно указанного пола
pub const GENDER_MISMATCH_PENALTY: f64 = -100.0;
/// Награда за совпадение пола
pub const GENDER_MATCH_BONUS: f64 = 30.0;
/// Награда за каждое совпадение описания с характеристиками голоса
pub const CUE_MATCH_BONUS: f64 = 15.0;
/// Не больше стольких совпадений описания учитывается в оценке
pub const MAX_CUE_MATCHES: usize = 3;
/// Штраф за голос, уже отданный другому персонажу
pub const REUSE_PENALTY: f64 = -10.0;
/// Верхняя граница случайной добавки
pub const TIE_BREAK_RANGE: f64 = 1.0;

const OLD_WORDS: &[&str] = &[
    "old", "elderly", "aged", "ancient", "senior", "grandfather", "grandmother", "grandpa", "grandma",
    "veteran", "старый", "пожилой", "старик", "старуха",
];
const OLD_TAGS: &[&str] = &["mature", "deep", "gravelly", "knowledgeable"];

const YOUNG_WORDS: &[&str] = &[
    "young", "child", "kid", "boy", "girl", "teen", "teenager", "youth", "little", "youthful",
    "молодой", "юный", "ребёнок", "ребенок",
];
const YOUNG_TAGS: &[&str] = &["youthful", "bright", "lively", "excitable"];

/// Соответствие говорящего и имени голоса
pub type VoiceMap = BTreeMap<String, String>;

/// Оценка совместимости персонажа и голоса без случайной добавки
pub fn score_voice(character: &CharacterProfile, voice: &VoiceProfile, already_used: bool) -> f64 {
    let mut score = 0.0;

    let mut gender = Gender::from_text(&character.gender);
    if gender.is_neutral() {
        gender = Gender::from_text(&character.description);
    }
    if !gender.is_neutral() && !voice.gender.is_neutral() {
        if gender == voice.gender {
            score += GENDER_MATCH_BONUS;
        } else {
            score += GENDER_MISMATCH_PENALTY;
        }
    }

    score += CUE_MATCH_BONUS * description_matches(&character.description, voice).min(MAX_CUE_MATCHES) as f64;

    if already_used {
        score += REUSE_PENALTY;
    }

    score
}

/// Количество совпадений описания персонажа с голосом
fn description_matches(description: &str, voice: &VoiceProfile) -> usize {
    let words = tokenize(description);
    let mentions = |list: &[&str]| words.iter().any(|word| list.contains(&word.as_str()));
    let mut matches = 0;

    if mentions(OLD_WORDS) {
        if OLD_TAGS.iter().any(|tag| voice.has_tag(tag)) {
            matches += 1;
        }
        if voice.pitch == Pitch::Low {
            matches += 1;
        }
    }
    if mentions(YOUNG_WORDS) {
        if YOUNG_TAGS.iter().any(|tag| voice.has_tag(tag)) {
            matches += 1;
        }
        if voice.pitch == Pitch::High {
            matches += 1;
        }
    }

    let distinct: HashSet<&String> = words.iter().collect();
    matches += voice.tags.iter().filter(|tag| distinct.contains(tag)).count();

    matches
}

/// Движок подбора голосов
pub struct CastingEngine {
    catalog: Vec<VoiceProfile>,
    narrator_voice: String,
    rng: StdRng,
    assignments: VoiceMap,
}

impl CastingEngine {
    /// Создать движок; без зерна случайная добавка берётся из энтропии
    pub fn new(catalog: Vec<VoiceProfile>, narrator_voice: impl Into<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            catalog,
            narrator_voice: narrator_voice.into(),
            rng,
            assignments: VoiceMap::new(),
        }
    }

    pub fn catalog(&self) -> &[VoiceProfile] {
        &self.catalog
    }

    /// Текущее распределение голосов
    pub fn assignments(&self) -> &VoiceMap {
        &self.assignments
    }

    /// Назначить голоса всем говорящим в сценарии
    ///
    /// Повторный вызов заменяет предыдущее распределение.
    pub fn cast(&mut self, roster: &[CharacterProfile], script: &[ScriptSegment]) -> Result<&VoiceMap> {
        if self.catalog.is_empty() {
            return Err(StoryvoxError::Casting("voice catalog is empty".to_string()));
        }

        let mut speakers: Vec<&str> = Vec::new();
        for segment in script {
            if !speakers.contains(&segment.speaker.as_str()) {
                speakers.push(&segment.speaker);
            }
        }

        let mut assignments = VoiceMap::new();
        let mut used: HashSet<String> = HashSet::new();

        if speakers.contains(&NARRATOR) {
            let voice = self.narrator_default();
            log::info!("Narrator cast as {}", voice);
            used.insert(voice.clone());
            assignments.insert(NARRATOR.to_string(), voice);
        }

        // Порядок персонажей из списка, затем говорящие без профиля
        let mut profiles: Vec<CharacterProfile> = roster
            .iter()
            .filter(|character| !character.is_narrator() && speakers.contains(&character.name.as_str()))
            .cloned()
            .collect();
        for speaker in &speakers {
            if *speaker != NARRATOR && !profiles.iter().any(|c| c.name == *speaker) {
                profiles.push(CharacterProfile::new(*speaker, "unknown", ""));
            }
        }

        for character in &profiles {
            if assignments.contains_key(&character.name) {
                continue;
            }
            let voice = self.best_voice(character, &used);
            log::info!("Character {} cast as {}", character.name, voice);
            used.insert(voice.clone());
            assignments.insert(character.name.clone(), voice);
        }

        self.assignments = assignments;
        Ok(&self.assignments)
    }

    /// Повторный подбор на тех же данных
    pub fn recast(&mut self, roster: &[CharacterProfile], script: &[ScriptSegment]) -> Result<&VoiceMap> {
        log::info!("Recasting {} characters", roster.len());
        self.cast(roster, script)
    }

    /// Заменить голос говорящего вручную
    pub fn assign(&mut self, speaker: &str, voice: &str) -> Result<()> {
        if !self.assignments.contains_key(speaker) {
            return Err(StoryvoxError::Casting(format!("speaker {} has no voice yet", speaker)));
        }
        let name = self
            .catalog
            .iter()
            .find(|profile| profile.name.eq_ignore_ascii_case(voice))
            .map(|profile| profile.name.clone())
            .ok_or_else(|| StoryvoxError::Casting(format!("unknown voice {}", voice)))?;

        log::info!("Speaker {} manually cast as {}", speaker, name);
        self.assignments.insert(speaker.to_string(), name);
        Ok(())
    }

    fn narrator_default(&self) -> String {
        self.catalog
            .iter()
            .find(|voice| voice.name.eq_ignore_ascii_case(&self.narrator_voice))
            .unwrap_or(&self.catalog[0])
            .name
            .clone()
    }

    fn best_voice(&mut self, character: &CharacterProfile, used: &HashSet<String>) -> String {
        let mut best: Option<(f64, &VoiceProfile)> = None;
        for voice in &self.catalog {
            let score = score_voice(character, voice, used.contains(&voice.name))
                + self.rng.r#gen::<f64>() * TIE_BREAK_RANGE;
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, voice));
            }
        }
        // Каталог не пуст, это проверено в cast
        best.map(|(_, voice)| voice.name.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casting::voices::builtin_catalog;

    fn voice(name: &str, gender: Gender, pitch: Pitch, tags: &[&str]) -> VoiceProfile {
        VoiceProfile::new(name, gender, pitch, tags)
    }

    fn line(speaker: &str) -> ScriptSegment {
        ScriptSegment::new(speaker, "text")
    }

    #[test]
    fn test_narrator_prefers_designated_voice() {
        let catalog = vec![
            voice("First", Gender::Female, Pitch::Medium, &["clear"]),
            voice("Charon", Gender::Male, Pitch::Low, &["deep"]),
        ];
        let mut engine = CastingEngine::new(catalog, "Charon", Some(1));
        let map = engine.cast(&[], &[line(NARRATOR)]).unwrap();
        assert_eq!(map[NARRATOR], "Charon");
    }

    #[test]
    fn test_narrator_falls_back_to_first_voice() {
        let catalog = vec![
            voice("First", Gender::Female, Pitch::Medium, &["clear"]),
            voice("Second", Gender::Male, Pitch::Low, &["deep"]),
        ];
        let mut engine = CastingEngine::new(catalog, "Missing", Some(1));
        let map = engine.cast(&[], &[line(NARRATOR)]).unwrap();
        assert_eq!(map[NARRATOR], "First");
    }

    #[test]
    fn test_gender_penalty_dominates_description_rewards() {
        let young_female = CharacterProfile::new("Mia", "female", "a young bright lively girl");
        let boyish = voice("Boyish", Gender::Male, Pitch::High, &["youthful", "bright", "lively"]);
        let plain = voice("Plain", Gender::Female, Pitch::Low, &["calm"]);

        let mismatch = score_voice(&young_female, &boyish, false) + TIE_BREAK_RANGE;
        let matched = score_voice(&young_female, &plain, true);
        assert!(matched > mismatch, "{} should beat {}", matched, mismatch);

        for seed in 0..20 {
            let mut engine = CastingEngine::new(vec![boyish.clone(), plain.clone()], "Plain", Some(seed));
            let map = engine.cast(&[young_female.clone()], &[line("Mia")]).unwrap();
            assert_eq!(map["Mia"], "Plain");
        }
    }

    #[test]
    fn test_age_cues_pick_matching_voice() {
        let elder = CharacterProfile::new("Grimm", "male", "an elderly wizard");
        let catalog = vec![
            voice("Kid", Gender::Male, Pitch::High, &["youthful"]),
            voice("Elder", Gender::Male, Pitch::Low, &["mature", "gravelly"]),
        ];
        let mut engine = CastingEngine::new(catalog, "Kid", Some(7));
        let map = engine.cast(&[elder], &[line("Grimm")]).unwrap();
        assert_eq!(map["Grimm"], "Elder");
    }

    #[test]
    fn test_prefers_distinct_voices() {
        let catalog = vec![
            voice("One", Gender::Female, Pitch::Medium, &["clear"]),
            voice("Two", Gender::Female, Pitch::Medium, &["clear"]),
        ];
        let roster = vec![
            CharacterProfile::new("Ann", "female", ""),
            CharacterProfile::new("Beth", "female", ""),
        ];
        let mut engine = CastingEngine::new(catalog, "One", Some(3));
        let map = engine.cast(&roster, &[line("Ann"), line("Beth")]).unwrap();
        assert_ne!(map["Ann"], map["Beth"]);
    }

    #[test]
    fn test_covers_every_active_speaker() {
        let roster = vec![
            CharacterProfile::new("Ann", "female", ""),
            CharacterProfile::new("Silent", "male", ""),
        ];
        let script = vec![line(NARRATOR), line("Ann"), line("Stranger")];
        let mut engine = CastingEngine::new(builtin_catalog(), "Charon", Some(11));
        let map = engine.cast(&roster, &script).unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.contains_key("Stranger"));
        assert!(!map.contains_key("Silent"));
    }

    #[test]
    fn test_seeded_casting_is_reproducible() {
        let roster = vec![
            CharacterProfile::new("Ann", "unknown", ""),
            CharacterProfile::new("Bob", "unknown", ""),
        ];
        let script = vec![line("Ann"), line("Bob")];

        let mut first = CastingEngine::new(builtin_catalog(), "Charon", Some(42));
        let mut second = CastingEngine::new(builtin_catalog(), "Charon", Some(42));
        assert_eq!(first.cast(&roster, &script).unwrap(), second.cast(&roster, &script).unwrap());
    }

    #[test]
    fn test_recast_replaces_mapping() {
        let mut engine = CastingEngine::new(builtin_catalog(), "Charon", Some(5));
        engine.cast(&[], &[line("Ann")]).unwrap();
        let map = engine.recast(&[], &[line("Bob")]).unwrap();
        assert!(map.contains_key("Bob"));
        assert!(!map.contains_key("Ann"));
    }

    #[test]
    fn test_empty_catalog_is_fatal() {
        let mut engine = CastingEngine::new(Vec::new(), "Charon", Some(1));
        assert!(matches!(engine.cast(&[], &[line("Ann")]), Err(StoryvoxError::Casting(_))));
    }

    #[test]
    fn test_manual_assignment() {
        let mut engine = CastingEngine::new(builtin_catalog(), "Charon", Some(3));
        engine.cast(&[], &[line(NARRATOR)]).unwrap();

        engine.assign(NARRATOR, "kore").unwrap();
        assert_eq!(engine.assignments()[NARRATOR], "Kore");
        assert!(engine.assign(NARRATOR, "NoSuchVoice").is_err());
        assert!(engine.assign("Stranger", "Kore").is_err());
    }
}
