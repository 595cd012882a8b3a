//! Подбор голосов

pub mod engine;
pub mod voices;

pub use engine::{CastingEngine, VoiceMap, score_voice};
pub use voices::{Gender, Pitch, VoiceProfile, builtin_catalog};
