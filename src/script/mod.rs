//! Сценарий: модель данных, анализ текста и оптимизация сегментов

pub mod analysis;
pub mod gemini;
pub mod models;
pub mod optimizer;

pub use analysis::{ScriptAnalyzer, normalize_analysis, truncate_input};
pub use gemini::GeminiAnalyzer;
pub use models::{AnalysisResult, CharacterProfile, NARRATOR, ScriptSegment};
pub use optimizer::optimize;
