//! Основной файл библиотеки storyvox
//!
//! Библиотека превращает длинный художественный текст в одну многоголосую
//! аудиодорожку: внешний сервис размечает текст по говорящим, каждому
//! говорящему подбирается голос, реплики синтезируются параллельно через
//! пул ключей с лимитами и собираются в WAV в исходном порядке.

pub mod casting;
pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod script;
pub mod tts;
pub mod utils;

pub use casting::{CastingEngine, VoiceMap, VoiceProfile};
pub use config::StoryvoxConfig;
pub use credentials::CredentialPool;
pub use diagnostics::DiagnosticLog;
pub use error::{ProviderError, Result, StoryvoxError};
pub use media::{FinalTrack, encode_wav, write_wav};
pub use pipeline::{PipelineStage, Storyvox};
pub use scheduler::{GenerationReport, GenerationScheduler};
pub use script::{GeminiAnalyzer, ScriptAnalyzer};
pub use tts::{GeminiSpeech, SpeechSynthesizer};
