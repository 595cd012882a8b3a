//! Интеграция с провайдером синтеза речи

pub mod gemini;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::ProviderError;

pub use gemini::GeminiSpeech;

/// Провайдер синтеза речи
///
/// Возвращает аудио в base64: сырой PCM, 16 бит, little-endian, моно,
/// частота задаётся контрактом провайдера. Превышение лимита ключа должно
/// приходить как [`ProviderError::RateLimited`].
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str, credential: &Credential) -> Result<String, ProviderError>;
}
