//! Модуль обработки ошибок библиотеки storyvox
//!
//! Содержит ошибки уровня запуска (`StoryvoxError`) и ошибки отдельного
//! запроса к провайдеру. Первые прерывают генерацию,
//! вторые (`ProviderError`) относятся к одному запросу к внешнему сервису
//! и обрабатываются вызывающим кодом.

use std::time::Duration;
use thiserror::Error;

/// Ошибки библиотеки storyvox
#[derive(Debug, Error)]
pub enum StoryvoxError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка WAV-кодирования
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка анализа текста
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Ошибка подбора голосов
    #[error("Casting error: {0}")]
    Casting(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ни один ключ не стал доступен за отведённое время
    #[error("No usable credentials: {0}")]
    NoCredentials(String),

    /// Не удалось синтезировать ни одного сегмента
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Запуск был отменён
    #[error("Run cancelled")]
    Cancelled,

    /// Недопустимый переход конвейера
    #[error("Invalid pipeline transition: {0}")]
    InvalidTransition(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

/// Тип Result для библиотеки storyvox
pub type Result<T> = std::result::Result<T, StoryvoxError>;

/// Ошибка одного запроса к внешнему провайдеру
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Провайдер сообщил о превышении лимита для ключа
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Запрос не уложился в таймаут
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Ответ не содержит аудио
    #[error("provider returned empty audio")]
    EmptyAudio,

    /// Ответ не удалось разобрать
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Сетевая ошибка или ошибка статуса
    #[error("provider request failed: {0}")]
    Http(String),
}

impl ProviderError {
    /// Повторяется ли запрос после этой ошибки
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}
