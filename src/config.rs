//! Модуль конфигурации библиотеки storyvox
//!
//! Конфигурация собирается в три слоя: значения по умолчанию, JSON-файл
//! (все поля необязательны) и переменные окружения `STORYVOX_*`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoryvoxError};

/// Настройки пула ключей доступа
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Список ключей через запятую, точку с запятой или пробел
    pub list: String,
    /// Минимальная длина ключа; более короткие записи отбрасываются
    pub min_length: usize,
    /// Лимит запросов одного ключа в пределах окна
    pub max_requests_per_window: u32,
    /// Длина окна подсчёта запросов в секундах
    pub window_secs: u64,
    /// Длительность блокировки ключа после ответа о превышении лимита
    pub suspend_ms: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            list: String::new(),
            min_length: 20,
            max_requests_per_window: 10,
            window_secs: 60,
            suspend_ms: 60_000,
        }
    }
}

impl CredentialConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn suspend_duration(&self) -> Duration {
        Duration::from_millis(self.suspend_ms)
    }
}

/// Настройки планировщика генерации
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Верхняя граница одновременных запросов
    pub max_concurrency: usize,
    /// Пауза между проверками пула, когда все ключи заняты
    pub poll_interval_ms: u64,
    /// Максимум попыток для сегмента, получившего отказ по лимиту
    pub max_attempts: u32,
    /// Таймаут одного запроса синтеза
    pub request_timeout_secs: u64,
    /// Сколько ждать свободного ключа, прежде чем прервать запуск
    pub max_credential_wait_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            poll_interval_ms: 1_000,
            max_attempts: 8,
            request_timeout_secs: 90,
            max_credential_wait_secs: Some(600),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_credential_wait(&self) -> Option<Duration> {
        self.max_credential_wait_secs.map(Duration::from_secs)
    }
}

/// Параметры аудио, которые задаёт контракт провайдера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Частота дискретизации ответа провайдера
    pub sample_rate: u32,
    /// Количество каналов ответа провайдера
    pub channels: u16,
    /// Пауза после каждого сегмента в миллисекундах
    pub silence_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            silence_ms: 500,
        }
    }
}

/// Настройки подбора голосов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CastingConfig {
    /// Голос рассказчика по умолчанию
    pub narrator_voice: String,
    /// Зерно для разрешения равенства оценок; без него выбор недетерминирован
    pub seed: Option<u64>,
}

impl Default for CastingConfig {
    fn default() -> Self {
        Self {
            narrator_voice: "Charon".to_string(),
            seed: None,
        }
    }
}

/// Настройки подготовки сценария
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Предел длины объединённого сегмента в символах
    pub max_segment_chars: usize,
    /// Сколько символов исходного текста отправлять на анализ
    pub analysis_max_chars: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: 800,
            analysis_max_chars: 30_000,
        }
    }
}

/// Адреса и модели внешних сервисов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub tts_model: String,
    pub analysis_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            analysis_model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryvoxConfig {
    pub credentials: CredentialConfig,
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    pub casting: CastingConfig,
    pub script: ScriptConfig,
    pub provider: ProviderConfig,
}

impl StoryvoxConfig {
    /// Загрузить конфигурацию из JSON-файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoryvoxError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Применить переопределения из переменных окружения
    pub fn apply_env_overrides(&mut self) {
        if let Ok(list) = std::env::var("STORYVOX_CREDENTIALS") {
            self.credentials.list = list;
        }
        if let Some(value) = env_parse::<usize>("STORYVOX_MAX_CONCURRENCY") {
            self.scheduler.max_concurrency = value;
        }
        if let Some(value) = env_parse::<u64>("STORYVOX_CASTING_SEED") {
            self.casting.seed = Some(value);
        }
        if let Ok(model) = std::env::var("STORYVOX_TTS_MODEL") {
            self.provider.tts_model = model;
        }
        if let Ok(model) = std::env::var("STORYVOX_ANALYSIS_MODEL") {
            self.provider.analysis_model = model;
        }
    }

    /// Проверить согласованность значений
    pub fn validate(&self) -> Result<()> {
        if self.credentials.window_secs == 0 {
            return Err(StoryvoxError::Configuration("credential window must be positive".to_string()));
        }
        if self.credentials.max_requests_per_window == 0 {
            return Err(StoryvoxError::Configuration(
                "max_requests_per_window must be positive".to_string(),
            ));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(StoryvoxError::Configuration("poll_interval_ms must be positive".to_string()));
        }
        if self.scheduler.request_timeout_secs == 0 {
            return Err(StoryvoxError::Configuration("request_timeout_secs must be positive".to_string()));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(StoryvoxError::Configuration("max_attempts must be positive".to_string()));
        }
        if self.script.max_segment_chars == 0 {
            return Err(StoryvoxError::Configuration("max_segment_chars must be positive".to_string()));
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(StoryvoxError::Configuration(
                "audio sample rate and channel count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring invalid value for {}: {}", key, raw);
            None
        }
    }
}
