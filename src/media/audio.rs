//! Модуль для работы с PCM-аудио
//!
//! Провайдер возвращает сырой PCM (16 бит, little-endian) в base64. Здесь он
//! декодируется в семплы, а к каждому фрагменту добавляется пауза.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::error::ProviderError;

/// Декодированный фрагмент аудио одного сегмента
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Индекс сегмента в сценарии
    pub index: usize,
    /// Семплы PCM, каналы чередуются
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(index: usize, samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            index,
            samples,
            sample_rate,
            channels,
        }
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Длительность в секундах
    pub fn duration_secs(&self) -> f64 {
        duration_in_seconds(self.frames(), self.sample_rate)
    }

    /// Добавить тишину заданной длительности в конец
    pub fn append_silence(&mut self, silence_ms: u32) {
        let frames = silence_frames(silence_ms, self.sample_rate);
        let len = self.samples.len() + frames * self.channels as usize;
        self.samples.resize(len, 0);
    }
}

/// Количество кадров тишины для заданной длительности
pub fn silence_frames(silence_ms: u32, sample_rate: u32) -> usize {
    (sample_rate as u64 * silence_ms as u64 / 1000) as usize
}

/// Длительность аудио в секундах по количеству кадров
pub fn duration_in_seconds(frames: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}

/// Декодировать сырой PCM (16 бит, little-endian)
///
/// Нечётный завершающий байт отбрасывается.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<i16> {
    if bytes.len() % 2 != 0 {
        log::warn!("PCM payload has odd length {}, dropping trailing byte", bytes.len());
    }
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Декодировать ответ провайдера в фрагмент аудио
pub fn decode_chunk(
    index: usize,
    payload: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioChunk, ProviderError> {
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| ProviderError::InvalidResponse(format!("Base64 decode error: {}", e)))?;

    let samples = decode_pcm16(&bytes);
    if samples.is_empty() {
        return Err(ProviderError::EmptyAudio);
    }

    Ok(AudioChunk::new(index, samples, sample_rate, channels))
}

/// Закодировать семплы в base64 так же, как это делает провайдер
pub fn encode_pcm16_base64(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|sample| sample.to_le_bytes()).collect();
    BASE64.encode(bytes)
}
