//! Сборка итоговой дорожки из фрагментов
//!
//! Фрагменты приходят от планировщика в массиве, проиндексированном по
//! сегментам сценария. Пустые ячейки (сегменты, которые не удалось
//! синтезировать) пропускаются; порядок определяется только индексом.

use super::audio::{AudioChunk, duration_in_seconds};
use crate::error::{Result, StoryvoxError};

/// Частота пустой дорожки по умолчанию
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
/// Количество каналов пустой дорожки по умолчанию
pub const DEFAULT_CHANNELS: u16 = 1;

/// Итоговая дорожка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTrack {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Индексы сегментов, вошедших в дорожку
    pub segments: Vec<usize>,
}

impl FinalTrack {
    /// Пустая, но корректная дорожка
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
            segments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        duration_in_seconds(self.frames(), self.sample_rate)
    }
}

/// Склеить фрагменты в порядке возрастания индекса сегмента
///
/// Частота и число каналов должны совпадать у всех фрагментов: пересэмплирование
/// не выполняется. Если непустых фрагментов нет, возвращается пустая дорожка
/// с параметрами по умолчанию.
pub fn assemble(slots: &[Option<AudioChunk>]) -> Result<FinalTrack> {
    let mut chunks: Vec<&AudioChunk> = slots
        .iter()
        .flatten()
        .filter(|chunk| !chunk.samples.is_empty())
        .collect();
    chunks.sort_by_key(|chunk| chunk.index);

    let Some(first) = chunks.first() else {
        log::warn!("No audio chunks to assemble, producing empty track");
        return Ok(FinalTrack::empty(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS));
    };

    let sample_rate = first.sample_rate;
    let channels = first.channels;
    if let Some(odd) = chunks
        .iter()
        .find(|chunk| chunk.sample_rate != sample_rate || chunk.channels != channels)
    {
        return Err(StoryvoxError::AudioProcessing(format!(
            "chunk {} has format {} Hz/{} ch, expected {} Hz/{} ch",
            odd.index, odd.sample_rate, odd.channels, sample_rate, channels
        )));
    }

    let total: usize = chunks.iter().map(|chunk| chunk.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);
    let mut segments = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        samples.extend_from_slice(&chunk.samples);
        segments.push(chunk.index);
    }

    log::info!(
        "Assembled {} chunks into {:.1} s of audio",
        chunks.len(),
        duration_in_seconds(total / channels as usize, sample_rate)
    );

    Ok(FinalTrack {
        samples,
        sample_rate,
        channels,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, value: i16, len: usize) -> AudioChunk {
        AudioChunk::new(index, vec![value; len], 24_000, 1)
    }

    #[test]
    fn test_orders_by_index_and_skips_empty_slots() {
        let slots = vec![Some(chunk(0, 1, 2)), None, Some(chunk(2, 3, 1))];
        let track = assemble(&slots).unwrap();
        assert_eq!(track.samples, vec![1, 1, 3]);
        assert_eq!(track.segments, vec![0, 2]);
    }

    #[test]
    fn test_order_ignores_slot_position() {
        // Фрагменты в ячейках не по порядку: решает индекс
        let slots = vec![Some(chunk(2, 3, 1)), Some(chunk(0, 1, 1)), Some(chunk(1, 2, 1))];
        let track = assemble(&slots).unwrap();
        assert_eq!(track.samples, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_input_gives_valid_empty_track() {
        let track = assemble(&[None, Some(chunk(1, 0, 0))]).unwrap();
        assert!(track.is_empty());
        assert_eq!(track.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(track.channels, DEFAULT_CHANNELS);
    }

    #[test]
    fn test_rejects_mismatched_format() {
        let slots = vec![
            Some(chunk(0, 1, 2)),
            Some(AudioChunk::new(1, vec![1, 2], 44_100, 1)),
        ];
        assert!(matches!(assemble(&slots), Err(StoryvoxError::AudioProcessing(_))));
    }

    #[test]
    fn test_duration_is_sum_of_chunks() {
        let mut a = chunk(0, 1, 12_000);
        let mut b = chunk(1, 1, 6_000);
        a.append_silence(250);
        b.append_silence(250);
        let expected = a.duration_secs() + b.duration_secs();

        let track = assemble(&[Some(b), Some(a)]).unwrap();
        assert!((track.duration_secs() - expected).abs() < 1e-9);
        assert!((track.duration_secs() - 1.25).abs() < 1e-9);
    }
}
