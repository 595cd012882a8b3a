//! Кодирование итоговой дорожки в WAV
//!
//! RIFF/WAVE, PCM (формат 1), 16 бит little-endian. Заголовок формирует
//! `hound`: byte rate = частота × каналы × 2, block align = каналы × 2.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::assembler::FinalTrack;
use crate::error::{Result, StoryvoxError};

fn spec_for(track: &FinalTrack) -> WavSpec {
    WavSpec {
        channels: track.channels,
        sample_rate: track.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Закодировать дорожку в WAV в памяти
pub fn encode_wav(track: &FinalTrack) -> Result<Vec<u8>> {
    if track.channels == 0 || track.sample_rate == 0 {
        return Err(StoryvoxError::AudioProcessing(
            "cannot encode track with zero channels or sample rate".to_string(),
        ));
    }

    let mut buffer = Vec::with_capacity(44 + track.samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec_for(track))?;
        for &sample in &track.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    log::debug!("Encoded WAV: {} bytes", buffer.len());
    Ok(buffer)
}

/// Записать дорожку в WAV-файл
pub fn write_wav<P: AsRef<Path>>(track: &FinalTrack, path: P) -> Result<()> {
    let bytes = encode_wav(track)?;
    std::fs::write(path.as_ref(), bytes)?;
    log::info!("Saved WAV to {}", path.as_ref().display());
    Ok(())
}

/// Прочитать WAV (16 бит PCM) обратно в дорожку
pub fn decode_wav(bytes: &[u8]) -> Result<FinalTrack> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(StoryvoxError::AudioProcessing(format!(
            "unsupported WAV format: {} bits {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader.samples::<i16>().collect::<std::result::Result<Vec<i16>, _>>()?;
    Ok(FinalTrack {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        segments: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    #[test]
    fn test_header_fields() {
        let track = FinalTrack {
            samples: vec![0, 1, -1, 100],
            sample_rate: 24_000,
            channels: 1,
            segments: vec![0],
        };
        let bytes = encode_wav(&track).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 1);
        assert_eq!(u32_at(&bytes, 24), 24_000);
        assert_eq!(u32_at(&bytes, 28), 48_000);
        assert_eq!(u16_at(&bytes, 32), 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 8);
        assert_eq!(bytes.len(), 44 + 8);
    }

    #[test]
    fn test_round_trip_preserves_format_and_length() {
        let track = FinalTrack {
            samples: (0..4_800).map(|i| (i % 200) as i16 - 100).collect(),
            sample_rate: 24_000,
            channels: 2,
            segments: Vec::new(),
        };
        let decoded = decode_wav(&encode_wav(&track).unwrap()).unwrap();

        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.samples.len(), 4_800);
        assert_eq!(decoded.samples, track.samples);
    }

    #[test]
    fn test_empty_track_encodes() {
        let bytes = encode_wav(&FinalTrack::empty(24_000, 1)).unwrap();
        assert_eq!(bytes.len(), 44);
        let decoded = decode_wav(&bytes).unwrap();
        assert!(decoded.samples.is_empty());
    }

    #[test]
    fn test_write_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&FinalTrack::empty(24_000, 1), &path).unwrap();
        assert!(path.exists());
    }
}
