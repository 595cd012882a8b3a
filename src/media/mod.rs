//! Аудио: декодирование фрагментов, сборка дорожки, WAV

pub mod assembler;
pub mod audio;
pub mod wav;

pub use assembler::{FinalTrack, assemble};
pub use audio::{AudioChunk, decode_chunk};
pub use wav::{decode_wav, encode_wav, write_wav};
