//! Data types flowing through the speech pipeline.

use crate::provider::tts::AudioEncoding;

/// One speakable sentence cut from the LLM delta stream.
///
/// `seq` is assigned at segmentation time, monotonically from 0 within a
/// turn, and is the ordering key for everything downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakableUnit {
    pub seq: u64,
    pub text: String,
}

impl SpeakableUnit {
    pub fn new(seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            text: text.into(),
        }
    }
}

/// Synthesized audio for one speakable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub seq: u64,
    pub encoding: AudioEncoding,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(seq: u64, encoding: AudioEncoding, data: Vec<u8>) -> Self {
        Self {
            seq,
            encoding,
            data,
        }
    }
}
