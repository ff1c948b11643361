//! Sentence segmentation over a delta stream.
//!
//! LLM deltas arrive at token granularity; speech synthesis wants whole
//! sentences. The segmenter accumulates deltas and emits a unit whenever the
//! accumulated tail hits a sentence boundary. It is pure state over strings:
//! no I/O, restartable per turn.

use crate::pipeline::types::SpeakableUnit;

/// Sentence-terminal punctuation, ASCII and fullwidth.
const BOUNDARY_CHARS: [char; 7] = ['.', '!', '?', '。', '！', '？', '；'];

/// Accumulates text deltas and cuts them into speakable units.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
    next_seq: u64,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta; returns a unit if the accumulator now ends a sentence.
    pub fn push(&mut self, fragment: &str) -> Option<SpeakableUnit> {
        self.buffer.push_str(fragment);
        if ends_at_boundary(&self.buffer) {
            self.emit()
        } else {
            None
        }
    }

    /// Drain whatever remains, boundary or not. Call at end of stream so
    /// trailing text without terminal punctuation is still spoken.
    pub fn flush(&mut self) -> Option<SpeakableUnit> {
        self.emit()
    }

    /// Units emitted so far; also the seq the next unit will get.
    pub fn units_emitted(&self) -> u64 {
        self.next_seq
    }

    fn emit(&mut self) -> Option<SpeakableUnit> {
        let text = std::mem::take(&mut self.buffer);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            // Whitespace-only accumulations are dropped, not spoken.
            return None;
        }
        let unit = SpeakableUnit::new(self.next_seq, trimmed);
        self.next_seq += 1;
        Some(unit)
    }
}

/// True when the accumulator's tail is a sentence boundary.
///
/// Punctuation is tested after trailing whitespace is ignored; a bare
/// newline counts as a boundary on its own (dialogue text treats a line
/// break as end of utterance). A trailing run of periods is an ellipsis
/// still being generated, not a sentence end.
fn ends_at_boundary(buffer: &str) -> bool {
    let tail = buffer.trim_end_matches([' ', '\t']);
    if tail.ends_with('\n') {
        return true;
    }
    let mut chars = buffer.trim_end().chars().rev();
    match chars.next() {
        Some('.') => chars.next() != Some('.'),
        Some(c) => BOUNDARY_CHARS.contains(&c),
        None => false,
    }
}
