//! Speech output pipeline.
//!
//! Turns a stream of LLM text deltas into an ordered stream of audio:
//! segment → synthesize (parallel) → reorder → deliver (serial).

pub mod reorder;
pub mod segmenter;
pub mod synthesizer;
pub mod types;

pub use reorder::ReorderBuffer;
pub use segmenter::SentenceSegmenter;
pub use synthesizer::{SynthesisPipeline, SynthesisSettings};
pub use types::{AudioChunk, SpeakableUnit};
