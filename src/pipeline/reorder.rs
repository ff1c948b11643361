//! Sequence reordering for concurrently synthesized audio.
//!
//! Synthesis tasks complete in whatever order vendor latency dictates; the
//! client must hear sentence 0 before sentence 1. Chunks park here until
//! their sequence number is next, then drain as a contiguous run. A failed
//! sequence is skipped explicitly so one bad unit never dams the rest of
//! the turn.

use crate::pipeline::types::AudioChunk;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: BTreeMap<u64, AudioChunk>,
    skipped: BTreeSet<u64>,
    next_seq: u64,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a completed chunk; returns every chunk that is now ready for
    /// delivery, in sequence order.
    ///
    /// Out-of-order completions return an empty vec and wait. A chunk whose
    /// seq was already delivered or skipped is dropped.
    pub fn insert(&mut self, chunk: AudioChunk) -> Vec<AudioChunk> {
        if chunk.seq < self.next_seq || self.skipped.contains(&chunk.seq) {
            return Vec::new();
        }
        self.pending.insert(chunk.seq, chunk);
        self.drain_ready()
    }

    /// Abandon a sequence whose synthesis failed; returns chunks unblocked
    /// by the skip.
    pub fn skip(&mut self, seq: u64) -> Vec<AudioChunk> {
        if seq < self.next_seq {
            return Vec::new();
        }
        self.pending.remove(&seq);
        self.skipped.insert(seq);
        self.drain_ready()
    }

    /// Number of chunks parked waiting for earlier sequences.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The sequence the buffer will release next.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    fn drain_ready(&mut self) -> Vec<AudioChunk> {
        let mut ready = Vec::new();
        loop {
            if let Some(chunk) = self.pending.remove(&self.next_seq) {
                self.next_seq += 1;
                ready.push(chunk);
            } else if self.skipped.remove(&self.next_seq) {
                self.next_seq += 1;
            } else {
                break;
            }
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tts::AudioEncoding;

    fn chunk(seq: u64) -> AudioChunk {
        AudioChunk::new(seq, AudioEncoding::Mp3, vec![seq as u8])
    }

    fn seqs(chunks: &[AudioChunk]) -> Vec<u64> {
        chunks.iter().map(|c| c.seq).collect()
    }

    #[test]
    fn in_order_inserts_release_immediately() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(seqs(&buf.insert(chunk(0))), vec![0]);
        assert_eq!(seqs(&buf.insert(chunk(1))), vec![1]);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn out_of_order_insert_waits_for_the_gap() {
        let mut buf = ReorderBuffer::new();
        assert!(buf.insert(chunk(1)).is_empty());
        assert!(buf.insert(chunk(2)).is_empty());
        assert_eq!(buf.pending_len(), 2);

        // seq 0 arrives last and releases the whole run
        assert_eq!(seqs(&buf.insert(chunk(0))), vec![0, 1, 2]);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn adversarial_completion_order_still_delivers_in_sequence() {
        let mut buf = ReorderBuffer::new();
        let mut delivered = Vec::new();
        for seq in [3, 1, 4, 0, 2] {
            delivered.extend(seqs(&buf.insert(chunk(seq))));
        }
        assert_eq!(delivered, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn skip_unblocks_later_chunks() {
        let mut buf = ReorderBuffer::new();
        assert!(buf.insert(chunk(1)).is_empty());
        assert!(buf.insert(chunk(2)).is_empty());

        // seq 0 failed — skipping it releases 1 and 2
        assert_eq!(seqs(&buf.skip(0)), vec![1, 2]);
    }

    #[test]
    fn skip_ahead_of_cursor_is_remembered() {
        let mut buf = ReorderBuffer::new();
        // seq 1 fails before seq 0 completes
        assert!(buf.skip(1).is_empty());
        assert!(buf.insert(chunk(2)).is_empty());

        // once 0 arrives, the hole at 1 is jumped over
        assert_eq!(seqs(&buf.insert(chunk(0))), vec![0, 2]);
        assert_eq!(buf.next_seq(), 3);
    }

    #[test]
    fn late_duplicate_or_skipped_chunk_is_dropped() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(seqs(&buf.insert(chunk(0))), vec![0]);
        assert!(buf.insert(chunk(0)).is_empty(), "duplicate must not re-deliver");

        assert!(buf.skip(1).is_empty());
        assert!(
            buf.insert(chunk(1)).is_empty(),
            "chunk for a skipped seq must be dropped"
        );
        assert_eq!(buf.next_seq(), 2);
    }

    #[test]
    fn all_failures_leave_buffer_empty() {
        let mut buf = ReorderBuffer::new();
        for seq in 0..4 {
            assert!(buf.skip(seq).is_empty());
        }
        assert_eq!(buf.pending_len(), 0);
        assert_eq!(buf.next_seq(), 4);
    }
}
