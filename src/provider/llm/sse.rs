//! Minimal server-sent events line reassembly.
//!
//! Vendor chat streams arrive as `text/event-stream` bodies chunked at
//! arbitrary byte boundaries. This buffer reassembles complete lines and
//! yields the payload of each `data:` line; other SSE fields (`event:`,
//! comments, blank separators) are skipped because the chat vendors put
//! everything of interest in `data`.

/// Reassembles SSE `data:` payloads from arbitrarily-split body chunks.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns the `data:` payloads completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}
