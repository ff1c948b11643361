//! Ordered concurrent synthesis.
//!
//! Units enter on a channel, one synthesis task is spawned per unit (bounded
//! fan-out), and finished audio leaves strictly in unit order via the
//! reorder buffer. Dropping the driver future aborts every in-flight
//! synthesis task with it, which is how turn cancellation reaches the
//! vendor connections.

use crate::pipeline::reorder::ReorderBuffer;
use crate::pipeline::types::{AudioChunk, SpeakableUnit};
use crate::provider::tts::{SynthesisRequest, TtsProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Per-turn synthesis parameters.
///
/// `template` carries voice, language, encoding and credentials; the unit
/// text is substituted per request.
#[derive(Clone)]
pub struct SynthesisSettings {
    pub template: SynthesisRequest,
    pub concurrency: usize,
}

impl SynthesisSettings {
    pub fn new(template: SynthesisRequest) -> Self {
        Self {
            template,
            concurrency: crate::defaults::SYNTHESIS_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

pub struct SynthesisPipeline {
    provider: Arc<dyn TtsProvider>,
    settings: SynthesisSettings,
}

impl SynthesisPipeline {
    pub fn new(provider: Arc<dyn TtsProvider>, settings: SynthesisSettings) -> Self {
        Self { provider, settings }
    }

    /// Drive the turn: consume `units` until the channel closes, deliver
    /// ordered chunks into `chunks`.
    ///
    /// Returns the number of units that failed synthesis. A failed unit's
    /// seq is skipped; delivery continues with the next sequence.
    pub async fn run(
        self,
        mut units: mpsc::Receiver<SpeakableUnit>,
        chunks: mpsc::Sender<AudioChunk>,
    ) -> usize {
        let encoding = self.settings.template.encoding;
        let mut tasks: JoinSet<(u64, crate::error::Result<Vec<u8>>)> = JoinSet::new();
        let mut buffer = ReorderBuffer::new();
        let mut units_open = true;
        let mut failures = 0usize;

        loop {
            tokio::select! {
                unit = units.recv(), if units_open && tasks.len() < self.settings.concurrency => {
                    match unit {
                        Some(unit) => {
                            debug!(seq = unit.seq, chars = unit.text.chars().count(), "synthesizing unit");
                            let provider = Arc::clone(&self.provider);
                            let mut request = self.settings.template.clone();
                            request.text = unit.text;
                            let seq = unit.seq;
                            tasks.spawn(async move {
                                (seq, synthesize_unit(provider, request).await)
                            });
                        }
                        None => units_open = false,
                    }
                }
                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let ready = match joined {
                        Some(Ok((seq, Ok(data)))) => {
                            buffer.insert(AudioChunk::new(seq, encoding, data))
                        }
                        Some(Ok((seq, Err(e)))) => {
                            warn!(seq, error = %e, "unit synthesis failed, skipping");
                            failures += 1;
                            buffer.skip(seq)
                        }
                        // Aborted or panicked task: the turn is going away.
                        Some(Err(_)) | None => return failures,
                    };
                    for chunk in ready {
                        if chunks.send(chunk).await.is_err() {
                            return failures;
                        }
                    }
                }
                else => break,
            }
        }

        failures
    }
}

/// Run one vendor call, collecting the streamed audio into a single chunk.
async fn synthesize_unit(
    provider: Arc<dyn TtsProvider>,
    request: SynthesisRequest,
) -> crate::error::Result<Vec<u8>> {
    let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(16);
    let collect = async {
        let mut data = Vec::new();
        while let Some(bytes) = audio_rx.recv().await {
            data.extend_from_slice(&bytes);
        }
        data
    };
    let (result, data) = tokio::join!(provider.synthesize(&request, audio_tx), collect);
    result?;
    Ok(data)
}
