//! One dialogue turn, end to end.
//!
//! Drives the LLM stream, mirrors every delta to the client, feeds the
//! segmenter, and runs the synthesis pipeline concurrently — all inside a
//! single future, so cancelling the turn (client `end`, disconnect) drops
//! everything at once, vendor connections included.

use crate::interview::InterviewEngine;
use crate::pipeline::segmenter::SentenceSegmenter;
use crate::pipeline::synthesizer::{SynthesisPipeline, SynthesisSettings};
use crate::pipeline::types::SpeakableUnit;
use crate::provider::llm::StreamEvent;
use crate::session::Outbound;
use crate::session::protocol::ServerMessage;
use crate::store::UserSettings;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How the turn ended, for the session loop's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    Completed,
    Failed,
    ClientGone,
}

/// Run one turn for `interview_id`, emitting protocol traffic on `out`.
///
/// Always terminates: every exit path returns the session to idle. Errors
/// are reported to the client as `error` events; they never tear down the
/// connection from here.
pub async fn run_turn(
    engine: Arc<InterviewEngine>,
    interview_id: i64,
    settings: UserSettings,
    text: String,
    out: mpsc::UnboundedSender<Outbound>,
) -> TurnEnd {
    if out.send(Outbound::Message(ServerMessage::TextStart)).is_err() {
        return TurnEnd::ClientGone;
    }

    let (user_message, mut stream) = match engine.start_turn(interview_id, &settings, &text).await
    {
        Ok(started) => started,
        Err(e) => {
            let _ = out.send(Outbound::Message(ServerMessage::error(e.to_string())));
            return TurnEnd::Failed;
        }
    };
    if out
        .send(Outbound::Message(ServerMessage::user_message_ack(
            user_message.id,
        )))
        .is_err()
    {
        return TurnEnd::ClientGone;
    }

    // Synthesis is best-effort: a misconfigured TTS setup degrades the turn
    // to text-only rather than failing it.
    let synthesis = match engine.get_interview(interview_id).await {
        Ok(interview) => match engine.resolve_synthesis(&interview, &settings) {
            Ok(synthesis) => synthesis,
            Err(e) => {
                warn!(interview_id, error = %e, "speech synthesis unavailable for turn");
                None
            }
        },
        Err(_) => None,
    };

    let (chunk_tx, mut chunk_rx) = mpsc::channel(16);
    let mut unit_tx = None;
    let mut pipeline: Pin<Box<dyn Future<Output = usize> + Send>> = match synthesis {
        Some((provider, template)) => {
            let (tx, rx) = mpsc::channel::<SpeakableUnit>(64);
            unit_tx = Some(tx);
            let settings = SynthesisSettings::new(template)
                .with_concurrency(engine.synthesis_concurrency());
            let pipeline = SynthesisPipeline::new(provider, settings);
            Box::pin(pipeline.run(rx, chunk_tx))
        }
        None => {
            drop(chunk_tx);
            Box::pin(std::future::ready(0))
        }
    };

    let mut segmenter = SentenceSegmenter::new();
    let mut full_reply = String::new();
    let mut queued: VecDeque<SpeakableUnit> = VecDeque::new();
    let mut stream_open = true;
    let mut chunks_open = true;
    let mut pipeline_done = false;
    let mut stream_error: Option<String> = None;

    loop {
        tokio::select! {
            event = stream.recv(), if stream_open => {
                match event {
                    Some(StreamEvent::Content(content)) => {
                        if out
                            .send(Outbound::Message(ServerMessage::TextDelta {
                                data: content.clone(),
                            }))
                            .is_err()
                        {
                            return TurnEnd::ClientGone;
                        }
                        full_reply.push_str(&content);
                        if unit_tx.is_some()
                            && let Some(unit) = segmenter.push(&content)
                        {
                            queued.push_back(unit);
                        }
                    }
                    Some(StreamEvent::Done) | None => {
                        stream_open = false;
                        if unit_tx.is_some()
                            && let Some(unit) = segmenter.flush()
                        {
                            queued.push_back(unit);
                        }
                    }
                    Some(StreamEvent::Error(message)) => {
                        stream_error = Some(message);
                        break;
                    }
                }
            }
            // Units are handed over only when the pipeline has room, so a
            // slow synthesizer backs up into `queued` instead of parking
            // this loop; audio keeps draining meanwhile.
            permit = reserve_unit(&unit_tx), if unit_tx.is_some() && !queued.is_empty() => {
                match permit {
                    Some(permit) => {
                        if let Some(unit) = queued.pop_front() {
                            permit.send(unit);
                        }
                    }
                    // Pipeline gone early; keep streaming text.
                    None => queued.clear(),
                }
            }
            chunk = chunk_rx.recv(), if chunks_open => {
                match chunk {
                    Some(chunk) => {
                        if out.send(Outbound::Audio(chunk)).is_err() {
                            return TurnEnd::ClientGone;
                        }
                    }
                    None => chunks_open = false,
                }
            }
            failures = &mut pipeline, if !pipeline_done => {
                pipeline_done = true;
                if failures > 0 {
                    debug!(interview_id, failures, "turn finished with skipped units");
                }
            }
            else => break,
        }

        // Once the stream closed and every unit was handed over, dropping
        // the sender lets the pipeline drain out.
        if !stream_open && queued.is_empty() {
            unit_tx = None;
        }
    }

    if let Some(message) = stream_error {
        // Dropping the pipeline future aborts in-flight synthesis tasks;
        // the cancellation itself is not reported to the client.
        let _ = out.send(Outbound::Message(ServerMessage::error(message)));
        return TurnEnd::Failed;
    }

    if let Err(e) = engine.finish_turn(interview_id, &full_reply).await {
        warn!(interview_id, error = %e, "failed to persist assistant reply");
    }

    if out
        .send(Outbound::Message(ServerMessage::TextEnd {
            data: full_reply,
        }))
        .is_err()
    {
        return TurnEnd::ClientGone;
    }
    TurnEnd::Completed
}

/// Wait for capacity on the unit channel. Pends forever when there is no
/// pipeline; `None` means the pipeline dropped its receiver.
async fn reserve_unit(
    tx: &Option<mpsc::Sender<SpeakableUnit>>,
) -> Option<mpsc::Permit<'_, SpeakableUnit>> {
    match tx {
        Some(tx) => tx.reserve().await.ok(),
        None => std::future::pending().await,
    }
}
