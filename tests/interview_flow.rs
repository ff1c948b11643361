//! Full interview lifecycle against the public crate API, with scripted
//! providers standing in for the vendors.

use intervox::interview::InterviewEngine;
use intervox::provider::llm::{LlmProvider, MockLlmProvider, StreamEvent};
use intervox::provider::registry::Registry;
use intervox::provider::stt::{MockSttProvider, SttProvider};
use intervox::provider::tts::{MockTtsProvider, TtsProvider};
use intervox::session::protocol::ServerMessage;
use intervox::session::turn::{run_turn, TurnEnd};
use intervox::session::Outbound;
use intervox::store::memory::MemoryStore;
use intervox::store::{NewInterview, UserSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn engine() -> Arc<InterviewEngine> {
    let mut llm: Registry<dyn LlmProvider> = Registry::new("llm");
    llm.register(Arc::new(
        MockLlmProvider::new()
            .with_name("openai")
            .with_fragments(["Tell me about ", "a hard bug you fixed.\n", "Take your time."]),
    ));
    let mut tts: Registry<dyn TtsProvider> = Registry::new("tts");
    tts.register(Arc::new(MockTtsProvider::new().with_latencies([
        Duration::from_millis(40),
        Duration::from_millis(5),
    ])));
    let mut stt: Registry<dyn SttProvider> = Registry::new("stt");
    stt.register(Arc::new(MockSttProvider::new("I rewrote the allocator.").with_name("whisper")));
    Arc::new(InterviewEngine::new(Arc::new(MemoryStore::new()), llm, tts, stt))
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }
    items
}

#[tokio::test(flavor = "multi_thread")]
async fn voice_interview_runs_end_to_end() {
    let engine = engine();
    let interview = engine
        .create_interview(NewInterview {
            user_id: 1,
            position: "Systems Engineer".to_string(),
            language: "en".to_string(),
            ..NewInterview::default()
        })
        .await
        .unwrap();

    let settings = UserSettings {
        tts_enabled: true,
        tts_provider: "mock-tts".to_string(),
        ..UserSettings::default()
    };

    // Turn 1: candidate speaks, interviewer streams back text and audio.
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let end = run_turn(
        Arc::clone(&engine),
        interview.id,
        settings.clone(),
        "Hello, I'm ready.".to_string(),
        out_tx,
    )
    .await;
    assert_eq!(end, TurnEnd::Completed);

    let items = drain(out_rx).await;
    assert!(matches!(
        items.first(),
        Some(Outbound::Message(ServerMessage::TextStart))
    ));

    let full_text: String = items
        .iter()
        .filter_map(|item| match item {
            Outbound::Message(ServerMessage::TextDelta { data }) => Some(data.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(full_text, "Tell me about a hard bug you fixed.\nTake your time.");

    // Two sentences segmented (newline boundary, then terminal period),
    // audio in order despite the first unit being the slow one.
    let audio: Vec<(u64, Vec<u8>)> = items
        .iter()
        .filter_map(|item| match item {
            Outbound::Audio(chunk) => Some((chunk.seq, chunk.data.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(audio.len(), 2);
    assert_eq!(audio[0].0, 0);
    assert_eq!(audio[0].1, b"Tell me about a hard bug you fixed.".to_vec());
    assert_eq!(audio[1].0, 1);
    assert_eq!(audio[1].1, b"Take your time.".to_vec());

    assert!(matches!(
        items.last(),
        Some(Outbound::Message(ServerMessage::TextEnd { .. }))
    ));

    // Both sides of the turn persisted.
    let messages = engine.list_messages(interview.id).await.unwrap();
    assert_eq!(messages.len(), 2);

    // Transcribed audio feeds turn 2 like typed text would.
    let transcript = engine
        .transcribe(&settings, vec![0u8; 32], "answer.wav", "en")
        .await
        .unwrap();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let end = run_turn(
        Arc::clone(&engine),
        interview.id,
        settings.clone(),
        transcript.text,
        out_tx,
    )
    .await;
    assert_eq!(end, TurnEnd::Completed);
    drain(out_rx).await;

    let messages = engine.list_messages(interview.id).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].content, "I rewrote the allocator.");

    // Ending produces the evaluation and further turns are refused.
    let evaluation = engine.end_interview(interview.id, &settings).await.unwrap();
    assert_eq!(evaluation.overall_score, 70);
    assert!(!evaluation.summary.is_empty());

    let err = engine
        .start_turn(interview.id, &settings, "one more?")
        .await
        .unwrap_err();
    assert!(matches!(err, intervox::IntervoxError::InterviewEnded { .. }));

    // Ending again returns the same stored evaluation.
    let again = engine.end_interview(interview.id, &settings).await.unwrap();
    assert_eq!(evaluation, again);
}

#[tokio::test]
async fn llm_stream_failure_is_reported_not_persisted() {
    let mut llm: Registry<dyn LlmProvider> = Registry::new("llm");
    llm.register(Arc::new(
        MockLlmProvider::new()
            .with_name("openai")
            .with_fragments(["Half a ", "sentence"])
            .fail_after(1),
    ));
    let mut tts: Registry<dyn TtsProvider> = Registry::new("tts");
    tts.register(Arc::new(MockTtsProvider::new()));
    let mut stt: Registry<dyn SttProvider> = Registry::new("stt");
    stt.register(Arc::new(MockSttProvider::new("x").with_name("whisper")));
    let engine = Arc::new(InterviewEngine::new(
        Arc::new(MemoryStore::new()),
        llm,
        tts,
        stt,
    ));

    let interview = engine
        .create_interview(NewInterview {
            user_id: 1,
            position: "Backend".to_string(),
            language: "en".to_string(),
            ..NewInterview::default()
        })
        .await
        .unwrap();

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let end = run_turn(
        Arc::clone(&engine),
        interview.id,
        UserSettings::default(),
        "hi".to_string(),
        out_tx,
    )
    .await;
    assert_eq!(end, TurnEnd::Failed);

    let items = drain(out_rx).await;
    assert!(items.iter().any(|item| matches!(
        item,
        Outbound::Message(ServerMessage::Error { .. })
    )));

    // Only the user's message survives a failed turn.
    let messages = engine.list_messages(interview.id).await.unwrap();
    assert_eq!(messages.len(), 1);

    // The session is not poisoned: the next turn may proceed.
    let (user_message, mut stream) = engine
        .start_turn(interview.id, &UserSettings::default(), "trying again")
        .await
        .unwrap();
    assert_eq!(user_message.content, "trying again");
    while let Some(event) = stream.recv().await {
        if let StreamEvent::Error(_) | StreamEvent::Done = event {
            break;
        }
    }
}
