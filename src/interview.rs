//! Interview engine: turn lifecycle, prompt assembly, provider resolution.
//!
//! The engine sits between storage and the vendor registries. It owns no
//! network state of its own; each call resolves providers by name and hands
//! back live streams for the caller (the session layer) to drive.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::llm::{ChatMessage, ChatRequest, LlmProvider, Role, StreamEvent};
use crate::provider::registry::Registry;
use crate::provider::stt::{SttProvider, Transcript, TranscriptRequest};
use crate::provider::tts::{SynthesisRequest, TtsProvider};
use crate::store::{
    Evaluation, Interview, InterviewMessage, InterviewStatus, InterviewStore, NewInterview,
    UserSettings,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub struct InterviewEngine {
    store: Arc<dyn InterviewStore>,
    llm: Registry<dyn LlmProvider>,
    tts: Registry<dyn TtsProvider>,
    stt: Registry<dyn SttProvider>,
    synthesis_concurrency: usize,
}

impl InterviewEngine {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        llm: Registry<dyn LlmProvider>,
        tts: Registry<dyn TtsProvider>,
        stt: Registry<dyn SttProvider>,
    ) -> Self {
        Self {
            store,
            llm,
            tts,
            stt,
            synthesis_concurrency: defaults::SYNTHESIS_CONCURRENCY,
        }
    }

    /// Cap on concurrent synthesis calls per turn.
    pub fn with_synthesis_concurrency(mut self, concurrency: usize) -> Self {
        self.synthesis_concurrency = concurrency.max(1);
        self
    }

    pub fn synthesis_concurrency(&self) -> usize {
        self.synthesis_concurrency
    }

    pub async fn create_interview(&self, interview: NewInterview) -> Result<Interview> {
        self.store.create(interview).await
    }

    pub async fn get_interview(&self, id: i64) -> Result<Interview> {
        self.store.get(id).await
    }

    pub async fn list_messages(&self, interview_id: i64) -> Result<Vec<InterviewMessage>> {
        self.store.list_messages(interview_id).await
    }

    /// Begin a dialogue turn: persist the user's message and open the LLM
    /// stream that will answer it.
    ///
    /// A completed interview rejects further turns. The caller owns the
    /// returned stream and is responsible for persisting the assistant's
    /// reply via [`finish_turn`](Self::finish_turn) once it is complete.
    pub async fn start_turn(
        &self,
        interview_id: i64,
        settings: &UserSettings,
        text: &str,
    ) -> Result<(InterviewMessage, mpsc::Receiver<StreamEvent>)> {
        let interview = self.store.get(interview_id).await?;
        if interview.status == InterviewStatus::Completed {
            return Err(IntervoxError::InterviewEnded { id: interview_id });
        }
        if interview.status == InterviewStatus::Pending {
            self.store
                .update_status(interview_id, InterviewStatus::InProgress)
                .await?;
        }

        let user_message = self
            .store
            .create_message(interview_id, Role::User, text)
            .await?;
        let history = self.store.list_messages(interview_id).await?;
        let messages = build_dialogue_messages(&interview, &history);

        let stream = self
            .open_chat_stream(
                &interview,
                settings,
                messages,
                defaults::DIALOGUE_TEMPERATURE,
            )
            .await?;
        info!(interview_id, message_id = user_message.id, "turn started");

        Ok((user_message, stream))
    }

    /// Persist the assistant's completed reply for this turn.
    pub async fn finish_turn(&self, interview_id: i64, content: &str) -> Result<InterviewMessage> {
        self.store
            .create_message(interview_id, Role::Assistant, content)
            .await
    }

    /// Close the interview and produce its evaluation.
    ///
    /// Repeat-safe: once completed, the stored evaluation is returned as-is
    /// without another LLM call.
    pub async fn end_interview(
        &self,
        interview_id: i64,
        settings: &UserSettings,
    ) -> Result<Evaluation> {
        let interview = self.store.get(interview_id).await?;
        if interview.status == InterviewStatus::Completed {
            return self.store.get_evaluation(interview_id).await;
        }

        self.store
            .update_status(interview_id, InterviewStatus::Completed)
            .await?;
        let history = self.store.list_messages(interview_id).await?;
        let messages = build_evaluation_messages(&interview, &history);

        let mut stream = self
            .open_chat_stream(
                &interview,
                settings,
                messages,
                defaults::EVALUATION_TEMPERATURE,
            )
            .await?;

        let mut summary = String::new();
        while let Some(event) = stream.recv().await {
            match event {
                StreamEvent::Content(content) => summary.push_str(&content),
                StreamEvent::Done => break,
                StreamEvent::Error(message) => {
                    return Err(IntervoxError::Stream {
                        provider: self.resolve_llm_name(&interview, settings).to_string(),
                        message,
                    });
                }
            }
        }

        let evaluation = self
            .store
            .create_evaluation(interview_id, 70, &summary)
            .await?;
        info!(interview_id, evaluation_id = evaluation.id, "interview evaluated");
        Ok(evaluation)
    }

    /// Resolve the synthesis setup for a turn, or `None` when speech output
    /// is disabled or unconfigured.
    pub fn resolve_synthesis(
        &self,
        interview: &Interview,
        settings: &UserSettings,
    ) -> Result<Option<(Arc<dyn TtsProvider>, SynthesisRequest)>> {
        if !settings.tts_enabled || settings.tts_provider.is_empty() {
            return Ok(None);
        }
        let provider = self.tts.get(&settings.tts_provider)?;
        if provider.requires_api_key() && settings.tts_api_key.is_empty() {
            return Err(IntervoxError::MissingApiKey {
                provider: settings.tts_provider.clone(),
            });
        }
        let template = SynthesisRequest {
            voice: settings.tts_voice.clone(),
            language: interview.language.clone(),
            speed: defaults::TTS_SPEED,
            api_key: settings.tts_api_key.clone(),
            ..SynthesisRequest::default()
        };
        Ok(Some((provider, template)))
    }

    /// Transcribe audio with the user's configured STT provider.
    pub async fn transcribe(
        &self,
        settings: &UserSettings,
        audio: Vec<u8>,
        filename: &str,
        language: &str,
    ) -> Result<Transcript> {
        let name = if settings.stt_provider.is_empty() {
            "whisper"
        } else {
            &settings.stt_provider
        };
        let provider = self.stt.get(name)?;
        provider
            .transcribe(TranscriptRequest {
                audio,
                filename: filename.to_string(),
                language: language.to_string(),
                api_key: settings.stt_api_key.clone(),
                ..TranscriptRequest::default()
            })
            .await
    }

    /// Interview override → user settings → crate default.
    fn resolve_llm_name<'a>(&self, interview: &'a Interview, settings: &'a UserSettings) -> &'a str {
        if !interview.llm_provider.is_empty() {
            &interview.llm_provider
        } else if !settings.llm_provider.is_empty() {
            &settings.llm_provider
        } else {
            defaults::DEFAULT_LLM_PROVIDER
        }
    }

    async fn open_chat_stream(
        &self,
        interview: &Interview,
        settings: &UserSettings,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let provider = self.llm.get(self.resolve_llm_name(interview, settings))?;
        let model = if !interview.llm_model.is_empty() {
            interview.llm_model.clone()
        } else {
            settings.llm_model.clone()
        };
        provider
            .chat_stream(ChatRequest {
                model,
                messages,
                max_tokens: defaults::MAX_TOKENS,
                temperature,
                api_key: settings.llm_api_key.clone(),
                base_url: if settings.llm_base_url.is_empty() {
                    None
                } else {
                    Some(settings.llm_base_url.clone())
                },
            })
            .await
    }
}

/// System prompt plus history; stored system messages are skipped in favor
/// of the freshly synthesized prompt.
fn build_dialogue_messages(
    interview: &Interview,
    history: &[InterviewMessage],
) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "你是一位专业的面试官，正在面试{}岗位的候选人。\n\
         请根据岗位要求逐一提出面试问题，每次只问一个问题。\n\
         等候选人回答后，进行简短评价并提出下一个问题。\n\
         面试语言：{}",
        interview.position, interview.language
    );
    if !interview.resume.is_empty() {
        prompt.push_str("\n\n候选人简历：\n");
        prompt.push_str(&interview.resume);
    }

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(prompt));
    for message in history {
        if message.role == Role::System {
            continue;
        }
        messages.push(ChatMessage {
            role: message.role,
            content: message.content.clone(),
        });
    }
    messages
}

/// Transcript rendered for the evaluator, with scoring dimensions.
fn build_evaluation_messages(
    interview: &Interview,
    history: &[InterviewMessage],
) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    prompt.push_str("请根据以下面试记录，给出综合评估。\n\n");
    prompt.push_str(&format!("面试岗位：{}\n\n", interview.position));
    prompt.push_str("=== 面试记录 ===\n\n");

    for message in history {
        let speaker = match message.role {
            Role::System => continue,
            Role::User => "候选人",
            Role::Assistant => "面试官",
        };
        prompt.push_str(&format!("{}: {}\n\n", speaker, message.content));
    }

    prompt.push_str("=== 评估要求 ===\n");
    prompt.push_str("请从以下维度进行评分 (0-100) 并给出评语：\n");
    prompt.push_str("1. 技术能力\n2. 沟通表达\n3. 逻辑思维\n4. 问题解决\n5. 学习潜力\n\n");
    prompt.push_str("同时给出：\n- 总体评分 (0-100)\n- 总结\n- 优势\n- 不足\n- 改进建议\n");

    vec![
        ChatMessage::system("你是一位资深面试评估专家。请根据面试记录给出客观、详细的评估报告。"),
        ChatMessage::user(prompt),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::llm::MockLlmProvider;
    use crate::provider::stt::MockSttProvider;
    use crate::provider::tts::MockTtsProvider;
    use crate::store::memory::MemoryStore;

    fn engine_with_llm(llm_providers: Vec<MockLlmProvider>) -> InterviewEngine {
        let mut llm: Registry<dyn LlmProvider> = Registry::new("llm");
        for provider in llm_providers {
            llm.register(Arc::new(provider));
        }
        let mut tts: Registry<dyn TtsProvider> = Registry::new("tts");
        tts.register(Arc::new(MockTtsProvider::new()));
        let mut stt: Registry<dyn SttProvider> = Registry::new("stt");
        stt.register(Arc::new(MockSttProvider::new("transcribed text").with_name("whisper")));

        InterviewEngine::new(Arc::new(MemoryStore::new()), llm, tts, stt)
    }

    fn default_engine() -> InterviewEngine {
        engine_with_llm(vec![
            MockLlmProvider::new()
                .with_name("openai")
                .with_fragments(["Tell me about yourself."]),
        ])
    }

    fn interview_request() -> NewInterview {
        NewInterview {
            user_id: 1,
            position: "Backend Engineer".to_string(),
            language: "en".to_string(),
            ..NewInterview::default()
        }
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn start_turn_persists_message_and_streams_reply() {
        let engine = default_engine();
        let interview = engine.create_interview(interview_request()).await.unwrap();

        let (user_message, stream) = engine
            .start_turn(interview.id, &UserSettings::default(), "I have 5 years of Go.")
            .await
            .unwrap();

        assert_eq!(user_message.role, Role::User);
        assert_eq!(user_message.content, "I have 5 years of Go.");

        let events = drain(stream).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("Tell me about yourself.".to_string()),
                StreamEvent::Done,
            ]
        );

        // Pending interviews flip to in-progress on the first turn.
        let stored = engine.get_interview(interview.id).await.unwrap();
        assert_eq!(stored.status, InterviewStatus::InProgress);
    }

    #[tokio::test]
    async fn start_turn_on_completed_interview_is_rejected() {
        let engine = default_engine();
        let interview = engine.create_interview(interview_request()).await.unwrap();
        engine
            .end_interview(interview.id, &UserSettings::default())
            .await
            .unwrap();

        let err = engine
            .start_turn(interview.id, &UserSettings::default(), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, IntervoxError::InterviewEnded { .. }));
    }

    #[tokio::test]
    async fn start_turn_on_unknown_interview_is_not_found() {
        let engine = default_engine();
        let err = engine
            .start_turn(404, &UserSettings::default(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, IntervoxError::InterviewNotFound { .. }));
    }

    #[tokio::test]
    async fn provider_resolution_prefers_interview_then_settings_then_default() {
        let engine = engine_with_llm(vec![
            MockLlmProvider::new().with_name("openai").with_fragments(["default"]),
            MockLlmProvider::new().with_name("anthropic").with_fragments(["settings"]),
            MockLlmProvider::new().with_name("deepseek").with_fragments(["interview"]),
        ]);

        // Interview override wins.
        let interview = engine
            .create_interview(NewInterview {
                llm_provider: "deepseek".to_string(),
                ..interview_request()
            })
            .await
            .unwrap();
        let settings = UserSettings {
            llm_provider: "anthropic".to_string(),
            ..UserSettings::default()
        };
        let (_, stream) = engine.start_turn(interview.id, &settings, "hi").await.unwrap();
        assert_eq!(
            drain(stream).await[0],
            StreamEvent::Content("interview".to_string())
        );

        // Settings next.
        let interview = engine.create_interview(interview_request()).await.unwrap();
        let (_, stream) = engine.start_turn(interview.id, &settings, "hi").await.unwrap();
        assert_eq!(
            drain(stream).await[0],
            StreamEvent::Content("settings".to_string())
        );

        // Neither set: crate default.
        let interview = engine.create_interview(interview_request()).await.unwrap();
        let (_, stream) = engine
            .start_turn(interview.id, &UserSettings::default(), "hi")
            .await
            .unwrap();
        assert_eq!(
            drain(stream).await[0],
            StreamEvent::Content("default".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_setup_error() {
        let engine = default_engine();
        let interview = engine
            .create_interview(NewInterview {
                llm_provider: "mystral".to_string(),
                ..interview_request()
            })
            .await
            .unwrap();

        let err = engine
            .start_turn(interview.id, &UserSettings::default(), "hi")
            .await
            .unwrap_err();
        assert!(err.is_setup());
    }

    #[tokio::test]
    async fn finish_turn_persists_assistant_reply() {
        let engine = default_engine();
        let interview = engine.create_interview(interview_request()).await.unwrap();
        let (_, stream) = engine
            .start_turn(interview.id, &UserSettings::default(), "hello")
            .await
            .unwrap();
        drain(stream).await;

        engine
            .finish_turn(interview.id, "Tell me about yourself.")
            .await
            .unwrap();

        let messages = engine.list_messages(interview.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn end_interview_stores_summary_and_is_repeat_safe() {
        let engine = engine_with_llm(vec![
            MockLlmProvider::new()
                .with_name("openai")
                .with_fragments(["Strong ", "candidate."]),
        ]);
        let interview = engine.create_interview(interview_request()).await.unwrap();

        let first = engine
            .end_interview(interview.id, &UserSettings::default())
            .await
            .unwrap();
        assert_eq!(first.overall_score, 70);
        assert_eq!(first.summary, "Strong candidate.");
        assert_eq!(
            engine.get_interview(interview.id).await.unwrap().status,
            InterviewStatus::Completed
        );

        // Ending again returns the stored evaluation without a new LLM call.
        let second = engine
            .end_interview(interview.id, &UserSettings::default())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn end_interview_propagates_stream_failure() {
        let engine = engine_with_llm(vec![
            MockLlmProvider::new()
                .with_name("openai")
                .with_fragments(["partial"])
                .fail_after(1),
        ]);
        let interview = engine.create_interview(interview_request()).await.unwrap();

        let err = engine
            .end_interview(interview.id, &UserSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntervoxError::Stream { .. }));
    }

    #[tokio::test]
    async fn resolve_synthesis_respects_enable_flag_and_keys() {
        let engine = default_engine();
        let interview = engine.create_interview(interview_request()).await.unwrap();
        let interview = engine.get_interview(interview.id).await.unwrap();

        // Disabled: no synthesis.
        let settings = UserSettings::default();
        assert!(engine.resolve_synthesis(&interview, &settings).unwrap().is_none());

        // Enabled with a keyless provider: template carries voice + language.
        let settings = UserSettings {
            tts_enabled: true,
            tts_provider: "mock-tts".to_string(),
            tts_voice: "alloy".to_string(),
            ..UserSettings::default()
        };
        let (provider, template) = engine
            .resolve_synthesis(&interview, &settings)
            .unwrap()
            .expect("synthesis should be configured");
        assert_eq!(provider.name(), "mock-tts");
        assert_eq!(template.voice, "alloy");
        assert_eq!(template.language, "en");

        // Unknown provider name is a setup error.
        let settings = UserSettings {
            tts_enabled: true,
            tts_provider: "nope".to_string(),
            ..UserSettings::default()
        };
        assert!(engine.resolve_synthesis(&interview, &settings).is_err());
    }

    #[tokio::test]
    async fn transcribe_uses_configured_provider() {
        let engine = default_engine();
        let transcript = engine
            .transcribe(&UserSettings::default(), vec![0u8; 8], "clip.wav", "en")
            .await
            .unwrap();
        assert_eq!(transcript.text, "transcribed text");
    }

    #[test]
    fn dialogue_messages_lead_with_system_prompt() {
        let interview = Interview {
            id: 1,
            user_id: 1,
            position: "平台工程师".to_string(),
            language: "zh".to_string(),
            resume: "十年经验".to_string(),
            llm_provider: String::new(),
            llm_model: String::new(),
            status: InterviewStatus::InProgress,
        };
        let history = vec![
            InterviewMessage {
                id: 1,
                interview_id: 1,
                role: Role::System,
                content: "stale prompt".to_string(),
            },
            InterviewMessage {
                id: 2,
                interview_id: 1,
                role: Role::User,
                content: "你好".to_string(),
            },
        ];

        let messages = build_dialogue_messages(&interview, &history);
        assert_eq!(messages.len(), 2, "stored system messages are skipped");
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("平台工程师"));
        assert!(messages[0].content.contains("十年经验"));
        assert_eq!(messages[1].content, "你好");
    }

    #[test]
    fn evaluation_messages_render_transcript_roles() {
        let interview = Interview {
            id: 1,
            user_id: 1,
            position: "Backend".to_string(),
            language: "zh".to_string(),
            resume: String::new(),
            llm_provider: String::new(),
            llm_model: String::new(),
            status: InterviewStatus::InProgress,
        };
        let history = vec![
            InterviewMessage {
                id: 1,
                interview_id: 1,
                role: Role::Assistant,
                content: "请自我介绍".to_string(),
            },
            InterviewMessage {
                id: 2,
                interview_id: 1,
                role: Role::User,
                content: "我叫李雷".to_string(),
            },
        ];

        let messages = build_evaluation_messages(&interview, &history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        let prompt = &messages[1].content;
        assert!(prompt.contains("面试官: 请自我介绍"));
        assert!(prompt.contains("候选人: 我叫李雷"));
        assert!(prompt.contains("总体评分"));
    }
}
