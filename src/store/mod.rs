//! Interview domain models and storage seams.
//!
//! Persistence itself lives outside this crate; the engine only sees these
//! repository traits. The bundled [`memory::MemoryStore`] backs tests and
//! single-process deployments.

pub mod memory;

use crate::error::Result;
use crate::provider::llm::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lifecycle of an interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Pending,
    InProgress,
    Completed,
}

/// An interview with its configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: i64,
    pub user_id: i64,
    /// Position being interviewed for, e.g. "Senior Backend Engineer".
    pub position: String,
    /// Interview language, e.g. "zh" or "en".
    pub language: String,
    /// Candidate resume text, folded into the system prompt when present.
    pub resume: String,
    /// Provider override for this interview; empty falls back to settings.
    pub llm_provider: String,
    pub llm_model: String,
    pub status: InterviewStatus,
}

/// Parameters for creating an interview.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewInterview {
    pub user_id: i64,
    pub position: String,
    pub language: String,
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub llm_provider: String,
    #[serde(default)]
    pub llm_model: String,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewMessage {
    pub id: i64,
    pub interview_id: i64,
    pub role: Role,
    pub content: String,
}

/// Final interview evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub interview_id: i64,
    pub overall_score: i32,
    pub summary: String,
}

/// Per-user provider configuration. API keys arrive already decrypted;
/// this crate never stores them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub user_id: i64,
    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub tts_provider: String,
    pub tts_api_key: String,
    pub tts_voice: String,
    pub tts_enabled: bool,
    pub stt_provider: String,
    pub stt_api_key: String,
}

/// Interview persistence seam.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn create(&self, interview: NewInterview) -> Result<Interview>;
    async fn get(&self, id: i64) -> Result<Interview>;
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Interview>>;
    async fn update_status(&self, id: i64, status: InterviewStatus) -> Result<()>;
    async fn create_message(&self, interview_id: i64, role: Role, content: &str)
    -> Result<InterviewMessage>;
    async fn list_messages(&self, interview_id: i64) -> Result<Vec<InterviewMessage>>;
    async fn create_evaluation(
        &self,
        interview_id: i64,
        overall_score: i32,
        summary: &str,
    ) -> Result<Evaluation>;
    async fn get_evaluation(&self, interview_id: i64) -> Result<Evaluation>;
}
