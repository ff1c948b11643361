//! In-memory interview storage.

use crate::error::{IntervoxError, Result};
use crate::provider::llm::Role;
use crate::store::{
    Evaluation, Interview, InterviewMessage, InterviewStatus, InterviewStore, NewInterview,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    interviews: HashMap<i64, Interview>,
    messages: Vec<InterviewMessage>,
    evaluations: HashMap<i64, Evaluation>,
    next_interview_id: i64,
    next_message_id: i64,
    next_evaluation_id: i64,
}

/// Process-local [`InterviewStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn create(&self, interview: NewInterview) -> Result<Interview> {
        let mut inner = self.inner.write().await;
        inner.next_interview_id += 1;
        let interview = Interview {
            id: inner.next_interview_id,
            user_id: interview.user_id,
            position: interview.position,
            language: interview.language,
            resume: interview.resume,
            llm_provider: interview.llm_provider,
            llm_model: interview.llm_model,
            status: InterviewStatus::Pending,
        };
        inner.interviews.insert(interview.id, interview.clone());
        Ok(interview)
    }

    async fn get(&self, id: i64) -> Result<Interview> {
        let inner = self.inner.read().await;
        inner
            .interviews
            .get(&id)
            .cloned()
            .ok_or(IntervoxError::InterviewNotFound { id })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Interview>> {
        let inner = self.inner.read().await;
        let mut interviews: Vec<Interview> = inner
            .interviews
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        interviews.sort_by_key(|i| i.id);
        Ok(interviews)
    }

    async fn update_status(&self, id: i64, status: InterviewStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.interviews.get_mut(&id) {
            Some(interview) => {
                interview.status = status;
                Ok(())
            }
            None => Err(IntervoxError::InterviewNotFound { id }),
        }
    }

    async fn create_message(
        &self,
        interview_id: i64,
        role: Role,
        content: &str,
    ) -> Result<InterviewMessage> {
        let mut inner = self.inner.write().await;
        if !inner.interviews.contains_key(&interview_id) {
            return Err(IntervoxError::InterviewNotFound { id: interview_id });
        }
        inner.next_message_id += 1;
        let message = InterviewMessage {
            id: inner.next_message_id,
            interview_id,
            role,
            content: content.to_string(),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, interview_id: i64) -> Result<Vec<InterviewMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.interview_id == interview_id)
            .cloned()
            .collect())
    }

    async fn create_evaluation(
        &self,
        interview_id: i64,
        overall_score: i32,
        summary: &str,
    ) -> Result<Evaluation> {
        let mut inner = self.inner.write().await;
        if !inner.interviews.contains_key(&interview_id) {
            return Err(IntervoxError::InterviewNotFound { id: interview_id });
        }
        inner.next_evaluation_id += 1;
        let evaluation = Evaluation {
            id: inner.next_evaluation_id,
            interview_id,
            overall_score,
            summary: summary.to_string(),
        };
        inner.evaluations.insert(interview_id, evaluation.clone());
        Ok(evaluation)
    }

    async fn get_evaluation(&self, interview_id: i64) -> Result<Evaluation> {
        let inner = self.inner.read().await;
        inner
            .evaluations
            .get(&interview_id)
            .cloned()
            .ok_or(IntervoxError::EvaluationNotFound { id: interview_id })
    }
}
