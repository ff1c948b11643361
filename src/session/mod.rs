//! Session orchestration over the duplex protocol.
//!
//! A session wraps one WebSocket connection to one interview. The state
//! machine is deliberately small: a turn is either running or it is not,
//! and a second `text` while one is running is rejected, never queued.

pub mod protocol;
pub mod turn;

use crate::pipeline::types::AudioChunk;
use protocol::ServerMessage;

/// Session lifecycle.
///
/// `Idle → TurnActive → Idle` per dialogue turn; `Ended` is terminal and
/// reached only through the client's `end` message (or disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    TurnActive,
    Ended,
}

/// Why a state transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    TurnInProgress,
    SessionEnded,
}

impl StateError {
    /// The error text sent back to the client.
    pub fn as_reply(&self) -> &'static str {
        match self {
            StateError::TurnInProgress => "a turn is already in progress",
            StateError::SessionEnded => "interview has ended",
        }
    }
}

/// The per-connection state machine.
#[derive(Debug, Default)]
pub struct SessionState {
    state: TurnState,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Enter `TurnActive`. Refused while a turn runs or after `end`.
    pub fn begin_turn(&mut self) -> std::result::Result<(), StateError> {
        match self.state {
            TurnState::Idle => {
                self.state = TurnState::TurnActive;
                Ok(())
            }
            TurnState::TurnActive => Err(StateError::TurnInProgress),
            TurnState::Ended => Err(StateError::SessionEnded),
        }
    }

    /// Return to `Idle`. Always safe: a turn that failed, finished or was
    /// cancelled must never leave the session stuck in `TurnActive`.
    pub fn finish_turn(&mut self) {
        if self.state == TurnState::TurnActive {
            self.state = TurnState::Idle;
        }
    }

    /// Enter the terminal state. Valid from `Idle` and `TurnActive` (the
    /// active turn is cancelled by the caller); idempotent once ended.
    pub fn end(&mut self) {
        self.state = TurnState::Ended;
    }

    pub fn is_ended(&self) -> bool {
        self.state == TurnState::Ended
    }
}

/// One outbound item on the session's write channel.
///
/// `Audio` expands to two WebSocket frames: the JSON marker, then the
/// binary payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Audio(AudioChunk),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_cycle_returns_to_idle() {
        let mut session = SessionState::new();
        assert_eq!(session.state(), TurnState::Idle);

        session.begin_turn().unwrap();
        assert_eq!(session.state(), TurnState::TurnActive);

        session.finish_turn();
        assert_eq!(session.state(), TurnState::Idle);

        // A new turn may start after the previous one finished.
        session.begin_turn().unwrap();
    }

    #[test]
    fn second_turn_is_rejected_not_queued() {
        let mut session = SessionState::new();
        session.begin_turn().unwrap();

        let err = session.begin_turn().unwrap_err();
        assert_eq!(err, StateError::TurnInProgress);
        assert_eq!(err.as_reply(), "a turn is already in progress");
        // The running turn is unaffected.
        assert_eq!(session.state(), TurnState::TurnActive);
    }

    #[test]
    fn ended_is_terminal() {
        let mut session = SessionState::new();
        session.end();
        assert!(session.is_ended());

        assert_eq!(session.begin_turn().unwrap_err(), StateError::SessionEnded);
        session.finish_turn();
        assert!(session.is_ended(), "finish_turn must not resurrect a session");
        session.end();
        assert!(session.is_ended());
    }

    #[test]
    fn end_during_active_turn_is_allowed() {
        let mut session = SessionState::new();
        session.begin_turn().unwrap();
        session.end();
        assert!(session.is_ended());
    }

    #[test]
    fn finish_turn_from_idle_is_a_noop() {
        let mut session = SessionState::new();
        session.finish_turn();
        assert_eq!(session.state(), TurnState::Idle);
    }
}
