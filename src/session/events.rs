//! Session events pushed to the UI

use serde::Serialize;
use uuid::Uuid;

use super::context::TranscriptLine;
use super::state::SessionState;

/// Channel capacity for session events
pub const EVENT_CAPACITY: usize = 64;

/// Update emitted by a running session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Lifecycle transition
    State {
        session_id: Uuid,
        #[serde(flatten)]
        state: SessionState,
        message: String,
    },
    /// Image analysis finished
    Analysis { session_id: Uuid, text: String },
    /// Transcript line appended
    Line {
        session_id: Uuid,
        #[serde(flatten)]
        line: TranscriptLine,
        display: String,
    },
}

impl SessionEvent {
    #[must_use]
    pub fn state(session_id: Uuid, state: SessionState) -> Self {
        let message = state.status_message();
        Self::State {
            session_id,
            state,
            message,
        }
    }

    #[must_use]
    pub fn line(session_id: Uuid, line: TranscriptLine) -> Self {
        let display = line.to_string();
        Self::Line {
            session_id,
            line,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_event_carries_display_text() {
        let event = SessionEvent::line(Uuid::nil(), TranscriptLine::user("hello"));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "line");
        assert_eq!(json["speaker"], "User");
        assert_eq!(json["display"], "User: hello");
    }

    #[test]
    fn state_event_flattens_state() {
        let event = SessionEvent::state(Uuid::nil(), SessionState::Stopped);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "state");
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["message"], "Conversation stopped.");
    }
}
