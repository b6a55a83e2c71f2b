//! Session lifecycle states

use std::fmt;

use serde::Serialize;

/// Step of the session that an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Analyze,
    Record,
    Transcribe,
    Complete,
    Synthesize,
    Play,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Analyze => "image analysis",
            Self::Record => "recording",
            Self::Transcribe => "transcription",
            Self::Complete => "chat completion",
            Self::Synthesize => "speech synthesis",
            Self::Play => "playback",
        };
        f.write_str(label)
    }
}

/// Lifecycle state of a conversation session
///
/// `Idle → Analyzing → Running → Stopped`, with `Failed` as the terminal
/// state when an external call breaks the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Analyzing,
    Running,
    Stopped,
    Failed {
        stage: TurnStage,
        #[serde(rename = "error")]
        message: String,
    },
}

impl SessionState {
    /// Analyzing or running
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Running)
    }

    /// Stopped or failed
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed { .. })
    }

    /// Whether moving to `next` is a legal transition
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Analyzing)
                | (Self::Analyzing, Self::Running | Self::Stopped | Self::Failed { .. })
                | (Self::Running, Self::Stopped | Self::Failed { .. })
        )
    }

    /// Human-readable status for the UI
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::Idle => "Upload an image to start a conversation.".to_string(),
            Self::Analyzing => "Analyzing the image...".to_string(),
            Self::Running => {
                "Conversation started. Press 'Stop Conversation' to end.".to_string()
            }
            Self::Stopped => "Conversation stopped.".to_string(),
            Self::Failed { stage, message } => {
                format!("Conversation ended because {stage} failed: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(SessionState::Idle.can_transition_to(&SessionState::Analyzing));
        assert!(SessionState::Analyzing.can_transition_to(&SessionState::Running));
        assert!(SessionState::Running.can_transition_to(&SessionState::Stopped));
        assert!(SessionState::Running.can_transition_to(&SessionState::Failed {
            stage: TurnStage::Transcribe,
            message: "boom".to_string(),
        }));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!SessionState::Stopped.can_transition_to(&SessionState::Running));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Running));
        let failed = SessionState::Failed {
            stage: TurnStage::Play,
            message: "no device".to_string(),
        };
        assert!(failed.is_terminal());
        assert!(!failed.can_transition_to(&SessionState::Stopped));
    }

    #[test]
    fn failure_message_differs_from_stop() {
        let failed = SessionState::Failed {
            stage: TurnStage::Complete,
            message: "429".to_string(),
        };
        assert_ne!(failed.status_message(), SessionState::Stopped.status_message());
        assert!(failed.status_message().contains("chat completion"));
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(SessionState::Failed {
            stage: TurnStage::Record,
            message: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"], "record");
        assert_eq!(json["error"], "x");
    }
}
