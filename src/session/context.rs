//! Conversation context
//!
//! An append-only list of role-tagged turns. The first turn is always the
//! system turn carrying the image analysis; after the greeting, user and
//! assistant turns strictly alternate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Number of turns placed by seeding (system + greeting)
pub const SEED_TURNS: usize = 2;

/// Build the system turn text from the image analysis
#[must_use]
pub fn system_prompt(analysis: &str, instructions: &str) -> String {
    format!("Consider the following image analysis: {analysis}. {instructions}")
}

/// Ordered conversation history for one session
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    /// Seed a new conversation with the system turn and assistant greeting
    #[must_use]
    pub fn seeded(analysis: &str, instructions: &str, greeting: &str) -> Self {
        Self {
            turns: vec![
                Turn::new(Role::System, system_prompt(analysis, instructions)),
                Turn::new(Role::Assistant, greeting),
            ],
        }
    }

    /// Append the user's transcribed speech
    ///
    /// # Errors
    ///
    /// Returns error if the previous turn is not an assistant turn
    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Role::User, Role::Assistant, content.into())
    }

    /// Append the assistant's reply
    ///
    /// # Errors
    ///
    /// Returns error if the previous turn is not a user turn
    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Role::Assistant, Role::User, content.into())
    }

    fn push(&mut self, role: Role, expected_previous: Role, content: String) -> Result<()> {
        let previous = self.turns.last().map(|t| t.role);
        if previous != Some(expected_previous) {
            return Err(Error::Session(format!(
                "turn order violated: {role:?} turn after {previous:?}"
            )));
        }

        self.turns.push(Turn { role, content });
        Ok(())
    }

    /// All turns, system turn first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns including the seed
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a context holds at least its seed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns appended by the conversation loop
    #[must_use]
    pub fn dialogue(&self) -> &[Turn] {
        &self.turns[SEED_TURNS.min(self.turns.len())..]
    }
}

/// Speaker label shown in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Bot,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("User"),
            Self::Bot => f.write_str("Bot"),
        }
    }
}

/// One line of the UI transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl TranscriptLine {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ConversationContext {
        ConversationContext::seeded(
            "An image containing the equation x^2+5x+6=0",
            "You are my tutor.",
            "Hello! I'm here to help you with your learning problem.",
        )
    }

    #[test]
    fn seed_starts_with_system_turn_holding_analysis() {
        let context = seeded();

        assert_eq!(context.len(), SEED_TURNS);
        assert_eq!(context.turns()[0].role, Role::System);
        assert!(context.turns()[0].content.contains("x^2+5x+6=0"));
        assert_eq!(context.turns()[1].role, Role::Assistant);
        assert!(context.turns()[1].content.starts_with("Hello! I'm here to help"));
        assert!(context.dialogue().is_empty());
    }

    #[test]
    fn turns_alternate_after_seed() {
        let mut context = seeded();

        context.push_user("I don't know where to start").unwrap();
        context.push_assistant("What kind of equation is it?").unwrap();
        context.push_user("A quadratic").unwrap();

        let roles: Vec<Role> = context.dialogue().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn out_of_order_turns_are_rejected() {
        let mut context = seeded();

        // Greeting is an assistant turn, so the next must be a user turn
        assert!(context.push_assistant("again").is_err());

        context.push_user("hi").unwrap();
        assert!(context.push_user("hi again").is_err());
        assert_eq!(context.len(), SEED_TURNS + 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(Turn::new(Role::Assistant, "ok")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "ok");
    }

    #[test]
    fn transcript_line_display() {
        assert_eq!(
            TranscriptLine::user("I don't know where to start").to_string(),
            "User: I don't know where to start"
        );
        assert_eq!(TranscriptLine::bot("Let's begin").to_string(), "Bot: Let's begin");
    }
}
