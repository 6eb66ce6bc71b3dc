//! Actions a caller can submit to a session.

use serde::{Deserialize, Serialize};

/// The resume payload for `SessionDriver::drive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Action {
    /// Initialize the session. A no-op once it exists.
    Start,
    /// A user message in the current conversation.
    Chat(String),
    /// Cast the final vote.
    Vote(String),
    /// Accuse a participant without ending the game.
    Suspect(String),
    /// Let the next participant speak.
    Advance,
    /// Open a private conversation with one participant.
    OneOnOne(String),
    /// Leave the private conversation.
    Exit,
    /// End the day; the night resolves on the next drive.
    NightStart,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Chat(_) => "chat",
            Action::Vote(_) => "vote",
            Action::Suspect(_) => "suspect",
            Action::Advance => "advance",
            Action::OneOnOne(_) => "one_on_one",
            Action::Exit => "exit",
            Action::NightStart => "night_start",
        }
    }

    /// The participant this action names, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::Vote(t) | Action::Suspect(t) | Action::OneOnOne(t) => Some(t),
            _ => None,
        }
    }
}

/// Whether `text` asks to leave a one-on-one conversation.
pub fn is_exit_command(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "q" | "exit" | "quit"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("q"));
        assert!(is_exit_command(" EXIT "));
        assert!(is_exit_command("Quit"));
        assert!(!is_exit_command("quiet"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn test_action_target() {
        assert_eq!(Action::Vote("a".into()).target(), Some("a"));
        assert_eq!(Action::Advance.target(), None);
    }

    #[test]
    fn test_action_json_shape() {
        let json = serde_json::to_string(&Action::Suspect("박준호".into())).unwrap();
        assert_eq!(json, r#"{"type":"suspect","value":"박준호"}"#);
        let back: Action = serde_json::from_str(r#"{"type":"night_start"}"#).unwrap();
        assert_eq!(back, Action::NightStart);
    }
}
