//! Caller-facing view of a session.
//!
//! `GameView` is what `drive` returns. The phantom's identity stays hidden
//! until the game has a result.

use crate::state::{
    DayNight, GameResult, GameState, MessageLogEntry, Phase, SuspendPoint, SuspicionMap,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A participant as callers may see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub name: String,
    pub job: String,
    pub personality: String,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub session_id: String,
    pub participants: Vec<ParticipantView>,
    pub alive_status: BTreeMap<String, bool>,
    pub suspicion: SuspicionMap,
    pub messages: Vec<MessageLogEntry>,
    pub night_log: Vec<String>,
    pub clues: Vec<String>,
    pub round_summaries: BTreeMap<u32, String>,
    pub round_number: u32,
    pub phase: Phase,
    pub day_night: DayNight,
    pub current_speaker: Option<String>,
    pub one_on_one_target: Option<String>,
    pub accused: Option<String>,
    pub game_result: Option<GameResult>,
    pub suspend_point: SuspendPoint,

    /// Only present once the game is over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phantom_name: Option<String>,
}

impl GameView {
    pub fn new(session_id: impl Into<String>, state: &GameState) -> Self {
        let participants = state
            .participants
            .iter()
            .map(|p| ParticipantView {
                name: p.name.clone(),
                job: p.job.clone(),
                personality: p.personality.clone(),
                alive: p.alive,
            })
            .collect();

        Self {
            session_id: session_id.into(),
            participants,
            alive_status: state.alive_status(),
            suspicion: state.suspicion.clone(),
            messages: state.message_log.clone(),
            night_log: state.night_log.clone(),
            clues: state.clues.clone(),
            round_summaries: state.round_summaries.clone(),
            round_number: state.round_number,
            phase: state.phase,
            day_night: state.day_night,
            current_speaker: state.current_speaker.clone(),
            one_on_one_target: state.one_on_one_target.clone(),
            accused: state.accused.clone(),
            game_result: state.game_result,
            suspend_point: state.suspend_point.clone(),
            phantom_name: state
                .game_result
                .is_some()
                .then(|| state.phantom_name.clone()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game_result.is_some()
    }

    pub fn alive_names(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::default_cast;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_phantom_redacted_until_finished() {
        let mut state = GameState::setup(&default_cast(), &mut StdRng::seed_from_u64(2));
        let phantom = state.phantom_name.clone();

        let view = GameView::new("s", &state);
        assert!(view.phantom_name.is_none());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("phantom_name"));
        assert!(!json.contains("is_phantom"));

        state.game_result = Some(GameResult::Win);
        state.phase = Phase::End;
        let view = GameView::new("s", &state);
        assert_eq!(view.phantom_name, Some(phantom));
    }
}
