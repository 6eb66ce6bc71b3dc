//! Game state for a Phantom Log session.
//!
//! `GameState` is the aggregate root: it owns the cast, the secret phantom,
//! the rolling message log and every counter the phase machine mutates.
//! It is plain data so it can be checkpointed by a `SessionStore` and
//! restored in another process without loss.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-participant accusation counts, keyed by participant name.
pub type SuspicionMap = BTreeMap<String, u32>;

/// A member of the cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique, stable key.
    pub name: String,

    /// Profession, used in personas and clue constraints.
    pub job: String,

    /// Short personality description.
    pub personality: String,

    /// Authored persona prompt. Empty means one is derived from job and personality.
    #[serde(default)]
    pub persona: String,

    /// Secret role flag. Never exposed through `GameView`.
    #[serde(default)]
    pub is_phantom: bool,

    pub alive: bool,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        job: impl Into<String>,
        personality: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            job: job.into(),
            personality: personality.into(),
            persona: String::new(),
            is_phantom: false,
            alive: true,
        }
    }

    /// Attach an authored persona prompt.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }
}

/// Where the session is in its day/night cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Discussion,
    OneOnOne,
    Night,
    End,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Discussion => "discussion",
            Phase::OneOnOne => "one_on_one",
            Phase::Night => "night",
            Phase::End => "end",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayNight {
    Day,
    Night,
}

/// Outcome of the final vote, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Lose,
}

/// Author of a message log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    System,
    User,
    Participant(String),
}

impl Speaker {
    /// Display label used in prompts and transcripts.
    pub fn label(&self) -> &str {
        match self {
            Speaker::System => "system",
            Speaker::User => "user",
            Speaker::Participant(name) => name,
        }
    }

    pub fn participant_name(&self) -> Option<&str> {
        match self {
            Speaker::Participant(name) => Some(name),
            _ => None,
        }
    }
}

/// One immutable line of the working message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub speaker: Speaker,
    pub text: String,
    pub sequence: u64,
}

/// Which phase-table cell is waiting for input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuspendPoint {
    /// Day discussion; any discussion action may resume.
    Discussion,
    /// Private conversation with one participant.
    OneOnOne { target: String },
    /// Night has been called and resolves on the next drive.
    NightPending,
    /// The vote is in; no further actions are accepted.
    Finished,
}

impl SuspendPoint {
    /// The suspend point a well-formed state must be parked at.
    pub fn for_state(state: &GameState) -> Option<Self> {
        match state.phase {
            Phase::Setup => None,
            Phase::Discussion => Some(SuspendPoint::Discussion),
            Phase::OneOnOne => state
                .one_on_one_target
                .clone()
                .map(|target| SuspendPoint::OneOnOne { target }),
            Phase::Night => Some(SuspendPoint::NightPending),
            Phase::End => Some(SuspendPoint::Finished),
        }
    }
}

/// Deterministic random stream stored alongside the state.
///
/// Each draw derives a fresh `StdRng` from the seed and a counter, so a
/// session reloaded from a checkpoint draws exactly what it would have
/// drawn had it never been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomCursor {
    pub seed: u64,
    pub draws: u64,
}

impl RandomCursor {
    pub fn new(seed: u64) -> Self {
        Self { seed, draws: 0 }
    }

    pub fn next_rng(&mut self) -> StdRng {
        let mixed = self.seed ^ self.draws.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        self.draws += 1;
        StdRng::seed_from_u64(mixed)
    }
}

/// The aggregate root of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub participants: Vec<Participant>,

    /// Secret. Redacted from views until the game ends.
    pub phantom_name: String,

    pub round_number: u32,
    pub phase: Phase,
    pub day_night: DayNight,
    pub current_speaker: Option<String>,

    /// Set while `phase == OneOnOne`.
    #[serde(default)]
    pub one_on_one_target: Option<String>,

    pub suspicion: SuspicionMap,
    pub message_log: Vec<MessageLogEntry>,
    pub night_log: Vec<String>,
    pub clues: Vec<String>,
    pub round_summaries: BTreeMap<u32, String>,
    pub accused: Option<String>,
    pub game_result: Option<GameResult>,
    pub suspend_point: SuspendPoint,

    /// Number of persisted transitions; used for optimistic store writes.
    #[serde(default)]
    pub revision: u64,

    /// Sequence number handed to the next log entry.
    pub next_sequence: u64,

    /// Sequence number of each participant's latest utterance.
    #[serde(default)]
    pub last_spoken: BTreeMap<String, u64>,

    /// Suspicion count each participant had when they last spoke.
    #[serde(default)]
    pub answered_suspicion: SuspicionMap,

    pub rng: RandomCursor,
}

impl GameState {
    /// Build a fresh session: draw the phantom uniformly, everyone alive,
    /// suspicion zeroed, first participant holding the floor.
    ///
    /// The cast must be non-empty with unique names (`GameConfig::validate`).
    pub fn setup<R: Rng>(cast: &[Participant], rng: &mut R) -> Self {
        let mut participants: Vec<Participant> = cast
            .iter()
            .cloned()
            .map(|mut p| {
                p.alive = true;
                p.is_phantom = false;
                p
            })
            .collect();

        let phantom_index = (0..participants.len())
            .collect::<Vec<_>>()
            .choose(rng)
            .copied()
            .unwrap_or(0);
        let phantom_name = participants
            .get(phantom_index)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        if let Some(phantom) = participants.get_mut(phantom_index) {
            phantom.is_phantom = true;
        }

        let suspicion = participants.iter().map(|p| (p.name.clone(), 0)).collect();
        let current_speaker = participants.first().map(|p| p.name.clone());

        let mut state = Self {
            participants,
            phantom_name,
            round_number: 1,
            phase: Phase::Discussion,
            day_night: DayNight::Day,
            current_speaker,
            one_on_one_target: None,
            suspicion,
            message_log: Vec::new(),
            night_log: Vec::new(),
            clues: Vec::new(),
            round_summaries: BTreeMap::new(),
            accused: None,
            game_result: None,
            suspend_point: SuspendPoint::Discussion,
            revision: 0,
            next_sequence: 1,
            last_spoken: BTreeMap::new(),
            answered_suspicion: BTreeMap::new(),
            rng: RandomCursor::new(rng.gen()),
        };
        let opening = crate::dialogue::prompts::opening_message(state.participants.len());
        state.push_message(Speaker::System, opening);
        state
    }

    /// Look up a participant by name.
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    pub fn participant_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.name == name)
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.participant(name).map(|p| p.alive).unwrap_or(false)
    }

    /// Alive participant names in roster order.
    pub fn alive_names(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Name -> alive flag for every participant.
    pub fn alive_status(&self) -> BTreeMap<String, bool> {
        self.participants
            .iter()
            .map(|p| (p.name.clone(), p.alive))
            .collect()
    }

    pub fn phantom(&self) -> Option<&Participant> {
        self.participant(&self.phantom_name)
    }

    pub fn is_finished(&self) -> bool {
        self.game_result.is_some()
    }

    /// Append a log entry and return its sequence number.
    pub fn push_message(&mut self, speaker: Speaker, text: impl Into<String>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.message_log.push(MessageLogEntry {
            speaker,
            text: text.into(),
            sequence,
        });
        sequence
    }

    /// Append a participant's utterance and record that they have spoken.
    pub fn push_utterance(&mut self, name: &str, text: impl Into<String>) -> u64 {
        let sequence = self.push_message(Speaker::Participant(name.to_string()), text);
        self.last_spoken.insert(name.to_string(), sequence);
        let count = self.suspicion.get(name).copied().unwrap_or(0);
        self.answered_suspicion.insert(name.to_string(), count);
        self.current_speaker = Some(name.to_string());
        sequence
    }

    /// The last `n` log entries, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[MessageLogEntry] {
        let start = self.message_log.len().saturating_sub(n);
        &self.message_log[start..]
    }

    /// The participant whose utterance is the most recent one, if they are alive.
    pub fn last_speaker(&self) -> Option<&str> {
        self.last_spoken
            .iter()
            .filter(|(name, _)| self.is_alive(name))
            .max_by_key(|(_, seq)| **seq)
            .map(|(name, _)| name.as_str())
    }

    /// Keep `current_speaker` pointing at a living participant.
    pub(crate) fn repair_current_speaker(&mut self) {
        let holds = self
            .current_speaker
            .as_deref()
            .map(|name| self.is_alive(name))
            .unwrap_or(false);
        if !holds {
            self.current_speaker = self.alive_names().first().map(|n| n.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::default_cast;

    fn fresh(seed: u64) -> GameState {
        let mut rng = StdRng::seed_from_u64(seed);
        GameState::setup(&default_cast(), &mut rng)
    }

    #[test]
    fn test_setup_initial_state() {
        let state = fresh(7);
        assert_eq!(state.participants.len(), 5);
        assert!(state.participants.iter().all(|p| p.alive));
        assert!(state.suspicion.values().all(|&c| c == 0));
        assert_eq!(state.round_number, 1);
        assert_eq!(state.phase, Phase::Discussion);
        assert_eq!(state.day_night, DayNight::Day);
        assert_eq!(state.current_speaker.as_deref(), Some(state.participants[0].name.as_str()));
        assert_eq!(state.message_log.len(), 1);
        assert_eq!(state.message_log[0].speaker, Speaker::System);
        assert!(state.game_result.is_none());
    }

    #[test]
    fn test_exactly_one_phantom() {
        let state = fresh(11);
        let flagged: Vec<_> = state.participants.iter().filter(|p| p.is_phantom).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].name, state.phantom_name);
    }

    #[test]
    fn test_setup_is_seed_deterministic() {
        assert_eq!(fresh(42), fresh(42));
    }

    #[test]
    fn test_sequences_are_monotonic() {
        let mut state = fresh(1);
        let a = state.push_message(Speaker::User, "hello");
        let b = state.push_message(Speaker::System, "notice");
        assert!(b > a);
        assert!(state.message_log.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_utterance_records_speaker() {
        let mut state = fresh(3);
        let name = state.participants[2].name.clone();
        state.suspicion.insert(name.clone(), 2);
        state.push_utterance(&name, "저는 아니에요.");
        assert_eq!(state.current_speaker.as_deref(), Some(name.as_str()));
        assert_eq!(state.answered_suspicion.get(&name), Some(&2));
        assert_eq!(state.last_speaker(), Some(name.as_str()));
    }

    #[test]
    fn test_recent_messages_window() {
        let mut state = fresh(5);
        for i in 0..10 {
            state.push_message(Speaker::User, format!("m{i}"));
        }
        let recent = state.recent_messages(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[4].text, "m9");
        assert_eq!(state.recent_messages(100).len(), 11);
    }

    #[test]
    fn test_suspend_point_for_state() {
        let mut state = fresh(9);
        assert_eq!(SuspendPoint::for_state(&state), Some(SuspendPoint::Discussion));
        state.phase = Phase::OneOnOne;
        state.one_on_one_target = Some("x".into());
        assert_eq!(
            SuspendPoint::for_state(&state),
            Some(SuspendPoint::OneOnOne { target: "x".into() })
        );
        state.phase = Phase::Night;
        assert_eq!(SuspendPoint::for_state(&state), Some(SuspendPoint::NightPending));
    }

    #[test]
    fn test_random_cursor_replays() {
        let mut a = RandomCursor::new(99);
        let mut b = a;
        let x: u64 = a.next_rng().gen();
        let y: u64 = b.next_rng().gen();
        assert_eq!(x, y);
        assert_eq!(a.draws, 1);
        let z: u64 = a.next_rng().gen();
        assert_ne!(x, z);
    }

    #[test]
    fn test_state_json_round_trip() {
        let state = fresh(21);
        let json = serde_json::to_string(&state).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, restored);
    }
}
