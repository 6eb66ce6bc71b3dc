//! Choosing who speaks next in the discussion.
//!
//! Selection prefers, in order: someone addressed in the last message,
//! someone whose suspicion has risen since they last spoke, the oracle's
//! pick (only with `SpeakerStrategy::Ranked`), and finally whoever has
//! spoken least recently. The previous speaker is never picked while
//! anyone else is alive.

use crate::config::SpeakerStrategy;
use crate::dialogue::prompts::{narrator_persona, rank_task};
use crate::dialogue::{context_from, with_policy, CallPolicy, DialogueGenerator};
use crate::state::{GameState, Speaker};
use regex::Regex;
use std::cmp::Reverse;
use tracing::{debug, warn};

lazy_static::lazy_static! {
    static ref ADDRESS_PATTERN: Regex =
        Regex::new(r"\[\s*([^\[\]]+?)\s*에게\s*\]").expect("address pattern is valid");
}

/// The name in the first `[<name>에게]` marker of `text`, if any.
pub fn addressed_name(text: &str) -> Option<&str> {
    ADDRESS_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Why a speaker was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    Addressed,
    UnderSuspicion,
    Ranked,
    LeastRecent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub name: String,
    pub reason: SelectionReason,
}

/// Alive participants eligible to speak next, in roster order.
pub fn candidates(state: &GameState) -> Vec<&str> {
    let alive = state.alive_names();
    if alive.len() <= 1 {
        return alive;
    }
    let previous = state.last_speaker();
    alive.into_iter().filter(|name| Some(*name) != previous).collect()
}

/// The candidate addressed by the last message, earliest mention first.
pub fn addressed_candidate(state: &GameState, candidates: &[&str]) -> Option<String> {
    let last = state.message_log.last()?;
    if last.speaker == Speaker::System {
        return None;
    }
    let author = last.speaker.participant_name();
    let text = last.text.as_str();
    let is_question = text.contains('?') || text.contains('？');

    let mut mentions: Vec<(usize, &str)> = Vec::new();
    for caps in ADDRESS_PATTERN.captures_iter(text) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            mentions.push((whole.start(), name.as_str()));
        }
    }
    for &name in candidates {
        if let Some(pos) = text.find(&format!("@{name}")) {
            mentions.push((pos, name));
        }
        if is_question {
            if let Some(pos) = text.find(name) {
                mentions.push((pos, name));
            }
        }
    }

    mentions
        .into_iter()
        .filter(|(_, name)| Some(*name) != author && candidates.contains(name))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, name)| name.to_string())
}

/// The candidate whose suspicion rose most since they last spoke.
pub fn pressured_candidate(state: &GameState, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|&name| {
            let now = state.suspicion.get(name).copied().unwrap_or(0);
            let answered = state.answered_suspicion.get(name).copied().unwrap_or(0);
            let delta = now.saturating_sub(answered);
            (delta > 0).then_some((name, delta))
        })
        .min_by_key(|(name, delta)| {
            let last = state.last_spoken.get(*name).copied().unwrap_or(0);
            (Reverse(*delta), last)
        })
        .map(|(name, _)| name.to_string())
}

/// Least-recently-spoken candidate, roster order on ties.
///
/// Deterministic and independent of any oracle.
pub fn fallback_speaker(state: &GameState) -> Option<String> {
    candidates(state)
        .into_iter()
        .min_by_key(|name| state.last_spoken.get(*name).copied().unwrap_or(0))
        .map(str::to_string)
}

/// Accept an oracle answer that is, or contains exactly one, candidate.
pub fn match_oracle_answer(answer: &str, candidates: &[&str]) -> Option<String> {
    let answer = answer.trim();
    if let Some(exact) = candidates.iter().find(|name| **name == answer) {
        return Some(exact.to_string());
    }
    let mut found = candidates.iter().filter(|name| answer.contains(**name));
    match (found.next(), found.next()) {
        (Some(name), None) => Some(name.to_string()),
        _ => None,
    }
}

/// Picks the next discussion speaker.
pub struct SpeakerSelector<'a> {
    generator: &'a dyn DialogueGenerator,
    strategy: SpeakerStrategy,
    policy: CallPolicy,
    window: usize,
}

impl<'a> SpeakerSelector<'a> {
    pub fn new(
        generator: &'a dyn DialogueGenerator,
        strategy: SpeakerStrategy,
        policy: CallPolicy,
        window: usize,
    ) -> Self {
        Self {
            generator,
            strategy,
            policy,
            window,
        }
    }

    /// Choose exactly one alive participant, or `None` if nobody is alive.
    pub async fn select(&self, state: &GameState) -> Option<Selection> {
        let candidates = candidates(state);
        if candidates.is_empty() {
            return None;
        }

        let selection = if let Some(name) = addressed_candidate(state, &candidates) {
            Selection {
                name,
                reason: SelectionReason::Addressed,
            }
        } else if let Some(name) = pressured_candidate(state, &candidates) {
            Selection {
                name,
                reason: SelectionReason::UnderSuspicion,
            }
        } else if let Some(name) = self.ask_oracle(state, &candidates).await {
            Selection {
                name,
                reason: SelectionReason::Ranked,
            }
        } else {
            Selection {
                name: fallback_speaker(state)?,
                reason: SelectionReason::LeastRecent,
            }
        };

        debug!(speaker = %selection.name, reason = ?selection.reason, "Selected next speaker");
        Some(selection)
    }

    async fn ask_oracle(&self, state: &GameState, candidates: &[&str]) -> Option<String> {
        if self.strategy != SpeakerStrategy::Ranked || candidates.len() < 2 {
            return None;
        }

        let context = context_from(state.recent_messages(self.window));
        let task = rank_task(candidates);
        let persona = narrator_persona();
        let generator = self.generator;
        let context = context.as_slice();
        let task = task.as_str();

        match with_policy(self.policy, move || generator.generate(persona, context, task)).await {
            Ok(answer) => {
                let matched = match_oracle_answer(&answer, candidates);
                if matched.is_none() {
                    debug!(answer = %answer, "Speaker ranking answer named no single candidate");
                }
                matched
            }
            Err(e) => {
                warn!(error = %e, "Speaker ranking failed, using fallback order");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::default_cast;
    use crate::testing::ScriptedDialogue;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> GameState {
        GameState::setup(&default_cast(), &mut StdRng::seed_from_u64(8))
    }

    fn names(state: &GameState) -> Vec<String> {
        state.participants.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_addressed_name_pattern() {
        assert_eq!(addressed_name("[박준호에게] 어젯밤 어디 있었어요?"), Some("박준호"));
        assert_eq!(addressed_name("[ 이서연 에게 ]안녕"), Some("이서연"));
        assert_eq!(addressed_name("박준호에게 물어볼게요"), None);
    }

    #[test]
    fn test_fallback_is_least_recent_in_roster_order() {
        let mut state = state();
        let n = names(&state);
        assert_eq!(fallback_speaker(&state), Some(n[0].clone()));

        state.push_utterance(&n[0], "a");
        assert_eq!(fallback_speaker(&state), Some(n[1].clone()));

        state.push_utterance(&n[1], "b");
        state.push_utterance(&n[2], "c");
        state.push_utterance(&n[3], "d");
        state.push_utterance(&n[4], "e");
        assert_eq!(fallback_speaker(&state), Some(n[0].clone()));
    }

    #[test]
    fn test_fallback_excludes_previous_speaker() {
        let mut state = state();
        let n = names(&state);
        for name in &n[1..] {
            state.participant_mut(name).unwrap().alive = false;
        }
        state.participant_mut(&n[1]).unwrap().alive = true;
        state.push_utterance(&n[0], "a");
        assert_eq!(fallback_speaker(&state), Some(n[1].clone()));
    }

    #[test]
    fn test_single_survivor_may_speak_twice() {
        let mut state = state();
        let n = names(&state);
        for name in &n[1..] {
            state.participant_mut(name).unwrap().alive = false;
        }
        state.push_utterance(&n[0], "a");
        assert_eq!(fallback_speaker(&state), Some(n[0].clone()));
    }

    #[test]
    fn test_addressed_by_marker_and_question() {
        let mut state = state();
        let n = names(&state);
        state.push_message(Speaker::User, format!("[{}에게] 괜찮아요", n[3]));
        let c = candidates(&state);
        assert_eq!(addressed_candidate(&state, &c), Some(n[3].clone()));

        state.push_utterance(&n[0], format!("{}씨, {}씨는 어디 있었죠?", n[2], n[4]));
        let c = candidates(&state);
        assert_eq!(addressed_candidate(&state, &c), Some(n[2].clone()));

        state.push_utterance(&n[1], format!("{}씨 말이 맞아요.", n[2]));
        let c = candidates(&state);
        assert_eq!(addressed_candidate(&state, &c), None);
    }

    #[test]
    fn test_author_is_not_addressed() {
        let mut state = state();
        let n = names(&state);
        state.push_utterance(&n[1], format!("저 {}가 범인이라고요?", n[1]));
        let c = candidates(&state);
        assert_eq!(addressed_candidate(&state, &c), None);
    }

    #[test]
    fn test_pressured_candidate_prefers_largest_rise() {
        let mut state = state();
        let n = names(&state);
        state.suspicion.insert(n[2].clone(), 1);
        state.suspicion.insert(n[4].clone(), 3);
        let c = candidates(&state);
        assert_eq!(pressured_candidate(&state, &c), Some(n[4].clone()));

        state.push_utterance(&n[4], "아니에요!");
        let c = candidates(&state);
        assert_eq!(pressured_candidate(&state, &c), Some(n[2].clone()));
    }

    #[test]
    fn test_match_oracle_answer() {
        let c = ["김민수", "이서연"];
        assert_eq!(match_oracle_answer(" 김민수 ", &c), Some("김민수".into()));
        assert_eq!(match_oracle_answer("다음은 이서연입니다.", &c), Some("이서연".into()));
        assert_eq!(match_oracle_answer("김민수 또는 이서연", &c), None);
        assert_eq!(match_oracle_answer("아무도", &c), None);
    }

    #[tokio::test]
    async fn test_ranked_uses_oracle_answer() {
        let state = state();
        let n = names(&state);
        let dialogue = ScriptedDialogue::new().with_rank(n[3].clone());
        let selector =
            SpeakerSelector::new(&dialogue, SpeakerStrategy::Ranked, CallPolicy::default(), 5);
        let selection = selector.select(&state).await.unwrap();
        assert_eq!(selection.name, n[3]);
        assert_eq!(selection.reason, SelectionReason::Ranked);
    }

    #[tokio::test]
    async fn test_ranked_falls_back_on_invalid_answer() {
        let state = state();
        let n = names(&state);
        let dialogue = ScriptedDialogue::new().with_rank("존재하지 않는 사람");
        let selector =
            SpeakerSelector::new(&dialogue, SpeakerStrategy::Ranked, CallPolicy::default(), 5);
        let selection = selector.select(&state).await.unwrap();
        assert_eq!(selection.name, n[0]);
        assert_eq!(selection.reason, SelectionReason::LeastRecent);
    }

    #[tokio::test]
    async fn test_round_robin_never_consults_oracle() {
        let state = state();
        let dialogue = ScriptedDialogue::new();
        let selector =
            SpeakerSelector::new(&dialogue, SpeakerStrategy::RoundRobin, CallPolicy::default(), 5);
        selector.select(&state).await.unwrap();
        assert!(dialogue.calls().is_empty());
    }
}
