//! Per-participant suspicion counters.
//!
//! Counters only ever grow. They are bumped by direct user accusations and
//! by the end-of-round cross-suspicion pass, where the dialogue generator
//! reads the recent conversation and reports who accused whom.

use crate::dialogue::prompts::{accusations_task, narrator_persona};
use crate::dialogue::{context_from, with_policy, CallPolicy, DialogueGenerator};
use crate::state::{GameState, SuspicionMap};
use serde::Deserialize;
use tracing::{debug, warn};

/// Add one accusation against `target` and return the new count.
///
/// Repeated calls each add one; there is no deduplication.
pub fn increment(suspicion: &mut SuspicionMap, target: &str) -> u32 {
    let count = suspicion.entry(target.to_string()).or_insert(0);
    *count = count.saturating_add(1);
    *count
}

#[derive(Debug, Deserialize)]
struct AccusationReport {
    #[serde(default)]
    accusations: Vec<Accusation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Accusation {
    pub accuser: String,
    pub target: String,
}

/// Keep accusations between two distinct living participants.
pub fn validate_accusations(state: &GameState, proposed: Vec<Accusation>) -> Vec<Accusation> {
    proposed
        .into_iter()
        .filter(|a| {
            let valid = a.accuser != a.target && state.is_alive(&a.accuser) && state.is_alive(&a.target);
            if !valid {
                debug!(accuser = %a.accuser, target = %a.target, "Rejected proposed accusation");
            }
            valid
        })
        .collect()
}

/// Runs the automated cross-suspicion pass.
pub struct SuspicionTracker<'a> {
    generator: &'a dyn DialogueGenerator,
    policy: CallPolicy,
    window: usize,
}

impl<'a> SuspicionTracker<'a> {
    pub fn new(generator: &'a dyn DialogueGenerator, policy: CallPolicy, window: usize) -> Self {
        Self {
            generator,
            policy,
            window,
        }
    }

    /// Ask the generator for accusations over the last messages and apply
    /// the valid ones. Returns how many were applied.
    ///
    /// Any failure, including malformed JSON, leaves the counters as they were.
    pub async fn cross_suspicion_pass(&self, state: &mut GameState) -> usize {
        let alive = state.alive_names();
        if alive.len() < 2 || state.message_log.is_empty() {
            return 0;
        }

        let context = context_from(state.recent_messages(self.window));
        let task = accusations_task(&alive);
        let persona = narrator_persona();
        let generator = self.generator;
        let context = context.as_slice();
        let task = task.as_str();

        let value = match with_policy(self.policy, move || {
            generator.generate_json(persona, context, task)
        })
        .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Cross-suspicion analysis failed, counters unchanged");
                return 0;
            }
        };

        let report: AccusationReport = match serde_json::from_value(value) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Cross-suspicion reply had the wrong shape, counters unchanged");
                return 0;
            }
        };

        let accepted = validate_accusations(state, report.accusations);
        for accusation in &accepted {
            increment(&mut state.suspicion, &accusation.target);
        }
        debug!(applied = accepted.len(), "Cross-suspicion pass applied");
        accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::default_cast;
    use crate::state::Speaker;
    use crate::testing::ScriptedDialogue;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> GameState {
        GameState::setup(&default_cast(), &mut StdRng::seed_from_u64(12))
    }

    #[test]
    fn test_increment_is_not_deduplicated() {
        let mut map = SuspicionMap::new();
        assert_eq!(increment(&mut map, "a"), 1);
        assert_eq!(increment(&mut map, "a"), 2);
        assert_eq!(map["a"], 2);
    }

    #[tokio::test]
    async fn test_pass_applies_valid_pairs_only() {
        let mut state = state();
        let n: Vec<String> = state.participants.iter().map(|p| p.name.clone()).collect();
        state.participant_mut(&n[4]).unwrap().alive = false;
        state.push_message(Speaker::User, "누가 범인일까요?");

        let reply = format!(
            r#"```json
{{"accusations": [
  {{"accuser": "{a}", "target": "{b}"}},
  {{"accuser": "{c}", "target": "{b}"}},
  {{"accuser": "{a}", "target": "{a}"}},
  {{"accuser": "{a}", "target": "{dead}"}},
  {{"accuser": "유령", "target": "{c}"}}
]}}
```"#,
            a = n[0],
            b = n[1],
            c = n[2],
            dead = n[4]
        );
        let dialogue = ScriptedDialogue::new().with_accusations(reply);
        let tracker = SuspicionTracker::new(&dialogue, CallPolicy::default(), 20);

        assert_eq!(tracker.cross_suspicion_pass(&mut state).await, 2);
        assert_eq!(state.suspicion[&n[1]], 2);
        assert_eq!(state.suspicion[&n[0]], 0);
        assert_eq!(state.suspicion[&n[4]], 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_swallowed() {
        let mut state = state();
        state.push_message(Speaker::User, "음...");
        let before = state.suspicion.clone();

        let dialogue = ScriptedDialogue::new().with_default_accusations("분석할 수 없습니다");
        let tracker = SuspicionTracker::new(&dialogue, CallPolicy::default(), 20);

        assert_eq!(tracker.cross_suspicion_pass(&mut state).await, 0);
        assert_eq!(state.suspicion, before);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_swallowed() {
        let mut state = state();
        state.push_message(Speaker::User, "음...");
        let before = state.suspicion.clone();

        let dialogue = ScriptedDialogue::new().with_accusations(r#"{"accusations": "none"}"#);
        let tracker = SuspicionTracker::new(&dialogue, CallPolicy::default(), 20);

        assert_eq!(tracker.cross_suspicion_pass(&mut state).await, 0);
        assert_eq!(state.suspicion, before);
    }
}
