//! Night resolution: the phantom's attack and the clue it leaves behind.

use crate::dialogue::prompts::{
    clue_task, dawn_message, narrator_persona, night_log_entry, quiet_night_log_entry,
    quiet_night_message,
};
use crate::dialogue::{with_policy, CallPolicy, DialogueGenerator};
use crate::state::{GameState, Speaker};
use rand::seq::SliceRandom;
use tracing::{info, warn};

/// What happened during one night.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightOutcome {
    pub victim: Option<String>,
    pub clue: Option<String>,
}

/// Living participants the phantom may attack, in roster order.
pub fn victim_candidates(state: &GameState) -> Vec<String> {
    state
        .participants
        .iter()
        .filter(|p| p.alive && !p.is_phantom && p.name != state.phantom_name)
        .map(|p| p.name.clone())
        .collect()
}

/// Draw a victim uniformly from the candidates using the session's random stream.
pub fn pick_victim(state: &mut GameState) -> Option<String> {
    let candidates = victim_candidates(state);
    if candidates.is_empty() {
        return None;
    }
    let mut rng = state.rng.next_rng();
    candidates.choose(&mut rng).cloned()
}

pub struct NightResolver<'a> {
    generator: &'a dyn DialogueGenerator,
    policy: CallPolicy,
}

impl<'a> NightResolver<'a> {
    pub fn new(generator: &'a dyn DialogueGenerator, policy: CallPolicy) -> Self {
        Self { generator, policy }
    }

    /// Kill one non-phantom, log the death and try to obtain a clue.
    ///
    /// A failed clue request is logged and skipped.
    pub async fn resolve(&self, state: &mut GameState) -> NightOutcome {
        let round = state.round_number;

        let Some(victim) = pick_victim(state) else {
            info!(round, "Quiet night, nobody left to attack");
            state.push_message(Speaker::System, quiet_night_message());
            state.night_log.push(quiet_night_log_entry(round));
            return NightOutcome::default();
        };

        if let Some(participant) = state.participant_mut(&victim) {
            participant.alive = false;
        }
        state.push_message(Speaker::System, dawn_message(&victim));
        state.night_log.push(night_log_entry(round, &victim));
        info!(round, victim = %victim, "Night victim chosen");

        let clue = self.request_clue(state, &victim).await;
        if let Some(clue) = &clue {
            state.clues.push(clue.clone());
        }

        NightOutcome {
            victim: Some(victim),
            clue,
        }
    }

    async fn request_clue(&self, state: &GameState, victim: &str) -> Option<String> {
        let phantom = state.phantom()?;
        let task = clue_task(phantom, victim);
        let persona = narrator_persona();
        let generator = self.generator;
        let task = task.as_str();

        match with_policy(self.policy, move || generator.generate(persona, &[], task)).await {
            Ok(clue) => Some(clue),
            Err(e) => {
                warn!(error = %e, "Clue generation failed, continuing without a clue");
                None
            }
        }
    }
}
