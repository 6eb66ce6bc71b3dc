//! Round compaction.
//!
//! At the end of every round the working message log is condensed into a
//! bounded synopsis stored under the round number, and the log itself is
//! replaced by two system banners. Earlier rounds are only reachable through
//! `GameState::round_summaries` afterwards.

use crate::dialogue::prompts::{
    narrator_persona, new_day_banner, summary_banner, summary_task, truncate_chars,
};
use crate::dialogue::{context_from, with_policy, CallPolicy, DialogueGenerator};
use crate::night::NightOutcome;
use crate::state::{GameState, Speaker};
use tracing::{debug, warn};

/// Night and suspicion facts for the round, in one line.
pub fn night_facts(state: &GameState, night: &NightOutcome) -> String {
    let mut facts = match &night.victim {
        Some(victim) => format!("{victim}이(가) 밤에 습격당해 사망."),
        None => "밤에 아무 일도 없었음.".to_string(),
    };
    if let Some(clue) = &night.clue {
        facts.push_str(&format!(" 현장 단서: {clue}."));
    }
    let suspected: Vec<String> = state
        .suspicion
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(name, count)| format!("{name} {count}회"))
        .collect();
    if !suspected.is_empty() {
        facts.push_str(&format!(" 의심 현황: {}.", suspected.join(", ")));
    }
    facts
}

/// Deterministic synopsis used when the generator cannot produce one.
pub fn fallback_summary(state: &GameState, night: &NightOutcome) -> String {
    let spoken = state
        .message_log
        .iter()
        .filter(|entry| entry.speaker != Speaker::System)
        .count();
    format!(
        "{}라운드에 {spoken}번의 발언이 오갔다. {}",
        state.round_number,
        night_facts(state, night)
    )
}

pub struct RoundSummarizer<'a> {
    generator: &'a dyn DialogueGenerator,
    policy: CallPolicy,
    max_chars: usize,
}

impl<'a> RoundSummarizer<'a> {
    pub fn new(generator: &'a dyn DialogueGenerator, policy: CallPolicy, max_chars: usize) -> Self {
        Self {
            generator,
            policy,
            max_chars: max_chars.max(1),
        }
    }

    /// Summarize the current round and reset the log to two banners.
    ///
    /// A summary already stored for this round is kept.
    pub async fn summarize(&self, state: &mut GameState, night: &NightOutcome) -> String {
        let round = state.round_number;
        let facts = night_facts(state, night);

        let generated = {
            let context = context_from(&state.message_log);
            let task = summary_task(round, &facts, self.max_chars);
            let persona = narrator_persona();
            let generator = self.generator;
            let context = context.as_slice();
            let task = task.as_str();
            with_policy(self.policy, move || generator.generate(persona, context, task)).await
        };

        let summary = match generated {
            Ok(text) if !text.trim().is_empty() => truncate_chars(text.trim(), self.max_chars),
            Ok(_) => truncate_chars(&fallback_summary(state, night), self.max_chars),
            Err(e) => {
                warn!(round, error = %e, "Round summary generation failed, using synopsis");
                truncate_chars(&fallback_summary(state, night), self.max_chars)
            }
        };

        let stored = state
            .round_summaries
            .entry(round)
            .or_insert(summary)
            .clone();

        let before = state.message_log.len();
        state.message_log.clear();
        state.push_message(Speaker::System, summary_banner(round, &stored));
        state.push_message(
            Speaker::System,
            new_day_banner(round + 1, night.victim.as_deref()),
        );
        debug!(round, compacted = before, "Round log compacted");

        stored
    }
}
