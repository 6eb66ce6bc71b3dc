//! The phase machine.
//!
//! Every transition takes a `GameState` by value and hands back the next
//! state together with the suspend point it is parked at. Generator calls
//! happen inside transitions but never fail them: each call site has a
//! fallback.

use crate::action::{is_exit_command, Action};
use crate::config::{ConfigError, GameConfig};
use crate::dialogue::prompts::{
    exit_notice, fallback_utterance, night_start_message, one_on_one_notice, persona_for,
    reply_task, suspect_notice, truncate_chars, utterance_task, verdict_message,
};
use crate::dialogue::{context_from, with_policy, DialogueGenerator};
use crate::night::NightResolver;
use crate::speaker::{addressed_name, SpeakerSelector};
use crate::state::{DayNight, GameResult, GameState, Phase, Speaker, SuspendPoint};
use crate::summary::RoundSummarizer;
use crate::suspicion::{self, SuspicionTracker};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Rejections that leave the state untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no living participant named '{0}'")]
    InvalidTarget(String),

    #[error("the game is over")]
    SessionTerminated,
}

/// Result of one transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    pub suspend_point: SuspendPoint,
    /// False when the action matched no cell and the state is as it was.
    pub changed: bool,
}

impl Transition {
    fn parked(mut state: GameState, changed: bool) -> Self {
        let suspend_point = SuspendPoint::for_state(&state).unwrap_or(SuspendPoint::Discussion);
        state.suspend_point = suspend_point.clone();
        Self {
            state,
            suspend_point,
            changed,
        }
    }
}

/// Applies actions to game state.
pub struct PhaseMachine {
    config: GameConfig,
    generator: Arc<dyn DialogueGenerator>,
}

impl PhaseMachine {
    pub fn new(config: GameConfig, generator: Arc<dyn DialogueGenerator>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, generator })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The Setup cell: draw the phantom and open the first discussion.
    pub fn setup<R: Rng>(&self, rng: &mut R) -> Transition {
        let state = GameState::setup(&self.config.cast, rng);
        info!(
            participants = state.participants.len(),
            "Session set up, discussion open"
        );
        Transition::parked(state, true)
    }

    /// The Night auto cell. Does nothing outside `Phase::Night`.
    pub async fn resolve_night(&self, mut state: GameState) -> Transition {
        if state.phase != Phase::Night {
            return Transition::parked(state, false);
        }

        let generator = self.generator.as_ref();
        let policy = self.config.call_policy();

        let night = NightResolver::new(generator, policy).resolve(&mut state).await;
        SuspicionTracker::new(generator, policy, self.config.analysis_window)
            .cross_suspicion_pass(&mut state)
            .await;
        RoundSummarizer::new(generator, policy, self.config.summary_max_chars)
            .summarize(&mut state, &night)
            .await;

        state.round_number += 1;
        state.phase = Phase::Discussion;
        state.day_night = DayNight::Day;
        state.one_on_one_target = None;
        state.repair_current_speaker();
        info!(
            round = state.round_number,
            alive = state.alive_names().len(),
            "Night resolved, new day"
        );

        Transition::parked(state, true)
    }

    /// Apply one action. A pending night resolves first.
    pub async fn apply(&self, state: GameState, action: Action) -> Result<Transition, TransitionError> {
        if state.is_finished() {
            return Err(TransitionError::SessionTerminated);
        }

        let resolved_night = state.phase == Phase::Night;
        let mut state = if resolved_night {
            self.resolve_night(state).await.state
        } else {
            state
        };

        if resolved_night && matches!(action, Action::Advance | Action::Start) {
            return Ok(Transition::parked(state, true));
        }

        if let Some(target) = action.target() {
            if !state.is_alive(target) {
                warn!(
                    action = action.name(),
                    participant = %target,
                    "Rejected action naming an unknown or dead participant"
                );
                return Err(TransitionError::InvalidTarget(target.to_string()));
            }
        }

        let changed = self.apply_day(&mut state, &action).await;
        debug!(
            action = action.name(),
            phase = %state.phase,
            changed,
            "Applied action"
        );

        Ok(Transition::parked(state, changed || resolved_night))
    }

    async fn apply_day(&self, state: &mut GameState, action: &Action) -> bool {
        match (state.phase, action) {
            (Phase::Discussion, Action::Advance) => {
                self.advance_discussion(state).await;
                true
            }
            (Phase::Discussion, Action::Chat(text)) => {
                state.push_message(Speaker::User, text.clone());
                if let Some(name) = addressed_name(text) {
                    if state.is_alive(name) {
                        let name = name.to_string();
                        enter_one_on_one(state, &name);
                    }
                }
                true
            }
            (Phase::OneOnOne, Action::Chat(text)) if is_exit_command(text) => {
                leave_one_on_one(state);
                true
            }
            (Phase::OneOnOne, Action::Exit) => {
                leave_one_on_one(state);
                true
            }
            (Phase::OneOnOne, Action::Chat(text)) => {
                state.push_message(Speaker::User, text.clone());
                self.reply_one_on_one(state).await;
                true
            }
            (Phase::OneOnOne, Action::Advance) => {
                self.reply_one_on_one(state).await;
                true
            }
            (Phase::Discussion | Phase::OneOnOne, Action::OneOnOne(target)) => {
                enter_one_on_one(state, target);
                true
            }
            (Phase::Discussion | Phase::OneOnOne, Action::Suspect(target)) => {
                let count = suspicion::increment(&mut state.suspicion, target);
                state.push_message(Speaker::System, suspect_notice(target, count));
                info!(participant = %target, count, "User accusation recorded");
                true
            }
            (Phase::Discussion | Phase::OneOnOne, Action::NightStart) => {
                state.one_on_one_target = None;
                state.phase = Phase::Night;
                state.day_night = DayNight::Night;
                state.push_message(Speaker::System, night_start_message());
                info!(round = state.round_number, "Night falls");
                true
            }
            (Phase::Discussion | Phase::OneOnOne, Action::Vote(target)) => {
                cast_vote(state, target);
                true
            }
            _ => false,
        }
    }

    async fn advance_discussion(&self, state: &mut GameState) {
        let selector = SpeakerSelector::new(
            self.generator.as_ref(),
            self.config.speaker_strategy,
            self.config.call_policy(),
            self.config.speaker_window,
        );
        let Some(selection) = selector.select(state).await else {
            warn!("Nobody alive to speak");
            return;
        };
        let task = utterance_task(&selection.name);
        self.speak(state, &selection.name, &task).await;
    }

    async fn reply_one_on_one(&self, state: &mut GameState) {
        let Some(target) = state.one_on_one_target.clone() else {
            return;
        };
        if !state.is_alive(&target) {
            leave_one_on_one(state);
            return;
        }
        let task = reply_task(&target);
        self.speak(state, &target, &task).await;
    }

    /// Generate and append one utterance for `name`.
    async fn speak(&self, state: &mut GameState, name: &str, task: &str) {
        let Some(participant) = state.participant(name) else {
            return;
        };
        let persona = persona_for(participant, state);
        let context = context_from(state.recent_messages(self.config.speaker_window));

        let generated = {
            let generator = self.generator.as_ref();
            let persona = persona.as_str();
            let context = context.as_slice();
            with_policy(self.config.call_policy(), move || {
                generator.generate(persona, context, task)
            })
            .await
        };

        let text = match generated {
            Ok(text) => {
                let cleaned = clean_utterance(name, &text);
                if cleaned.is_empty() {
                    fallback_utterance(name)
                } else {
                    truncate_chars(&cleaned, self.config.utterance_max_chars)
                }
            }
            Err(e) => {
                warn!(speaker = %name, error = %e, "Utterance generation failed, using fallback line");
                fallback_utterance(name)
            }
        };

        state.push_utterance(name, text);
    }
}

/// Strip a leading name tag and wrapping quotes from a generated line.
pub fn clean_utterance(name: &str, text: &str) -> String {
    let mut text = text.trim();
    for prefix in [format!("{name}:"), format!("{name} :")] {
        if let Some(rest) = text.strip_prefix(prefix.as_str()) {
            text = rest.trim_start();
            break;
        }
    }
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    text.trim().to_string()
}

fn enter_one_on_one(state: &mut GameState, target: &str) {
    if state.one_on_one_target.as_deref() == Some(target) {
        return;
    }
    state.phase = Phase::OneOnOne;
    state.one_on_one_target = Some(target.to_string());
    state.current_speaker = Some(target.to_string());
    state.push_message(Speaker::System, one_on_one_notice(target));
    debug!(participant = %target, "One-on-one conversation opened");
}

fn leave_one_on_one(state: &mut GameState) {
    state.phase = Phase::Discussion;
    state.one_on_one_target = None;
    state.push_message(Speaker::System, exit_notice());
    debug!("Back to discussion");
}

fn cast_vote(state: &mut GameState, target: &str) {
    let result = if target == state.phantom_name {
        GameResult::Win
    } else {
        GameResult::Lose
    };
    state.accused = Some(target.to_string());
    state.game_result = Some(result);
    state.phase = Phase::End;
    state.one_on_one_target = None;
    let verdict = verdict_message(target, &state.phantom_name, result);
    state.push_message(Speaker::System, verdict);
    info!(accused = %target, phantom = %state.phantom_name, ?result, "Vote cast, game over");
}
