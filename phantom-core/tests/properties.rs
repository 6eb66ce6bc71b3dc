//! Property tests over arbitrary action sequences and speaker histories.

use phantom_core::speaker::{candidates, fallback_speaker};
use phantom_core::{
    default_cast, Action, GameConfig, GameState, Phase, PhaseMachine, ScriptedDialogue,
    TransitionError,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;

fn cast_names() -> Vec<String> {
    default_cast().into_iter().map(|p| p.name).collect()
}

/// Map a (kind, participant) pair onto an action. Votes are rare so that
/// most sequences run for a while before ending.
fn to_action(kind: u8, who: usize) -> Action {
    let names = cast_names();
    let name = names[who % names.len()].clone();
    match kind {
        0..=5 => Action::Advance,
        6..=8 => Action::Chat("다들 어젯밤에 뭐 했어요?".into()),
        9 => Action::Chat(format!("[{name}에게] 잠깐 얘기 좀 해요")),
        10 => Action::Chat("q".into()),
        11..=13 => Action::Suspect(name),
        14 => Action::OneOnOne(name),
        15 | 16 => Action::NightStart,
        17 => Action::Exit,
        18 => Action::Start,
        _ => Action::Vote(name),
    }
}

fn check_invariants(state: &GameState) {
    assert_eq!(state.game_result.is_some(), state.phase == Phase::End);
    assert!(state.round_number >= 1);
    if let Some(speaker) = &state.current_speaker {
        assert!(state.is_alive(speaker), "current speaker {speaker} is dead");
    }
    assert!(state.is_alive(&state.phantom_name));
    assert_eq!(state.participants.iter().filter(|p| p.is_phantom).count(), 1);
    assert!(state
        .message_log
        .windows(2)
        .all(|w| w[0].sequence < w[1].sequence));
    if state.phase == Phase::OneOnOne {
        assert!(state.one_on_one_target.is_some());
    }
}

async fn run_sequence(seed: u64, actions: Vec<Action>) {
    let machine = PhaseMachine::new(GameConfig::new(), Arc::new(ScriptedDialogue::new())).unwrap();
    let mut state = machine.setup(&mut StdRng::seed_from_u64(seed)).state;
    let mut suspicion: BTreeMap<String, u32> = state.suspicion.clone();
    let mut rounds_seen = state.round_number;

    for action in actions {
        let before = state.clone();
        match machine.apply(state.clone(), action).await {
            Ok(transition) => {
                assert!(!before.is_finished());
                state = transition.state;
            }
            Err(TransitionError::SessionTerminated) => {
                assert!(before.is_finished());
            }
            Err(TransitionError::InvalidTarget(name)) => {
                assert!(!before.is_finished());
                assert!(!name.is_empty());
            }
        }

        check_invariants(&state);

        for (name, count) in &state.suspicion {
            let previous = suspicion.get(name).copied().unwrap_or(0);
            assert!(*count >= previous, "suspicion for {name} went down");
        }
        suspicion = state.suspicion.clone();

        assert!(state.round_number >= rounds_seen);
        rounds_seen = state.round_number;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_invariants_hold_for_any_action_sequence(
        seed in any::<u64>(),
        raw in prop::collection::vec((0u8..20, 0usize..5), 0..30),
    ) {
        let actions: Vec<Action> = raw.into_iter().map(|(k, w)| to_action(k, w)).collect();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_sequence(seed, actions));
    }

    #[test]
    fn prop_fallback_never_repeats_previous_speaker(
        seed in any::<u64>(),
        alive in prop::collection::vec(any::<bool>(), 5),
        order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
        spoken in 0usize..=5,
    ) {
        let mut state = GameState::setup(&default_cast(), &mut StdRng::seed_from_u64(seed));
        let names = cast_names();
        for (name, flag) in names.iter().zip(&alive) {
            state.participant_mut(name).unwrap().alive = *flag;
        }
        if state.alive_names().is_empty() {
            state.participant_mut(&names[0]).unwrap().alive = true;
        }
        for &i in order.iter().take(spoken) {
            if state.is_alive(&names[i]) {
                state.push_utterance(&names[i], "...");
            }
        }

        let alive_count = state.alive_names().len();
        let chosen = fallback_speaker(&state).unwrap();
        prop_assert!(state.is_alive(&chosen));
        if alive_count > 1 {
            prop_assert_ne!(Some(chosen.as_str()), state.last_speaker());
        }

        let recency = |name: &str| state.last_spoken.get(name).copied().unwrap_or(0);
        for other in candidates(&state) {
            prop_assert!(recency(&chosen) <= recency(other));
        }
    }
}

#[test]
fn test_phantom_draw_is_uniform() {
    const RUNS: usize = 5000;
    let cast = default_cast();
    let mut master = StdRng::seed_from_u64(0xC0FFEE);
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for _ in 0..RUNS {
        let mut rng = StdRng::seed_from_u64(master.gen());
        let state = GameState::setup(&cast, &mut rng);
        *counts.entry(state.phantom_name).or_default() += 1;
    }

    assert_eq!(counts.len(), cast.len());
    let expected = 1.0 / cast.len() as f64;
    for (name, count) in counts {
        let frequency = count as f64 / RUNS as f64;
        assert!(
            (frequency - expected).abs() < 0.03,
            "{name} was the phantom {frequency:.3} of the time"
        );
    }
}
