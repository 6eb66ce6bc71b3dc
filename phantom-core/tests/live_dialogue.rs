//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p phantom-core --test live_dialogue -- --ignored`

use phantom_core::{
    Action, ClaudeDialogue, DialogueConfig, GameConfig, MemoryStore, Phase, PhaseMachine,
    SessionDriver, Speaker,
};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

fn api_key() -> Option<String> {
    std::env::var("ANTHROPIC_API_KEY").ok()
}

fn driver(key: String) -> SessionDriver {
    let dialogue = ClaudeDialogue::new(key, DialogueConfig::default()).expect("client");
    let machine = PhaseMachine::new(GameConfig::new(), Arc::new(dialogue)).expect("machine");
    SessionDriver::new(machine, Arc::new(MemoryStore::new()))
}

#[tokio::test]
#[ignore] // Run with: cargo test -p phantom-core --test live_dialogue -- --ignored
async fn test_participant_speaks_with_real_api() {
    setup();
    let Some(key) = api_key() else {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    };

    let driver = driver(key);
    driver.drive("live", None).await.expect("setup");
    let view = driver
        .drive("live", Some(Action::Advance))
        .await
        .expect("advance");

    let last = view.messages.last().expect("utterance");
    assert!(matches!(last.speaker, Speaker::Participant(_)));
    assert!(!last.text.is_empty());
    assert!(last.text.chars().count() <= 200);
    println!("{}: {}", last.speaker.label(), last.text);
}

#[tokio::test]
#[ignore]
async fn test_night_round_with_real_api() {
    setup();
    let Some(key) = api_key() else {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    };

    let driver = driver(key);
    driver.drive("live-night", None).await.expect("setup");
    driver
        .drive("live-night", Some(Action::Advance))
        .await
        .expect("advance");
    driver
        .drive("live-night", Some(Action::NightStart))
        .await
        .expect("night");
    let view = driver.drive("live-night", None).await.expect("resolve");

    assert_eq!(view.phase, Phase::Discussion);
    assert_eq!(view.round_number, 2);
    assert_eq!(view.messages.len(), 2);
    assert!(!view.round_summaries[&1].is_empty());
    println!("Summary: {}", view.round_summaries[&1]);
    println!("Clues: {:?}", view.clues);
}
