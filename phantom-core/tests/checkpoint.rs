//! Checkpoint transparency: a session persisted and reloaded between every
//! action ends up exactly where an uninterrupted in-memory run does.

use phantom_core::{
    Action, FileStore, GameConfig, GameState, PhaseMachine, ScriptedDialogue, SessionDriver,
    SessionStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const SEED: u64 = 2024;

fn machine() -> PhaseMachine {
    PhaseMachine::new(GameConfig::new(), Arc::new(ScriptedDialogue::new())).unwrap()
}

/// A brand-new driver over the same directory, as after a process restart.
async fn restarted_driver(dir: &Path) -> (SessionDriver, Arc<FileStore>) {
    let store = Arc::new(FileStore::open(dir).await.unwrap());
    let driver = SessionDriver::new(machine(), store.clone()).with_seed(SEED);
    (driver, store)
}

async fn stored_state(store: &FileStore, session_id: &str) -> GameState {
    store.load(session_id).await.unwrap().unwrap().state
}

fn comparable(mut state: GameState) -> GameState {
    state.revision = 0;
    state
}

#[tokio::test]
async fn test_reload_between_actions_matches_uninterrupted_run() {
    let dir = TempDir::new().unwrap();

    let reference = machine();
    let mut direct = reference.setup(&mut StdRng::seed_from_u64(SEED)).state;

    let (driver, store) = restarted_driver(dir.path()).await;
    driver.drive("game", None).await.unwrap();
    assert_eq!(
        comparable(stored_state(&store, "game").await),
        comparable(direct.clone())
    );

    let names: Vec<String> = direct.participants.iter().map(|p| p.name.clone()).collect();
    let phantom = direct.phantom_name.clone();

    // `None` stands for a bare drive, which resolves the pending night.
    let script: Vec<Option<Action>> = vec![
        Some(Action::Advance),
        Some(Action::Advance),
        Some(Action::Chat(format!("[{}에게] 어제 뭐 했어요?", names[2]))),
        Some(Action::Chat("정말이에요?".into())),
        Some(Action::Chat("q".into())),
        Some(Action::Suspect(names[1].clone())),
        Some(Action::Advance),
        Some(Action::NightStart),
        None,
        Some(Action::Advance),
        Some(Action::Suspect(phantom.clone())),
        Some(Action::NightStart),
        Some(Action::Advance),
        Some(Action::Vote(phantom)),
    ];

    for action in script {
        direct = match action.clone() {
            Some(action) => reference.apply(direct, action).await.unwrap().state,
            None => reference.resolve_night(direct).await.state,
        };

        let (driver, store) = restarted_driver(dir.path()).await;
        driver.drive("game", action).await.unwrap();
        assert_eq!(
            comparable(stored_state(&store, "game").await),
            comparable(direct.clone())
        );
    }

    assert!(direct.is_finished());
}

#[tokio::test]
async fn test_revision_counts_persisted_transitions() {
    let dir = TempDir::new().unwrap();
    let (driver, store) = restarted_driver(dir.path()).await;

    driver.drive("game", None).await.unwrap();
    assert_eq!(stored_state(&store, "game").await.revision, 1);

    driver.drive("game", Some(Action::Advance)).await.unwrap();
    driver.drive("game", None).await.unwrap();
    assert_eq!(stored_state(&store, "game").await.revision, 2);

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "game");
}
