//! Turn and phase orchestration for Phantom Log.
//!
//! A fixed cast, one of whom is secretly the phantom, cycles through day
//! discussion, one-on-one conversations, night resolution and a final vote.
//! This crate provides:
//! - The checkpointed `PhaseMachine` and the `SessionDriver` that loads,
//!   transitions and persists a session per action
//! - Speaker selection, night resolution, suspicion tracking and round
//!   compaction
//! - A `DialogueGenerator` seam with a Claude-backed implementation
//! - File and in-memory session stores
//!
//! # Quick Start
//!
//! ```ignore
//! use phantom_core::{
//!     Action, ClaudeDialogue, DialogueConfig, GameConfig, MemoryStore, PhaseMachine,
//!     SessionDriver,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dialogue = ClaudeDialogue::new(std::env::var("ANTHROPIC_API_KEY")?, DialogueConfig::default())?;
//!     let machine = PhaseMachine::new(GameConfig::new(), Arc::new(dialogue))?;
//!     let driver = SessionDriver::new(machine, Arc::new(MemoryStore::new()));
//!
//!     let view = driver.drive("my-game", None).await?;
//!     println!("{}", view.messages[0].text);
//!
//!     let view = driver.drive("my-game", Some(Action::Advance)).await?;
//!     println!("{:?}", view.messages.last());
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod cast;
pub mod config;
pub mod dialogue;
pub mod driver;
pub mod night;
pub mod phase;
pub mod speaker;
pub mod state;
pub mod store;
pub mod summary;
pub mod suspicion;
pub mod testing;
pub mod view;

// Primary public API
pub use action::Action;
pub use cast::default_cast;
pub use config::{ConfigError, GameConfig, SpeakerStrategy};
pub use dialogue::{
    CallPolicy, ClaudeDialogue, ContextLine, DialogueConfig, DialogueGenerator, GenerationError,
    TaskKind,
};
pub use driver::{new_session_id, DriveError, SessionDriver};
pub use phase::{PhaseMachine, Transition, TransitionError};
pub use state::{
    DayNight, GameResult, GameState, MessageLogEntry, Participant, Phase, Speaker, SuspendPoint,
};
pub use store::{FileStore, MemoryStore, SessionInfo, SessionRecord, SessionStore, StoreError};
pub use testing::{FailingDialogue, ScriptedDialogue};
pub use view::GameView;
