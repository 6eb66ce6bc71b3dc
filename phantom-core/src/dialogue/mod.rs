//! The dialogue generator seam.
//!
//! Character speech, clues, speaker ranking, cross-suspicion analysis and
//! round summaries all come from one external capability. The core only
//! ever sees it through `DialogueGenerator` and always degrades gracefully
//! when it fails.

mod anthropic;
mod generator;
pub mod prompts;

pub use anthropic::{ClaudeDialogue, DialogueConfig};
pub use generator::{
    context_from, extract_json, with_policy, CallPolicy, ContextLine, DialogueGenerator,
    GenerationError, TaskKind,
};
