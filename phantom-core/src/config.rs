//! Engine configuration.
//!
//! Everything the engine needs is passed in explicitly; nothing here reads
//! the process environment.

use crate::cast::default_cast;
use crate::dialogue::CallPolicy;
use crate::state::Participant;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors from validating a `GameConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the cast is empty")]
    EmptyCast,

    #[error("duplicate participant name: {0}")]
    DuplicateName(String),

    #[error("participant names must not be blank")]
    BlankName,
}

/// How the next discussion speaker is chosen once the deterministic
/// rules (addressed, under pressure) have not fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerStrategy {
    /// Least-recently-spoken participant, roster order on ties.
    #[default]
    RoundRobin,
    /// Ask the dialogue generator to rank candidates, falling back to round-robin.
    Ranked,
}

/// Configuration for the phase machine and its collaborators.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Roster used by Setup.
    pub cast: Vec<Participant>,

    pub speaker_strategy: SpeakerStrategy,

    /// Messages given to per-speaker generation and ranking.
    pub speaker_window: usize,

    /// Messages given to the end-of-round cross-suspicion pass.
    pub analysis_window: usize,

    /// Upper bound on a stored round summary, in characters.
    pub summary_max_chars: usize,

    /// Upper bound on a generated utterance, in characters.
    pub utterance_max_chars: usize,

    /// Per-call limit on a dialogue generator request.
    pub generation_timeout: Duration,

    /// Extra attempts after a failed generator call.
    pub generation_retries: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cast: default_cast(),
            speaker_strategy: SpeakerStrategy::RoundRobin,
            speaker_window: 5,
            analysis_window: 20,
            summary_max_chars: 400,
            utterance_max_chars: 200,
            generation_timeout: Duration::from_secs(30),
            generation_retries: 1,
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster.
    pub fn with_cast(mut self, cast: Vec<Participant>) -> Self {
        self.cast = cast;
        self
    }

    pub fn with_speaker_strategy(mut self, strategy: SpeakerStrategy) -> Self {
        self.speaker_strategy = strategy;
        self
    }

    pub fn with_speaker_window(mut self, window: usize) -> Self {
        self.speaker_window = window;
        self
    }

    pub fn with_analysis_window(mut self, window: usize) -> Self {
        self.analysis_window = window;
        self
    }

    pub fn with_summary_max_chars(mut self, max: usize) -> Self {
        self.summary_max_chars = max;
        self
    }

    pub fn with_utterance_max_chars(mut self, max: usize) -> Self {
        self.utterance_max_chars = max;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_generation_retries(mut self, retries: u32) -> Self {
        self.generation_retries = retries;
        self
    }

    /// The timeout/retry policy applied at every generator call site.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.generation_timeout,
            retries: self.generation_retries,
        }
    }

    /// Check the roster can be used for Setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cast.is_empty() {
            return Err(ConfigError::EmptyCast);
        }
        let mut seen = HashSet::new();
        for participant in &self.cast {
            if participant.name.trim().is_empty() {
                return Err(ConfigError::BlankName);
            }
            if !seen.insert(participant.name.as_str()) {
                return Err(ConfigError::DuplicateName(participant.name.clone()));
            }
        }
        Ok(())
    }
}
