//! The `DialogueGenerator` trait and the call-site policy around it.

use crate::state::{MessageLogEntry, Speaker};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a dialogue generator call.
///
/// These never escape `drive`; every call site has a fallback.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider error: {0}")]
    Provider(#[from] claude::Error),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator returned an empty reply")]
    Empty,

    #[error("malformed structured reply: {0}")]
    Malformed(String),
}

impl GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Provider(e) => e.is_transient(),
            GenerationError::Timeout(_) | GenerationError::Empty | GenerationError::Malformed(_) => {
                true
            }
        }
    }
}

/// One line of conversation handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLine {
    pub speaker: String,
    pub text: String,
}

impl ContextLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl From<&MessageLogEntry> for ContextLine {
    fn from(entry: &MessageLogEntry) -> Self {
        let speaker = match &entry.speaker {
            Speaker::System => "시스템",
            Speaker::User => "유저",
            Speaker::Participant(name) => name.as_str(),
        };
        Self::new(speaker, entry.text.clone())
    }
}

/// Convert a log window into generator context.
pub fn context_from(entries: &[MessageLogEntry]) -> Vec<ContextLine> {
    entries.iter().map(ContextLine::from).collect()
}

/// What a task asks the generator for. Every task string starts with its
/// kind's header so providers and test doubles can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A discussion utterance.
    Utterance,
    /// A reply inside a one-on-one conversation.
    Reply,
    /// Name the participant who should speak next.
    RankSpeaker,
    /// A clue left at the night's crime scene.
    Clue,
    /// JSON list of accusations among participants.
    Accusations,
    /// Synopsis of a finished round.
    Summary,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Utterance,
        TaskKind::Reply,
        TaskKind::RankSpeaker,
        TaskKind::Clue,
        TaskKind::Accusations,
        TaskKind::Summary,
    ];

    pub fn header(self) -> &'static str {
        match self {
            TaskKind::Utterance => "[과제: 토론 발언]",
            TaskKind::Reply => "[과제: 1:1 대답]",
            TaskKind::RankSpeaker => "[과제: 다음 발언자 선정]",
            TaskKind::Clue => "[과제: 단서 작성]",
            TaskKind::Accusations => "[과제: 의심 관계 분석]",
            TaskKind::Summary => "[과제: 라운드 요약]",
        }
    }

    pub fn detect(task: &str) -> Option<Self> {
        let task = task.trim_start();
        Self::ALL.into_iter().find(|kind| task.starts_with(kind.header()))
    }
}

/// The external text generator behind every character.
///
/// Output is untrusted plain text; callers validate anything they parse.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Produce a short utterance for `persona` given the conversation so far.
    async fn generate(
        &self,
        persona: &str,
        context: &[ContextLine],
        task: &str,
    ) -> Result<String, GenerationError>;

    /// Structured variant: the reply must contain a JSON document.
    async fn generate_json(
        &self,
        persona: &str,
        context: &[ContextLine],
        task: &str,
    ) -> Result<serde_json::Value, GenerationError> {
        let raw = self.generate(persona, context, task).await?;
        let json = extract_json(&raw);
        serde_json::from_str(json).map_err(|e| GenerationError::Malformed(format!("{e}: {json}")))
    }
}

/// Timeout and retry budget for one logical generator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
        }
    }
}

/// Run `call` under `policy`: each attempt is bounded by the timeout and
/// retryable failures are attempted again up to `retries` more times.
pub async fn with_policy<T, F, Fut>(policy: CallPolicy, mut call: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let attempts = policy.retries.saturating_add(1);
    let mut last_error = GenerationError::Empty;

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(attempt, attempts, error = %e, "Dialogue generator call failed");
                if !e.is_retryable() {
                    return Err(e);
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Extract JSON from a response that might have markdown code blocks or
/// prose around it.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    // ```json ... ``` blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // ``` ... ``` blocks without a language tag
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Outermost braces
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    text
}
