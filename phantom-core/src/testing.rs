//! Testing utilities.
//!
//! This module provides dialogue generators for deterministic tests:
//! - `ScriptedDialogue` returns queued replies per task kind, with defaults
//! - `FailingDialogue` fails every call
//!
//! Neither touches the network.

use crate::dialogue::{ContextLine, DialogueGenerator, GenerationError, TaskKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One queued outcome.
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail,
}

/// A generator call as the scripted generator saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: Option<TaskKind>,
    pub persona: String,
    pub context: Vec<ContextLine>,
    pub task: String,
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<TaskKind, VecDeque<Scripted>>,
    defaults: HashMap<TaskKind, String>,
    calls: Vec<RecordedCall>,
}

/// A dialogue generator that returns scripted replies.
///
/// Each task kind has its own queue. When a queue is empty the kind's
/// default reply is returned.
#[derive(Debug)]
pub struct ScriptedDialogue {
    script: Mutex<Script>,
}

impl Default for ScriptedDialogue {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDialogue {
    pub fn new() -> Self {
        let defaults = [
            (TaskKind::Utterance, "음... 다들 어젯밤에 뭘 하고 있었는지 말해 봐요."),
            (TaskKind::Reply, "저는 정말 아무것도 몰라요."),
            (TaskKind::RankSpeaker, "없음"),
            (TaskKind::Clue, "바닥에 누구의 것인지 모를 발자국이 남아 있다."),
            (TaskKind::Accusations, r#"{"accusations": []}"#),
            (TaskKind::Summary, "서로의 알리바이를 확인하며 탐색전을 벌인 하루였다."),
        ]
        .into_iter()
        .map(|(kind, text)| (kind, text.to_string()))
        .collect();

        Self {
            script: Mutex::new(Script {
                defaults,
                ..Script::default()
            }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a reply for the next call of `kind`.
    pub fn push(&self, kind: TaskKind, reply: impl Into<String>) {
        self.script()
            .queued
            .entry(kind)
            .or_default()
            .push_back(Scripted::Reply(reply.into()));
    }

    /// Make the next call of `kind` fail.
    pub fn push_failure(&self, kind: TaskKind) {
        self.script()
            .queued
            .entry(kind)
            .or_default()
            .push_back(Scripted::Fail);
    }

    /// Replace the reply used once the queue for `kind` is empty.
    pub fn set_default(&self, kind: TaskKind, reply: impl Into<String>) {
        self.script().defaults.insert(kind, reply.into());
    }

    pub fn with_utterance(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::Utterance, reply);
        self
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::Reply, reply);
        self
    }

    pub fn with_rank(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::RankSpeaker, reply);
        self
    }

    pub fn with_clue(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::Clue, reply);
        self
    }

    pub fn with_accusations(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::Accusations, reply);
        self
    }

    pub fn with_default_accusations(self, reply: impl Into<String>) -> Self {
        self.set_default(TaskKind::Accusations, reply);
        self
    }

    pub fn with_summary(self, reply: impl Into<String>) -> Self {
        self.push(TaskKind::Summary, reply);
        self
    }

    pub fn with_failure(self, kind: TaskKind) -> Self {
        self.push_failure(kind);
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    /// Number of calls made for `kind`.
    pub fn call_count(&self, kind: TaskKind) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| c.kind == Some(kind))
            .count()
    }
}

#[async_trait]
impl DialogueGenerator for ScriptedDialogue {
    async fn generate(
        &self,
        persona: &str,
        context: &[ContextLine],
        task: &str,
    ) -> Result<String, GenerationError> {
        let kind = TaskKind::detect(task);
        let mut script = self.script();
        script.calls.push(RecordedCall {
            kind,
            persona: persona.to_string(),
            context: context.to_vec(),
            task: task.to_string(),
        });

        let Some(kind) = kind else {
            return Ok("...".to_string());
        };

        let next = script.queued.get_mut(&kind).and_then(|q| q.pop_front());
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail) => Err(GenerationError::Provider(claude::Error::Network(
                "scripted failure".to_string(),
            ))),
            None => Ok(script.defaults.get(&kind).cloned().unwrap_or_default()),
        }
    }
}

/// A dialogue generator whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingDialogue;

#[async_trait]
impl DialogueGenerator for FailingDialogue {
    async fn generate(
        &self,
        _persona: &str,
        _context: &[ContextLine],
        _task: &str,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Provider(claude::Error::Network(
            "generator unavailable".to_string(),
        )))
    }
}
