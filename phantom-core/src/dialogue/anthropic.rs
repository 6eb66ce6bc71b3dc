//! Claude-backed dialogue generator.

use super::generator::{ContextLine, DialogueGenerator, GenerationError};
use super::prompts::render_context;
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use std::time::Duration;
use tracing::debug;

/// Configuration for the Claude-backed generator.
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens per reply. Utterances are short.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// HTTP timeout for a single request.
    pub request_timeout: Duration,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 400,
            temperature: Some(0.8),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A `DialogueGenerator` that asks Claude.
///
/// The persona becomes the system prompt; the context window and the task
/// are sent as a single user turn.
#[derive(Debug, Clone)]
pub struct ClaudeDialogue {
    client: Claude,
    config: DialogueConfig,
}

impl ClaudeDialogue {
    /// Build a generator with its own HTTP client.
    pub fn new(api_key: impl Into<String>, config: DialogueConfig) -> Result<Self, claude::Error> {
        let client = Claude::with_timeout(api_key, config.request_timeout)?;
        Ok(Self { client, config })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Claude, config: DialogueConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }

    fn build_request(&self, persona: &str, context: &[ContextLine], task: &str) -> Request {
        let prompt = if context.is_empty() {
            task.to_string()
        } else {
            format!("## 지금까지의 대화\n{}\n\n{task}", render_context(context))
        };

        let mut request = Request::new(vec![Message::user(prompt)])
            .with_system(persona)
            .with_max_tokens(self.config.max_tokens);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl DialogueGenerator for ClaudeDialogue {
    async fn generate(
        &self,
        persona: &str,
        context: &[ContextLine],
        task: &str,
    ) -> Result<String, GenerationError> {
        let request = self.build_request(persona, context, task);
        let response = self.client.complete(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Claude reply received"
        );

        let text = response.text().trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue() -> ClaudeDialogue {
        ClaudeDialogue::new("test-key", DialogueConfig::default()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DialogueConfig::default();
        assert!(config.model.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_empty_key() {
        assert!(matches!(
            ClaudeDialogue::new("", DialogueConfig::default()),
            Err(claude::Error::NoApiKey)
        ));
    }

    #[test]
    fn test_request_shape() {
        let context = vec![ContextLine::new("김민수", "어젯밤에 뭐 했어요?")];
        let request = dialogue().build_request("persona", &context, "task");
        assert_eq!(request.system.as_deref(), Some("persona"));
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.contains("김민수: 어젯밤에 뭐 했어요?"));
        assert!(request.messages[0].content.ends_with("task"));
        assert_eq!(request.temperature, Some(0.8));
    }

    #[test]
    fn test_request_without_context_is_task_only() {
        let request = dialogue().build_request("persona", &[], "task");
        assert_eq!(request.messages[0].content, "task");
    }
}
