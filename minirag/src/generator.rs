//! Grounded answer generation.
//!
//! The [`AnswerGenerator`] joins retrieved chunk texts into a context block,
//! pairs it with a fixed system instruction, and asks a [`ChatModel`] for an
//! answer at temperature 0.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// The answer the model is instructed to give when the context is insufficient.
pub const REFUSAL_ANSWER: &str = "I don't have enough information in the provided documents.";

/// Substring used to recognise a refusal, compared case-insensitively.
const REFUSAL_MARKER: &str = "don't have enough information";

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str = "\
You are an internal AI assistant that answers questions about the uploaded documents.
Your role is to answer user questions strictly using the provided document context.
RULES (MANDATORY):
1. Use ONLY the information present in the provided context.
2. Do NOT use external knowledge, assumptions, or general industry knowledge.
3. If the answer is not explicitly mentioned or cannot be inferred directly from the context, respond with:
   \"I don't have enough information in the provided documents.\"
4. Do NOT exaggerate, guarantee, or invent details.
5. When multiple options exist, clearly differentiate them based on the context.
6. Maintain a professional, factual, and neutral tone.
The final answer must be concise, accurate, and grounded in the retrieved content.";

/// Sampling temperature for every completion.
pub const ANSWER_TEMPERATURE: f32 = 0.0;

/// Whether a generated answer is the refusal.
pub fn is_refusal(answer: &str) -> bool {
    answer.to_lowercase().contains(REFUSAL_MARKER)
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// The end user.
    User,
}

/// A role-tagged message sent to a [`ChatModel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// A remote chat completion model.
///
/// Failures are reported as [`RagError::GenerationService`](crate::RagError::GenerationService).
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the messages and return the model's reply verbatim.
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;

    /// Identifier of the model.
    fn model(&self) -> &str;
}

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The model's response.
    pub text: String,
    /// Whether the response is the refusal answer.
    pub refused: bool,
    /// Retrieved chunks, in the order they were given to the model.
    pub retrieved: Vec<SearchResult>,
}

/// Builds grounded prompts and sends them to a [`ChatModel`].
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl AnswerGenerator {
    /// Create a generator using [`SYSTEM_PROMPT`].
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, system_prompt: SYSTEM_PROMPT.to_string() }
    }

    /// Replace the system instruction.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The system instruction in use.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the system + user exchange for a question and its context.
    ///
    /// Chunk texts are joined with blank lines in the order given. An empty
    /// chunk list still produces a (blank) context section.
    pub fn build_messages(&self, query: &str, chunks: &[&Chunk]) -> Vec<ChatMessage> {
        let context = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(format!("Context:\n{context}\n\nQuestion:\n{query}")),
        ]
    }

    /// Ask the model to answer `query` using only `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationService`](crate::RagError::GenerationService)
    /// if the model call fails.
    pub async fn generate(&self, query: &str, chunks: &[&Chunk]) -> Result<String> {
        let messages = self.build_messages(query, chunks);
        debug!(model = self.model.model(), context_chunks = chunks.len(), "requesting answer");

        let answer = self.model.complete(&messages, ANSWER_TEMPERATURE).await?;

        info!(model = self.model.model(), refused = is_refusal(&answer), "generated answer");
        Ok(answer)
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator").field("model", &self.model.model()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::document::{DocumentMetadata, Page};

    #[derive(Default)]
    struct RecordingModel {
        seen: Mutex<Vec<(Vec<ChatMessage>, f32)>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
            self.seen.lock().unwrap().push((messages.to_vec(), temperature));
            Ok("recorded".to_string())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            id: "d/0".into(),
            document_id: "d".into(),
            chunk_index: 0,
            text: text.into(),
            embedding: Vec::new(),
            metadata: DocumentMetadata { source: "a.md".into(), page: Page::NotApplicable },
        }
    }

    #[test]
    fn context_joins_chunks_with_blank_lines() {
        let generator = AnswerGenerator::new(Arc::new(RecordingModel::default()));
        let (a, b) = (chunk("alpha"), chunk("beta"));
        let messages = generator.build_messages("what?", &[&a, &b]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Context:\nalpha\n\nbeta\n\nQuestion:\nwhat?");
    }

    #[test]
    fn empty_context_is_still_sent() {
        let generator = AnswerGenerator::new(Arc::new(RecordingModel::default()));
        let messages = generator.build_messages("anything?", &[]);
        assert_eq!(messages[1].content, "Context:\n\n\nQuestion:\nanything?");
    }

    #[tokio::test]
    async fn generate_uses_zero_temperature() {
        let model = Arc::new(RecordingModel::default());
        let generator = AnswerGenerator::new(model.clone());
        let c = chunk("ctx");

        let answer = generator.generate("q", &[&c]).await.unwrap();
        assert_eq!(answer, "recorded");
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, 0.0);
    }

    #[test]
    fn refusal_detection_is_case_insensitive() {
        assert!(is_refusal(REFUSAL_ANSWER));
        assert!(is_refusal("Sorry, I DON'T HAVE ENOUGH INFORMATION to say."));
        assert!(!is_refusal("The warranty period is 24 months."));
    }

    #[test]
    fn system_prompt_names_the_refusal_string() {
        assert!(SYSTEM_PROMPT.contains(REFUSAL_ANSWER));
    }
}
