use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::embeddings::Chunk;
use crate::providers::{ChatMessage, ChatModel};
use crate::session::Turn;

pub const SYSTEM_PROMPT: &str = "You are a concise, careful assistant. Answer ONLY from the provided context. If the answer is not in the context, say you don't know. Cite sources by filename and page if present.";

const NO_CONTEXT: &str = "(no relevant context found)";

/// Turns a question, retrieved chunks and prior turns into an answer
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    #[inline]
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    #[inline]
    pub fn generate(&self, question: &str, chunks: &[Chunk], history: &[Turn]) -> Result<String> {
        let messages = build_messages(question, chunks, history);
        debug!(
            "Generating answer from {} chunk(s) and {} prior turn(s)",
            chunks.len(),
            history.len()
        );
        let answer = self.model.complete(&messages)?;
        Ok(answer.trim().to_string())
    }
}

/// System instruction, then the prior turns in order, then the question with its context
#[inline]
pub fn build_messages(question: &str, chunks: &[Chunk], history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().map(Turn::to_message));
    messages.push(ChatMessage::user(format!(
        "Question:\n{}\n\nContext:\n{}",
        question,
        join_context(chunks)
    )));
    messages
}

fn join_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }
    chunks
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
