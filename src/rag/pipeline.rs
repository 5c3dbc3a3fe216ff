use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::generator::AnswerGenerator;
use super::retriever::Retriever;
use super::sources::{SourceRef, format_sources, uncited_sources};
use crate::Result;
use crate::embeddings::Chunk;
use crate::providers::Role;
use crate::session::{SessionStore, lock_session};

pub const DEFAULT_TOP_K: usize = 4;

pub const EMPTY_QUESTION_REPLY: &str = "Please enter a question.";

/// Reply to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    /// Retrieved chunks, closest first
    pub chunks: Vec<Chunk>,
}

impl Answer {
    #[inline]
    pub fn formatted_sources(&self, markdown: bool) -> String {
        format_sources(&self.sources, markdown)
    }
}

/// Retrieval, generation and session memory behind `ask`
pub struct ConversationalPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
    sessions: Arc<SessionStore>,
    top_k: usize,
}

impl ConversationalPipeline {
    #[inline]
    pub fn new(retriever: Retriever, generator: AnswerGenerator, sessions: Arc<SessionStore>) -> Self {
        Self {
            retriever,
            generator,
            sessions,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn generator(&self) -> &AnswerGenerator {
        &self.generator
    }

    /// Answer `question` in the context of `session_id`'s conversation
    ///
    /// Requests on the same session run one at a time. The question and
    /// answer are recorded only once generation succeeds.
    #[inline]
    pub fn ask(&self, session_id: &str, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Ok(Answer {
                text: EMPTY_QUESTION_REPLY.to_string(),
                sources: Vec::new(),
                chunks: Vec::new(),
            });
        }

        let session = self.sessions.get_or_create(session_id);
        let mut guard = lock_session(&session);
        let history = guard.turns().to_vec();
        debug!(
            "Session {} has {} prior turn(s)",
            session_id,
            history.len()
        );

        let hits = self.retriever.retrieve(question, self.top_k)?;
        let chunks: Vec<Chunk> = hits.into_iter().map(|hit| hit.chunk).collect();

        let text = self.generator.generate(question, &chunks, &history)?;

        guard.push(Role::User, question);
        guard.push(Role::Assistant, text.clone());
        drop(guard);

        let sources: Vec<SourceRef> = chunks.iter().map(SourceRef::from_chunk).collect();
        let unknown = uncited_sources(&text, &sources);
        if !unknown.is_empty() {
            warn!(
                "Answer for session {} cites sources that were not retrieved: {:?}",
                session_id, unknown
            );
        }

        info!(
            "Answered in session {} with {} source(s)",
            session_id,
            sources.len()
        );
        Ok(Answer {
            text,
            sources,
            chunks,
        })
    }
}
