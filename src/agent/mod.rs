// Solution agent
// Asks the knowledge base first and falls back to a web search when it has no answer


use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::Result;
use crate::providers::{ChatMessage, ChatModel, Role};
use crate::rag::{Answer, ConversationalPipeline};
use crate::search::{WebResult, WebSearch};

pub const DEFAULT_WEB_RESULTS: usize = 2;

const WEB_PROMPT: &str = "You are an expert at finding solutions. Answer the user's technical question using ONLY the web results provided. Respond only with the solution itself, without conversational filler. If the results do not contain a solution, say you don't know.";

const UNKNOWN_MARKERS: [&str; 8] = [
    "don't know",
    "do not know",
    "not in the context",
    "no relevant context",
    "can't find",
    "cannot find",
    "couldn't find",
    "could not find",
];

/// Where a solution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolutionOrigin {
    KnowledgeBase,
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub text: String,
    pub origin: SolutionOrigin,
    /// Rendered source lines, empty if there are none
    pub sources: String,
}

pub struct SupportAgent {
    pipeline: Arc<ConversationalPipeline>,
    model: Arc<dyn ChatModel>,
    web: Option<Arc<dyn WebSearch>>,
    max_results: usize,
    markdown: bool,
}

impl SupportAgent {
    #[inline]
    pub fn new(pipeline: Arc<ConversationalPipeline>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            pipeline,
            model,
            web: None,
            max_results: DEFAULT_WEB_RESULTS,
            markdown: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>, max_results: usize) -> Self {
        self.web = Some(web);
        self.max_results = max_results;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    #[inline]
    pub fn pipeline(&self) -> &Arc<ConversationalPipeline> {
        &self.pipeline
    }

    /// Answer from the knowledge base, or from the web when it has nothing
    #[inline]
    pub fn solve(&self, session_id: &str, question: &str) -> Result<Solution> {
        let answer = self.pipeline.ask(session_id, question)?;

        let Some(web) = &self.web else {
            return Ok(self.from_knowledge_base(answer));
        };
        if question.trim().is_empty() || !needs_fallback(&answer) {
            return Ok(self.from_knowledge_base(answer));
        }

        info!("Knowledge base had no answer, searching the web");
        let results = match web.search(question, self.max_results) {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                info!("Web search returned nothing");
                return Ok(self.from_knowledge_base(answer));
            }
            Err(e) => {
                warn!("Web search failed, keeping knowledge base answer: {}", e);
                return Ok(self.from_knowledge_base(answer));
            }
        };

        let messages = vec![
            ChatMessage::system(WEB_PROMPT),
            ChatMessage::user(format!(
                "Question:\n{}\n\nWeb results:\n{}",
                question,
                render_results(&results)
            )),
        ];
        let text = match self.model.complete(&messages) {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                warn!("Web answer failed, keeping knowledge base answer: {}", e);
                return Ok(self.from_knowledge_base(answer));
            }
        };

        self.pipeline
            .sessions()
            .append(session_id, Role::Assistant, text.clone());

        Ok(Solution {
            text,
            origin: SolutionOrigin::Web,
            sources: self.format_web_sources(&results),
        })
    }

    fn from_knowledge_base(&self, answer: Answer) -> Solution {
        let sources = answer.formatted_sources(self.markdown);
        Solution {
            text: answer.text,
            origin: SolutionOrigin::KnowledgeBase,
            sources,
        }
    }

    fn format_web_sources(&self, results: &[WebResult]) -> String {
        let label = if self.markdown { "**Source:**" } else { "Source:" };
        let mut output = String::new();
        for result in results {
            let _ = write!(output, "\n- {} {}", label, result.url);
        }
        output
    }
}

/// Whether a knowledge base answer should be retried on the web
#[inline]
pub fn needs_fallback(answer: &Answer) -> bool {
    answer.sources.is_empty() || looks_unanswered(&answer.text)
}

fn looks_unanswered(text: &str) -> bool {
    let normalized = text.to_lowercase().replace('\u{2019}', "'");
    UNKNOWN_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}

fn render_results(results: &[WebResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {} ({})\n{}",
                i + 1,
                result.title,
                result.url,
                result.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
