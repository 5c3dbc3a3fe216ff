// Retrieval-augmented generation
// Retriever, answer generator and the conversational pipeline that ties them to sessions


pub mod generator;
pub mod pipeline;
pub mod retriever;
pub mod sources;

pub use generator::{AnswerGenerator, SYSTEM_PROMPT, build_messages};
pub use pipeline::{Answer, ConversationalPipeline, DEFAULT_TOP_K, EMPTY_QUESTION_REPLY};
pub use retriever::Retriever;
pub use sources::{SourceRef, format_sources, uncited_sources};
