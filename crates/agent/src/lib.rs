//! Lead extraction for inbound listing emails.
//!
//! The model only turns free text into the fixed set of lead fields. Which fields end up on a
//! record, and whether a record is touched at all, is decided by the caller.

pub mod extraction;
pub mod llm;

pub use extraction::{EmailContent, ExtractionError, LeadExtraction, LeadExtractor};
pub use llm::{ChatPrompt, LlmClient, OpenAiCompatibleClient};
