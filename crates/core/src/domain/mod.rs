pub mod document;
pub mod inbound;
pub mod publish;
pub mod submission;
