pub mod engine;
pub mod states;

pub use engine::{
    transition, CrmPublisher, DocumentFiller, DocumentStore, PipelineOrchestrator,
    PipelineReport, PipelineTransitionError, PublishTarget, RunRequest, StageCause, StageFailure,
};
pub use states::{PipelineEvent, PipelineState, Stage, TransitionOutcome};
