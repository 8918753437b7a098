//! Query Cascade Pipeline
//!
//! Stage implementations, routing and the request orchestrator. This crate
//! depends only on `query-cascade-core`: every external collaborator (model
//! provider, query engine) arrives as a capability trait object, so the
//! whole pipeline can be compiled and tested without network or storage.
//!
//! - `stages` - The five stages and the `StageSet` that holds them
//! - `routing` - State machine steps (`PipelineStep`) and the `RetryPolicy`
//! - `orchestrator` - Sequencing, cancellation and tracing (`Orchestrator`)
//! - `response` - Reading a terminal state into a `PipelineResponse`
//! - `config` - Tunables (`PipelineConfig`)
//! - `context` - Per-run control handle (`RunContext`)

pub mod config;
pub mod context;
pub mod orchestrator;
pub mod response;
pub mod routing;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

// Re-export configuration
pub use config::{PipelineConfig, MAX_RETRY_BUDGET};
pub use context::RunContext;

// Re-export orchestrator types
pub use orchestrator::{Orchestrator, PipelineOutcome, StageRecord};
pub use response::{terminal_message, PipelineResponse, ResultData};
pub use routing::{PipelineStep, RetryPolicy};

// Re-export stages
pub use stages::{
    fallback_narrative, strip_code_fences, suggest_visualization, ClassificationStage,
    Collaborators, ExecutionStage, NarrativeStage, ResultCheckStage, StageSet, SynthesisStage,
};
