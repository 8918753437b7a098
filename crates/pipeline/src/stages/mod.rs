//! Pipeline Stages
//!
//! One module per step. Each stage wraps the collaborator it delegates to and
//! converts every collaborator failure into a degraded update:
//!
//! | Stage | Collaborators | On failure |
//! |-------|---------------|------------|
//! | classification | `QueryClassifier` | category `qa`, intent = query |
//! | synthesis | `QuerySynthesizer`, `QueryValidator` | `query_valid = false` |
//! | execution | `QueryExecutor` | empty row set |
//! | result_check | `ResultChecker` | treated as passed |
//! | narrative | `NarrativeSynthesizer` | deterministic fallback text |

mod classification;
mod execution;
mod narrative;
mod result_check;
mod synthesis;

use std::sync::Arc;

use query_cascade_core::{
    NarrativeSynthesizer, QueryClassifier, QueryExecutor, QuerySynthesizer, QueryValidator,
    ResultChecker, Stage, StageKind,
};

use crate::config::PipelineConfig;
use crate::routing::RetryPolicy;

pub use classification::ClassificationStage;
pub use execution::ExecutionStage;
pub use narrative::{fallback_narrative, suggest_visualization, NarrativeStage};
pub use result_check::ResultCheckStage;
pub use synthesis::{strip_code_fences, SynthesisStage};

/// The external collaborators a default pipeline is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn QueryClassifier>,
    pub synthesizer: Arc<dyn QuerySynthesizer>,
    pub validator: Arc<dyn QueryValidator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub checker: Arc<dyn ResultChecker>,
    pub narrator: Arc<dyn NarrativeSynthesizer>,
}

/// One stage implementation per step of the state machine.
#[derive(Clone)]
pub struct StageSet {
    classification: Arc<dyn Stage>,
    synthesis: Arc<dyn Stage>,
    execution: Arc<dyn Stage>,
    result_check: Arc<dyn Stage>,
    narrative: Arc<dyn Stage>,
}

impl StageSet {
    /// Assemble a stage set from explicit implementations.
    pub fn new(
        classification: Arc<dyn Stage>,
        synthesis: Arc<dyn Stage>,
        execution: Arc<dyn Stage>,
        result_check: Arc<dyn Stage>,
        narrative: Arc<dyn Stage>,
    ) -> Self {
        Self {
            classification,
            synthesis,
            execution,
            result_check,
            narrative,
        }
    }

    /// Build the standard stages around a set of collaborators.
    pub fn from_collaborators(collaborators: Collaborators, config: &PipelineConfig) -> Self {
        Self {
            classification: Arc::new(ClassificationStage::new(collaborators.classifier)),
            synthesis: Arc::new(SynthesisStage::new(
                collaborators.synthesizer,
                collaborators.validator,
                config.prior_error_context,
            )),
            execution: Arc::new(ExecutionStage::new(collaborators.executor)),
            result_check: Arc::new(ResultCheckStage::new(
                collaborators.checker,
                RetryPolicy::new(config.max_retries),
                config.null_scan_rows,
                config.checker_sample_rows,
            )),
            narrative: Arc::new(NarrativeStage::new(collaborators.narrator, config)),
        }
    }

    /// Replace a single stage, keeping the others.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        match stage.kind() {
            StageKind::Classification => self.classification = stage,
            StageKind::Synthesis => self.synthesis = stage,
            StageKind::Execution => self.execution = stage,
            StageKind::ResultCheck => self.result_check = stage,
            StageKind::Narrative => self.narrative = stage,
        }
        self
    }

    pub fn get(&self, kind: StageKind) -> &Arc<dyn Stage> {
        match kind {
            StageKind::Classification => &self.classification,
            StageKind::Synthesis => &self.synthesis,
            StageKind::Execution => &self.execution,
            StageKind::ResultCheck => &self.result_check,
            StageKind::Narrative => &self.narrative,
        }
    }
}
