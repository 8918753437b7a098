//! Classification Stage
//!
//! Labels the request as `qa`, `summarization` or `dashboard` and extracts
//! an intent and entities. Unknown labels and classifier failures both fall
//! back to `qa`, which is the path that can still answer most questions.

use std::sync::Arc;

use async_trait::async_trait;

use query_cascade_core::{
    QueryCategory, QueryClassifier, RequestState, Stage, StageKind, StateUpdate,
};

pub struct ClassificationStage {
    classifier: Arc<dyn QueryClassifier>,
}

impl ClassificationStage {
    pub fn new(classifier: Arc<dyn QueryClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage for ClassificationStage {
    fn kind(&self) -> StageKind {
        StageKind::Classification
    }

    async fn run(&self, state: &RequestState) -> StateUpdate {
        let query = state.query();

        match self.classifier.classify(query, state.dataset_schema()).await {
            Ok(classification) => {
                let category = match QueryCategory::from_label(&classification.category) {
                    Some(category) => category,
                    None => {
                        tracing::debug!(
                            "Unknown category label '{}', defaulting to qa",
                            classification.category
                        );
                        QueryCategory::Qa
                    }
                };
                let intent = classification
                    .intent
                    .filter(|intent| !intent.trim().is_empty())
                    .unwrap_or_else(|| query.to_string());

                StateUpdate::classified(category, intent, classification.entities)
            }
            Err(e) => {
                tracing::warn!("Query classification failed: {}", e);
                StateUpdate::classified(QueryCategory::Qa, query, Default::default())
                    .with_error(format!("Query understanding error: {}", e.detail()))
            }
        }
    }
}
