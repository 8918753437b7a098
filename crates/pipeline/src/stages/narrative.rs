//! Narrative Stage
//!
//! Produces the terminal answer. On the qa / dashboard path the synthesizer
//! sees the (capped) result rows; on the summarization path it sees only the
//! dataset profile, since nothing was executed.
//!
//! The message is never empty. When the synthesizer fails or returns blank
//! text a deterministic fallback is built from the state instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use query_cascade_core::results::result_columns;
use query_cascade_core::{
    ChartSuggestion, ChartType, DatasetSchema, Narrative, NarrativeInput, NarrativeRequest,
    NarrativeSynthesizer, QueryCategory, RequestState, Row, Stage, StageKind, StateUpdate,
    VisualizationHint,
};

use crate::config::PipelineConfig;

const NO_DATA_MESSAGE: &str =
    "No data found matching your query. Try rephrasing or checking the date range.";

/// Words in the narrative that signal the answer would benefit from a chart.
const VISUALIZATION_KEYWORDS: [&str; 4] = ["chart", "graph", "plot", "visualiz"];

const DEFAULT_CHART_TITLE: &str = "Data Visualization";

// ============================================================================
// Fallback text
// ============================================================================

/// Deterministic answer used when the narrative synthesizer gives nothing.
pub fn fallback_narrative(state: &RequestState, sample_fields: usize) -> String {
    if state.category() == Some(QueryCategory::Summarization) {
        if let Some(schema) = state.dataset_schema() {
            return profile_fallback(schema);
        }
    }

    if state.row_count() == 0 {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut text = format!("Found {} records matching your query.\n\n", state.row_count());
    if let Some(first) = state.rows().first() {
        text.push_str("Sample data:\n");
        for (key, value) in first.iter().take(sample_fields) {
            text.push_str(&format!("- {}: {}\n", key, display_value(value)));
        }
    }
    text
}

fn profile_fallback(schema: &DatasetSchema) -> String {
    let name = if schema.filename.is_empty() {
        &schema.dataset_id
    } else {
        &schema.filename
    };
    let mut text = format!(
        "Dataset {} has {} rows and {} columns: {}.",
        name,
        schema.row_count,
        schema.column_count,
        schema.columns.join(", ")
    );

    for (column, stats) in &schema.summary_stats {
        if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
            text.push_str(&format!(
                "\n- {}: ranges from {} to {} (mean {:.2})",
                column, min, max, mean
            ));
        }
    }
    for (column, range) in &schema.date_range {
        if let (Some(start), Some(end)) = (&range.start, &range.end) {
            text.push_str(&format!("\n- {}: {} to {}", column, start, end));
        }
    }
    text
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Visualization
// ============================================================================

/// Derive at most one chart from the result rows.
///
/// A chart is proposed only when there are rows with at least two columns
/// and the narrative mentions a chart. Hints never trigger a chart on their
/// own. The first two result columns become the X and Y axes; the first hint
/// may override the chart type and title.
pub fn suggest_visualization(
    text: &str,
    rows: &[Row],
    hints: &[VisualizationHint],
    config: &PipelineConfig,
) -> Option<ChartSuggestion> {
    if rows.is_empty() {
        return None;
    }

    let lowered = text.to_lowercase();
    let mentions_chart = VISUALIZATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword));
    if !mentions_chart {
        return None;
    }

    let columns = result_columns(rows);
    let [x_axis, y_axis, ..] = columns.as_slice() else {
        return None;
    };

    let hint = hints.first();
    Some(ChartSuggestion {
        chart_type: hint.and_then(|h| h.chart_type).unwrap_or(ChartType::Bar),
        title: hint
            .and_then(|h| h.title.clone())
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHART_TITLE.to_string()),
        data: rows.iter().take(config.chart_row_limit).cloned().collect(),
        x_axis: x_axis.to_string(),
        y_axis: y_axis.to_string(),
        height: config.chart_height,
    })
}

// ============================================================================
// Stage
// ============================================================================

pub struct NarrativeStage {
    narrator: Arc<dyn NarrativeSynthesizer>,
    config: PipelineConfig,
}

impl NarrativeStage {
    pub fn new(narrator: Arc<dyn NarrativeSynthesizer>, config: &PipelineConfig) -> Self {
        Self {
            narrator,
            config: config.clone(),
        }
    }

    fn fallback(&self, state: &RequestState, error: String) -> StateUpdate {
        let message = fallback_narrative(state, self.config.fallback_sample_fields);
        StateUpdate::narrated(message, Vec::new()).with_error(error)
    }
}

#[async_trait]
impl Stage for NarrativeStage {
    fn kind(&self) -> StageKind {
        StageKind::Narrative
    }

    async fn run(&self, state: &RequestState) -> StateUpdate {
        let summarizing = state.category() == Some(QueryCategory::Summarization);
        let rows = state.rows();
        let capped = &rows[..rows.len().min(self.config.narrative_row_limit)];

        let input = if summarizing {
            NarrativeInput::Profile {
                schema: state.dataset_schema(),
            }
        } else {
            NarrativeInput::Rows {
                rows: capped,
                row_count: state.row_count(),
            }
        };
        let request = NarrativeRequest {
            query: state.query(),
            input,
            metadata: state.dataset_schema().map(|schema| schema.summary()),
        };

        let Narrative {
            text,
            visualization_hints,
        } = match self.narrator.synthesize_narrative(request).await {
            Ok(narrative) => narrative,
            Err(e) => {
                tracing::warn!("Narrative generation failed, using fallback: {}", e);
                let error = format!("Narrative generation error: {}", e.detail());
                return self.fallback(state, error);
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("Narrative synthesizer returned empty text, using fallback");
            return self.fallback(state, "Narrative synthesizer returned empty text".to_string());
        }

        let chart_rows: &[Row] = if summarizing { &[] } else { rows };
        let visualizations =
            suggest_visualization(&text, chart_rows, &visualization_hints, &self.config)
                .into_iter()
                .collect();

        StateUpdate::narrated(text, visualizations)
    }
}
