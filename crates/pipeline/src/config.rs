//! Pipeline Configuration
//!
//! Bounds and sample sizes used by the stages. Defaults match the behaviour
//! the rest of the system expects (two retries, 50 rows for the narrative,
//! the last three errors as corrective context).

use serde::{Deserialize, Serialize};

use query_cascade_core::{CoreError, CoreResult};

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRY_BUDGET: u32 = 5;

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Synthesize→execute→check cycles allowed after the first attempt
    pub max_retries: u32,
    /// Rows handed to the narrative synthesizer
    pub narrative_row_limit: usize,
    /// Leading rows scanned for the all-null structural check
    pub null_scan_rows: usize,
    /// Rows sent to the semantic result checker
    pub checker_sample_rows: usize,
    /// Error entries passed back to the synthesizer on retry
    pub prior_error_context: usize,
    /// Rows embedded in a chart suggestion
    pub chart_row_limit: usize,
    /// Chart height hint in pixels
    pub chart_height: u32,
    /// Fields of the first row listed in the fallback narrative
    pub fallback_sample_fields: usize,
    /// Rows included in the assembled response
    pub response_row_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            narrative_row_limit: 50,
            null_scan_rows: 10,
            checker_sample_rows: 5,
            prior_error_context: 3,
            chart_row_limit: 20,
            chart_height: 300,
            fallback_sample_fields: 5,
            response_row_limit: 100,
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_retries > MAX_RETRY_BUDGET {
            return Err(CoreError::config(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRY_BUDGET, self.max_retries
            )));
        }

        let limits = [
            ("narrative_row_limit", self.narrative_row_limit),
            ("null_scan_rows", self.null_scan_rows),
            ("checker_sample_rows", self.checker_sample_rows),
            ("prior_error_context", self.prior_error_context),
            ("chart_row_limit", self.chart_row_limit),
            ("fallback_sample_fields", self.fallback_sample_fields),
            ("response_row_limit", self.response_row_limit),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(CoreError::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.chart_height == 0 {
            return Err(CoreError::config("chart_height must be greater than 0"));
        }

        Ok(())
    }

    /// Maximum number of stage runs before narration, derived from the retry
    /// budget: one classification plus three stages per synthesis attempt.
    pub fn stage_run_ceiling(&self) -> usize {
        1 + 3 * (self.max_retries as usize + 1)
    }
}
