//! Prompt Templates
//!
//! System prompts and user-prompt builders for the model-backed pipeline
//! collaborators. Queries target SQLite, the engine the application ships.

use serde_json::{Map, Value};

use query_cascade_core::{DatasetSchema, Row, SchemaSummary};

// ============================================================================
// Classification
// ============================================================================

pub const CLASSIFICATION_SYSTEM: &str = "You are a Query Understanding Agent for a retail analytics system.
Your job is to analyze user queries and extract key information.

You must determine:
1. Query Type: \"summarization\", \"qa\", or \"dashboard\"
   - \"qa\": Specific questions requiring data retrieval (e.g., \"show me top 10\", \"what is the total\", \"which products\")
   - \"summarization\": Requests for overall summaries (e.g., \"summarize the data\", \"give me an overview\")
   - \"dashboard\": Requests for multiple visualizations or comprehensive views (e.g., \"create a dashboard\")

2. Intent: What the user wants to know

3. Entities: Extract relevant entities like date ranges, regions, categories or products,
   metrics (sales, revenue, price) and aggregations (top 5, total, average).

IMPORTANT: Most specific data queries should be classified as \"qa\", not \"dashboard\".
Only use \"dashboard\" if the user explicitly asks for a dashboard or a multi-chart view.

Return your analysis as a JSON object with these keys:
- query_type: string (one of \"qa\", \"summarization\", \"dashboard\")
- intent: string
- entities: object";

pub fn classification_user(query: &str, schema: Option<&DatasetSchema>) -> String {
    let schema_text = match schema {
        Some(schema) => pretty(&serde_json::json!({
            "columns": schema.columns,
            "schema": schema.column_types,
            "date_columns": schema.date_columns,
            "categorical_columns": schema.categorical_columns,
            "numerical_columns": schema.numerical_columns,
        })),
        None => "No schema available".to_string(),
    };
    format!(
        "Analyze this user query:\n\"{}\"\n\nAvailable data schema:\n{}\n\nReturn JSON only.",
        query, schema_text
    )
}

// ============================================================================
// Query Synthesis
// ============================================================================

pub const SYNTHESIS_SYSTEM: &str = "You are an expert SQL Generation Agent for SQLite.
Generate efficient, correct SQL queries based on user intent and data schema.

Guidelines:
1. Use SQLite SQL syntax (a single SELECT statement)
2. Always use proper WHERE clauses for filtering
3. Use appropriate aggregations (SUM, AVG, COUNT, etc.)
4. Handle dates with date(), strftime() or substr() as needed
5. Use LIMIT when appropriate
6. Group by categorical columns when aggregating
7. Handle NULL values and invalid data properly:
   - Filter out NULL, 'Nill', 'Null' and empty strings before converting
   - Example: WHERE column IS NOT NULL AND column != 'Nill' AND column != ''
   - Cast with CAST(NULLIF(column, '') AS REAL) when a numeric column is stored as text
8. Return only the SQL query, no explanations

Use the table name and column names exactly as provided.

IMPORTANT: Data quality issues are common. Always filter out invalid values before type conversions.";

pub const RETRY_GUIDANCE: &str = "Please fix the query to handle these issues. Cast defensively and filter out invalid values like 'Nill', 'Null', empty strings.";

pub fn synthesis_user(
    intent: &str,
    entities: &Map<String, Value>,
    schema: &DatasetSchema,
    table_name: &str,
    prior_errors: &[String],
) -> String {
    let mut prompt = format!(
        "Generate a SQL query for SQLite.\n\n\
         User Intent: {}\n\
         Entities: {}\n\n\
         Table: {}\n\
         Schema: {}\n\n\
         Date columns: {}\n\
         Categorical columns: {}\n\
         Numerical columns: {}\n\
         Sample values: {}\n\n\
         Return only the SQL query, no markdown, no explanations.",
        intent,
        pretty(&Value::Object(entities.clone())),
        table_name,
        pretty(&serde_json::json!(schema.column_types)),
        join_or_none(&schema.date_columns),
        join_or_none(&schema.categorical_columns),
        join_or_none(&schema.numerical_columns),
        compact(&serde_json::json!(schema.unique_values)),
    );

    if !prior_errors.is_empty() {
        prompt.push_str("\n\nPREVIOUS ATTEMPT FAILED with errors:\n");
        prompt.push_str(&prior_errors.join("\n"));
        prompt.push_str("\n\n");
        prompt.push_str(RETRY_GUIDANCE);
    }
    prompt
}

// ============================================================================
// Result Check
// ============================================================================

pub const CHECK_SYSTEM: &str = "You are a Validation Agent that checks query results for correctness.

Your job:
1. Check if results are reasonable given the query
2. Verify no obvious errors (all nulls, empty results when there shouldn't be, etc.)
3. Flag suspicious patterns
4. Suggest if the query needs refinement

Return JSON with:
- valid: bool
- issues: list of strings (empty if valid)
- suggestion: string (optional, if the query should be refined)";

pub fn check_user(query: &str, query_text: Option<&str>, row_count: usize, sample: &[Row]) -> String {
    format!(
        "Validate these query results:\n\n\
         Original Query: {}\n\
         SQL: {}\n\
         Result Count: {}\n\
         Sample Results: {}\n\n\
         Return JSON only.",
        query,
        query_text.unwrap_or("(none)"),
        row_count,
        compact(&serde_json::json!(sample)),
    )
}

// ============================================================================
// Narrative
// ============================================================================

pub const INSIGHT_SYSTEM: &str = "You are an Insight Generation Agent for retail analytics.
Generate clear, actionable insights from data in a conversational tone.

Guidelines:
1. Be concise but informative
2. Highlight key findings
3. Use business terminology
4. Include specific numbers and percentages
5. Suggest visualizations when appropriate
6. Format numbers nicely (e.g., 12.3K, 25.5%)

Your response should be natural and helpful, as if talking to a business analyst.";

pub fn insight_user(
    query: &str,
    rows: &[Row],
    row_count: usize,
    metadata: Option<&SchemaSummary>,
) -> String {
    format!(
        "Generate insights for this query.\n\n\
         User Query: \"{}\"\n\
         Query Results: {}\n\
         Result Count: {}\n\n\
         File Metadata: {}\n\n\
         Provide clear, actionable insights. If appropriate, suggest a chart.",
        query,
        compact(&serde_json::json!(rows)),
        row_count,
        metadata_text(metadata),
    )
}

pub const SUMMARIZATION_SYSTEM: &str = "You are a Summarization Agent for retail data.

Generate executive summaries that include:
1. Overall performance metrics
2. Key trends and patterns
3. Top performers and underperformers
4. Notable insights
5. Recommendations if appropriate

Be concise, factual, and business-focused.";

pub fn summarization_user(
    query: &str,
    schema: Option<&DatasetSchema>,
    metadata: Option<&SchemaSummary>,
) -> String {
    let (filename, stats, sample) = match schema {
        Some(schema) => (
            if schema.filename.is_empty() {
                schema.dataset_id.as_str()
            } else {
                schema.filename.as_str()
            },
            compact(&serde_json::json!(schema.summary_stats)),
            compact(&serde_json::json!(schema.unique_values)),
        ),
        None => ("(no dataset)", "{}".to_string(), "{}".to_string()),
    };
    format!(
        "Generate a summary for this dataset.\n\n\
         Request: \"{}\"\n\
         File: {}\n\
         Metadata: {}\n\
         Key Statistics: {}\n\
         Sample Values: {}\n\n\
         Provide a comprehensive but concise summary.",
        query,
        filename,
        metadata_text(metadata),
        stats,
        sample,
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn metadata_text(metadata: Option<&SchemaSummary>) -> String {
    metadata
        .map(|m| compact(&serde_json::json!(m)))
        .unwrap_or_else(|| "{}".to_string())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn compact(value: &Value) -> String {
    value.to_string()
}
