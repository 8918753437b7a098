//! Query Cascade Core
//!
//! Foundational types for the Query Cascade workspace: the per-request state
//! record, the typed partial updates stages return, the stage contract, and
//! the capability traits external collaborators implement. This crate has
//! zero dependencies on transport, storage or model-provider code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `state` - Request state record and query category (`RequestState`, `QueryCategory`)
//! - `update` - Partial updates and the merge vocabulary (`StateUpdate`, `StageChange`, `CheckOutcome`)
//! - `stage` - Uniform stage contract (`Stage`, `StageKind`)
//! - `capability` - Collaborator interfaces (classifier, synthesizer, engine, checker, narrator)
//! - `schema` - Profiled dataset schema (`DatasetSchema`, `SchemaSummary`)
//! - `results` - Result rows and chart suggestions
//!
//! ## Design Principles
//!
//! 1. **Minimal dependencies** - serde/async-trait/thiserror only
//! 2. **Trait-based collaborators** - enables fakes in tests and swapping providers
//! 3. **Merge rules live with the state** - stages can only describe changes

pub mod capability;
pub mod error;
pub mod results;
pub mod schema;
pub mod stage;
pub mod state;
pub mod update;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Request State ──────────────────────────────────────────────────────
pub use state::{DatasetRef, QueryCategory, RequestState};
pub use update::{CheckOutcome, StageChange, StateUpdate};

// ── Stage Contract ─────────────────────────────────────────────────────
pub use stage::{Stage, StageKind};

// ── Collaborators ──────────────────────────────────────────────────────
pub use capability::{
    CheckRequest, CheckVerdict, Classification, Narrative, NarrativeInput, NarrativeRequest,
    NarrativeSynthesizer, QueryClassifier, QueryExecutor, QuerySynthesizer, QueryValidation,
    QueryValidator, ResultChecker, SynthesisRequest,
};

// ── Data Model ─────────────────────────────────────────────────────────
pub use results::{ChartSuggestion, ChartType, Row, VisualizationHint};
pub use schema::{ColumnStats, DatasetSchema, DateRange, SchemaSummary};
