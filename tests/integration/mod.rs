//! Integration Tests Module
//!
//! End-to-end tests over a real SQLite engine with scripted model
//! collaborators. No network calls are made.

// Shared fixtures and scripted collaborators
mod support;

// Orchestrator driven against the SQLite engine
mod pipeline_test;

// Chat service: dataset resolution, caching, timeouts and cancellation
mod chat_service_test;

// Application wiring, dataset registration and configuration
mod app_state_test;
