//! Asset Analysis Orchestrator
//!
//! Answers an investment question about one asset by:
//! - Running macro, technical and sentiment specialists concurrently
//! - Synthesizing their outputs deterministically (no LLM in the vote)
//! - Remembering prior turns of a conversation and injecting them
//! - Caching full analyses under a collision-resistant key
//!
//! PIPELINE:
//! CACHE → CONTEXT → FAN-OUT → SYNTHESIZE → COMMIT

pub mod agent;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod memory;
pub mod models;
pub mod specialists;
pub mod state;
pub mod synthesis;

pub use error::Result;

// Re-export common types
pub use agent::Orchestrator;
pub use config::Settings;
pub use error::OrchestrationError;
pub use models::*;
