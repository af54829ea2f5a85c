//! Common types shared across Chiron crates.
//!
//! This crate provides the wire types, session context, and errors
//! that the classifier, task agents, and HTTP layer exchange.

pub mod context;
pub mod error;
pub mod types;

pub use context::SessionContext;
pub use error::{ChironError, Result};
pub use types::{
    Action, AnalyzeRequest, AnalyzeResponse, ClassificationResult, PredictedQuestion, StreamEvent,
    TaskResult,
};
