//! Request pipeline for Chiron.
//!
//! The pipeline is the central brain that:
//! 1. Receives user requests
//! 2. Classifies intent and screens for unsafe queries
//! 3. Dispatches to the agent the classification calls for
//! 4. Assembles the response envelope, batch or streaming
//!
//! # Architecture
//!
//! ```text
//! User Request
//!      │
//!      ▼
//! ┌──────────────────┐
//! │     Pipeline     │  ◄── IntentClassifier
//! │   (this crate)   │
//! └────────┬─────────┘
//!          │ dispatch on action
//!    ┌─────┴─────┬──────────┐
//!    ▼           ▼          ▼
//! [Tutor]    [Diagram]  [Analogy]
//!  Agent      Agent      Agent
//!    │                      │
//!    ▼                      ▼
//!      [Question Predictor]
//! ```

pub mod classifier;
pub mod config;
pub mod pipeline;

pub use classifier::IntentClassifier;
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, REFUSAL_TEXT};
