//! Task agents for the Chiron assistant.
//!
//! Each agent turns one classified request into a [`TaskResult`]:
//!
//! - **Tutor**: answers programming questions using the problem
//!   statement and, when allowed, the user's editor code
//! - **Diagram**: produces validated Mermaid flowchart source
//! - **Analogy**: explains concepts through everyday comparisons
//! - **Predictor**: guesses up to three follow-up questions
//!
//! Agents are stateless: everything request-specific arrives through
//! the [`SessionContext`], so one agent instance serves all requests.

pub mod analogy;
pub mod diagram;
pub mod predictor;
pub mod tutor;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use chiron_common::{SessionContext, TaskResult};

/// A specialist that handles one dispatched request.
///
/// Agents never return errors: any upstream failure folds into a
/// `TaskResult` with `success: false` and a fixed notice, with the
/// detail going to the log instead of the user.
#[async_trait]
pub trait TaskAgent: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, query: &str, intent: Option<&str>, ctx: &SessionContext) -> TaskResult;
}

pub use analogy::AnalogyAgent;
pub use diagram::DiagramAgent;
pub use predictor::QuestionPredictor;
pub use tutor::TutorAgent;
