//! Wire types shared by the classifier, task agents, and HTTP layer.

use serde::{Deserialize, Serialize};

/// What the pipeline should do with a request, as decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Answer the programming question directly.
    Proceed,
    /// Produce a Mermaid flowchart for the request.
    GenerateDiagram,
    /// Explain the concept with everyday analogies.
    Visualize,
    /// Only guidance text is needed, no task agent runs.
    Guide,
    /// The request is under-specified; ask the user for more detail.
    NeedMoreInfo,
    /// Refuse the request.
    Block,
    /// Any action string the classifier emits that we do not recognize.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Proceed => "proceed",
            Action::GenerateDiagram => "generate_diagram",
            Action::Visualize => "visualize",
            Action::Guide => "guide",
            Action::NeedMoreInfo => "need_more_info",
            Action::Block => "block",
            Action::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classifier verdict for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Whether the request is safe to act on
    pub safe: bool,

    /// Dispatch decision
    pub action: Action,

    /// Whether the task agent should see the user's editor code
    pub need_code: bool,

    /// Intent label, e.g. "code_analysis"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    /// Short rationale for the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ClassificationResult {
    /// The verdict used whenever classification cannot be trusted.
    pub fn blocked() -> Self {
        Self {
            safe: false,
            action: Action::Block,
            need_code: false,
            intent: None,
            response: None,
        }
    }
}

/// A follow-up question the predictor expects the user to ask next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedQuestion {
    pub question: String,
}

impl PredictedQuestion {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Outcome of running a task agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the agent produced a usable answer
    pub success: bool,

    /// Answer text, or a fixed failure notice
    pub response: String,

    /// Predicted follow-up questions (empty when none apply)
    #[serde(default)]
    pub predicted_questions: Vec<PredictedQuestion>,

    /// Raw Mermaid source when the agent drew a diagram
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram_source: Option<String>,
}

impl TaskResult {
    /// A successful textual answer with its predicted follow-ups.
    pub fn answer(response: impl Into<String>, predicted_questions: Vec<PredictedQuestion>) -> Self {
        Self {
            success: true,
            response: response.into(),
            predicted_questions,
            diagram_source: None,
        }
    }

    /// A successful diagram. `response` carries the fenced form for display.
    pub fn diagram(response: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
            predicted_questions: Vec::new(),
            diagram_source: Some(source.into()),
        }
    }

    /// A failed run carrying a fixed user-facing notice.
    pub fn failure(response: impl Into<String>) -> Self {
        Self {
            success: false,
            response: response.into(),
            predicted_questions: Vec::new(),
            diagram_source: None,
        }
    }
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// The user's question
    pub query: String,

    /// Problem statement the user is working on
    #[serde(default)]
    pub problem_content: String,

    /// Current contents of the user's editor
    #[serde(default)]
    pub editor_code: String,
}

/// Body of the `POST /analyze` response.
///
/// Classification fields are always present. Task fields only appear
/// when a task agent actually ran (or the request was refused).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Intent label, defaulting to "invalid_request"
    pub intent: String,

    /// Classifier safety verdict
    pub safe: bool,

    /// Dispatch decision
    pub action: Action,

    /// Whether editor code was considered
    pub need_code: bool,

    /// Classifier rationale or a default notice
    pub response: String,

    /// Whether the task agent succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_success: Option<bool>,

    /// Task agent output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_response: Option<String>,

    /// Predicted follow-up questions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_questions: Option<Vec<PredictedQuestion>>,
}

/// One event on the `POST /analyze/stream` SSE channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Classification verdict, always the first event
    Intent(ClassificationResult),
    /// A chunk of answer text
    Content(String),
    /// Predicted follow-up questions, sent once before the end
    PredictedQuestions(Vec<PredictedQuestion>),
    /// A task failure notice; a terminal `End` still follows
    Error(String),
    /// Terminal marker, always the last event
    End,
}
