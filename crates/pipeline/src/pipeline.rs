//! Request orchestration: classify, dispatch to an agent, assemble
//! the response envelope.

use std::sync::Arc;

use chiron_agents::{AnalogyAgent, DiagramAgent, TaskAgent, TutorAgent};
use chiron_common::{
    Action, AnalyzeRequest, AnalyzeResponse, ClassificationResult, Result, SessionContext,
    StreamEvent, TaskResult,
};
use chiron_llm::{build_llm_client, LlmClient};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::classifier::IntentClassifier;
use crate::config::PipelineConfig;

/// Fixed notice for refused requests.
pub const REFUSAL_TEXT: &str = "该请求已被安全策略拦截，无法处理。";

/// Envelope fallbacks when the classifier gave no label or rationale.
const DEFAULT_INTENT: &str = "invalid_request";
const DEFAULT_RESPONSE_TEXT: &str = "处理请求时出错";

/// The full request pipeline. One instance serves all requests; every
/// piece of per-request state lives in the `SessionContext` built for
/// that call.
pub struct Pipeline {
    classifier: IntentClassifier,
    tutor: TutorAgent,
    diagram: DiagramAgent,
    analogy: AnalogyAgent,
}

impl Pipeline {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            classifier: IntentClassifier::new(client.clone()),
            tutor: TutorAgent::new(client.clone()),
            diagram: DiagramAgent::new(client.clone()),
            analogy: AnalogyAgent::new(client),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(build_llm_client(&config.llm)?))
    }

    /// Runs the full pipeline for one request and returns the batch
    /// envelope. Infallible: failures surface inside the envelope.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> AnalyzeResponse {
        info!(
            query_preview = %request.query.chars().take(50).collect::<String>(),
            "Analyzing request"
        );

        let mut ctx = SessionContext::new();
        ctx.set_problem_content(&request.problem_content);

        let classification = self.classifier.classify(&request.query).await;
        let task = self.dispatch(&classification, request, &mut ctx).await;
        assemble_response(classification, task)
    }

    /// Runs the agent the classification calls for. `None` means the
    /// classification itself is the whole answer.
    async fn dispatch(
        &self,
        classification: &ClassificationResult,
        request: &AnalyzeRequest,
        ctx: &mut SessionContext,
    ) -> Option<TaskResult> {
        let intent = classification.intent.as_deref();
        match classification.action {
            Action::Proceed => {
                // Editor code reaches the tutor only when the
                // classifier asked for it.
                if classification.need_code {
                    ctx.set_editor_code(&request.editor_code);
                }
                Some(self.tutor.run(&request.query, intent, ctx).await)
            }
            Action::GenerateDiagram => Some(self.diagram.run(&request.query, intent, ctx).await),
            Action::Visualize => Some(self.analogy.run(&request.query, intent, ctx).await),
            Action::Guide | Action::NeedMoreInfo => None,
            Action::Block | Action::Unknown => Some(TaskResult::failure(REFUSAL_TEXT)),
        }
    }

    /// Streaming variant of [`analyze`](Self::analyze): events go out
    /// over `events` as the pipeline progresses.
    ///
    /// The event order is fixed: `intent` first, then content or an
    /// error notice, then `predicted_questions` when the branch has
    /// any, then the terminal `end`. A dropped receiver stops the run
    /// quietly.
    pub async fn analyze_stream(&self, request: AnalyzeRequest, events: mpsc::Sender<StreamEvent>) {
        info!(
            query_preview = %request.query.chars().take(50).collect::<String>(),
            "Analyzing request (streaming)"
        );

        let mut ctx = SessionContext::new();
        ctx.set_problem_content(&request.problem_content);

        let classification = self.classifier.classify(&request.query).await;
        if events
            .send(StreamEvent::Intent(classification.clone()))
            .await
            .is_err()
        {
            debug!("Stream consumer disconnected before classification");
            return;
        }

        let intent = classification.intent.as_deref();
        match classification.action {
            Action::Proceed => {
                if classification.need_code {
                    ctx.set_editor_code(&request.editor_code);
                }
                let result = self
                    .tutor
                    .run_streaming(&request.query, intent, &ctx, &events)
                    .await;
                if result.success {
                    let _ = events
                        .send(StreamEvent::PredictedQuestions(result.predicted_questions))
                        .await;
                } else {
                    let _ = events.send(StreamEvent::Error(result.response)).await;
                }
            }
            Action::GenerateDiagram => {
                let result = self.diagram.run(&request.query, intent, &ctx).await;
                if result.success {
                    let _ = events.send(StreamEvent::Content(result.response)).await;
                } else {
                    let _ = events.send(StreamEvent::Error(result.response)).await;
                }
            }
            Action::Visualize => {
                let result = self.analogy.run(&request.query, intent, &ctx).await;
                if result.success {
                    let _ = events.send(StreamEvent::Content(result.response)).await;
                    let _ = events
                        .send(StreamEvent::PredictedQuestions(result.predicted_questions))
                        .await;
                } else {
                    let _ = events.send(StreamEvent::Error(result.response)).await;
                }
            }
            Action::Guide | Action::NeedMoreInfo => {
                let rationale = classification
                    .response
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RESPONSE_TEXT.to_string());
                let _ = events.send(StreamEvent::Content(rationale)).await;
            }
            Action::Block | Action::Unknown => {
                let _ = events
                    .send(StreamEvent::Content(REFUSAL_TEXT.to_string()))
                    .await;
            }
        }

        let _ = events.send(StreamEvent::End).await;
    }
}

fn assemble_response(
    classification: ClassificationResult,
    task: Option<TaskResult>,
) -> AnalyzeResponse {
    let intent = classification
        .intent
        .unwrap_or_else(|| DEFAULT_INTENT.to_string());
    let response = classification
        .response
        .unwrap_or_else(|| DEFAULT_RESPONSE_TEXT.to_string());

    let (task_success, task_response, predicted_questions) = match task {
        Some(task) => (
            Some(task.success),
            Some(task.response),
            Some(task.predicted_questions),
        ),
        None => (None, None, None),
    };

    AnalyzeResponse {
        intent,
        safe: classification.safe,
        action: classification.action,
        need_code: classification.need_code,
        response,
        task_success,
        task_response,
        predicted_questions,
    }
}
