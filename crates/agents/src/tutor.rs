//! Programming tutor: answers questions against the problem statement
//! and, when the classifier asked for it, the user's editor code.

use std::sync::Arc;

use async_trait::async_trait;
use chiron_common::{SessionContext, StreamEvent, TaskResult};
use chiron_llm::{LlmClient, LlmRequest};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::predictor::QuestionPredictor;
use crate::TaskAgent;

const TUTOR_SYSTEM_PROMPT: &str = r#"你是一个专业的编程助手，负责执行用户的编程相关任务。
根据不同的任务类型，你需要提供相应的帮助：

1. 对于代码分析任务：
   - 分析代码的时间复杂度和空间复杂度
   - 指出代码中可能的性能瓶颈
   - 提供优化建议

2. 对于解题思路任务：
   - 分析问题的关键点
   - 提供清晰的解题步骤
   - 推荐合适的算法和数据结构

3. 对于代码检查任务：
   - 检查代码的正确性
   - 指出潜在的bug
   - 提供改进建议

4. 对于代码提示任务：
   - 提供符合最佳实践的代码示例
   - 解释关键的代码片段
   - 给出注释和文档建议

请确保你的回答：
1. 针对具体任务类型提供相应的专业建议
2. 给出清晰、可执行的建议
3. 必要时提供代码示例
4. 解释你的建议理由
"#;

const FAILURE_NOTICE: &str = "任务执行失败，请稍后重试。";
const TEMPERATURE: f32 = 0.2;

pub struct TutorAgent {
    client: Arc<dyn LlmClient>,
    predictor: QuestionPredictor,
}

impl TutorAgent {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            predictor: QuestionPredictor::new(client.clone()),
            client,
        }
    }

    fn build_request(&self, query: &str, intent: Option<&str>, ctx: &SessionContext) -> LlmRequest {
        LlmRequest::with_system(TUTOR_SYSTEM_PROMPT, build_task_prompt(query, intent, ctx))
            .temperature(TEMPERATURE)
    }

    /// Streams the answer into `events` token by token, then predicts
    /// follow-ups from the assembled text.
    ///
    /// A dropped receiver aborts the run; there is nobody left to
    /// answer.
    pub async fn run_streaming(
        &self,
        query: &str,
        intent: Option<&str>,
        ctx: &SessionContext,
        events: &mpsc::Sender<StreamEvent>,
    ) -> TaskResult {
        let mut stream = match self
            .client
            .complete_stream(self.build_request(query, intent, ctx))
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Tutor stream failed to start");
                return TaskResult::failure(FAILURE_NOTICE);
            }
        };

        let mut answer = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(token) => {
                    answer.push_str(&token);
                    if events.send(StreamEvent::Content(token)).await.is_err() {
                        debug!("Stream consumer disconnected, aborting tutor run");
                        return TaskResult::failure(FAILURE_NOTICE);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Tutor stream failed mid-answer");
                    return TaskResult::failure(FAILURE_NOTICE);
                }
            }
        }

        if answer.trim().is_empty() {
            error!("Tutor stream produced no content");
            return TaskResult::failure(FAILURE_NOTICE);
        }

        let questions = self.predictor.predict(ctx, query, &answer).await;
        TaskResult::answer(answer, questions)
    }
}

#[async_trait]
impl TaskAgent for TutorAgent {
    fn name(&self) -> &'static str {
        "tutor"
    }

    async fn run(&self, query: &str, intent: Option<&str>, ctx: &SessionContext) -> TaskResult {
        let answer = match self
            .client
            .complete(self.build_request(query, intent, ctx))
            .await
        {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => {
                error!("Tutor returned an empty answer");
                return TaskResult::failure(FAILURE_NOTICE);
            }
            Err(e) => {
                error!(error = %e, "Tutor request failed");
                return TaskResult::failure(FAILURE_NOTICE);
            }
        };

        let questions = self.predictor.predict(ctx, query, &answer).await;
        TaskResult::answer(answer, questions)
    }
}

fn directive_for(intent: Option<&str>) -> &'static str {
    match intent {
        Some("code_analysis") => "分析代码的复杂度和性能，并提供优化建议。",
        Some("problem_solving") => "提供清晰的解题思路和方法。",
        Some("code_check") => "检查代码的正确性，指出潜在问题。",
        Some("code_suggestion") => "提供改进建议和代码示例。",
        _ => "针对用户的问题提供专业的帮助。",
    }
}

fn build_task_prompt(query: &str, intent: Option<&str>, ctx: &SessionContext) -> String {
    let mut context = format!("题目内容:\n{}\n\n", ctx.problem_content());
    if ctx.has_editor_code() {
        context.push_str(&format!("用户代码:\n{}\n\n", ctx.editor_code()));
    }
    context.push_str("请根据以上内容，");
    context.push_str(directive_for(intent));
    format!("{context}\n\n用户问题: {query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;
    use chiron_common::ChironError;

    fn ctx_with(problem: &str, code: &str) -> SessionContext {
        let mut ctx = SessionContext::new();
        ctx.set_problem_content(problem);
        ctx.set_editor_code(code);
        ctx
    }

    #[test]
    fn prompt_includes_code_only_when_present() {
        let ctx = ctx_with("两数之和", "def solve(): pass");
        let prompt = build_task_prompt("复杂度是多少？", Some("code_analysis"), &ctx);
        assert!(prompt.contains("题目内容:\n两数之和"));
        assert!(prompt.contains("用户代码:\ndef solve(): pass"));
        assert!(prompt.contains("分析代码的复杂度和性能"));
        assert!(prompt.ends_with("用户问题: 复杂度是多少？"));

        let no_code = build_task_prompt("复杂度是多少？", Some("code_analysis"), &ctx_with("两数之和", ""));
        assert!(!no_code.contains("用户代码"));
    }

    #[test]
    fn unknown_intent_gets_generic_directive() {
        let prompt = build_task_prompt("问题", Some("something_else"), &SessionContext::new());
        assert!(prompt.contains("针对用户的问题提供专业的帮助。"));

        let missing = build_task_prompt("问题", None, &SessionContext::new());
        assert!(missing.contains("针对用户的问题提供专业的帮助。"));
    }

    #[test]
    fn directives_cover_all_intent_labels() {
        assert!(directive_for(Some("problem_solving")).contains("解题思路"));
        assert!(directive_for(Some("code_check")).contains("正确性"));
        assert!(directive_for(Some("code_suggestion")).contains("改进建议"));
    }

    #[tokio::test]
    async fn run_returns_answer_and_predictions() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("时间复杂度是 O(n log n)。".to_string()),
            Ok("问题1：空间复杂度呢？".to_string()),
        ]));
        let agent = TutorAgent::new(client);

        let result = agent
            .run("这段代码的时间复杂度是多少？", Some("code_analysis"), &SessionContext::new())
            .await;

        assert!(result.success);
        assert_eq!(result.response, "时间复杂度是 O(n log n)。");
        assert_eq!(result.predicted_questions.len(), 1);
        assert_eq!(result.predicted_questions[0].question, "空间复杂度呢？");
    }

    #[tokio::test]
    async fn run_folds_upstream_error_into_failure() {
        let client = Arc::new(ScriptedClient::new(vec![Err(ChironError::Llm(
            "503 Service Unavailable".to_string(),
        ))]));
        let agent = TutorAgent::new(client);

        let result = agent.run("问题", None, &SessionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.response, FAILURE_NOTICE);
        assert!(result.predicted_questions.is_empty());
    }

    #[tokio::test]
    async fn run_rejects_empty_answers() {
        let client = Arc::new(ScriptedClient::single("   \n"));
        let agent = TutorAgent::new(client);

        let result = agent.run("问题", None, &SessionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.response, FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn run_streaming_forwards_tokens_then_predicts() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("先排序，再用双指针。".to_string()),
            Ok("问题1：还有别的方法吗？".to_string()),
        ]));
        let agent = TutorAgent::new(client);
        let (tx, mut rx) = mpsc::channel(16);

        let result = agent
            .run_streaming("怎么解这道题？", Some("problem_solving"), &SessionContext::new(), &tx)
            .await;
        drop(tx);

        assert!(result.success);
        assert_eq!(result.response, "先排序，再用双指针。");
        assert_eq!(result.predicted_questions.len(), 1);

        let mut streamed = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Content(token) => streamed.push_str(&token),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(streamed, "先排序，再用双指针。");
    }

    #[tokio::test]
    async fn run_streaming_fails_when_stream_cannot_start() {
        let client = Arc::new(ScriptedClient::new(vec![Err(ChironError::Llm(
            "boom".to_string(),
        ))]));
        let agent = TutorAgent::new(client);
        let (tx, _rx) = mpsc::channel(16);

        let result = agent
            .run_streaming("问题", None, &SessionContext::new(), &tx)
            .await;

        assert!(!result.success);
        assert_eq!(result.response, FAILURE_NOTICE);
    }
}
