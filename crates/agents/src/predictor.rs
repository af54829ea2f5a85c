//! Follow-up question prediction.

use std::sync::Arc;

use chiron_common::{PredictedQuestion, SessionContext};
use chiron_llm::{LlmClient, LlmRequest};
use tracing::warn;

const PREDICTOR_SYSTEM_PROMPT: &str = r#"你是一个专业的对话预测助手。
基于当前的编程问题讨论上下文，你需要预测用户可能的后续提问。

请注意：
1. 预测的问题应该合理且与当前上下文紧密相关
2. 问题应该从不同角度展开，例如：
   - 代码优化相关
   - 概念理解相关
   - 实现细节相关

输出格式应该是一个列表，包含三个预测，每个预测包含：
- question: 预测的问题
- reason: 预测这个问题的理由
- probability: 提问概率（高/中/低）
"#;

const TEMPERATURE: f32 = 0.7;
const MAX_PREDICTIONS: usize = 3;

/// Predicts what the user is likely to ask next, given the answer
/// they just received.
pub struct QuestionPredictor {
    client: Arc<dyn LlmClient>,
}

impl QuestionPredictor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Best effort: any upstream or parse failure yields an empty
    /// list, never an error.
    pub async fn predict(
        &self,
        ctx: &SessionContext,
        query: &str,
        answer: &str,
    ) -> Vec<PredictedQuestion> {
        let prompt = build_prediction_prompt(ctx, query, answer);
        let request =
            LlmRequest::with_system(PREDICTOR_SYSTEM_PROMPT, prompt).temperature(TEMPERATURE);

        match self.client.complete(request).await {
            Ok(response) => parse_predictions(&response.content),
            Err(e) => {
                warn!(error = %e, "Question prediction failed");
                Vec::new()
            }
        }
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "无"
    } else {
        text
    }
}

fn build_prediction_prompt(ctx: &SessionContext, query: &str, answer: &str) -> String {
    format!(
        r#"基于以下上下文，预测用户可能的后续三个问题。

当前题目内容：
{problem}

当前用户代码（如果有）：
{code}

当前用户问题：
{query}

系统回答：
{answer}

请直接预测三个后续问题，每个问题单独一行，不需要其他信息：

问题1：[预测的问题内容]
问题2：[预测的问题内容]
问题3：[预测的问题内容]

注意：
1. 必须预测三个问题
2. 每个问题都要以"问题X："开头
3. 严格按照上述格式输出，不要添加其他内容"#,
        problem = or_none(ctx.problem_content()),
        code = or_none(ctx.editor_code()),
        query = or_none(query),
        answer = answer,
    )
}

/// Accepts "问题1：..." and "Question 1: ..." lines, with either the
/// full-width or ASCII colon. Lines that match neither are skipped
/// rather than failing the whole batch.
fn parse_predictions(text: &str) -> Vec<PredictedQuestion> {
    let mut questions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some(rest) = line
            .strip_prefix("问题")
            .or_else(|| line.strip_prefix("Question"))
        else {
            continue;
        };
        let rest = rest
            .trim_start()
            .trim_start_matches(|c: char| c.is_ascii_digit());
        let Some(question) = rest.strip_prefix('：').or_else(|| rest.strip_prefix(':')) else {
            continue;
        };
        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        questions.push(PredictedQuestion::new(question));
        if questions.len() == MAX_PREDICTIONS {
            break;
        }
    }
    questions
}
