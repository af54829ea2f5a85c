//! Everyday-analogy explanations of algorithms and concepts.

use std::sync::Arc;

use async_trait::async_trait;
use chiron_common::{PredictedQuestion, SessionContext, TaskResult};
use chiron_llm::{LlmClient, LlmRequest};
use tracing::error;

use crate::predictor::QuestionPredictor;
use crate::TaskAgent;

const ANALOGY_SYSTEM_PROMPT: &str = r#"你是一个专门帮助学生生动形象理解算法和解题思路的助手。你的任务是：

1. 使用贴近生活的比喻和例子
2. 用通俗易懂的语言解释复杂概念
3. 可以使用故事、场景或游戏的方式来解释
4. 结合具体的例子进行讲解
5. 将抽象概念具象化

回答要求：
1. 保持简洁明了
2. 避免使用过于专业的术语
3. 多使用类比和比喻
4. 可以加入有趣的元素
5. 注重循序渐进的讲解

示例：
问：解释快速排序算法
答：想象你在整理一堆扑克牌：
1. 先随便选一张牌（比如8），这就是我们的"基准牌"
2. 然后把所有牌分成两堆：小于8的放左边，大于8的放右边
3. 对每一堆重复这个过程，直到所有牌都排好

这就像在图书馆整理书架，先按一个标准（如书的厚度）大致分类，然后再细分，最后就能得到整齐的书架。
"#;

const FAILURE_NOTICE: &str = "生成解释失败，请重试";
const TEMPERATURE: f32 = 0.7;

const FALLBACK_QUESTIONS: [&str; 3] = [
    "能再举一个生活中的例子来解释这个概念吗？",
    "如果遇到更复杂的情况，这个解释还适用吗？",
    "这个类比和实际的代码实现有什么对应关系？",
];

pub struct AnalogyAgent {
    client: Arc<dyn LlmClient>,
    predictor: QuestionPredictor,
}

impl AnalogyAgent {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            predictor: QuestionPredictor::new(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl TaskAgent for AnalogyAgent {
    fn name(&self) -> &'static str {
        "analogy"
    }

    async fn run(&self, query: &str, _intent: Option<&str>, _ctx: &SessionContext) -> TaskResult {
        let request = LlmRequest::with_system(ANALOGY_SYSTEM_PROMPT, query).temperature(TEMPERATURE);

        let explanation = match self.client.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => {
                error!("Analogy agent returned an empty explanation");
                return TaskResult::failure(FAILURE_NOTICE);
            }
            Err(e) => {
                error!(error = %e, "Analogy request failed");
                return TaskResult::failure(FAILURE_NOTICE);
            }
        };

        // An analogy stands alone, so prediction runs on the query
        // and answer only, not the session's problem or code.
        let mut questions = self
            .predictor
            .predict(&SessionContext::new(), query, &explanation)
            .await;
        if questions.is_empty() {
            // All three canned questions or none, never a mix.
            questions = FALLBACK_QUESTIONS
                .into_iter()
                .map(PredictedQuestion::new)
                .collect();
        }

        TaskResult::answer(explanation, questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;
    use chiron_common::ChironError;

    #[tokio::test]
    async fn run_returns_explanation_with_predictions() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("想象你在整理扑克牌。".to_string()),
            Ok("问题1：冒泡排序像什么？".to_string()),
        ]));
        let agent = AnalogyAgent::new(client);

        let result = agent.run("解释快速排序", None, &SessionContext::new()).await;

        assert!(result.success);
        assert_eq!(result.response, "想象你在整理扑克牌。");
        assert_eq!(result.predicted_questions.len(), 1);
        assert_eq!(result.predicted_questions[0].question, "冒泡排序像什么？");
    }

    #[tokio::test]
    async fn run_falls_back_to_canned_questions() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("想象你在整理扑克牌。".to_string()),
            Ok("模型没有按格式输出".to_string()),
        ]));
        let agent = AnalogyAgent::new(client);

        let result = agent.run("解释快速排序", None, &SessionContext::new()).await;

        assert!(result.success);
        assert_eq!(result.predicted_questions.len(), 3);
        assert_eq!(result.predicted_questions[0].question, FALLBACK_QUESTIONS[0]);
        assert_eq!(result.predicted_questions[2].question, FALLBACK_QUESTIONS[2]);
    }

    #[tokio::test]
    async fn run_fails_without_canned_questions_on_empty_explanation() {
        let client = Arc::new(ScriptedClient::single(""));
        let agent = AnalogyAgent::new(client);

        let result = agent.run("解释快速排序", None, &SessionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.response, FAILURE_NOTICE);
        assert!(result.predicted_questions.is_empty());
    }

    #[tokio::test]
    async fn run_folds_upstream_error_into_failure() {
        let client = Arc::new(ScriptedClient::new(vec![Err(ChironError::Llm(
            "boom".to_string(),
        ))]));
        let agent = AnalogyAgent::new(client);

        let result = agent.run("解释快速排序", None, &SessionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.response, FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn explanation_is_trimmed() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("\n  想象一个书架。  \n".to_string()),
            Ok("问题1：然后呢？".to_string()),
        ]));
        let agent = AnalogyAgent::new(client);

        let result = agent.run("解释二分查找", None, &SessionContext::new()).await;

        assert_eq!(result.response, "想象一个书架。");
    }
}
