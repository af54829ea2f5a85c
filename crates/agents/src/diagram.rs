//! Mermaid flowchart generation with basic syntax validation.

use std::sync::Arc;

use async_trait::async_trait;
use chiron_common::{SessionContext, TaskResult};
use chiron_llm::{LlmClient, LlmRequest};
use tracing::{error, warn};

use crate::TaskAgent;

const DIAGRAM_SYSTEM_PROMPT: &str = r#"你是一位Mermaid流程图代码生成专家。你的任务是根据用户的需求生成准确的Mermaid流程图代码。

请遵循以下规则：
1. 只输出纯Mermaid代码，不要包含任何其他解释
2. 使用flowchart语法来创建流程图
3. 确保生成的代码符合Mermaid语法规范
4. 使用简洁清晰的图形表示方式
5. 为每个节点使用有意义的ID和描述
6. 使用合适的图形和箭头表示关系
7. 确保代码可以正确渲染

示例输出格式：
flowchart TD
    A[开始] --> B{判断条件}
    B -->|条件1| C[处理1]
    B -->|条件2| D[处理2]
    C --> E[结束]
    D --> E
"#;

const FAILURE_NOTICE: &str = "流程图生成失败，请稍后重试。";
const TEMPERATURE: f32 = 0.2;

pub struct DiagramAgent {
    client: Arc<dyn LlmClient>,
}

impl DiagramAgent {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskAgent for DiagramAgent {
    fn name(&self) -> &'static str {
        "diagram"
    }

    async fn run(&self, query: &str, _intent: Option<&str>, _ctx: &SessionContext) -> TaskResult {
        let request = LlmRequest::with_system(DIAGRAM_SYSTEM_PROMPT, build_diagram_prompt(query))
            .temperature(TEMPERATURE);

        let content = match self.client.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                error!(error = %e, "Diagram request failed");
                return TaskResult::failure(FAILURE_NOTICE);
            }
        };

        let source = extract_diagram_source(&content);
        if let Err(reason) = validate_diagram_source(&source) {
            warn!(reason = %reason, "Rejected generated diagram");
            return TaskResult::failure(FAILURE_NOTICE);
        }

        TaskResult::diagram(format!("```mermaid\n{source}\n```"), source)
    }
}

fn build_diagram_prompt(request: &str) -> String {
    format!(
        "请根据以下需求生成Mermaid流程图代码：\n{request}\n\n注意：\n1. 只输出Mermaid代码\n2. 不要包含任何解释文字\n3. 使用flowchart语法"
    )
}

/// Prefers a fenced mermaid block when present; otherwise the whole
/// reply is taken as diagram source.
fn extract_diagram_source(content: &str) -> String {
    if let Some(start) = content.find("```mermaid") {
        let after = &content[start + "```mermaid".len()..];
        let body = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
        return body.trim().to_string();
    }
    content.trim().to_string()
}

/// Cheap structural checks; real rendering happens client-side.
fn validate_diagram_source(source: &str) -> std::result::Result<(), String> {
    if source.is_empty() {
        return Err("empty diagram".to_string());
    }
    if !source.to_lowercase().contains("flowchart") {
        return Err("missing flowchart declaration".to_string());
    }
    if !source.contains("->") {
        return Err("no arrows between nodes".to_string());
    }
    for (open, close, name) in [
        ('(', ')', "parentheses"),
        ('[', ']', "square brackets"),
        ('{', '}', "curly braces"),
    ] {
        if source.matches(open).count() != source.matches(close).count() {
            return Err(format!("unbalanced {name}"));
        }
    }
    Ok(())
}
