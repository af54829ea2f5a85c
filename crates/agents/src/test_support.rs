//! Scripted client for exercising agents without a live endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chiron_common::{ChironError, Result};
use chiron_llm::{LlmClient, LlmRequest, LlmResponse, TokenStream};

/// Returns canned responses in call order; errors once exhausted.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn single(response: impl Into<String>) -> Self {
        Self::new(vec![Ok(response.into())])
    }

    fn next_response(&self) -> Result<String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChironError::Llm("scripted client exhausted".to_string())))
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
        let content = self.next_response()?;
        Ok(LlmResponse {
            content,
            model: "scripted".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn complete_stream(&self, _request: LlmRequest) -> Result<TokenStream> {
        let content = self.next_response()?;
        let tokens: Vec<Result<String>> = content
            .chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        Ok(Box::pin(futures::stream::iter(tokens)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
