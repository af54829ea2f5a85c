use std::sync::Arc;

use async_trait::async_trait;
use chiron_common::{ChironError, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse, TokenStream};
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key for the inference endpoint. Prefer the QWEN_API_KEY or
    /// OPENAI_API_KEY environment variables over putting it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL ending in /v1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "Qwen/Qwen2.5-72B-Instruct".to_string()
}

fn default_max_concurrent() -> usize {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from config or environment variables.
    ///
    /// Priority:
    /// 1. Explicit api_key in config
    /// 2. QWEN_API_KEY
    /// 3. OPENAI_API_KEY
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }

        std::env::var("QWEN_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Caps in-flight LLM calls so a burst of requests cannot flood the
/// upstream endpoint.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ChironError::Agent(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    async fn complete_stream(&self, request: LlmRequest) -> Result<TokenStream> {
        // The permit must outlive this call: a stream keeps its slot
        // until the last token is read or the stream is dropped.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ChironError::Agent(format!("Semaphore acquire failed: {e}")))?;

        let mut inner = self.inner.complete_stream(request).await?;
        let stream = async_stream::stream! {
            let _permit = permit;
            while let Some(item) = inner.next().await {
                yield item;
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Builds the layered client stack: provider client, then retry, then
/// the concurrency cap.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Box::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
        )?),
        other => {
            return Err(ChironError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let retrying: Box<dyn LlmClient> =
        Box::new(RetryingClient::new(base_client, config.retry.clone()));

    let semaphored = SemaphoredClient::new(Arc::from(retrying), config.max_concurrent_requests);

    Ok(Arc::new(semaphored))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "Qwen/Qwen2.5-72B-Instruct"
api_url = "https://api-inference.modelscope.cn/v1"
max_concurrent_requests = 4

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "Qwen/Qwen2.5-72B-Instruct");
        assert_eq!(
            config.api_url.as_deref(),
            Some("https://api-inference.modelscope.cn/v1")
        );
        assert!(config.api_key.is_none());
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn deserialize_config_defaults() {
        let config: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "Qwen/Qwen2.5-72B-Instruct");
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn inline_api_key_wins_over_env() {
        let config = LlmConfig {
            api_key: Some("ms-inline".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("ms-inline"));
    }

    #[test]
    fn blank_inline_api_key_falls_through() {
        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        // With no env vars set this is None; either way the blank
        // inline key must never come back.
        assert_ne!(config.resolve_api_key().as_deref(), Some("   "));
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            api_key: Some("ms-test".to_string()),
            ..LlmConfig::default()
        };
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "Qwen/Qwen2.5-72B-Instruct");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            ..LlmConfig::default()
        };
        assert!(build_llm_client(&config).is_err());
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                // Simulate work
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            async fn complete_stream(&self, _request: LlmRequest) -> Result<TokenStream> {
                Ok(Box::pin(futures::stream::empty()))
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let inner = Arc::new(CountingClient {
            concurrent: concurrent.clone(),
            max_seen: max_seen.clone(),
        });

        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        // Max concurrency should never exceed 2
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn stream_holds_permit_until_dropped() {
        struct OneTokenClient;

        #[async_trait]
        impl LlmClient for OneTokenClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            async fn complete_stream(&self, _request: LlmRequest) -> Result<TokenStream> {
                Ok(Box::pin(futures::stream::iter(vec![Ok("tok".to_string())])))
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let semaphored = SemaphoredClient::new(Arc::new(OneTokenClient), 1);

        let stream = semaphored
            .complete_stream(LlmRequest::default())
            .await
            .unwrap();
        assert_eq!(semaphored.semaphore.available_permits(), 0);

        drop(stream);
        assert_eq!(semaphored.semaphore.available_permits(), 1);
    }
}
