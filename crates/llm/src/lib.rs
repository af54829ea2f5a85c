pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use client::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenStream, TokenUsage,
};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
