//! AI Integration Layer
//!
//! Provider metadata, prompt rendering, completion backends and the
//! generation client that ties them together.

pub mod client;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod timeout;

pub use client::GenerationClient;
pub use prompt::{PromptBuilder, PromptTemplates, RenderedPrompt};
pub use provider::{
    AnthropicBackend, CompletionBackend, CompletionRequest, CompletionResponse, OpenAiBackend,
    ProviderConfig, ProviderSet, ProvidersConfig, ResponseTiming, SharedBackend,
};
pub use registry::{
    ModelInfo, ProviderId, ProviderInfo, all_providers, effective_max_tokens, find_model,
    provider_info,
};
pub use timeout::{TimeoutConfig, guarded, with_timeout};
