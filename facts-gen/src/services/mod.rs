//! Outbound services: Music service, LLM gateway, facts generation

pub mod facts_generator;
pub mod llm_client;
pub mod music_client;
pub mod prompts;

pub use facts_generator::{FactsGenerator, GenerationError, GenerationResult, TEMPLATE_NAME};
pub use llm_client::{ChatCompletion, ChatMessage, LlmError, LlmGatewayClient};
pub use music_client::{MetadataError, MusicServiceClient, TrackMetadataSource};
