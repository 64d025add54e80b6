//! kdiag LLM - Text-generation provider abstraction
//!
//! This crate provides the prose-generation collaborator for kdiag:
//! - Provider: the `LlmProvider` trait the diagnosis writer depends on
//! - OpenAI-compatible: HTTP provider for any `/chat/completions` endpoint
//! - Mock: scripted provider for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod openai_compat;
pub mod provider;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::LlmProvider;
