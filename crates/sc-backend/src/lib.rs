//! sc-backend: LLM provider adapters for streamchat.
//!
//! This crate provides a single streaming interface, `CompletionSource`,
//! over OpenAI-compatible chat completion APIs, plus a scripted mock.

pub mod mock;
pub mod openai;
pub mod source;
pub mod sse;

pub use mock::{MockConfig, MockResponse, MockSource};
pub use openai::OpenAiClient;
pub use source::{BackendError, CompletionSource, TextStream};
