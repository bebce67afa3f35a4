//! OpenAI API client and the shared engine for OpenAI compatible services.
//!
//! # Example
//! ```ignore
//! use seer::providers::openai;
//!
//! let client = openai::Client::new("YOUR_API_KEY")?;
//!
//! let gpt4o = client.vision_model(openai::GPT_4O);
//! ```
//!
//! Azure, ZhipuAI, LocalAI, Xinference, LM Studio and OpenRouter speak the same chat
//! completions dialect; their modules configure this client and hand out its
//! [`CompletionModel`].

pub mod client;
pub mod completion;
pub mod streaming;

pub use client::*;
pub use completion::*;
pub use streaming::*;
