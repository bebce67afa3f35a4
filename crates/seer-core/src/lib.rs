//! Seer is a small library that puts a dozen vision-capable LLM providers behind one interface.
//!
//! # High-level features
//! - Describe an image (`describe`) or hold an image-grounded conversation (`chat`,
//!   `chat_streamly`) without branching on which provider is behind the model
//! - Images accepted as raw bytes, an in-memory buffer or a decoded [`image::DynamicImage`]
//! - Failures never escape a call: they come back as text starting with `**ERROR**: `
//!   and a token count of zero, so one channel carries both answers and errors
//!
//! # Simple example:
//! ```ignore
//! use seer::{image::ImageInput, providers::openai, vision::VisionModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = openai::Client::from_env()?;
//!     let model = client.vision_model(openai::GPT_4O);
//!
//!     let image = ImageInput::from_path("chart.png")?;
//!     let response = model.describe(&image, None).await;
//!
//!     println!("{} ({} tokens)", response.text, response.total_tokens);
//!     Ok(())
//! }
//! ```
//!
//! # Core concepts
//! ## Vision models
//! Every backend exposes a model type implementing [VisionModel](crate::vision::VisionModel).
//! Backends implement the fallible `try_*` methods; the trait provides the error-containing
//! `describe`, `chat` and `chat_streamly` on top of them.
//!
//! ## Streaming
//! [chat_streamly](crate::vision::VisionModel::chat_streamly) yields
//! [StreamChunk::Partial](crate::streaming::StreamChunk::Partial) values carrying the answer so far,
//! followed by exactly one [StreamChunk::Done](crate::streaming::StreamChunk::Done) with the total
//! token count.
//!
//! # Integrations
//! OpenAI, Azure OpenAI, ZhipuAI, Qwen (DashScope), Ollama, LocalAI, Xinference, LM Studio,
//! OpenRouter, NVIDIA, Google Gemini, plus a no-op `local` backend.

pub mod client;
pub mod error;
pub(crate) mod http_client;
pub mod image;
pub mod json_utils;
pub mod language;
pub mod message;
pub mod prompt;
pub mod providers;
pub mod request;
pub mod streaming;
pub mod vision;

pub use error::{ERROR_MARKER, VisionError};
pub use language::Language;
pub use message::{Role, Turn};
pub use request::GenerationConfig;
pub use streaming::{StreamChunk, VisionStream};
pub use vision::{VisionModel, VisionResponse};
