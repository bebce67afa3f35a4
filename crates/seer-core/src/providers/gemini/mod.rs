//! Google Gemini API client
//!
//! Images are sent as `inlineData` parts, the API key as a `key` query parameter.
//! Assistant turns use Gemini's `model` role and system turns are lifted into
//! `systemInstruction`.
//!
//! # Example
//! ```ignore
//! use seer::providers::gemini;
//!
//! let client = gemini::Client::new("YOUR_API_KEY")?;
//!
//! let flash = client.vision_model(gemini::GEMINI_1_5_FLASH);
//! ```

pub mod client;
pub mod completion;
pub mod streaming;

pub use client::{Client, ClientBuilder};
pub use completion::*;
