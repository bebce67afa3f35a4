//! Seer puts image description and image-grounded chat for a dozen vision LLM providers
//! behind one interface.
//!
//! Everything lives in [`seer_core`] and is re-exported here, so `seer::providers::openai`
//! and `seer_core::providers::openai` name the same module.
//!
//! ```ignore
//! use seer::{VisionModel, image::ImageInput, providers::ollama};
//!
//! let model = ollama::Client::new("http://localhost:11434")?.vision_model(ollama::LLAVA);
//! let response = model.describe(&ImageInput::from_path("chart.png")?, None).await;
//! ```

pub use seer_core::*;
