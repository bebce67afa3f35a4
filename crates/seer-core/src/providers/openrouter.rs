//! OpenRouter API client
//!
//! OpenRouter fronts many vision models behind one OpenAI compatible endpoint. Its describe
//! prompt is the short scene description rather than the chart extraction checklist.
//!
//! # Example
//! ```ignore
//! use seer::providers::openrouter;
//!
//! let client = openrouter::Client::new("YOUR_API_KEY")?;
//!
//! let model = client.vision_model(openrouter::GEMINI_FLASH_1_5);
//! ```

use crate::{
    client::ClientBuilderError,
    prompt::PromptKind,
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
    },
};

// ================================================================
// Main OpenRouter Client
// ================================================================
const OPENROUTER_API_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub const GEMINI_FLASH_1_5: &str = "google/gemini-flash-1.5";
pub const CLAUDE_3_5_SONNET: &str = "anthropic/claude-3.5-sonnet";
pub const GPT_4O: &str = "openai/gpt-4o";

static OPENROUTER: Profile = Profile {
    provider: "openrouter",
    default_base_url: Some(OPENROUTER_API_BASE_URL),
    api_key_env: "OPENROUTER_API_KEY",
    base_url_env: "OPENROUTER_BASE_URL",
    fixed_api_key: None,
    base_url_suffix: None,
    auth: Auth::Bearer,
    chat_path: ChatPath::Completions,
    prompt_kind: PromptKind::SceneDescription,
};

pub type ClientBuilder<'a> = openai::ClientBuilder<'a, Client>;

#[derive(Clone, Debug)]
pub struct Client {
    inner: openai::Client,
}

impl From<openai::Client> for Client {
    fn from(inner: openai::Client) -> Self {
        Self { inner }
    }
}

impl Client {
    pub fn builder(api_key: &str) -> ClientBuilder<'_> {
        ClientBuilder::with_profile(&OPENROUTER, api_key)
    }

    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from `OPENROUTER_API_KEY` (and optional `OPENROUTER_BASE_URL`).
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&OPENROUTER)
    }

    pub fn vision_model(&self, model: &str) -> openai::CompletionModel {
        self.inner.vision_model(model)
    }
}
