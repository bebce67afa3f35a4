//! ZhipuAI API client
//!
//! # Example
//! ```ignore
//! use seer::providers::zhipuai;
//!
//! let client = zhipuai::Client::new("YOUR_API_KEY")?;
//!
//! let glm = client.vision_model(zhipuai::GLM_4V);
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
// Main ZhipuAI Client
// ================================================================
const ZHIPU_API_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

pub const GLM_4V: &str = "glm-4v";
pub const GLM_4V_PLUS: &str = "glm-4v-plus";
pub const GLM_4V_FLASH: &str = "glm-4v-flash";

static ZHIPUAI: Profile = Profile {
    provider: "zhipuai",
    default_base_url: Some(ZHIPU_API_BASE_URL),
    api_key_env: "ZHIPUAI_API_KEY",
    base_url_env: "ZHIPUAI_BASE_URL",
    fixed_api_key: None,
    base_url_suffix: None,
    auth: Auth::Bearer,
    chat_path: ChatPath::Completions,
    prompt_kind: PromptKind::ChartExtraction,
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
        ClientBuilder::with_profile(&ZHIPUAI, api_key)
    }

    /// Create a new ZhipuAI client with the given API key.
    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from `ZHIPUAI_API_KEY` (and optional `ZHIPUAI_BASE_URL`).
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&ZHIPUAI)
    }

    pub fn vision_model(&self, model: &str) -> openai::CompletionModel {
        self.inner.vision_model(model)
    }
}
