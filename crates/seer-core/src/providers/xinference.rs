//! Xinference client
//!
//! # Example
//! ```ignore
//! use seer::providers::xinference;
//!
//! let client = xinference::Client::new("http://localhost:9997/v1")?;
//!
//! let qwen_vl = client.vision_model("qwen-vl-chat");
//! ```

use crate::{
    client::ClientBuilderError,
    prompt::PromptKind,
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
    },
};

static XINFERENCE: Profile = Profile {
    provider: "xinference",
    default_base_url: None,
    api_key_env: "XINFERENCE_API_KEY",
    base_url_env: "XINFERENCE_BASE_URL",
    fixed_api_key: Some("xxx"),
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
    pub fn builder(base_url: &str) -> ClientBuilder<'_> {
        ClientBuilder::with_profile(&XINFERENCE, "").base_url(base_url)
    }

    pub fn new(base_url: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(base_url).build()
    }

    /// Create a client from `XINFERENCE_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&XINFERENCE)
    }

    pub fn vision_model(&self, model: &str) -> openai::CompletionModel {
        self.inner.vision_model(model)
    }
}
