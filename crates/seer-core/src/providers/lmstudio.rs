//! LM Studio client
//!
//! LM Studio serves its OpenAI compatible API under `/v1`; a base url without it gets the
//! segment appended.
//!
//! # Example
//! ```ignore
//! use seer::providers::lmstudio;
//!
//! let client = lmstudio::Client::new("http://localhost:1234")?;
//!
//! let llava = client.vision_model("llava-v1.5-7b");
//! ```

use crate::{
    client::ClientBuilderError,
    prompt::PromptKind,
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
    },
};

static LMSTUDIO: Profile = Profile {
    provider: "lmstudio",
    default_base_url: None,
    api_key_env: "LMSTUDIO_API_KEY",
    base_url_env: "LMSTUDIO_API_BASE",
    fixed_api_key: Some("lm-studio"),
    base_url_suffix: Some("v1"),
    auth: Auth::Bearer,
    chat_path: ChatPath::Completions,
    prompt_kind: PromptKind::ChartExtraction,
};

pub type ClientBuilder<'a> = openai::ClientBuilder<'a, Client>;

/// A client for the LM Studio API.
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
        ClientBuilder::with_profile(&LMSTUDIO, "").base_url(base_url)
    }

    pub fn new(base_url: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(base_url).build()
    }

    /// Create a client from `LMSTUDIO_API_BASE`.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&LMSTUDIO)
    }

    pub fn vision_model(&self, model: &str) -> openai::CompletionModel {
        self.inner.vision_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_is_appended() {
        let client = Client::new("http://localhost:1234/").unwrap();
        assert_eq!(
            client.vision_model("llava").client.base_url(),
            "http://localhost:1234/v1"
        );
    }
}
