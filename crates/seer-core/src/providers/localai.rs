//! LocalAI client
//!
//! LocalAI ignores credentials and needs an explicit endpoint. Model names registered as
//! `name___suffix` are sent as `name`.
//!
//! # Example
//! ```ignore
//! use seer::providers::localai;
//!
//! let client = localai::Client::new("http://localhost:8080/v1")?;
//!
//! let llava = client.vision_model("llava___LocalAI");
//! ```

use crate::{
    client::ClientBuilderError,
    prompt::PromptKind,
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
    },
};

const MODEL_SUFFIX_SEPARATOR: &str = "___";

static LOCALAI: Profile = Profile {
    provider: "localai",
    default_base_url: None,
    api_key_env: "LOCALAI_API_KEY",
    base_url_env: "LOCALAI_BASE_URL",
    fixed_api_key: Some("empty"),
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
        ClientBuilder::with_profile(&LOCALAI, "").base_url(base_url)
    }

    pub fn new(base_url: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(base_url).build()
    }

    /// Create a client from `LOCALAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&LOCALAI)
    }

    pub fn vision_model(&self, model: &str) -> openai::CompletionModel {
        let model = model
            .split(MODEL_SUFFIX_SEPARATOR)
            .next()
            .unwrap_or(model);
        self.inner.vision_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_suffix_is_dropped() {
        let client = Client::new("http://localhost:8080/v1").unwrap();
        assert_eq!(client.vision_model("llava___LocalAI").model, "llava");
        assert_eq!(client.vision_model("bakllava").model, "bakllava");
    }

    #[test]
    fn base_url_is_required() {
        assert!(matches!(
            Client::new(""),
            Err(ClientBuilderError::MissingBaseUrl("localai"))
        ));
    }
}
