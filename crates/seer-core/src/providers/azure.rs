//! Azure OpenAI API client
//!
//! # Example
//! ```ignore
//! use seer::providers::azure;
//!
//! let client = azure::Client::new("YOUR_API_KEY", "https://{resource}.openai.azure.com")?;
//!
//! let gpt4o = client.vision_model("my-gpt-4o-deployment");
//! ```
//!
//! The model name is the deployment id; requests go to
//! `{endpoint}/openai/deployments/{deployment}/chat/completions`.

use crate::{
    client::ClientBuilderError,
    prompt::PromptKind,
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
    },
};

// ================================================================
// Main Azure OpenAI Client
// ================================================================
const API_VERSION: &str = "2024-02-01";

static AZURE: Profile = Profile {
    provider: "azure",
    default_base_url: None,
    api_key_env: "AZURE_OPENAI_API_KEY",
    base_url_env: "AZURE_OPENAI_ENDPOINT",
    fixed_api_key: None,
    base_url_suffix: None,
    auth: Auth::ApiKeyHeader,
    chat_path: ChatPath::AzureDeployment {
        api_version: API_VERSION,
    },
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
    /// Azure OpenAI endpoint url, for example: `https://{your-resource-name}.openai.azure.com`
    pub fn builder<'a>(api_key: &'a str, azure_endpoint: &'a str) -> ClientBuilder<'a> {
        ClientBuilder::with_profile(&AZURE, api_key).base_url(azure_endpoint)
    }

    pub fn new(api_key: &str, azure_endpoint: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key, azure_endpoint).build()
    }

    /// Create a client from `AZURE_OPENAI_API_KEY` and `AZURE_OPENAI_ENDPOINT`.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&AZURE)
    }

    pub fn vision_model(&self, deployment: &str) -> openai::CompletionModel {
        self.inner.vision_model(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_required() {
        let err = Client::new("key", "").unwrap_err();
        assert!(matches!(err, ClientBuilderError::MissingBaseUrl("azure")));
    }

    #[test]
    fn deployment_url() {
        let client = Client::new("key", "https://example.openai.azure.com/").unwrap();
        let request = client
            .vision_model("gpt4o-prod")
            .client
            .post_chat_completion("gpt4o-prod")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://example.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(request.headers()["api-key"], "key");
        assert!(request.headers().get("authorization").is_none());
    }
}
