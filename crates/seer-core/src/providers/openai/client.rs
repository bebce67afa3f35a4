use std::{fmt::Debug, marker::PhantomData};

use serde::Deserialize;

use crate::{
    client::{self, ClientBuilderError},
    error::VisionError,
    language::Language,
    prompt::PromptKind,
};

use super::CompletionModel;

// ================================================================
// Main OpenAI Client
// ================================================================
const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// How the api key travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Bearer,
    /// Azure style `api-key` header.
    ApiKeyHeader,
}

/// Where chat completions are posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChatPath {
    /// `{base_url}/chat/completions`
    Completions,
    /// `{base_url}/openai/deployments/{model}/chat/completions?api-version=...`
    AzureDeployment { api_version: &'static str },
}

/// Everything that distinguishes one OpenAI compatible service from another.
#[derive(Debug)]
pub(crate) struct Profile {
    pub provider: &'static str,
    pub default_base_url: Option<&'static str>,
    pub api_key_env: &'static str,
    pub base_url_env: &'static str,
    /// Local servers ignore credentials; this value replaces whatever the caller passes.
    pub fixed_api_key: Option<&'static str>,
    /// Path segment the base url must end with, appended when missing.
    pub base_url_suffix: Option<&'static str>,
    pub auth: Auth,
    pub chat_path: ChatPath,
    pub prompt_kind: PromptKind,
}

pub(crate) static OPENAI: Profile = Profile {
    provider: "openai",
    default_base_url: Some(OPENAI_API_BASE_URL),
    api_key_env: "OPENAI_API_KEY",
    base_url_env: "OPENAI_BASE_URL",
    fixed_api_key: None,
    base_url_suffix: None,
    auth: Auth::Bearer,
    chat_path: ChatPath::Completions,
    prompt_kind: PromptKind::ChartExtraction,
};

pub struct ClientBuilder<'a, C = Client> {
    profile: &'static Profile,
    api_key: &'a str,
    base_url: Option<&'a str>,
    http_client: Option<reqwest::Client>,
    language: Language,
    _client: PhantomData<C>,
}

impl<'a, C> ClientBuilder<'a, C>
where
    C: From<Client>,
{
    pub(crate) fn with_profile(profile: &'static Profile, api_key: &'a str) -> Self {
        Self {
            profile,
            api_key,
            base_url: None,
            http_client: None,
            language: Language::default(),
            _client: PhantomData,
        }
    }

    pub fn base_url(mut self, base_url: &'a str) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn custom_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn language(mut self, language: impl Into<Language>) -> Self {
        self.language = language.into();
        self
    }

    pub fn build(self) -> Result<C, ClientBuilderError> {
        let profile = self.profile;
        let base_url = match profile.default_base_url {
            Some(default) => client::normalize_base_url(self.base_url.unwrap_or(default))?,
            None => client::require_base_url(self.base_url, profile.provider)?,
        };
        let base_url = match profile.base_url_suffix {
            Some(suffix) => with_suffix(base_url, suffix),
            None => base_url,
        };
        let api_key = profile.fixed_api_key.unwrap_or(self.api_key).to_string();

        Ok(C::from(Client {
            profile,
            base_url,
            api_key,
            http_client: client::http_client_or_default(self.http_client)?,
            language: self.language,
        }))
    }

    /// Builder filled from `<PROVIDER>_API_KEY` and `<PROVIDER>_BASE_URL`.
    pub(crate) fn build_from_env(profile: &'static Profile) -> Result<C, ClientBuilderError> {
        let api_key = match profile.fixed_api_key {
            Some(key) => key.to_string(),
            None => client::required_env(profile.api_key_env)?,
        };
        let base_url = client::optional_env(profile.base_url_env);
        let mut builder = ClientBuilder::<C>::with_profile(profile, &api_key);
        if let Some(base_url) = base_url.as_deref() {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }
}

fn with_suffix(base_url: String, suffix: &str) -> String {
    if base_url.rsplit('/').next() == Some(suffix) {
        base_url
    } else {
        format!("{base_url}/{suffix}")
    }
}

#[derive(Clone)]
pub struct Client {
    profile: &'static Profile,
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
    language: Language,
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.profile.provider)
            .field("base_url", &self.base_url)
            .field("http_client", &self.http_client)
            .field("api_key", &"<REDACTED>")
            .field("language", &self.language)
            .finish()
    }
}

impl Client {
    /// Create a new OpenAI client builder.
    ///
    /// # Example
    /// ```ignore
    /// use seer::providers::openai::Client;
    ///
    /// let openai = Client::builder("your-open-ai-api-key")
    ///     .language("English")
    ///     .build()?;
    /// ```
    pub fn builder(api_key: &str) -> ClientBuilder<'_> {
        ClientBuilder::with_profile(&OPENAI, api_key)
    }

    /// Create a new OpenAI client. For more control, use the `builder` method.
    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from the `OPENAI_API_KEY` (and optional `OPENAI_BASE_URL`)
    /// environment variables.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&OPENAI)
    }

    /// Create a vision model with the given name.
    ///
    /// # Example
    /// ```ignore
    /// use seer::providers::openai::{Client, self};
    ///
    /// let openai = Client::new("your-open-ai-api-key")?;
    /// let gpt4o = openai.vision_model(openai::GPT_4O);
    /// ```
    pub fn vision_model(&self, model: &str) -> CompletionModel {
        CompletionModel::new(self.clone(), model)
    }

    pub fn provider_name(&self) -> &'static str {
        self.profile.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub(crate) fn prompt_kind(&self) -> PromptKind {
        self.profile.prompt_kind
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(target: "seer", provider = self.profile.provider, %url, "POST");
        self.authorize(self.http_client.post(url))
    }

    pub(crate) fn post_chat_completion(&self, model: &str) -> reqwest::RequestBuilder {
        match self.profile.chat_path {
            ChatPath::Completions => self.post("chat/completions"),
            ChatPath::AzureDeployment { api_version } => self.post(&format!(
                "openai/deployments/{model}/chat/completions?api-version={api_version}"
            )),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.profile.auth {
            Auth::Bearer => builder.bearer_auth(&self.api_key),
            Auth::ApiKeyHeader => builder.header("api-key", &self.api_key),
        }
    }
}

/// Error body some services send with a 200 status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl ApiErrorResponse {
    pub fn message(&self) -> &str {
        match &self.error {
            ApiErrorBody::Detailed { message } => message,
            ApiErrorBody::Plain(message) => message,
        }
    }
}

impl From<ApiErrorResponse> for VisionError {
    fn from(err: ApiErrorResponse) -> Self {
        VisionError::ProviderError(err.message().to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiResponse<T> {
    Err(ApiErrorResponse),
    Ok(T),
}

impl<T> ApiResponse<T> {
    pub(crate) fn into_result(self) -> Result<T, VisionError> {
        match self {
            ApiResponse::Ok(value) => Ok(value),
            ApiResponse::Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NEEDS_V1: Profile = Profile {
        provider: "needs-v1",
        default_base_url: None,
        api_key_env: "NEEDS_V1_API_KEY",
        base_url_env: "NEEDS_V1_BASE_URL",
        fixed_api_key: Some("dummy"),
        base_url_suffix: Some("v1"),
        auth: Auth::Bearer,
        chat_path: ChatPath::Completions,
        prompt_kind: PromptKind::ChartExtraction,
    };

    #[test]
    fn default_base_url_is_used() {
        let client = Client::new("sk-test").unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
        assert_eq!(client.provider_name(), "openai");
        assert_eq!(client.language(), Language::Chinese);
    }

    #[test]
    fn base_url_override() {
        let client = Client::builder("sk-test")
            .base_url("http://localhost:8080/v1/")
            .language("English")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.language(), Language::English);
    }

    #[test]
    fn suffix_is_appended_once() {
        let client: Client = ClientBuilder::with_profile(&NEEDS_V1, "ignored")
            .base_url("http://localhost:1234")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
        assert_eq!(client.api_key, "dummy");

        let client: Client = ClientBuilder::with_profile(&NEEDS_V1, "ignored")
            .base_url("http://localhost:1234/v1")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
    }

    #[test]
    fn missing_base_url_fails_without_default() {
        let err = ClientBuilder::<Client>::with_profile(&NEEDS_V1, "k")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientBuilderError::MissingBaseUrl("needs-v1")));
    }

    #[test]
    fn error_body_wins_over_empty_response() {
        let parsed: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"error": {"message": "model not found", "code": 404}}"#)
                .unwrap();
        let err = parsed.into_result().unwrap_err();
        assert_eq!(err.to_string(), "model not found");

        let parsed: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"error": "quota exceeded"}"#).unwrap();
        assert!(parsed.into_result().is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let client = Client::new("sk-secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<REDACTED>"));
    }
}
