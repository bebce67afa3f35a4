use serde::Deserialize;

use super::completion::CompletionModel;
use crate::{
    client::{self, ClientBuilderError},
    error::VisionError,
    language::Language,
};

// ================================================================
// Google Gemini Client
// ================================================================
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct ClientBuilder<'a> {
    api_key: &'a str,
    base_url: &'a str,
    http_client: Option<reqwest::Client>,
    language: Language,
}

impl<'a> ClientBuilder<'a> {
    pub fn new(api_key: &'a str) -> Self {
        Self {
            api_key,
            base_url: GEMINI_API_BASE_URL,
            http_client: None,
            language: Language::default(),
        }
    }

    pub fn base_url(mut self, base_url: &'a str) -> Self {
        self.base_url = base_url;
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

    pub fn build(self) -> Result<Client, ClientBuilderError> {
        Ok(Client {
            base_url: client::normalize_base_url(self.base_url)?,
            api_key: self.api_key.to_string(),
            http_client: client::http_client_or_default(self.http_client)?,
            language: self.language,
        })
    }
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
    language: Language,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("http_client", &self.http_client)
            .field("language", &self.language)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl Client {
    /// Create a new Google Gemini client builder.
    ///
    /// # Example
    /// ```ignore
    /// use seer::providers::gemini::Client;
    ///
    /// let gemini_client = Client::builder("your-google-gemini-api-key")
    ///    .language("English")
    ///    .build()?;
    /// ```
    pub fn builder(api_key: &str) -> ClientBuilder<'_> {
        ClientBuilder::new(api_key)
    }

    /// Create a new Google Gemini client. For more control, use the `builder` method.
    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from `GEMINI_API_KEY` (and optional `GEMINI_BASE_URL`).
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        let api_key = client::required_env("GEMINI_API_KEY")?;
        let base_url = client::optional_env("GEMINI_BASE_URL");
        let builder = ClientBuilder::new(&api_key);
        match base_url.as_deref() {
            Some(base_url) => builder.base_url(base_url).build(),
            None => builder.build(),
        }
    }

    pub fn vision_model(&self, model: &str) -> CompletionModel {
        CompletionModel::new(self.clone(), model)
    }

    pub(crate) fn language(&self) -> Language {
        self.language
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.post_with_query(path, "")
    }

    pub(crate) fn post_sse(&self, path: &str) -> reqwest::RequestBuilder {
        self.post_with_query(path, "alt=sse&")
    }

    fn post_with_query(&self, path: &str, query: &str) -> reqwest::RequestBuilder {
        // API key rides as a query param, no auth header
        let path = path.trim_start_matches('/');
        tracing::debug!(target: "seer", provider = "gemini", "POST {}/{}?{}key=****", self.base_url, path, query);
        let url = format!("{}/{}?{}key={}", self.base_url, path, query, self.api_key);
        self.http_client.post(url)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
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
            ApiResponse::Err(err) => Err(VisionError::ProviderError(err.error.message)),
        }
    }
}
