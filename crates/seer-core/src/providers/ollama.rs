//! Ollama API client
//!
//! Describe goes through `/api/generate`; chat through `/api/chat`. Images are passed as
//! base64 strings in an `images` array next to the text, and streaming responses are
//! newline-delimited JSON rather than server-sent events.
//!
//! # Example
//! ```ignore
//! use seer::providers::ollama;
//!
//! let client = ollama::Client::new("http://localhost:11434")?;
//!
//! let llava = client.vision_model(ollama::LLAVA);
//! ```

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    client::{self, ClientBuilderError},
    error::VisionError,
    http_client,
    image::ImageInput,
    language::Language,
    message::{Role, Turn},
    prompt::{self, PromptKind},
    request::GenerationConfig,
    streaming::{FinishReason, RawDelta, RawDeltaStream},
    vision::{self, RawCompletion},
};

pub const LLAVA: &str = "llava";
pub const LLAMA3_2_VISION: &str = "llama3.2-vision";
pub const MINICPM_V: &str = "minicpm-v";

// ---------- Main Client ----------

pub struct ClientBuilder<'a> {
    base_url: Option<&'a str>,
    http_client: Option<reqwest::Client>,
    language: Language,
}

impl<'a> ClientBuilder<'a> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            base_url: None,
            http_client: None,
            language: Language::default(),
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

    pub fn build(self) -> Result<Client, ClientBuilderError> {
        Ok(Client {
            base_url: client::require_base_url(self.base_url, "ollama")?,
            http_client: client::http_client_or_default(self.http_client)?,
            language: self.language,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    http_client: reqwest::Client,
    language: Language,
}

impl Client {
    /// Create a new Ollama client builder.
    ///
    /// # Example
    /// ```ignore
    /// use seer::providers::ollama::Client;
    ///
    /// let client = Client::builder()
    ///     .base_url("http://gpu-box:11434")
    ///     .language("English")
    ///     .build()?;
    /// ```
    pub fn builder<'a>() -> ClientBuilder<'a> {
        ClientBuilder::new()
    }

    pub fn new(base_url: &str) -> Result<Self, ClientBuilderError> {
        ClientBuilder::new().base_url(base_url).build()
    }

    /// Create a client from `OLLAMA_API_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        let base_url = client::required_env("OLLAMA_API_BASE_URL")?;
        Self::new(&base_url)
    }

    pub fn vision_model(&self, model: &str) -> CompletionModel {
        CompletionModel::new(self.clone(), model)
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(target: "seer", provider = "ollama", %url, "POST");
        self.http_client.post(url)
    }
}

// ---------- API Definitions ----------

/// Only the parameters the caller actually set are forwarded; Ollama applies the model's
/// own defaults to the rest.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl From<&GenerationConfig> for Options {
    fn from(gen_conf: &GenerationConfig) -> Self {
        Self {
            temperature: gen_conf.temperature,
            num_predict: gen_conf.max_tokens,
            top_p: gen_conf.top_p,
            presence_penalty: gen_conf.presence_penalty,
            frequency_penalty: gen_conf.frequency_penalty,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub options: Options,
    pub stream: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: Options,
    pub stream: bool,
    pub keep_alive: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct Counts {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl Counts {
    fn total_tokens(&self) -> Option<u64> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
        }
    }

    fn finish(&self) -> Option<FinishReason> {
        if !self.done {
            return None;
        }
        Some(
            self.done_reason
                .as_deref()
                .map(FinishReason::from_openai)
                .unwrap_or(FinishReason::Stop),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(flatten)]
    pub counts: Counts,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(flatten)]
    pub counts: Counts,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse<T> {
    Err(ApiErrorResponse),
    Ok(T),
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, VisionError> {
        match self {
            ApiResponse::Ok(value) => Ok(value),
            ApiResponse::Err(err) => Err(VisionError::ProviderError(err.error)),
        }
    }
}

impl From<GenerateResponse> for RawCompletion {
    fn from(response: GenerateResponse) -> Self {
        RawCompletion {
            finish: response.counts.finish(),
            total_tokens: response.counts.total_tokens().unwrap_or(0),
            text: response.response,
        }
    }
}

impl From<ChatResponse> for RawCompletion {
    fn from(response: ChatResponse) -> Self {
        RawCompletion {
            finish: response.counts.finish(),
            total_tokens: response.counts.total_tokens().unwrap_or(0),
            text: response.message.content,
        }
    }
}

impl From<ChatResponse> for RawDelta {
    fn from(response: ChatResponse) -> Self {
        RawDelta {
            finish: response.counts.finish(),
            total_tokens: response.counts.total_tokens(),
            text: Some(response.message.content),
        }
    }
}

// ---------- Vision model ----------

#[derive(Clone, Debug)]
pub struct CompletionModel {
    client: Client,
    pub model: String,
}

impl CompletionModel {
    pub fn new(client: Client, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    fn generate_request(&self, b64: String, max_tokens: u64) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt::instruction(PromptKind::ChartExtraction, self.client.language)
                .to_string(),
            images: vec![b64],
            options: Options {
                num_predict: Some(max_tokens),
                ..Default::default()
            },
            stream: false,
        }
    }

    fn chat_request(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        b64: &str,
        stream: bool,
    ) -> ChatRequest {
        let messages = history
            .into_iter()
            .map(|turn| Message {
                images: if turn.is_user() {
                    vec![b64.to_string()]
                } else {
                    Vec::new()
                },
                role: turn.role,
                content: turn.content,
            })
            .collect();

        ChatRequest {
            model: self.model.clone(),
            messages,
            options: Options::from(gen_conf),
            stream,
            keep_alive: -1,
        }
    }
}

impl vision::VisionModel for CompletionModel {
    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn language(&self) -> Language {
        self.client.language
    }

    async fn try_describe(
        &self,
        image: &ImageInput,
        max_tokens: u64,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.generate_request(image.to_base64()?, max_tokens);
        let response: ApiResponse<GenerateResponse> =
            http_client::send_json(self.client.post("api/generate").json(&request)).await?;
        Ok(response.into_result()?.into())
    }

    async fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64, false);
        let response: ApiResponse<ChatResponse> =
            http_client::send_json(self.client.post("api/chat").json(&request)).await?;
        Ok(response.into_result()?.into())
    }

    async fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64, true);
        let response =
            http_client::send_streaming(self.client.post("api/chat").json(&request)).await?;
        let mut lines = http_client::ndjson_lines(response);

        Ok(Box::pin(stream! {
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                };

                match serde_json::from_str::<ApiResponse<ChatResponse>>(&line)
                    .map(ApiResponse::into_result)
                {
                    Ok(Ok(response)) => yield Ok(RawDelta::from(response)),
                    Ok(Err(err)) => {
                        yield Err(err);
                        break;
                    }
                    Err(err) => {
                        tracing::debug!(target: "seer", "Couldn't parse Ollama stream line: {err}");
                        continue;
                    }
                }
            }
        }))
    }
}
