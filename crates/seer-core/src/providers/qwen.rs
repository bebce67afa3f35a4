//! Alibaba Cloud DashScope (Qwen-VL) client
//!
//! DashScope's native multimodal generation API wraps messages in an `input` object and puts
//! generation parameters under `parameters`. Content items are keyed by kind (`{"image": ...}`,
//! `{"text": ...}`) rather than tagged with a `type` field.
//!
//! # Example
//! ```ignore
//! use seer::providers::qwen;
//!
//! let client = qwen::Client::new("YOUR_API_KEY")?;
//!
//! let qwen_vl = client.vision_model(qwen::QWEN_VL_MAX);
//! ```

use std::path::PathBuf;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    client::{self, ClientBuilderError},
    error::VisionError,
    http_client,
    image::{self, ImageInput},
    language::Language,
    message::{Role, Turn},
    prompt::{self, PromptKind},
    request::GenerationConfig,
    streaming::{FinishReason, RawDelta, RawDeltaStream},
    vision::{self, RawCompletion},
};

// ================================================================
// Main DashScope Client
// ================================================================
const DASHSCOPE_API_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";
const GENERATION_PATH: &str = "services/aigc/multimodal-generation/generation";

pub const QWEN_VL_MAX: &str = "qwen-vl-max";
pub const QWEN_VL_PLUS: &str = "qwen-vl-plus";
pub const QWEN_VL_CHAT_V1: &str = "qwen-vl-chat-v1";

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
            base_url: DASHSCOPE_API_BASE_URL,
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
            image_dir: std::env::temp_dir().join("seer"),
        })
    }
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
    language: Language,
    image_dir: PathBuf,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("http_client", &self.http_client)
            .field("api_key", &"<REDACTED>")
            .field("language", &self.language)
            .finish()
    }
}

impl Client {
    pub fn builder(api_key: &str) -> ClientBuilder<'_> {
        ClientBuilder::new(api_key)
    }

    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from `DASHSCOPE_API_KEY` (and optional `DASHSCOPE_BASE_URL`).
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        let api_key = client::required_env("DASHSCOPE_API_KEY")?;
        let base_url = client::optional_env("DASHSCOPE_BASE_URL");
        let mut builder = ClientBuilder::new(&api_key);
        if let Some(base_url) = base_url.as_deref() {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    pub fn vision_model(&self, model: &str) -> CompletionModel {
        CompletionModel::new(self.clone(), model)
    }

    fn post(&self, streaming: bool) -> reqwest::RequestBuilder {
        let url = format!("{}/{GENERATION_PATH}", self.base_url);
        tracing::debug!(target: "seer", provider = "qwen", %url, streaming, "POST");
        let builder = self.http_client.post(url).bearer_auth(&self.api_key);
        if streaming {
            builder
                .header("X-DashScope-SSE", "enable")
                .header("accept", "text/event-stream")
        } else {
            builder
        }
    }
}

// ================================================================
// Request / response shapes
// ================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ContentItem {
    Image { image: String },
    Text { text: String },
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Input {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct Parameters {
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_output: Option<bool>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub input: Input,
    pub parameters: Parameters,
}

#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    pub output: Output,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub finish_reason: Option<String>,
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: ResponseContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    Items(Vec<ContentItem>),
    Text(String),
}

impl Default for ResponseContent {
    fn default() -> Self {
        ResponseContent::Items(Vec::new())
    }
}

impl ResponseContent {
    fn into_text(self) -> String {
        match self {
            ResponseContent::Text(text) => text,
            ResponseContent::Items(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    ContentItem::Text { text } => Some(text),
                    ContentItem::Image { .. } => None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.input_tokens + self.output_tokens)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Err(ApiErrorResponse),
    Ok(GenerationResponse),
}

impl ApiResponse {
    fn into_result(self) -> Result<GenerationResponse, VisionError> {
        match self {
            ApiResponse::Ok(response) => Ok(response),
            ApiResponse::Err(err) => Err(VisionError::ProviderError(format!(
                "{}: {}",
                err.code, err.message
            ))),
        }
    }
}

fn finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        None | Some("") | Some("null") => None,
        Some(reason) => Some(FinishReason::from_openai(reason)),
    }
}

impl GenerationResponse {
    fn into_delta(self) -> RawDelta {
        let total_tokens = self.usage.map(|usage| usage.total());
        match self.output.choices.into_iter().next() {
            Some(choice) => RawDelta {
                text: Some(choice.message.content.into_text()),
                finish: finish_reason(choice.finish_reason.as_deref()),
                total_tokens,
            },
            None => RawDelta {
                total_tokens,
                ..Default::default()
            },
        }
    }
}

impl TryFrom<GenerationResponse> for RawCompletion {
    type Error = VisionError;

    fn try_from(response: GenerationResponse) -> Result<Self, Self::Error> {
        let total_tokens = response.usage.map(|usage| usage.total()).unwrap_or(0);
        let choice = response
            .output
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::ResponseError("Response contained no choices".into()))?;

        Ok(RawCompletion {
            text: choice.message.content.into_text(),
            finish: finish_reason(choice.finish_reason.as_deref()),
            total_tokens,
        })
    }
}

// ================================================================
// Vision model
// ================================================================

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

    fn describe_request(&self, b64: &str, max_tokens: u64) -> GenerationRequest {
        let instruction = prompt::instruction(PromptKind::ChartExtraction, self.client.language);
        GenerationRequest {
            model: self.model.clone(),
            input: Input {
                messages: vec![Message {
                    role: Role::User,
                    content: vec![
                        ContentItem::Image {
                            image: prompt::data_url(b64),
                        },
                        ContentItem::Text {
                            text: instruction.to_string(),
                        },
                    ],
                }],
            },
            parameters: Parameters {
                max_tokens,
                ..Default::default()
            },
        }
    }

    fn chat_request(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        b64: &str,
        streaming: bool,
    ) -> GenerationRequest {
        let messages = history
            .into_iter()
            .map(|turn| {
                let content = match turn.role {
                    Role::User => vec![
                        ContentItem::Image {
                            image: prompt::data_url(b64),
                        },
                        ContentItem::Text { text: turn.content },
                    ],
                    _ => vec![ContentItem::Text { text: turn.content }],
                };
                Message {
                    role: turn.role,
                    content,
                }
            })
            .collect();

        let effective = gen_conf.effective();
        GenerationRequest {
            model: self.model.clone(),
            input: Input { messages },
            parameters: Parameters {
                max_tokens: effective.max_tokens,
                temperature: Some(effective.temperature),
                top_p: Some(effective.top_p),
                presence_penalty: gen_conf.presence_penalty,
                incremental_output: streaming.then_some(true),
            },
        }
    }

    /// Keep a JPEG copy of the described image under the client's image directory.
    fn persist_image(&self, image: &ImageInput) -> Result<PathBuf, VisionError> {
        std::fs::create_dir_all(&self.client.image_dir)?;
        let path = self
            .client
            .image_dir
            .join(format!("{}.jpg", uuid::Uuid::new_v4()));
        image::save_jpeg(image, &path)?;
        tracing::debug!(target: "seer", path = %path.display(), "saved image for dashscope");
        Ok(path)
    }
}

async fn send_generation_request(
    builder: reqwest::RequestBuilder,
) -> Result<RawCompletion, VisionError> {
    let response: ApiResponse = http_client::send_json(builder).await?;
    response.into_result()?.try_into()
}

impl vision::VisionModel for CompletionModel {
    fn provider_name(&self) -> &'static str {
        "qwen"
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
        if let Err(err) = self.persist_image(image) {
            tracing::warn!(target: "seer", error = %err, "could not keep a copy of the image");
        }
        let b64 = image.to_base64()?;
        let request = self.describe_request(&b64, max_tokens);
        send_generation_request(self.client.post(false).json(&request)).await
    }

    async fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64, false);
        send_generation_request(self.client.post(false).json(&request)).await
    }

    async fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64, true);
        let response = http_client::send_streaming(self.client.post(true).json(&request)).await?;
        let mut events = http_client::sse_data(response);

        Ok(Box::pin(stream! {
            while let Some(event) = events.next().await {
                let data = match event {
                    Ok(data) => data,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                };

                match serde_json::from_str::<ApiResponse>(&data).map(ApiResponse::into_result) {
                    Ok(Ok(response)) => yield Ok(response.into_delta()),
                    Ok(Err(err)) => {
                        yield Err(err);
                        break;
                    }
                    Err(err) => {
                        tracing::debug!(target: "seer", "Couldn't parse DashScope event: {err}");
                        continue;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> CompletionModel {
        Client::new("sk-test").unwrap().vision_model(QWEN_VL_MAX)
    }

    #[test]
    fn chat_request_shape() {
        let request = serde_json::to_value(model().chat_request(
            vec![Turn::user("what is it?")],
            &GenerationConfig::default(),
            "QUJD",
            true,
        ))
        .unwrap();

        assert_eq!(
            request,
            json!({
                "model": "qwen-vl-max",
                "input": {"messages": [{
                    "role": "user",
                    "content": [
                        {"image": "data:image/jpeg;base64,QUJD"},
                        {"text": "what is it?"}
                    ]
                }]},
                "parameters": {
                    "max_tokens": 16385,
                    "temperature": 0.3,
                    "top_p": 0.7,
                    "incremental_output": true
                }
            })
        );
    }

    #[test]
    fn describe_request_has_only_max_tokens() {
        let request = serde_json::to_value(model().describe_request("QUJD", 2048)).unwrap();
        assert_eq!(request["parameters"], json!({"max_tokens": 2048}));
        assert_eq!(
            request["input"]["messages"][0]["content"][0]["image"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn response_text_and_tokens() {
        let response: ApiResponse = serde_json::from_value(json!({
            "output": {"choices": [{
                "finish_reason": "length",
                "message": {"role": "assistant", "content": [{"text": "Fo"}, {"text": "o"}]}
            }]},
            "usage": {"input_tokens": 30, "output_tokens": 12},
            "request_id": "abc"
        }))
        .unwrap();
        let completion = RawCompletion::try_from(response.into_result().unwrap()).unwrap();
        assert_eq!(completion.text, "Foo");
        assert_eq!(completion.finish, Some(FinishReason::Length));
        assert_eq!(completion.total_tokens, 42);
    }

    #[test]
    fn null_finish_reason_is_none() {
        let response: GenerationResponse = serde_json::from_value(json!({
            "output": {"choices": [{
                "finish_reason": "null",
                "message": {"role": "assistant", "content": [{"text": "a"}]}
            }]},
            "usage": {"total_tokens": 5}
        }))
        .unwrap();
        assert_eq!(
            response.into_delta(),
            RawDelta {
                text: Some("a".into()),
                finish: None,
                total_tokens: Some(5),
            }
        );
    }

    #[test]
    fn error_body_is_provider_error() {
        let response: ApiResponse = serde_json::from_value(json!({
            "code": "InvalidApiKey",
            "message": "Invalid API-key provided.",
            "request_id": "abc"
        }))
        .unwrap();
        assert_eq!(
            response.into_result().unwrap_err().to_string(),
            "InvalidApiKey: Invalid API-key provided."
        );
    }

    #[test]
    fn describe_keeps_a_jpeg_copy() {
        use ::image::{DynamicImage, Rgb, RgbImage};

        let dir = std::env::temp_dir().join(format!("seer-test-{}", uuid::Uuid::new_v4()));
        let mut model = model();
        model.client.image_dir = dir.clone();

        let image = ImageInput::from(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            10,
            10,
            Rgb([9, 9, 9]),
        )));
        let path = model.persist_image(&image).unwrap();
        assert_eq!(path.parent(), Some(dir.as_path()));
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("jpg"));
        let saved = std::fs::read(&path).unwrap();
        assert_eq!(::image::guess_format(&saved).unwrap(), ::image::ImageFormat::Jpeg);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
