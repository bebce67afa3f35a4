//! NVIDIA NIM vision-language models
//!
//! Every model has its own endpoint, derived from its `factory/model` name:
//! `meta/llama-3.2-11b-vision-instruct` is served at `{base_url}/meta/llama-3.2-11b-vision-instruct`.
//! LLaVA models published by `liuhaotian` live under `community/` with a shortened name.
//!
//! The image is not a separate content part: it travels as an inline `<img>` tag appended to
//! the text of each user turn.
//!
//! # Example
//! ```ignore
//! use seer::providers::nvidia;
//!
//! let client = nvidia::Client::new("YOUR_API_KEY")?;
//!
//! let model = client.vision_model(nvidia::NEVA_22B)?;
//! ```

use crate::{
    client::ClientBuilderError,
    error::VisionError,
    image::ImageInput,
    json_utils,
    language::Language,
    message::{Role, Turn},
    prompt::{self, PromptKind},
    providers::openai::{
        self,
        client::{Auth, ChatPath, Profile},
        completion::{CompletionRequest, Message, MessageContent, send_completion_request},
        streaming::send_compatible_streaming_request,
    },
    request::GenerationConfig,
    streaming::RawDeltaStream,
    vision::{self, RawCompletion},
};

// ================================================================
// Main NVIDIA Client
// ================================================================
const NVIDIA_API_BASE_URL: &str = "https://ai.api.nvidia.com/v1/vlm";

pub const NEVA_22B: &str = "nvidia/neva-22b";
pub const LLAMA_3_2_11B_VISION: &str = "meta/llama-3.2-11b-vision-instruct";
pub const LLAVA_V1_6_34B: &str = "liuhaotian/llava-v1.6-34b";

static NVIDIA: Profile = Profile {
    provider: "nvidia",
    default_base_url: Some(NVIDIA_API_BASE_URL),
    api_key_env: "NVIDIA_API_KEY",
    base_url_env: "NVIDIA_BASE_URL",
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
        ClientBuilder::with_profile(&NVIDIA, api_key)
    }

    pub fn new(api_key: &str) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    /// Create a client from `NVIDIA_API_KEY` (and optional `NVIDIA_BASE_URL`).
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::build_from_env(&NVIDIA)
    }

    /// Create a vision model. The name must have the form `factory/model`.
    pub fn vision_model(&self, model: &str) -> Result<CompletionModel, ClientBuilderError> {
        Ok(CompletionModel {
            client: self.inner.clone(),
            path: endpoint_path(model)?,
            model: model.to_string(),
        })
    }
}

/// Endpoint path of a `factory/model` name, relative to the base url.
fn endpoint_path(model: &str) -> Result<String, ClientBuilderError> {
    let (factory, name) = model
        .split_once('/')
        .filter(|(factory, name)| !factory.is_empty() && !name.is_empty() && !name.contains('/'))
        .ok_or(ClientBuilderError::InvalidProperty(
            "nvidia model name must be `factory/model`",
        ))?;

    if factory == "liuhaotian" {
        Ok(format!("community/{}", name.replace("-v1.6", "16")))
    } else {
        Ok(format!("{factory}/{name}"))
    }
}

fn text_with_image(text: &str, b64: &str) -> String {
    format!("{text} {}", prompt::inline_img_tag(b64))
}

#[derive(Clone, Debug)]
pub struct CompletionModel {
    client: openai::Client,
    path: String,
    pub model: String,
}

impl CompletionModel {
    fn describe_request(&self, b64: &str, max_tokens: u64) -> CompletionRequest {
        let instruction = prompt::instruction(PromptKind::SceneDescription, self.client.language());
        let message = Message {
            role: Role::User,
            content: MessageContent::Text(text_with_image(instruction, b64)),
        };
        CompletionRequest::describe(None, message, max_tokens)
    }

    fn chat_request(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        b64: &str,
    ) -> CompletionRequest {
        let messages = history
            .into_iter()
            .map(|turn| {
                let content = match turn.role {
                    Role::User => text_with_image(&turn.content, b64),
                    _ => turn.content,
                };
                Message {
                    role: turn.role,
                    content: MessageContent::Text(content),
                }
            })
            .collect();
        CompletionRequest::chat(None, messages, gen_conf)
    }

    fn post(&self, accept: &'static str) -> reqwest::RequestBuilder {
        self.client.post(&self.path).header("accept", accept)
    }
}

impl vision::VisionModel for CompletionModel {
    fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn language(&self) -> Language {
        self.client.language()
    }

    async fn try_describe(
        &self,
        image: &ImageInput,
        max_tokens: u64,
    ) -> Result<RawCompletion, VisionError> {
        let b64 = image.to_base64()?;
        let request = self.describe_request(&b64, max_tokens);
        send_completion_request(self.post("application/json").json(&request)).await
    }

    async fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64);
        send_completion_request(self.post("application/json").json(&request)).await
    }

    async fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        let request = json_utils::merge(
            serde_json::to_value(self.chat_request(history, gen_conf, image_b64))?,
            serde_json::json!({"stream": true}),
        );
        send_compatible_streaming_request(
            self.post("text/event-stream").json(&request),
        )
        .await
    }
}
