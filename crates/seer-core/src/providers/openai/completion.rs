// ================================================================
// OpenAI Chat Completions API (vision)
// ================================================================

use serde::{Deserialize, Serialize};

use super::{
    Client,
    client::ApiResponse,
    streaming::send_compatible_streaming_request,
};
use crate::{
    error::VisionError,
    http_client,
    image::ImageInput,
    json_utils,
    language::Language,
    message::{Role, Turn},
    prompt::{self, PromptKind},
    request::GenerationConfig,
    streaming::{FinishReason, RawDeltaStream},
    vision::{self, RawCompletion},
};

/// `gpt-4o` vision model
pub const GPT_4O: &str = "gpt-4o";
/// `gpt-4o-mini` vision model
pub const GPT_4O_MINI: &str = "gpt-4o-mini";
/// `gpt-4.1` vision model
pub const GPT_4_1: &str = "gpt-4.1";
/// `gpt-4-turbo` vision model
pub const GPT_4_TURBO: &str = "gpt-4-turbo";
/// `gpt-4-vision-preview` vision model
pub const GPT_4_VISION_PREVIEW: &str = "gpt-4-vision-preview";

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    pub fn image(b64: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: prompt::data_url(b64),
            },
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

impl Message {
    /// The single user message sent by `describe`: image first, then the instruction.
    pub fn describe_prompt(b64: &str, kind: PromptKind, language: Language) -> Self {
        Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::image(b64),
                ContentPart::text(prompt::instruction(kind, language)),
            ]),
        }
    }

    /// A conversation turn; user turns carry the image ahead of their text.
    pub fn chat_turn(turn: Turn, b64: &str) -> Self {
        match turn.role {
            Role::User => Message {
                role: Role::User,
                content: MessageContent::Parts(vec![
                    ContentPart::image(b64),
                    ContentPart::text(turn.content),
                ]),
            },
            role => Message {
                role,
                content: MessageContent::Text(turn.content),
            },
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl CompletionRequest {
    pub fn describe(model: Option<String>, message: Message, max_tokens: u64) -> Self {
        Self {
            model,
            messages: vec![message],
            max_tokens,
            temperature: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    pub fn chat(model: Option<String>, messages: Vec<Message>, gen_conf: &GenerationConfig) -> Self {
        let effective = gen_conf.effective();
        Self {
            model,
            messages,
            max_tokens: effective.max_tokens,
            temperature: Some(effective.temperature),
            top_p: Some(effective.top_p),
            presence_penalty: gen_conf.presence_penalty,
            frequency_penalty: gen_conf.frequency_penalty,
        }
    }

    /// The same request with `stream: true` and usage reporting switched on.
    pub fn into_streaming_json(self) -> Result<serde_json::Value, VisionError> {
        Ok(json_utils::merge(
            serde_json::to_value(self)?,
            serde_json::json!({"stream": true, "stream_options": {"include_usage": true}}),
        ))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionResponse {
    #[serde(default, deserialize_with = "json_utils::null_or_vec")]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<AssistantMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u64,
}

impl TryFrom<CompletionResponse> for RawCompletion {
    type Error = VisionError;

    fn try_from(response: CompletionResponse) -> Result<Self, Self::Error> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::ResponseError("Response contained no choices".into()))?;

        Ok(RawCompletion {
            text: choice
                .message
                .and_then(|message| message.content)
                .unwrap_or_default(),
            finish: choice.finish_reason.as_deref().map(FinishReason::from_openai),
            total_tokens: response.usage.map(|usage| usage.total_tokens).unwrap_or(0),
        })
    }
}

/// Post a chat completion request and decode the first choice.
pub(crate) async fn send_completion_request(
    request_builder: reqwest::RequestBuilder,
) -> Result<RawCompletion, VisionError> {
    let response: ApiResponse<CompletionResponse> =
        http_client::send_json(request_builder).await?;
    response.into_result()?.try_into()
}

#[derive(Clone, Debug)]
pub struct CompletionModel {
    pub(crate) client: Client,
    /// Name of the model (e.g.: gpt-4o)
    pub model: String,
    prompt_kind: PromptKind,
}

impl CompletionModel {
    pub fn new(client: Client, model: &str) -> Self {
        let prompt_kind = client.prompt_kind();
        Self {
            client,
            model: model.to_string(),
            prompt_kind,
        }
    }

    /// Use a different describe instruction than the provider's default.
    pub fn with_prompt_kind(mut self, prompt_kind: PromptKind) -> Self {
        self.prompt_kind = prompt_kind;
        self
    }

    pub(crate) fn describe_request(&self, b64: &str, max_tokens: u64) -> CompletionRequest {
        let message = Message::describe_prompt(b64, self.prompt_kind, self.client.language());
        CompletionRequest::describe(Some(self.model.clone()), message, max_tokens)
    }

    pub(crate) fn chat_request(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        b64: &str,
    ) -> CompletionRequest {
        let messages = history
            .into_iter()
            .map(|turn| Message::chat_turn(turn, b64))
            .collect();
        CompletionRequest::chat(Some(self.model.clone()), messages, gen_conf)
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
        tracing::debug!(target: "seer", image_b64_len = b64.len(), "describe request");

        send_completion_request(self.client.post_chat_completion(&self.model).json(&request))
            .await
    }

    async fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64);
        tracing::debug!(target: "seer", messages = request.messages.len(), "chat request");

        send_completion_request(self.client.post_chat_completion(&self.model).json(&request))
            .await
    }

    async fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        let request = self
            .chat_request(history, gen_conf, image_b64)
            .into_streaming_json()?;

        send_compatible_streaming_request(
            self.client.post_chat_completion(&self.model).json(&request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> CompletionModel {
        Client::builder("sk-test")
            .language("English")
            .build()
            .unwrap()
            .vision_model(GPT_4O)
    }

    #[test]
    fn describe_request_puts_image_first() {
        let request = serde_json::to_value(model().describe_request("QUJD", 300)).unwrap();
        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["max_tokens"], 300);
        assert!(request.get("temperature").is_none());
        let content = &request["messages"][0]["content"];
        assert_eq!(request["messages"][0]["role"], "user");
        assert_eq!(
            content[0],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,QUJD"}})
        );
        assert_eq!(content[1]["type"], "text");
        assert!(
            content[1]["text"]
                .as_str()
                .unwrap()
                .starts_with("You will receive an image")
        );
    }

    #[test]
    fn chat_request_embeds_image_in_user_turns_only() {
        let history = vec![
            Turn::user("what is this?"),
            Turn::assistant("a cat"),
            Turn::user("what color?"),
        ];
        let request = serde_json::to_value(model().chat_request(
            history,
            &GenerationConfig::new().temperature(0.1),
            "QUJD",
        ))
        .unwrap();

        assert_eq!(request["messages"][1], json!({"role": "assistant", "content": "a cat"}));
        let last = &request["messages"][2]["content"];
        assert_eq!(last[0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert_eq!(last[1], json!({"type": "text", "text": "what color?"}));
        assert_eq!(request["temperature"], 0.1);
        assert_eq!(request["top_p"], 0.7);
        assert_eq!(request["max_tokens"], 16385);
        assert!(request.get("presence_penalty").is_none());
    }

    #[test]
    fn streaming_request_asks_for_usage() {
        let request = model()
            .chat_request(vec![Turn::user("hi")], &GenerationConfig::default(), "")
            .into_streaming_json()
            .unwrap();
        assert_eq!(request["stream"], true);
        assert_eq!(request["stream_options"]["include_usage"], true);
    }

    #[test]
    fn response_maps_to_completion() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": " Foo "}, "finish_reason": "length"}],
            "usage": {"total_tokens": 42}
        }))
        .unwrap();
        let completion = RawCompletion::try_from(response).unwrap();
        assert_eq!(completion.text, " Foo ");
        assert_eq!(completion.finish, Some(FinishReason::Length));
        assert_eq!(completion.total_tokens, 42);
    }

    #[test]
    fn missing_usage_and_content_default() {
        let response: CompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        let completion = RawCompletion::try_from(response).unwrap();
        assert_eq!(completion, RawCompletion::default());
    }

    #[test]
    fn no_choices_is_an_error() {
        let response: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            RawCompletion::try_from(response),
            Err(VisionError::ResponseError(_))
        ));
    }
}
