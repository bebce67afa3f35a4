// ================================================================
// Google Gemini Completion API
// ================================================================
//
// https://ai.google.dev/api/generate-content

/// `gemini-1.5-flash` vision model
pub const GEMINI_1_5_FLASH: &str = "gemini-1.5-flash";
/// `gemini-1.5-pro` vision model
pub const GEMINI_1_5_PRO: &str = "gemini-1.5-pro";
/// `gemini-2.0-flash` vision model
pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";
/// `gemini-1.0-pro-vision-latest` vision model
pub const GEMINI_1_0_PRO_VISION: &str = "gemini-1.0-pro-vision-latest";

use serde::{Deserialize, Serialize};

use super::{
    Client,
    client::ApiResponse,
    streaming::send_streaming_request,
};
use crate::{
    error::VisionError,
    http_client,
    image::{IMAGE_MEDIA_TYPE, ImageInput},
    language::Language,
    message::{Role, Turn},
    prompt::{self, PromptKind},
    request::GenerationConfig,
    streaming::{FinishReason, RawDeltaStream},
    vision::{self, RawCompletion},
};

//
// Gemini API Response Types
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ContentCandidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCandidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl ContentCandidate {
    /// Concatenated text parts of the candidate.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect()
    }

    pub fn finish(&self) -> Option<FinishReason> {
        self.finish_reason.as_deref().map(finish_reason)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Map a Gemini `finishReason`; `MAX_TOKENS` is the truncation signal.
fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        other => FinishReason::Other(other.to_string()),
    }
}

impl TryFrom<GenerateContentResponse> for RawCompletion {
    type Error = VisionError;

    fn try_from(response: GenerateContentResponse) -> Result<Self, Self::Error> {
        let total_tokens = response
            .usage_metadata
            .as_ref()
            .map(|usage| usage.total_token_count)
            .unwrap_or(0);

        match response.candidates.first() {
            Some(candidate) => Ok(RawCompletion {
                text: candidate.text(),
                finish: candidate.finish(),
                total_tokens,
            }),
            None => Err(VisionError::ResponseError(
                match response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
                    Some(reason) => format!("Prompt blocked: {reason}"),
                    None => "No candidates found in response".into(),
                },
            )),
        }
    }
}

//
// Gemini API Request Types
//

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Content {
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: Blob,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(b64: &str) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: IMAGE_MEDIA_TYPE.to_string(),
                data: b64.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfigParams {
    pub max_output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl From<&GenerationConfig> for GenerationConfigParams {
    fn from(gen_conf: &GenerationConfig) -> Self {
        let effective = gen_conf.effective();
        Self {
            max_output_tokens: effective.max_tokens,
            temperature: Some(effective.temperature),
            top_p: Some(effective.top_p),
            presence_penalty: gen_conf.presence_penalty,
            frequency_penalty: gen_conf.frequency_penalty,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfigParams,
}

#[derive(Clone, Debug)]
pub struct CompletionModel {
    pub(crate) client: Client,
    pub model: String,
}

impl CompletionModel {
    pub fn new(client: Client, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub(crate) fn describe_request(&self, b64: &str, max_tokens: u64) -> GenerateContentRequest {
        let instruction = prompt::instruction(PromptKind::SceneDescription, self.client.language());
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(instruction), Part::image(b64)],
                role: Some("user".into()),
            }],
            system_instruction: None,
            generation_config: GenerationConfigParams {
                max_output_tokens: max_tokens,
                ..Default::default()
            },
        }
    }

    /// System turns move to `systemInstruction`, assistant turns take the `model` role and the
    /// image is appended to the final turn.
    pub(crate) fn chat_request(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        b64: &str,
    ) -> GenerateContentRequest {
        let mut system = Vec::new();
        let mut contents = Vec::new();
        for turn in history {
            match turn.role {
                Role::System => system.push(Part::text(turn.content)),
                Role::User | Role::Assistant => contents.push(Content {
                    parts: vec![Part::text(turn.content)],
                    role: Some(gemini_role(turn.role).into()),
                }),
            }
        }
        if let Some(last) = contents.last_mut() {
            last.parts.push(Part::image(b64));
        }

        GenerateContentRequest {
            contents,
            system_instruction: (!system.is_empty()).then_some(Content {
                parts: system,
                role: None,
            }),
            generation_config: GenerationConfigParams::from(gen_conf),
        }
    }

    pub(crate) fn endpoint(&self, method: &str) -> String {
        format!("/v1beta/models/{}:{}", self.model, method)
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        _ => "user",
    }
}

async fn send_request(
    builder: reqwest::RequestBuilder,
) -> Result<RawCompletion, VisionError> {
    let response: ApiResponse<GenerateContentResponse> = http_client::send_json(builder).await?;
    response.into_result()?.try_into()
}

impl vision::VisionModel for CompletionModel {
    fn provider_name(&self) -> &'static str {
        "gemini"
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
        tracing::debug!(target: "seer", image_bytes = b64.len(), "Gemini describe request");
        let request = self.describe_request(&b64, max_tokens);
        send_request(
            self.client
                .post(&self.endpoint("generateContent"))
                .json(&request),
        )
        .await
    }

    async fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64);
        send_request(
            self.client
                .post(&self.endpoint("generateContent"))
                .json(&request),
        )
        .await
    }

    async fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        let request = self.chat_request(history, gen_conf, image_b64);
        send_streaming_request(
            self.client
                .post_sse(&self.endpoint("streamGenerateContent"))
                .json(&request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(language: &str) -> CompletionModel {
        Client::builder("key")
            .language(language)
            .build()
            .unwrap()
            .vision_model(GEMINI_1_5_FLASH)
    }

    #[test]
    fn describe_puts_text_before_image() {
        let request = serde_json::to_value(model("English").describe_request("QUJD", 2048)).unwrap();
        assert_eq!(
            request,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "Please describe the content of this picture, like where, when, who, what happen. If it has number data, please extract them out."},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "QUJD"}}
                    ]
                }],
                "generationConfig": {"maxOutputTokens": 2048}
            })
        );
    }

    #[test]
    fn chat_maps_roles_and_appends_image_to_last_turn() {
        let request = serde_json::to_value(model("Chinese").chat_request(
            vec![
                Turn::system("be brief"),
                Turn::user("hi"),
                Turn::assistant("hello"),
                Turn::user("what is this?"),
            ],
            &GenerationConfig::new().max_tokens(100),
            "QUJD",
        ))
        .unwrap();

        assert_eq!(request["systemInstruction"], json!({"parts": [{"text": "be brief"}]}));
        assert_eq!(request["contents"][1]["role"], "model");
        assert_eq!(request["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(
            request["contents"][2]["parts"],
            json!([
                {"text": "what is this?"},
                {"inlineData": {"mimeType": "image/jpeg", "data": "QUJD"}}
            ])
        );
        assert_eq!(
            request["generationConfig"],
            json!({"maxOutputTokens": 100, "temperature": 0.3, "topP": 0.7})
        );
    }

    #[test]
    fn max_tokens_finish_is_truncation() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A bar "}, {"text": "chart"}]},
                "finishReason": "MAX_TOKENS"
            }],
            "usageMetadata": {"promptTokenCount": 300, "candidatesTokenCount": 12, "totalTokenCount": 312}
        }))
        .unwrap();

        let completion = RawCompletion::try_from(response).unwrap();
        assert_eq!(completion.text, "A bar chart");
        assert_eq!(completion.finish, Some(FinishReason::Length));
        assert_eq!(completion.total_tokens, 312);
    }

    #[test]
    fn blocked_prompt_is_response_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert_eq!(
            RawCompletion::try_from(response).unwrap_err().to_string(),
            "Prompt blocked: SAFETY"
        );
    }
}
