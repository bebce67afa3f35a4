//! The interface every backend implements.
//!
//! Backends implement the three fallible `try_*` methods and describe themselves through
//! `provider_name`, `model_name` and `language`. The caller-facing operations (`describe`,
//! `chat`, `chat_streamly`) are provided by the trait: they apply the history transform and
//! the truncation notice, and turn every [`VisionError`] into an answer starting with
//! [`ERROR_MARKER`] with a token count of 0.
//!
//! [`VisionModelDyn`] is the object-safe twin, used when the backend is picked at runtime
//! (see [`crate::providers::build`]).

use std::{fmt, future::Future};

use futures::future::BoxFuture;
use tracing::{Instrument, info_span};

use crate::{
    error::{ERROR_MARKER, VisionError},
    image::ImageInput,
    language::Language,
    message::Turn,
    prompt,
    request::{DEFAULT_MAX_TOKENS, GenerationConfig},
    streaming::{self, FinishReason, RawDeltaStream, VisionStream},
};

/// Answer text and the total number of tokens the provider billed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionResponse {
    pub text: String,
    pub total_tokens: u64,
}

impl VisionResponse {
    pub fn new(text: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            text: text.into(),
            total_tokens,
        }
    }

    pub fn from_error(err: &VisionError) -> Self {
        Self {
            text: err.to_marker(),
            total_tokens: 0,
        }
    }

    /// Whether the answer carries a contained failure instead of model output.
    pub fn is_error(&self) -> bool {
        self.text.starts_with(ERROR_MARKER)
    }

    pub fn into_parts(self) -> (String, u64) {
        (self.text, self.total_tokens)
    }
}

impl fmt::Display for VisionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A single non-streamed answer as the backend decoded it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCompletion {
    pub text: String,
    pub finish: Option<FinishReason>,
    pub total_tokens: u64,
}

impl RawCompletion {
    fn into_describe_response(self) -> VisionResponse {
        VisionResponse::new(self.text.trim(), self.total_tokens)
    }

    fn into_chat_response(self, language: Language) -> VisionResponse {
        let mut text = self.text.trim().to_string();
        if self.finish == Some(FinishReason::Length) {
            text.push_str(language.truncation_notice());
        }
        VisionResponse::new(text, self.total_tokens)
    }
}

pub trait VisionModel: Clone + Send + Sync + 'static {
    /// Short backend identifier, e.g. `"openai"`.
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;

    /// Language of the instructions and notices this model emits.
    fn language(&self) -> Language;

    /// Send the describe prompt for `image`, capped at `max_tokens`.
    fn try_describe(
        &self,
        image: &ImageInput,
        max_tokens: u64,
    ) -> impl Future<Output = Result<RawCompletion, VisionError>> + Send;

    /// Send an already prepared conversation, attaching the image to every user turn.
    fn try_chat(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> impl Future<Output = Result<RawCompletion, VisionError>> + Send;

    /// Like [`VisionModel::try_chat`], returning the provider's deltas as they arrive.
    fn try_stream(
        &self,
        history: Vec<Turn>,
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> impl Future<Output = Result<RawDeltaStream, VisionError>> + Send;

    /// Describe an image in one shot. `max_tokens` defaults to 16385.
    fn describe(
        &self,
        image: &ImageInput,
        max_tokens: Option<u64>,
    ) -> impl Future<Output = VisionResponse> + Send {
        let span = info_span!(
            target: "seer",
            "describe",
            provider = self.provider_name(),
            model = self.model_name(),
        );
        async move {
            let max_tokens = max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
            match self.try_describe(image, max_tokens).await {
                Ok(completion) => {
                    tracing::info!(target: "seer", total_tokens = completion.total_tokens, "describe finished");
                    completion.into_describe_response()
                }
                Err(err) => {
                    tracing::warn!(target: "seer", "describe failed: {err}");
                    VisionResponse::from_error(&err)
                }
            }
        }
        .instrument(span)
    }

    /// One exchange of an image-grounded conversation.
    ///
    /// `history` must end with a user turn. A non-empty `system` is folded into that turn, see
    /// [`prompt::prepare_history`]. An answer cut off by the token limit gets the language's
    /// continuation notice appended.
    fn chat(
        &self,
        system: &str,
        history: &[Turn],
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> impl Future<Output = VisionResponse> + Send {
        let span = info_span!(
            target: "seer",
            "chat",
            provider = self.provider_name(),
            model = self.model_name(),
            turns = history.len(),
        );
        async move {
            let result = match prompt::prepare_history(system, history) {
                Ok(outgoing) => self.try_chat(outgoing, gen_conf, image_b64).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(completion) => {
                    tracing::info!(target: "seer", total_tokens = completion.total_tokens, "chat finished");
                    completion.into_chat_response(self.language())
                }
                Err(err) => {
                    tracing::warn!(target: "seer", "chat failed: {err}");
                    VisionResponse::from_error(&err)
                }
            }
        }
        .instrument(span)
    }

    /// Streaming variant of [`VisionModel::chat`].
    ///
    /// Nothing is sent until the returned stream is first polled.
    fn chat_streamly(
        &self,
        system: &str,
        history: &[Turn],
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> VisionStream {
        let span = info_span!(
            target: "seer",
            "chat_streamly",
            provider = self.provider_name(),
            model = self.model_name(),
            turns = history.len(),
        );
        let model = self.clone();
        let prepared = prompt::prepare_history(system, history);
        let gen_conf = gen_conf.clone();
        let image_b64 = image_b64.to_string();

        let source = async move {
            let outgoing = prepared?;
            model.try_stream(outgoing, &gen_conf, &image_b64).await
        };
        streaming::accumulate(source, self.language(), span)
    }
}

/// Object-safe version of [`VisionModel`].
pub trait VisionModelDyn: Send + Sync {
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;

    fn language(&self) -> Language;

    fn describe<'a>(
        &'a self,
        image: &'a ImageInput,
        max_tokens: Option<u64>,
    ) -> BoxFuture<'a, VisionResponse>;

    fn chat<'a>(
        &'a self,
        system: &'a str,
        history: &'a [Turn],
        gen_conf: &'a GenerationConfig,
        image_b64: &'a str,
    ) -> BoxFuture<'a, VisionResponse>;

    fn chat_streamly(
        &self,
        system: &str,
        history: &[Turn],
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> VisionStream;
}

impl<T: VisionModel> VisionModelDyn for T {
    fn provider_name(&self) -> &'static str {
        VisionModel::provider_name(self)
    }

    fn model_name(&self) -> &str {
        VisionModel::model_name(self)
    }

    fn language(&self) -> Language {
        VisionModel::language(self)
    }

    fn describe<'a>(
        &'a self,
        image: &'a ImageInput,
        max_tokens: Option<u64>,
    ) -> BoxFuture<'a, VisionResponse> {
        Box::pin(VisionModel::describe(self, image, max_tokens))
    }

    fn chat<'a>(
        &'a self,
        system: &'a str,
        history: &'a [Turn],
        gen_conf: &'a GenerationConfig,
        image_b64: &'a str,
    ) -> BoxFuture<'a, VisionResponse> {
        Box::pin(VisionModel::chat(self, system, history, gen_conf, image_b64))
    }

    fn chat_streamly(
        &self,
        system: &str,
        history: &[Turn],
        gen_conf: &GenerationConfig,
        image_b64: &str,
    ) -> VisionStream {
        VisionModel::chat_streamly(self, system, history, gen_conf, image_b64)
    }
}
