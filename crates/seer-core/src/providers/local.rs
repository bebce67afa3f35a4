//! No-op backend.
//!
//! Answers every request with empty text and zero tokens without touching the network, so a
//! deployment can name a vision model that is not wired to any provider.

use crate::{
    error::VisionError,
    image::ImageInput,
    language::Language,
    message::Turn,
    request::GenerationConfig,
    streaming::RawDeltaStream,
    vision::{self, RawCompletion},
};

#[derive(Clone, Debug, Default)]
pub struct CompletionModel {
    pub model: String,
    language: Language,
}

impl CompletionModel {
    pub fn new(model: &str, language: impl Into<Language>) -> Self {
        Self {
            model: model.to_string(),
            language: language.into(),
        }
    }
}

impl vision::VisionModel for CompletionModel {
    fn provider_name(&self) -> &'static str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn language(&self) -> Language {
        self.language
    }

    async fn try_describe(
        &self,
        _image: &ImageInput,
        _max_tokens: u64,
    ) -> Result<RawCompletion, VisionError> {
        Ok(RawCompletion::default())
    }

    async fn try_chat(
        &self,
        _history: Vec<Turn>,
        _gen_conf: &GenerationConfig,
        _image_b64: &str,
    ) -> Result<RawCompletion, VisionError> {
        Ok(RawCompletion::default())
    }

    async fn try_stream(
        &self,
        _history: Vec<Turn>,
        _gen_conf: &GenerationConfig,
        _image_b64: &str,
    ) -> Result<RawDeltaStream, VisionError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        streaming::StreamChunk,
        vision::{VisionModel, VisionResponse},
    };
    use futures::StreamExt;

    #[tokio::test]
    async fn every_operation_is_empty() {
        let model = CompletionModel::new("anything", "English");
        let image = ImageInput::from(vec![1u8, 2, 3]);

        assert_eq!(model.describe(&image, None).await, VisionResponse::default());
        assert_eq!(
            model
                .chat("", &[Turn::user("hi")], &GenerationConfig::default(), "")
                .await,
            VisionResponse::default()
        );

        let chunks: Vec<_> = model
            .chat_streamly("", &[Turn::user("hi")], &GenerationConfig::default(), "")
            .collect()
            .await;
        assert_eq!(chunks, vec![StreamChunk::Done(0)]);
    }
}
