//! Streaming chat.
//!
//! Backends turn their wire format (SSE events, NDJSON lines) into a stream of [`RawDelta`]s.
//! [`accumulate`] folds those deltas into the caller-facing [`VisionStream`]: a series of
//! [`StreamChunk::Partial`] values carrying the answer so far, closed by exactly one
//! [`StreamChunk::Done`] with the token count. Failures never end the stream early; they are
//! appended to the answer with the error marker and followed by `Done(0)`.
//!
//! ```ignore
//! let mut stream = model.chat_streamly("", &history, &GenerationConfig::default(), &b64);
//! while let Some(chunk) = stream.next().await {
//!     match chunk {
//!         StreamChunk::Partial(answer) => render(&answer),
//!         StreamChunk::Done(tokens) => println!("{tokens} tokens"),
//!     }
//! }
//! ```

use std::{future::Future, pin::Pin};

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing_futures::Instrument as _;

use crate::{
    error::VisionError,
    language::Language,
    vision::VisionResponse,
};

/// Item of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// The whole answer received so far.
    Partial(String),
    /// Final item: total tokens reported by the provider, 0 when unknown or on error.
    Done(u64),
}

pub type VisionStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut off by the token limit.
    Length,
    Other(String),
}

impl FinishReason {
    /// Map an OpenAI style `finish_reason` value.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One increment decoded from a provider stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDelta {
    pub text: Option<String>,
    pub finish: Option<FinishReason>,
    pub total_tokens: Option<u64>,
}

impl RawDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn finish(finish: FinishReason, total_tokens: Option<u64>) -> Self {
        Self {
            text: None,
            finish: Some(finish),
            total_tokens,
        }
    }

    pub fn usage(total_tokens: u64) -> Self {
        Self {
            total_tokens: Some(total_tokens),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.finish.is_none()
            && self.total_tokens.is_none()
    }
}

pub type RawDeltaStream = Pin<Box<dyn Stream<Item = Result<RawDelta, VisionError>> + Send>>;

/// Drive a provider delta stream into a [`VisionStream`].
///
/// `source` performs the request and resolves to the delta stream; it is not polled until the
/// returned stream is.
pub(crate) fn accumulate<F>(source: F, language: Language, span: tracing::Span) -> VisionStream
where
    F: Future<Output = Result<RawDeltaStream, VisionError>> + Send + 'static,
{
    let stream = stream! {
        let mut answer = String::new();
        let mut total_tokens = 0u64;
        let mut failure = None;

        match source.await {
            Ok(mut deltas) => {
                while let Some(delta) = deltas.next().await {
                    let delta = match delta {
                        Ok(delta) => delta,
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    };
                    if delta.is_empty() {
                        continue;
                    }

                    let mut grew = false;
                    if let Some(text) = delta.text.filter(|text| !text.is_empty()) {
                        answer.push_str(&text);
                        grew = true;
                    }
                    if delta.finish == Some(FinishReason::Length) {
                        answer.push_str(language.truncation_notice());
                        grew = true;
                    }
                    if let Some(tokens) = delta.total_tokens {
                        total_tokens = tokens;
                    }
                    if grew {
                        yield StreamChunk::Partial(answer.clone());
                    }
                }
            }
            Err(err) => failure = Some(err),
        }

        match failure {
            Some(err) => {
                tracing::warn!(target: "seer", "stream failed after {} chars: {err}", answer.len());
                yield StreamChunk::Partial(format!("{answer}\n{}", err.to_marker()));
                yield StreamChunk::Done(0);
            }
            None => {
                tracing::info!(target: "seer", total_tokens, "stream finished");
                yield StreamChunk::Done(total_tokens);
            }
        }
    };

    Box::pin(stream.instrument(span))
}

/// Drain a stream into the final answer and token count.
pub async fn collect_stream(mut stream: VisionStream) -> VisionResponse {
    let mut text = String::new();
    let mut total_tokens = 0;
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Partial(answer) => text = answer,
            StreamChunk::Done(tokens) => total_tokens = tokens,
        }
    }
    VisionResponse { text, total_tokens }
}

/// Print a stream to stdout as it arrives and return the token count.
pub async fn stream_to_stdout(stream: &mut VisionStream) -> Result<u64, std::io::Error> {
    use std::io::Write;

    let mut printed = 0;
    let mut total_tokens = 0;
    print!("Response: ");
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Partial(answer) => {
                if let Some(fresh) = answer.get(printed..) {
                    print!("{fresh}");
                }
                printed = answer.len();
                std::io::stdout().flush()?;
            }
            StreamChunk::Done(tokens) => total_tokens = tokens,
        }
    }
    println!();
    Ok(total_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn from_deltas(
        deltas: Vec<Result<RawDelta, VisionError>>,
        language: Language,
    ) -> VisionStream {
        let source = async move { Ok(Box::pin(stream::iter(deltas)) as RawDeltaStream) };
        accumulate(source, language, tracing::Span::none())
    }

    async fn drain(stream: VisionStream) -> Vec<StreamChunk> {
        stream.collect().await
    }

    #[tokio::test]
    async fn yields_cumulative_answer_then_tokens() {
        let chunks = drain(from_deltas(
            vec![
                Ok(RawDelta::text("Hel")),
                Ok(RawDelta::default()),
                Ok(RawDelta::text("lo")),
                Ok(RawDelta::finish(FinishReason::Stop, Some(12))),
            ],
            Language::English,
        ))
        .await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::Partial("Hel".into()),
                StreamChunk::Partial("Hello".into()),
                StreamChunk::Done(12),
            ]
        );
    }

    #[tokio::test]
    async fn length_finish_appends_notice() {
        let chunks = drain(from_deltas(
            vec![
                Ok(RawDelta::text("abc")),
                Ok(RawDelta::finish(FinishReason::Length, Some(7))),
            ],
            Language::Chinese,
        ))
        .await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::Partial("abc".into()),
                StreamChunk::Partial("abc······\n由于长度的原因，回答被截断了，要继续吗？".into()),
                StreamChunk::Done(7),
            ]
        );
    }

    #[tokio::test]
    async fn usage_only_delta_is_captured_silently() {
        let chunks = drain(from_deltas(
            vec![
                Ok(RawDelta::text("a")),
                Ok(RawDelta::finish(FinishReason::Stop, None)),
                Ok(RawDelta::usage(30)),
            ],
            Language::English,
        ))
        .await;

        assert_eq!(
            chunks,
            vec![StreamChunk::Partial("a".into()), StreamChunk::Done(30)]
        );
    }

    #[tokio::test]
    async fn missing_usage_reports_zero() {
        let chunks = drain(from_deltas(vec![Ok(RawDelta::text("x"))], Language::English)).await;
        assert_eq!(chunks.last(), Some(&StreamChunk::Done(0)));
    }

    #[tokio::test]
    async fn mid_stream_error_is_contained() {
        let chunks = drain(from_deltas(
            vec![
                Ok(RawDelta::text("partial")),
                Err(VisionError::StreamError("connection reset".into())),
                Ok(RawDelta::text("never seen")),
            ],
            Language::English,
        ))
        .await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::Partial("partial".into()),
                StreamChunk::Partial("partial\n**ERROR**: connection reset".into()),
                StreamChunk::Done(0),
            ]
        );
    }

    #[tokio::test]
    async fn setup_error_is_contained() {
        let source = async { Err(VisionError::ProviderError("401 Unauthorized".into())) };
        let chunks = drain(accumulate(source, Language::English, tracing::Span::none())).await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::Partial("\n**ERROR**: 401 Unauthorized".into()),
                StreamChunk::Done(0),
            ]
        );
    }

    #[tokio::test]
    async fn content_never_shrinks_and_done_is_last() {
        let chunks = drain(from_deltas(
            vec![
                Ok(RawDelta::text("a")),
                Ok(RawDelta::text("bc")),
                Ok(RawDelta::finish(FinishReason::Length, None)),
                Err(VisionError::StreamError("eof".into())),
            ],
            Language::English,
        ))
        .await;

        let mut last_len = 0;
        for chunk in chunks.iter().take(chunks.len() - 1) {
            assert!(matches!(chunk, StreamChunk::Partial(_)), "Done before the end");
            if let StreamChunk::Partial(text) = chunk {
                assert!(text.len() >= last_len);
                last_len = text.len();
            }
        }
        assert_eq!(chunks.last(), Some(&StreamChunk::Done(0)));
        assert_eq!(
            chunks
                .iter()
                .filter(|chunk| matches!(chunk, StreamChunk::Done(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn collect_keeps_last_answer() {
        let response = collect_stream(from_deltas(
            vec![
                Ok(RawDelta::text("one ")),
                Ok(RawDelta::text("two")),
                Ok(RawDelta::usage(5)),
            ],
            Language::English,
        ))
        .await;
        assert_eq!(response.into_parts(), ("one two".to_string(), 5));
    }

    #[test]
    fn openai_finish_reasons() {
        assert_eq!(FinishReason::from_openai("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_openai("length"), FinishReason::Length);
        assert_eq!(
            FinishReason::from_openai("content_filter"),
            FinishReason::Other("content_filter".into())
        );
    }
}
