use async_stream::stream;
use futures::StreamExt;
use serde::Deserialize;

use super::{client::ApiResponse, completion::Usage};
use crate::{
    error::VisionError,
    http_client,
    json_utils,
    streaming::{FinishReason, RawDelta, RawDeltaStream},
};

// ================================================================
// OpenAI Completion Streaming API
// ================================================================
#[derive(Debug, Deserialize, Clone)]
pub struct StreamingDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamingChoice {
    #[serde(default)]
    pub delta: Option<StreamingDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamingCompletionChunk {
    #[serde(default, deserialize_with = "json_utils::null_or_vec")]
    pub choices: Vec<StreamingChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl From<StreamingCompletionChunk> for RawDelta {
    fn from(chunk: StreamingCompletionChunk) -> Self {
        let choice = chunk.choices.into_iter().next();
        let (text, finish) = match choice {
            Some(choice) => (
                choice.delta.and_then(|delta| delta.content),
                choice.finish_reason.as_deref().map(FinishReason::from_openai),
            ),
            None => (None, None),
        };
        RawDelta {
            text,
            finish,
            total_tokens: chunk.usage.map(|usage| usage.total_tokens),
        }
    }
}

/// Send a request to an OpenAI compatible endpoint and decode its SSE chunks.
pub(crate) async fn send_compatible_streaming_request(
    request_builder: reqwest::RequestBuilder,
) -> Result<RawDeltaStream, VisionError> {
    let response = http_client::send_streaming(request_builder).await?;
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

            match serde_json::from_str::<ApiResponse<StreamingCompletionChunk>>(&data) {
                Ok(ApiResponse::Ok(chunk)) => yield Ok(RawDelta::from(chunk)),
                Ok(ApiResponse::Err(err)) => {
                    yield Err(VisionError::from(err));
                    break;
                }
                Err(err) => {
                    tracing::debug!(target: "seer", "Couldn't parse SSE payload as a completion chunk: {err}");
                    continue;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(json: &str) -> RawDelta {
        serde_json::from_str::<StreamingCompletionChunk>(json)
            .unwrap()
            .into()
    }

    #[test]
    fn text_chunk() {
        assert_eq!(
            delta(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#),
            RawDelta::text("Hel")
        );
    }

    #[test]
    fn length_chunk_with_usage() {
        assert_eq!(
            delta(
                r#"{"choices":[{"delta":{},"finish_reason":"length"}],"usage":{"total_tokens":9}}"#
            ),
            RawDelta::finish(FinishReason::Length, Some(9))
        );
    }

    #[test]
    fn usage_only_chunk() {
        assert_eq!(
            delta(r#"{"choices":[],"usage":{"prompt_tokens":3,"total_tokens":11}}"#),
            RawDelta::usage(11)
        );
    }

    #[test]
    fn null_usage_is_not_captured() {
        assert_eq!(
            delta(r#"{"choices":[{"delta":{"content":""}}],"usage":null}"#),
            RawDelta {
                text: Some(String::new()),
                ..Default::default()
            }
        );
    }
}
