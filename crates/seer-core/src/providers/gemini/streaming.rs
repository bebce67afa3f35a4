use async_stream::stream;
use futures::StreamExt;

use super::{client::ApiResponse, completion::GenerateContentResponse};
use crate::{
    error::VisionError,
    http_client,
    streaming::{RawDelta, RawDeltaStream},
};

/// Each `streamGenerateContent` event carries the new text only. `usageMetadata` is repeated
/// on every event and is complete on the last one.
impl From<GenerateContentResponse> for RawDelta {
    fn from(response: GenerateContentResponse) -> Self {
        let candidate = response.candidates.first();
        RawDelta {
            text: candidate.map(|candidate| candidate.text()),
            finish: candidate.and_then(|candidate| candidate.finish()),
            total_tokens: response
                .usage_metadata
                .map(|usage| usage.total_token_count),
        }
    }
}

pub(crate) async fn send_streaming_request(
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

            match serde_json::from_str::<ApiResponse<GenerateContentResponse>>(&data)
                .map(ApiResponse::into_result)
            {
                Ok(Ok(response)) => yield Ok(RawDelta::from(response)),
                Ok(Err(err)) => {
                    yield Err(err);
                    break;
                }
                Err(err) => {
                    tracing::debug!(target: "seer", "Couldn't parse Gemini stream event: {err}");
                    continue;
                }
            }
        }
    }))
}
