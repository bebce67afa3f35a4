use std::pin::Pin;

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::VisionError;

/// Payloads of a streamed response, one JSON document per item.
pub(crate) type DataStream = Pin<Box<dyn Stream<Item = Result<String, VisionError>> + Send>>;

/// Turn a non-2xx response into a [`VisionError::ProviderError`] carrying status and body.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, VisionError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await?;
        Err(VisionError::ProviderError(format!("{status}: {body}")))
    }
}

pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, VisionError> {
    let response = ensure_success(builder.send().await?).await?;
    let body = response.text().await?;
    tracing::trace!(target: "seer", "response body: {body}");
    Ok(serde_json::from_str(&body)?)
}

pub(crate) async fn send_streaming(builder: RequestBuilder) -> Result<Response, VisionError> {
    ensure_success(builder.send().await?).await
}

/// `data:` payloads of a server-sent events response. Empty payloads and the `[DONE]`
/// sentinel are dropped.
pub(crate) fn sse_data(response: Response) -> DataStream {
    Box::pin(stream! {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    yield Ok(data.to_string());
                }
                Err(err) => {
                    yield Err(VisionError::StreamError(err.to_string()));
                    break;
                }
            }
        }
    })
}

/// Lines of a newline-delimited JSON response. A line split across network reads is
/// reassembled before it is yielded.
pub(crate) fn ndjson_lines(response: Response) -> DataStream {
    Box::pin(stream! {
        let mut chunks = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut broken = false;

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(VisionError::StreamError(err.to_string()));
                    broken = true;
                    break;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                let rest = buffer.split_off(newline + 1);
                let line = std::mem::replace(&mut buffer, rest);
                match String::from_utf8(line) {
                    Ok(line) if line.trim().is_empty() => {}
                    Ok(line) => yield Ok(line.trim().to_string()),
                    Err(err) => yield Err(VisionError::ResponseError(err.to_string())),
                }
            }
        }

        if !broken && !buffer.is_empty() {
            match String::from_utf8(buffer) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => yield Ok(line.trim().to_string()),
                Err(err) => yield Err(VisionError::ResponseError(err.to_string())),
            }
        }
    })
}
