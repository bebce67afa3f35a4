use thiserror::Error;

/// Prefix of every answer produced from a failed call.
pub const ERROR_MARKER: &str = "**ERROR**: ";

#[derive(Debug, Error)]
pub enum VisionError {
    /// Http error (e.g.: connection error, timeout, etc.)
    #[error("{0}")]
    HttpError(reqwest::Error),

    /// Json error (e.g.: serialization, deserialization)
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// The image could not be decoded or re-encoded
    #[error("{0}")]
    ImageError(#[from] ::image::ImageError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The conversation handed to `chat` cannot be dispatched
    #[error("{0}")]
    InvalidHistory(String),

    /// Error parsing the provider response
    #[error("{0}")]
    ResponseError(String),

    /// Error returned by the provider (non-2xx status or error body)
    #[error("{0}")]
    ProviderError(String),

    /// The streaming transport broke mid-response
    #[error("{0}")]
    StreamError(String),
}

/// Some endpoints carry credentials in the query string, so the url never reaches the text.
impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        VisionError::HttpError(err.without_url())
    }
}

impl VisionError {
    /// Render the error the way it travels through the text channel.
    pub fn to_marker(&self) -> String {
        format!("{ERROR_MARKER}{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_prefixes_message() {
        let err = VisionError::ProviderError("401 Unauthorized: bad key".into());
        assert_eq!(
            err.to_marker(),
            "**ERROR**: 401 Unauthorized: bad key"
        );
    }

    #[tokio::test]
    async fn transport_error_drops_url() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/path?key=hunter2")
            .send()
            .await
            .unwrap_err();
        let marker = VisionError::from(err).to_marker();
        assert!(marker.starts_with(ERROR_MARKER));
        assert!(!marker.contains("hunter2"));
        assert!(!marker.contains("127.0.0.1"));
    }
}
