//! Shared pieces of provider client construction.
//!
//! Every backend in [`crate::providers`] has a `ClientBuilder` that ends in
//! `build() -> Result<Client, ClientBuilderError>`. Construction is the only place where a
//! failure is returned to the caller instead of being folded into the answer text: a client
//! without a usable endpoint is never handed out.

use thiserror::Error;
use url::Url;

/// Errors that can occur when building a client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientBuilderError {
    /// The reqwest client could not be built (TLS backend, proxy configuration, ...).
    #[error("reqwest error: {0}")]
    HttpError(
        #[from]
        #[source]
        reqwest::Error,
    ),

    /// A property was provided but cannot be used, e.g. an unparsable base url.
    #[error("invalid property: {0}")]
    InvalidProperty(&'static str),

    /// The backend has no default endpoint and none was given.
    #[error("{0} requires a base url")]
    MissingBaseUrl(&'static str),

    /// A required environment variable is not set.
    #[error("environment variable {0} not set")]
    MissingEnv(&'static str),

    /// The provider name in a [`crate::providers::ProviderConfig`] is not known.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Read a required environment variable.
pub(crate) fn required_env(name: &'static str) -> Result<String, ClientBuilderError> {
    std::env::var(name).map_err(|_| ClientBuilderError::MissingEnv(name))
}

/// Read an optional environment variable, treating an empty value as unset.
pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Validate a base url and strip trailing slashes so paths can be appended with `/`.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, ClientBuilderError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|_| ClientBuilderError::InvalidProperty("base_url"))?;
    Ok(trimmed.to_string())
}

/// Resolve an optional base url for backends that cannot work without one.
pub(crate) fn require_base_url(
    base_url: Option<&str>,
    provider: &'static str,
) -> Result<String, ClientBuilderError> {
    match base_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => normalize_base_url(url),
        None => Err(ClientBuilderError::MissingBaseUrl(provider)),
    }
}

pub(crate) fn http_client_or_default(
    http_client: Option<reqwest::Client>,
) -> Result<reqwest::Client, ClientBuilderError> {
    match http_client {
        Some(http_client) => Ok(http_client),
        None => Ok(reqwest::Client::builder().build()?),
    }
}
