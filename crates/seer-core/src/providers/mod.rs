//! This module contains clients for the different vision LLM providers that Seer supports.
//!
//! Currently, the following providers are supported:
//! - OpenAI
//! - Azure OpenAI
//! - ZhipuAI
//! - Qwen (DashScope)
//! - Ollama
//! - LocalAI
//! - Xinference
//! - LM Studio
//! - OpenRouter
//! - NVIDIA
//! - Gemini
//! - local (no-op)
//!
//! Each provider has its own module, which contains a `Client` implementation that can
//! be used to initialize vision models for that provider.
//!
//! # Example
//! ```ignore
//! use seer::{providers::openai, vision::VisionModel};
//!
//! let openai = openai::Client::new("your-openai-api-key")?;
//! let gpt_4o = openai.vision_model(openai::GPT_4O);
//! ```
//!
//! When the provider is only known at runtime, describe it with a [`ProviderConfig`] and let
//! [`build`] pick the backend:
//! ```ignore
//! use seer::providers::{self, ProviderConfig};
//!
//! let config: ProviderConfig = serde_json::from_str(
//!     r#"{"provider": "Ollama", "model_name": "llava", "base_url": "http://localhost:11434"}"#,
//! )?;
//! let model = providers::build(&config)?;
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{client::ClientBuilderError, language::Language, vision::VisionModelDyn};

pub mod azure;
pub mod gemini;
pub mod local;
pub mod lmstudio;
pub mod localai;
pub mod nvidia;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod qwen;
pub mod xinference;
pub mod zhipuai;

/// The backends a [`ProviderConfig`] can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAI,
    AzureOpenAI,
    ZhipuAI,
    Qwen,
    Ollama,
    LocalAI,
    Xinference,
    Gemini,
    Nvidia,
    LmStudio,
    OpenRouter,
    Local,
}

impl ProviderKind {
    /// Canonical provider name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::AzureOpenAI => "Azure-OpenAI",
            ProviderKind::ZhipuAI => "ZHIPU-AI",
            ProviderKind::Qwen => "Tongyi-Qianwen",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LocalAI => "LocalAI",
            ProviderKind::Xinference => "Xinference",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Nvidia => "NVIDIA",
            ProviderKind::LmStudio => "LM-Studio",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ClientBuilderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let kind = match name.trim().to_lowercase().as_str() {
            "openai" => ProviderKind::OpenAI,
            "azure-openai" | "azure" => ProviderKind::AzureOpenAI,
            "zhipu-ai" | "zhipuai" => ProviderKind::ZhipuAI,
            "tongyi-qianwen" | "qwen" | "dashscope" => ProviderKind::Qwen,
            "ollama" => ProviderKind::Ollama,
            "localai" => ProviderKind::LocalAI,
            "xinference" => ProviderKind::Xinference,
            "gemini" => ProviderKind::Gemini,
            "nvidia" => ProviderKind::Nvidia,
            "lm-studio" | "lmstudio" => ProviderKind::LmStudio,
            "openrouter" => ProviderKind::OpenRouter,
            "local" => ProviderKind::Local,
            _ => return Err(ClientBuilderError::UnknownProvider(name.to_string())),
        };
        Ok(kind)
    }
}

fn default_lang() -> String {
    Language::default().to_string()
}

/// Caller-supplied description of a vision model.
///
/// `key` may be a dummy for local servers; `base_url` is required by backends without a
/// public endpoint (Azure, Ollama, LocalAI, Xinference, LM Studio). An empty `base_url` counts
/// as unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(default)]
    pub key: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl ProviderConfig {
    pub fn new(provider: &str, key: &str, model_name: &str) -> Self {
        Self {
            provider: provider.to_string(),
            key: key.to_string(),
            model_name: model_name.to_string(),
            base_url: None,
            lang: default_lang(),
        }
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn kind(&self) -> Result<ProviderKind, ClientBuilderError> {
        self.provider.parse()
    }

    fn base_url_opt(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Apply the optional base url and the language to a provider's client builder.
macro_rules! configured {
    ($builder:expr, $config:expr) => {{
        let builder = $builder.language($config.lang.as_str());
        match $config.base_url_opt() {
            Some(base_url) => builder.base_url(base_url),
            None => builder,
        }
    }};
}

/// Build the vision model a [`ProviderConfig`] names.
pub fn build(config: &ProviderConfig) -> Result<Box<dyn VisionModelDyn>, ClientBuilderError> {
    let kind = config.kind()?;
    let model = config.model_name.as_str();
    let base_url = config.base_url_opt().unwrap_or_default();
    let lang = config.lang.as_str();
    tracing::debug!(target: "seer", provider = %kind, model, "building vision model");

    let built: Box<dyn VisionModelDyn> = match kind {
        ProviderKind::OpenAI => Box::new(
            configured!(openai::Client::builder(&config.key), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::AzureOpenAI => Box::new(
            azure::Client::builder(&config.key, base_url)
                .language(lang)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::ZhipuAI => Box::new(
            configured!(zhipuai::Client::builder(&config.key), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Qwen => Box::new(
            configured!(qwen::Client::builder(&config.key), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Ollama => Box::new(
            configured!(ollama::Client::builder(), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::LocalAI => Box::new(
            localai::Client::builder(base_url)
                .language(lang)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Xinference => Box::new(
            xinference::Client::builder(base_url)
                .language(lang)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Gemini => Box::new(
            configured!(gemini::Client::builder(&config.key), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Nvidia => Box::new(
            configured!(nvidia::Client::builder(&config.key), config)
                .build()?
                .vision_model(model)?,
        ),
        ProviderKind::LmStudio => Box::new(
            lmstudio::Client::builder(base_url)
                .language(lang)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::OpenRouter => Box::new(
            configured!(openrouter::Client::builder(&config.key), config)
                .build()?
                .vision_model(model),
        ),
        ProviderKind::Local => Box::new(local::CompletionModel::new(model, lang)),
    };
    Ok(built)
}
