//! Output language of the instructions a model receives.
//!
//! The setting is fixed when a model is built and selects between exactly two hard-coded
//! variants of every instruction and notice. Parsing is an exact, case-insensitive comparison
//! with `"chinese"`; every other value selects English.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{convert::Infallible, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Language {
    #[default]
    Chinese,
    English,
}

impl Language {
    pub fn parse(value: &str) -> Self {
        if value.to_lowercase() == "chinese" {
            Language::Chinese
        } else {
            Language::English
        }
    }

    pub fn is_chinese(&self) -> bool {
        matches!(self, Language::Chinese)
    }

    /// Appended to an answer that the provider cut off because of its length limit.
    pub fn truncation_notice(&self) -> &'static str {
        match self {
            Language::Chinese => "······\n由于长度的原因，回答被截断了，要继续吗？",
            Language::English => "...\nFor the content length reason, it stopped, continue?",
        }
    }
}

impl FromStr for Language {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Language::parse(s))
    }
}

impl From<&str> for Language {
    fn from(value: &str) -> Self {
        Language::parse(value)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Chinese => write!(f, "Chinese"),
            Language::English => write!(f, "English"),
        }
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Language::parse(&value))
    }
}
