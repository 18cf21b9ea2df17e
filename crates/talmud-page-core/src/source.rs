//! Text-source abstraction and the wire shapes it returns.
//!
//! The pipeline talks to the remote text API only through [`TextSource`], so
//! tests can substitute an in-memory source and the binary can plug in an HTTP
//! client. Response bodies are kept raw until the pipeline has seen every
//! status code; parsing happens afterwards so that a single bad payload fails
//! the whole request the same way a bad status does.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A body that the text API sends either as one string or as a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Text {
    One(String),
    Many(Vec<String>),
}

impl Default for Text {
    fn default() -> Self {
        Text::One(String::new())
    }
}

impl Text {
    pub fn is_empty(&self) -> bool {
        match self {
            Text::One(s) => s.is_empty(),
            Text::Many(items) => items.is_empty(),
        }
    }

    /// Applies `f` to every string, keeping the arity.
    pub fn map(self, mut f: impl FnMut(&str) -> String) -> Text {
        match self {
            Text::One(s) => Text::One(f(&s)),
            Text::Many(items) => Text::Many(items.iter().map(|s| f(s)).collect()),
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            Text::One(s) => vec![s],
            Text::Many(items) => items,
        }
    }

    /// The first string, or `""` when there is none.
    pub fn first(&self) -> &str {
        match self {
            Text::One(s) => s,
            Text::Many(items) => items.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::One(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveTitle {
    #[serde(default)]
    pub en: String,
}

/// One raw commentary item, exactly as the text API returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(default)]
    pub he: Text,
    #[serde(default)]
    pub text: Text,
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub source_ref: String,
    #[serde(default)]
    pub source_he_ref: String,
    #[serde(default)]
    pub anchor_ref_expanded: Vec<String>,
    #[serde(default)]
    pub collective_title: CollectiveTitle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind_type: Option<String>,
}

impl Fragment {
    /// Display name used for classification.
    pub fn name(&self) -> &str {
        &self.collective_title.en
    }
}

/// A successfully parsed text API response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub index_title: Option<String>,
    #[serde(default)]
    pub he: Option<Text>,
    #[serde(default)]
    pub text: Option<Text>,
    #[serde(default)]
    pub commentary: Vec<Fragment>,
    #[serde(default)]
    pub commentator: Option<String>,
}

impl TextResponse {
    /// `title`, falling back to `indexTitle`. `None` when upstream sent
    /// neither.
    pub fn display_title(&self) -> Option<String> {
        self.title
            .clone()
            .or_else(|| self.index_title.clone())
            .filter(|title| !title.trim().is_empty())
    }
}

/// One request to the text API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Reference appended to the base URL, e.g. `Berakhot.2a`.
    pub reference: String,
    pub base_url: String,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    /// The full URL without query parameters.
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.reference)
    }
}

/// Status and body of a completed fetch, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Where text comes from.
///
/// An `Err` means the request never produced a response (connection refused,
/// timeout, ...). Non-200 responses are returned as `Ok` and judged by the
/// pipeline.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<RawResponse>;
}
