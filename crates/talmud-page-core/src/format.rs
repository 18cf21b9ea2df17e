//! Text-formatting hooks applied before sections and comments are built.
//!
//! Formatters are pure string transforms. The aggregator calls them once per
//! body and never inspects what they do.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::source::Text;

pub trait TextFormatter: Send + Sync {
    fn primary_hebrew(&self, text: &str) -> String {
        text.to_string()
    }

    fn primary_english(&self, text: &str) -> String {
        text.to_string()
    }

    /// `kind` is the English name of the comment's commentary kind.
    fn comment_hebrew(&self, text: Text, _kind: &str) -> Text {
        text
    }

    fn comment_english(&self, text: Text, _kind: &str) -> Text {
        text
    }
}

/// Leaves every body untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unformatted;

impl TextFormatter for Unformatted {}

static ANCHOR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?a(?:\s[^>]*)?>").expect("valid regex"));

/// Cleans translated text from the public text API: inline links are
/// unwrapped to their text and a leading section sign is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiFormatter;

impl ApiFormatter {
    fn english(text: &str) -> String {
        let unlinked = ANCHOR_TAG.replace_all(text, "");
        unlinked.replacen("§ ", "", 1)
    }
}

impl TextFormatter for ApiFormatter {
    fn primary_english(&self, text: &str) -> String {
        Self::english(text)
    }

    fn comment_english(&self, text: Text, _kind: &str) -> Text {
        text.map(Self::english)
    }
}
