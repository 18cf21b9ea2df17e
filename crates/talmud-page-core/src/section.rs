//! Sections of a rendered page and their per-section post-processing.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::commentary::{CommentaryGroup, CommentaryTree};
use crate::hebrew::{strip_nonletters, ALEPH, TAV};

static HADRAN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(<br>)+<big><strong>הדרן עלך .*").expect("valid regex"));

static SUGYA_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^<big>[{}-{}]", ALEPH, TAV)).expect("valid regex"));

/// Kind whose opening fragment marks a new topical unit.
const SUGYA_MARKER_KIND: &str = "Steinsaltz";

/// Whether `text` opens with the closing-benediction marker. Vowels and
/// cantillation are ignored.
pub fn is_hadran(text: &str) -> bool {
    HADRAN.is_match(&strip_nonletters(text))
}

/// One aligned position of the primary text, with everything placed on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub hebrew: String,
    pub english: String,
    pub reference: String,
    pub commentary: CommentaryTree,
    pub hadran: bool,
    pub steinsaltz_start_of_sugya: bool,
}

impl Section {
    pub fn new(
        hebrew: impl Into<String>,
        english: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            hebrew: hebrew.into(),
            english: english.into(),
            reference: reference.into(),
            ..Self::default()
        }
    }

    /// Flags the section when one of its sugya-marker comments opens with a
    /// large Hebrew letter.
    pub fn mark_sugya_start(&mut self) {
        if self.commentary.comments().iter().any(|c| {
            c.english_name == SUGYA_MARKER_KIND && SUGYA_START.is_match(c.hebrew.first())
        }) {
            self.steinsaltz_start_of_sugya = true;
        }
    }

    /// Turns a closing-benediction section into a bare Hebrew line: line
    /// breaks removed, translation and commentary dropped.
    pub fn mark_hadran(&mut self) {
        if !is_hadran(&self.hebrew) {
            return;
        }
        self.hebrew = self.hebrew.replace("<br>", "");
        self.english.clear();
        self.commentary = CommentaryTree::new();
        self.hadran = true;
    }

    pub fn finalize(self) -> SectionDocument {
        SectionDocument {
            commentary: self.commentary.flatten(),
            he: self.hebrew,
            en: self.english,
            reference: self.reference,
            hadran: self.hadran,
            steinsaltz_start_of_sugya: self.steinsaltz_start_of_sugya,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Transport form of a [`Section`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionDocument {
    pub he: String,
    pub en: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub commentary: IndexMap<String, CommentaryGroup>,
    #[serde(skip_serializing_if = "is_false")]
    pub hadran: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub steinsaltz_start_of_sugya: bool,
}
