//! Precomputed closing-ceremony text appended to a title's last page.
//!
//! The resource carries two placeholders: `____` in the English text and
//! `<small>(יאמר שם המסכת)</small>` in the Hebrew. Both are filled with the
//! title's name when the sections are produced.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::index::TitleRecord;
use crate::section::Section;

/// The embedded closing-ceremony resource.
pub const BUILTIN_CLOSING_CEREMONY_JSON: &str = include_str!("../../../data/closing_ceremony.json");

const TITLE_PLACEHOLDER: &str = "____";
const HEBREW_TITLE_PLACEHOLDER: &str = "<small>(יאמר שם המסכת)</small>";

#[derive(Debug, Clone, Deserialize)]
struct CeremonySection {
    he: String,
    en: String,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct CeremonyFile {
    sections: Vec<CeremonySection>,
}

#[derive(Debug, Clone)]
pub struct ClosingCeremony {
    sections: Vec<CeremonySection>,
}

impl ClosingCeremony {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CLOSING_CEREMONY_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CeremonyFile =
            serde_json::from_str(json).context("Failed to parse closing ceremony data")?;
        Ok(Self {
            sections: file.sections,
        })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Ceremony sections with `title`'s names substituted.
    pub fn sections_for(&self, title: &TitleRecord) -> Vec<Section> {
        let hebrew_name = title
            .vocalized_hebrew_name
            .as_deref()
            .unwrap_or(&title.hebrew_name);
        let hebrew_replacement = format!("<strong>{}</strong>", hebrew_name);

        self.sections
            .iter()
            .map(|s| {
                Section::new(
                    s.he.replace(HEBREW_TITLE_PLACEHOLDER, &hebrew_replacement),
                    s.en.replace(TITLE_PLACEHOLDER, &title.canonical_name),
                    s.reference.clone(),
                )
            })
            .collect()
    }
}
