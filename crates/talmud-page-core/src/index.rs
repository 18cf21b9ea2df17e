//! Canonical title index.
//!
//! A static registry of every title the site can render, loaded once at
//! process start from `data/titles.json` (embedded at build time). Each title
//! has a canonical English name, a Hebrew name, a set of aliases, and its
//! first and last page. Aliases are matched case-insensitively with
//! apostrophes and hyphens ignored, and with spaces and underscores treated as
//! the same character.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::Error;
use crate::page::PageId;

/// The embedded canonical index data file.
pub const BUILTIN_TITLES_JSON: &str = include_str!("../../../data/titles.json");

/// How a title numbers its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pagination {
    /// Two-sided leaves (`2a`, `2b`, ...), used by Talmud tractates.
    Amud,
    /// Plain chapter numbers, used by Biblical books.
    Chapter,
}

/// One title of the corpus. Immutable after the index is built.
#[derive(Debug, Clone, Deserialize)]
pub struct TitleRecord {
    pub canonical_name: String,
    pub hebrew_name: String,
    /// Fully vowelled Hebrew name, substituted into the closing ceremony.
    #[serde(default)]
    pub vocalized_hebrew_name: Option<String>,
    pub pagination: Pagination,
    pub start: PageId,
    pub end: PageId,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TitleRecord {
    pub fn is_paginated(&self) -> bool {
        self.pagination == Pagination::Amud
    }

    /// Whether `page` uses this title's numbering scheme and lies within
    /// `start..=end`.
    pub fn contains(&self, page: &PageId) -> bool {
        page.is_amud() == self.is_paginated() && self.start <= *page && *page <= self.end
    }

    /// The next page of this title, or `None` at the last page.
    pub fn next_page(&self, page: &PageId) -> Option<PageId> {
        if !self.contains(page) || *page == self.end {
            return None;
        }
        page.next()
    }

    /// The previous page of this title, or `None` at the first page.
    pub fn previous_page(&self, page: &PageId) -> Option<PageId> {
        if !self.contains(page) || *page == self.start {
            return None;
        }
        page.previous()
    }

    /// All pages from `from` to `to` inclusive, in order.
    pub fn pages_between(&self, from: PageId, to: PageId) -> Vec<PageId> {
        let mut pages = Vec::new();
        let mut current = Some(from);
        while let Some(page) = current.filter(|p| *p <= to && self.contains(p)) {
            pages.push(page);
            current = page.next();
        }
        pages
    }

    /// The canonical name with spaces replaced for use in URL paths.
    pub fn url_name(&self) -> String {
        self.canonical_name.replace(' ', "_")
    }
}

#[derive(Deserialize)]
struct TitlesFile {
    titles: Vec<TitleRecord>,
}

/// Lookup structure over all [`TitleRecord`]s.
#[derive(Debug, Clone)]
pub struct TitleIndex {
    titles: Vec<TitleRecord>,
    by_canonical_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

/// Normalizes a title or alias for lookup.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '-')
        .map(|c| if c == '_' { ' ' } else { c })
        .collect()
}

impl TitleIndex {
    /// Loads the index embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TITLES_JSON)
    }

    /// Parses and validates a titles document.
    ///
    /// Fails when a title's `start` comes after its `end`, when a page uses the
    /// wrong numbering scheme, or when two titles claim the same alias.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TitlesFile =
            serde_json::from_str(json).context("Failed to parse title index data")?;
        Self::new(file.titles)
    }

    pub fn new(titles: Vec<TitleRecord>) -> Result<Self> {
        let mut by_canonical_name = HashMap::new();
        let mut by_alias: HashMap<String, usize> = HashMap::new();

        for (i, title) in titles.iter().enumerate() {
            let paginated = title.is_paginated();
            if title.start.is_amud() != paginated || title.end.is_amud() != paginated {
                bail!(
                    "{}: start/end do not match its pagination scheme",
                    title.canonical_name
                );
            }
            if title.start > title.end {
                bail!(
                    "{}: start {} is after end {}",
                    title.canonical_name,
                    title.start,
                    title.end
                );
            }
            if by_canonical_name
                .insert(title.canonical_name.clone(), i)
                .is_some()
            {
                bail!("duplicate title: {}", title.canonical_name);
            }

            let names = std::iter::once(&title.canonical_name)
                .chain(std::iter::once(&title.hebrew_name))
                .chain(title.aliases.iter());
            for name in names {
                let folded = fold_name(name);
                if let Some(&existing) = by_alias.get(&folded) {
                    if existing != i {
                        bail!(
                            "alias '{}' maps to both {} and {}",
                            name,
                            titles[existing].canonical_name,
                            title.canonical_name
                        );
                    }
                }
                by_alias.insert(folded, i);
            }
        }

        Ok(Self {
            titles,
            by_canonical_name,
            by_alias,
        })
    }

    pub fn titles(&self) -> &[TitleRecord] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Looks up a title by any of its names (canonical, Hebrew, alias, or a
    /// URL form with underscores).
    pub fn lookup(&self, name: &str) -> Option<&TitleRecord> {
        self.by_alias
            .get(&fold_name(name))
            .map(|&i| &self.titles[i])
    }

    /// The canonical name for `name`, if it names a known title.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|t| t.canonical_name.as_str())
    }

    /// Looks up a title by its exact canonical name.
    pub fn get(&self, canonical_name: &str) -> Option<&TitleRecord> {
        self.by_canonical_name
            .get(canonical_name)
            .map(|&i| &self.titles[i])
    }

    /// Like [`lookup`](Self::lookup) but raises [`Error::UnknownTitle`].
    pub fn title(&self, name: &str) -> Result<&TitleRecord, Error> {
        self.lookup(name).ok_or_else(|| Error::UnknownTitle {
            query: name.to_string(),
        })
    }

    /// Whether `page` exists in the title named `name`.
    pub fn page_exists(&self, name: &str, page: &PageId) -> bool {
        self.lookup(name).is_some_and(|t| t.contains(page))
    }

    /// Raises [`Error::PageDoesNotExist`] listing every page of `pages` that
    /// falls outside the title.
    pub fn validate_pages(&self, title: &TitleRecord, pages: &[PageId]) -> Result<(), Error> {
        let missing: Vec<String> = pages
            .iter()
            .filter(|p| !title.contains(p))
            .map(|p| p.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::PageDoesNotExist {
                title: title.canonical_name.clone(),
                pages: missing,
            })
        }
    }
}
