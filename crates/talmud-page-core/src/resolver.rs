//! Free-text reference resolution.
//!
//! Turns user queries such as `"Brachot 2a"`, `"ברכות ב."`,
//! `"Shabbat 100a-103a"` or `"Genesis 1 to 3"` into a [`QueryResult`]: a
//! canonical title plus a validated start page and optional end page.
//!
//! # Page tokens
//!
//! For two-sided titles a token is canonicalized by trying, in order:
//!
//! | Shape | Meaning |
//! |-------|---------|
//! | `12ab` | the whole leaf 12 |
//! | `12` or `יב` | the whole leaf 12 |
//! | `12a`, `12.`, `יב.` | front of leaf 12 |
//! | `12b`, `12:`, `יב:` | back of leaf 12 |
//!
//! Chapter titles accept plain decimal numbers only. Decimal leaf and
//! chapter numbers have at most three digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{format_list_english, Error, Result};
use crate::hebrew::decode_numeral;
use crate::index::{TitleIndex, TitleRecord};
use crate::page::{PageId, Side};

static FULL_LEAF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3})ab$").expect("valid regex"));
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}$").expect("valid regex"));

const RANGE_SEPARATORS: [&str; 2] = ["to", "-"];

/// A fully resolved query. Never partially valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub title: String,
    pub start: PageId,
    pub end: Option<PageId>,
}

impl QueryResult {
    pub fn single(title: impl Into<String>, page: PageId) -> Self {
        Self {
            title: title.into(),
            start: page,
            end: None,
        }
    }

    /// Both sides of leaf `number`.
    pub fn full_leaf(title: impl Into<String>, number: u32) -> Self {
        Self {
            title: title.into(),
            start: PageId::front(number),
            end: Some(PageId::back(number)),
        }
    }

    /// The site path for this result, e.g. `/Bava_Metzia/2a/to/3b`.
    pub fn to_url_pathname(&self) -> String {
        let mut path = format!("/{}/{}", self.title.replace(' ', "_"), self.start);
        if let Some(end) = self.end {
            path.push_str(&format!("/to/{}", end));
        }
        path
    }

    /// Pulls out-of-range endpoints one step inward when the neighbouring page
    /// exists (e.g. `Tamid 25` starts at `25b`), puts reversed endpoints in
    /// order, and collapses a range whose endpoints coincide.
    pub fn normalized(&self, title: &TitleRecord) -> QueryResult {
        let mut start = self.start;
        let mut end = self.end.unwrap_or(self.start);

        if !title.contains(&end) {
            if let Some(previous) = end.previous().filter(|p| title.contains(p)) {
                end = previous;
            }
        }
        if !title.contains(&start) {
            if let Some(next) = start.next().filter(|p| title.contains(p)) {
                start = next;
            }
        }
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }

        QueryResult {
            title: self.title.clone(),
            start,
            end: (start != end).then_some(end),
        }
    }

    /// Every page the result covers, in order.
    pub fn pages(&self, title: &TitleRecord) -> Vec<PageId> {
        match self.end {
            Some(end) => title.pages_between(self.start, end),
            None => vec![self.start],
        }
    }
}

/// A canonicalized page token from a two-sided title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Amud {
    /// Both sides of a leaf.
    FullLeaf(u32),
    Single(PageId),
}

impl Amud {
    fn first(self) -> PageId {
        match self {
            Amud::FullLeaf(number) => PageId::front(number),
            Amud::Single(page) => page,
        }
    }

    fn last(self) -> PageId {
        match self {
            Amud::FullLeaf(number) => PageId::back(number),
            Amud::Single(page) => page,
        }
    }
}

fn leaf_number(token: &str) -> Option<u32> {
    if DECIMAL.is_match(token) {
        return token.parse().ok();
    }
    decode_numeral(token)
}

fn canonicalize_amud(token: &str) -> Option<Amud> {
    if let Some(captures) = FULL_LEAF.captures(token) {
        return captures[1].parse().ok().map(Amud::FullLeaf);
    }
    if let Some(number) = leaf_number(token) {
        return Some(Amud::FullLeaf(number));
    }

    let mut chars = token.chars();
    let side = match chars.next_back()? {
        'a' | '.' => Side::Front,
        'b' | ':' => Side::Back,
        _ => return None,
    };
    let number = leaf_number(chars.as_str())?;
    Some(Amud::Single(PageId::Amud { number, side }))
}

fn canonicalize_chapter(token: &str) -> Option<u32> {
    if !DECIMAL.is_match(token) {
        return None;
    }
    let number: u32 = token.parse().ok()?;
    (number.to_string() == token).then_some(number)
}

fn invalid_tokens(tokens: Vec<String>) -> Error {
    let message = if tokens.len() == 1 {
        format!("{} is not a valid page", tokens[0])
    } else {
        format!("{} are not valid pages", format_list_english(&tokens))
    };
    Error::InvalidQuery { tokens, message }
}

fn validate<T>(tokens: &[&str], canonicalize: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
    let mut valid = Vec::with_capacity(tokens.len());
    let mut invalid = Vec::new();
    for token in tokens {
        match canonicalize(*token) {
            Some(value) => valid.push(value),
            None => invalid.push(token.to_string()),
        }
    }
    if invalid.is_empty() {
        Ok(valid)
    } else {
        Err(invalid_tokens(invalid))
    }
}

/// Splits the query into its longest title prefix and the remaining words.
///
/// Longest first: when one title's name is a word prefix of another's
/// (`Shir` / `Shir HaShirim`), the longer name wins.
fn split_title<'q>(index: &'q TitleIndex, words: &[&'q str]) -> Option<(&'q TitleRecord, usize)> {
    (1..=words.len())
        .rev()
        .find_map(|i| index.lookup(&words[..i].join(" ")).map(|title| (title, i)))
}

/// Resolves a free-text query against `index`.
///
/// # Errors
///
/// - [`Error::UnknownTitle`] when no word prefix of the query names a title.
/// - [`Error::InvalidQuery`] when the remainder is not a page or page range;
///   the error carries the offending token(s).
pub fn resolve(index: &TitleIndex, query: &str) -> Result<QueryResult> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let normalized_query = words.join(" ");

    let (title, consumed) = split_title(index, &words).ok_or_else(|| Error::UnknownTitle {
        query: normalized_query.clone(),
    })?;
    let mut rest: Vec<&str> = words[consumed..].to_vec();

    if rest.is_empty() {
        return Err(Error::invalid_query(format!(
            "No page specified in query: \"{}\"",
            normalized_query
        )));
    }

    if rest.len() == 1 && rest[0].contains('-') {
        let parts: Vec<&str> = rest[0].split('-').collect();
        if parts.len() != 2 {
            return Err(Error::invalid_query(format!(
                "Could not understand: {}",
                normalized_query
            )));
        }
        rest = vec![parts[0], "-", parts[1]];
    }

    let name = title.canonical_name.clone();
    match rest.as_slice() {
        [page] => {
            if title.is_paginated() {
                let amud = validate(&[*page], canonicalize_amud)?[0];
                Ok(match amud {
                    Amud::FullLeaf(number) => QueryResult::full_leaf(name, number),
                    Amud::Single(page) => QueryResult::single(name, page),
                })
            } else {
                let chapter = validate(&[*page], canonicalize_chapter)?[0];
                Ok(QueryResult::single(name, PageId::Chapter(chapter)))
            }
        }
        [start, separator, end] if RANGE_SEPARATORS.contains(separator) => {
            if title.is_paginated() {
                let amudim = validate(&[*start, *end], canonicalize_amud)?;
                Ok(QueryResult {
                    title: name,
                    start: amudim[0].first(),
                    end: Some(amudim[1].last()),
                })
            } else {
                let chapters = validate(&[*start, *end], canonicalize_chapter)?;
                Ok(QueryResult {
                    title: name,
                    start: PageId::Chapter(chapters[0]),
                    end: Some(PageId::Chapter(chapters[1])),
                })
            }
        }
        _ => Err(Error::invalid_query(format!(
            "Could not understand: {}",
            normalized_query
        ))),
    }
}

/// Resolves a reference that points back into the corpus (e.g. a comment's
/// source `"Shabbat 31a:5"`), ignoring everything after the first `:`.
pub fn linkable_ref(index: &TitleIndex, reference: &str) -> Option<QueryResult> {
    if !index
        .titles()
        .iter()
        .any(|t| reference.starts_with(&t.canonical_name))
    {
        return None;
    }
    let head = reference.split(':').next().unwrap_or(reference);
    resolve(index, head).ok()
}
