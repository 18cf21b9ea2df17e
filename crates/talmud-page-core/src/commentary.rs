//! Placed comments and the per-section commentary tree.
//!
//! Each section owns one [`CommentaryTree`]: the comments placed directly on
//! the section plus, for every top-level kind that received nested comments,
//! a child tree keyed by that kind's name. Nesting depth is not limited.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::format::TextFormatter;
use crate::index::TitleIndex;
use crate::resolver::linkable_ref;
use crate::source::{Fragment, Text};

/// A classified, formatted fragment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    #[serde(rename = "he")]
    pub hebrew: Text,
    #[serde(rename = "en")]
    pub english: Text,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "sourceRef")]
    pub source_ref: String,
    #[serde(rename = "sourceHeRef")]
    pub source_he_ref: String,
    /// Site path of the referenced page when the source points back into
    /// the corpus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip)]
    pub english_name: String,
}

fn strip_segment(reference: &str) -> String {
    match reference.find(':') {
        Some(i) => reference[..i].to_string(),
        None => reference.to_string(),
    }
}

/// Drops geresh/gershayim from the last word when it is a `chapter:verse`
/// style locator.
fn strip_quotation_marks(reference: &str) -> String {
    match reference.rsplit_once(' ') {
        Some((head, last)) if last.contains(':') => {
            format!("{} {}", head, last.replace(['׳', '״'], ""))
        }
        None if reference.contains(':') => reference.replace(['׳', '״'], ""),
        _ => reference.to_string(),
    }
}

fn strip_prefix(text: &str, prefix: &str) -> String {
    text.strip_prefix(prefix).unwrap_or(text).to_string()
}

impl Comment {
    /// Builds a comment of kind `kind` from a raw fragment.
    pub fn create(
        fragment: &Fragment,
        kind: &str,
        formatter: &dyn TextFormatter,
        index: &TitleIndex,
    ) -> Comment {
        let mut english = fragment.text.clone();
        if fragment.he == fragment.text {
            warn!(reference = %fragment.reference, "identical hebrew and english");
            english = Text::default();
        }

        let hebrew = formatter.comment_hebrew(fragment.he.clone(), kind);
        let english = formatter.comment_english(english, kind);

        let link = linkable_ref(index, &fragment.source_ref).map(|r| r.to_url_pathname());
        let mut source_ref = fragment.source_ref.clone();
        let mut source_he_ref = fragment.source_he_ref.clone();
        if kind == "Mesorat Hashas" && link.is_some() {
            source_ref = strip_segment(&source_ref);
            source_he_ref = strip_segment(&source_he_ref);
        } else {
            source_he_ref = strip_quotation_marks(&source_he_ref);
        }
        if kind == "Mishneh Torah" {
            source_ref = strip_prefix(&source_ref, "Mishneh Torah, ");
            source_he_ref = strip_prefix(&source_he_ref, "משנה תורה, ");
        }

        Comment {
            hebrew,
            english,
            reference: fragment.reference.clone(),
            source_ref,
            source_he_ref,
            link,
            english_name: kind.to_string(),
        }
    }
}

/// Raised when a nested comment's parent kind has no top-level comment in
/// the section yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no top-level {0} comment to nest under")]
pub struct MissingParent(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentaryTree {
    comments: Vec<Comment>,
    nested: IndexMap<String, CommentaryTree>,
}

impl CommentaryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn nested(&self, parent: &str) -> Option<&CommentaryTree> {
        self.nested.get(parent)
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.nested.values().all(CommentaryTree::is_empty)
    }

    fn contains_ref(&self, reference: &str) -> bool {
        self.comments.iter().any(|c| c.reference == reference)
    }

    /// Places a comment at this level. Returns `false` when a comment with
    /// the same ref is already here.
    pub fn add(&mut self, comment: Comment) -> bool {
        if self.contains_ref(&comment.reference) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    /// Places a comment in the child tree under `parent`, creating the child
    /// tree on first use.
    pub fn add_nested(&mut self, parent: &str, comment: Comment) -> Result<bool, MissingParent> {
        if !self.comments.iter().any(|c| c.english_name == parent) {
            return Err(MissingParent(parent.to_string()));
        }
        Ok(self.nested.entry(parent.to_string()).or_default().add(comment))
    }

    pub fn remove(&mut self, reference: &str) {
        self.comments.retain(|c| c.reference != reference);
    }

    /// Transport form: kind name → group, ordered by first appearance.
    ///
    /// Nested trees whose parent kind no longer has a top-level comment are
    /// dropped, as are empty nested trees.
    pub fn flatten(&self) -> IndexMap<String, CommentaryGroup> {
        let mut result: IndexMap<String, CommentaryGroup> = IndexMap::new();
        for comment in &self.comments {
            result
                .entry(comment.english_name.clone())
                .or_default()
                .comments
                .push(comment.clone());
        }
        for (parent, tree) in &self.nested {
            let nested = tree.flatten();
            if nested.is_empty() {
                continue;
            }
            if let Some(group) = result.get_mut(parent) {
                group.commentary = Some(nested);
            }
        }
        result
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentaryGroup {
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary: Option<IndexMap<String, CommentaryGroup>>,
}

/// Which copy of a duplicated comment to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    TopLevel,
    Nested,
}

/// Matches a (top-level kind, nested kind) pair. `None` matches any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRule {
    pub top_level_kind: Option<String>,
    pub nested_kind: Option<String>,
    pub remove: Removal,
}

impl DuplicateRule {
    pub fn top_level(kind: &str, remove: Removal) -> Self {
        Self {
            top_level_kind: Some(kind.to_string()),
            nested_kind: None,
            remove,
        }
    }

    pub fn nested(kind: &str, remove: Removal) -> Self {
        Self {
            top_level_kind: None,
            nested_kind: Some(kind.to_string()),
            remove,
        }
    }

    pub fn pair(top_level_kind: &str, nested_kind: &str, remove: Removal) -> Self {
        Self {
            top_level_kind: Some(top_level_kind.to_string()),
            nested_kind: Some(nested_kind.to_string()),
            remove,
        }
    }

    fn matches(&self, top_level: &Comment, nested: &Comment) -> bool {
        self.top_level_kind
            .as_ref()
            .map_or(true, |k| *k == top_level.english_name)
            && self
                .nested_kind
                .as_ref()
                .map_or(true, |k| *k == nested.english_name)
    }
}

/// Ordered duplicate-resolution rules; the first matching rule decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePolicy {
    rules: Vec<DuplicateRule>,
}

impl DuplicatePolicy {
    pub fn new(rules: Vec<DuplicateRule>) -> Self {
        Self { rules }
    }

    pub fn standard() -> Self {
        let mut rules = vec![DuplicateRule::top_level("Verses", Removal::Nested)];
        for kind in [
            "Maharsha",
            "Maharshal",
            "Meir Lublin",
            "Otzar Laazei Rashi",
            "Gilyon HaShas",
        ] {
            rules.push(DuplicateRule::nested(kind, Removal::TopLevel));
        }
        Self::new(rules)
    }

    pub fn decide(&self, top_level: &Comment, nested: &Comment) -> Option<Removal> {
        self.rules
            .iter()
            .find(|rule| rule.matches(top_level, nested))
            .map(|rule| rule.remove)
    }

    /// Removes comments that appear both at a level and in one of its child
    /// trees, deepest levels first. Pairs without a matching rule are logged
    /// and left in place. Running it twice changes nothing further.
    pub fn resolve(&self, tree: &mut CommentaryTree) {
        for child in tree.nested.values_mut() {
            self.resolve(child);
        }

        let mut removals: Vec<(Removal, String, String)> = Vec::new();
        for (parent, child) in &tree.nested {
            for nested in &child.comments {
                let Some(top_level) = tree.comments.iter().find(|c| c.reference == nested.reference)
                else {
                    continue;
                };
                match self.decide(top_level, nested) {
                    Some(removal) => {
                        removals.push((removal, parent.clone(), nested.reference.clone()))
                    }
                    None => warn!(
                        reference = %top_level.reference,
                        top_level_source = %top_level.source_ref,
                        nested_ref = %nested.reference,
                        "duplicated comment"
                    ),
                }
            }
        }

        for (removal, parent, reference) in removals {
            match removal {
                Removal::TopLevel => tree.remove(&reference),
                Removal::Nested => {
                    if let Some(child) = tree.nested.get_mut(&parent) {
                        child.remove(&reference);
                    }
                }
            }
        }
    }
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self::standard()
    }
}
