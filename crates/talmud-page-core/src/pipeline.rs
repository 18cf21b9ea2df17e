//! The commentary aggregation pipeline.
//!
//! [`Aggregator::aggregate`] fetches the primary text of a page together with
//! its secondary commentaries, aligns the primary text into sections, places
//! every classified fragment on its section (secondary fragments nested under
//! their commentator), and runs the post-processing for the title's corpus.
//!
//! # Failure semantics
//!
//! Fetch and parse failures fail the whole request: no partial page is ever
//! returned. Fragments that cannot be classified or placed are dropped and
//! logged. A page that ends up with no sections is still a success.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::ceremony::ClosingCeremony;
use crate::commentary::{Comment, DuplicatePolicy};
use crate::error::{Error, Result};
use crate::format::{TextFormatter, Unformatted};
use crate::index::{TitleIndex, TitleRecord};
use crate::page::{PageId, Side};
use crate::resolver::QueryResult;
use crate::section::{is_hadran, Section, SectionDocument};
use crate::source::{FetchRequest, Fragment, RawResponse, TextResponse, TextSource};
use crate::taxonomy::Taxonomy;

/// Which post-processing a title gets. Derived from its pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Talmud,
    Tanakh,
}

impl Flavor {
    pub fn of(title: &TitleRecord) -> Self {
        if title.is_paginated() {
            Flavor::Talmud
        } else {
            Flavor::Tanakh
        }
    }
}

/// A commentary fetched alongside the primary text, whose fragments nest
/// under the top-level comments of `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondarySource {
    /// Prepended to the primary reference, e.g. `Rashi_on_`.
    pub ref_prefix: String,
    pub kind: String,
}

impl SecondarySource {
    pub fn new(ref_prefix: &str, kind: &str) -> Self {
        Self {
            ref_prefix: ref_prefix.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Where and how the pipeline fetches text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub talmud_base_url: String,
    pub tanakh_base_url: String,
    pub timeout: Duration,
    /// Timeout for chapter-numbered titles, whose texts are larger.
    pub chapter_timeout: Duration,
    pub secondary: Vec<SecondarySource>,
    pub max_range_pages: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            talmud_base_url: "https://www.sefaria.org/api/texts".to_string(),
            tanakh_base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(20),
            chapter_timeout: Duration::from_secs(40),
            secondary: vec![
                SecondarySource::new("Rashi_on_", "Rashi"),
                SecondarySource::new("Tosafot_on_", "Tosafot"),
            ],
            max_range_pages: 10,
        }
    }
}

/// A single page or an inclusive range of pages of one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub start: PageId,
    pub end: Option<PageId>,
}

impl From<PageId> for PageSpan {
    fn from(page: PageId) -> Self {
        PageSpan {
            start: page,
            end: None,
        }
    }
}

impl From<&QueryResult> for PageSpan {
    fn from(result: &QueryResult) -> Self {
        PageSpan {
            start: result.start,
            end: result.end,
        }
    }
}

/// The rendered page handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDocument {
    pub id: String,
    pub title: String,
    pub sections: Vec<SectionDocument>,
}

struct SyntheticPage {
    title: &'static str,
    page: PageId,
    hebrew: &'static str,
    english: &'static str,
}

/// Pages whose upstream text is known to be missing.
const SYNTHETIC_PAGES: &[SyntheticPage] = &[SyntheticPage {
    title: "Nazir",
    page: PageId::Amud {
        number: 33,
        side: Side::Back,
    },
    hebrew: "אין גמרא לנזיר ל״ג ע״א, רק תוספות (שהם קשורים לדפים אחרים)",
    english: "Nazir 33b has no Gemara, just Tosafot (which are linked to other pages).",
}];

/// The replacement section list for a known data gap, if `page` is one.
pub fn synthetic_sections(title: &str, page: &PageId) -> Option<Vec<Section>> {
    SYNTHETIC_PAGES
        .iter()
        .find(|s| s.title == title && s.page == *page)
        .map(|s| vec![Section::new(s.hebrew, s.english, "synthetic")])
}

/// Index of the section a fragment annotates, from the first anchor that
/// starts with `prefix` (`"Berakhot 2a:3"` → 2).
fn anchored_section(fragment: &Fragment, prefix: &str) -> Option<usize> {
    let anchor = fragment
        .anchor_ref_expanded
        .iter()
        .find(|anchor| anchor.starts_with(prefix))?;
    let position: usize = anchor.split(':').nth(1)?.trim().parse().ok()?;
    position.checked_sub(1)
}

/// Pairs the Hebrew and English arrays, padding a trailing benediction line
/// that upstream sends without a translation.
fn align(hebrew: Vec<String>, mut english: Vec<String>) -> Result<Vec<(String, String)>> {
    if hebrew.len() == english.len() + 1 && hebrew.last().is_some_and(|last| is_hadran(last)) {
        english.push(String::new());
    }
    if hebrew.len() != english.len() {
        let unmatched: Vec<String> = hebrew
            .iter()
            .skip(english.len())
            .chain(english.iter().skip(hebrew.len()))
            .cloned()
            .collect();
        error!(?unmatched, "unmatched text/translation");
        return Err(Error::LengthMismatch { unmatched });
    }
    Ok(hebrew.into_iter().zip(english).collect())
}

/// Turns raw responses into parsed ones, failing with every bad body when
/// any response is unusable.
fn parse_responses(results: Vec<anyhow::Result<RawResponse>>) -> Result<Vec<TextResponse>> {
    let mut bodies = Vec::new();
    let mut raw = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(response) if response.is_success() => raw.push(response),
            Ok(response) => bodies.push(response.body),
            Err(e) => bodies.push(format!("{:#}", e)),
        }
    }
    if !bodies.is_empty() {
        return Err(Error::UpstreamFetch { bodies });
    }

    let mut parsed = Vec::with_capacity(raw.len());
    for response in raw {
        match serde_json::from_str::<TextResponse>(&response.body) {
            Ok(text) => parsed.push(text),
            Err(_) => bodies.push(response.body),
        }
    }
    if !bodies.is_empty() {
        return Err(Error::UpstreamFetch { bodies });
    }
    Ok(parsed)
}

/// Builds page documents from a [`TextSource`].
///
/// Holds no per-request state; one instance serves any number of concurrent
/// requests.
pub struct Aggregator {
    source: Arc<dyn TextSource>,
    index: Arc<TitleIndex>,
    ceremony: ClosingCeremony,
    settings: SourceSettings,
    taxonomy: Taxonomy,
    policy: DuplicatePolicy,
    formatter: Arc<dyn TextFormatter>,
}

impl Aggregator {
    pub fn new(
        source: Arc<dyn TextSource>,
        index: Arc<TitleIndex>,
        ceremony: ClosingCeremony,
        settings: SourceSettings,
    ) -> Self {
        Self {
            source,
            index,
            ceremony,
            settings,
            taxonomy: Taxonomy::standard(),
            policy: DuplicatePolicy::standard(),
            formatter: Arc::new(Unformatted),
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn TextFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn index(&self) -> &Arc<TitleIndex> {
        &self.index
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// Renders one page or a range of pages of `title`.
    ///
    /// Reversed ranges are put in order. Every page of a range is fetched
    /// concurrently and the sections are concatenated in page order. The
    /// document title is upstream's, or the canonical name when upstream
    /// sends none.
    pub async fn aggregate(&self, title: &str, span: impl Into<PageSpan>) -> Result<PageDocument> {
        let span = span.into();
        let record = self.index.title(title)?;

        let (start, end) = match span.end {
            Some(end) if end < span.start => (end, Some(span.start)),
            other => (span.start, other),
        };
        let endpoints: Vec<PageId> = std::iter::once(start).chain(end).collect();
        self.index.validate_pages(record, &endpoints)?;

        let pages = match end {
            Some(end) => record.pages_between(start, end),
            None => vec![start],
        };
        if pages.len() > self.settings.max_range_pages {
            return Err(Error::InvalidQuery {
                tokens: vec![start.to_string(), end.map(|e| e.to_string()).unwrap_or_default()],
                message: format!(
                    "Ranges are limited to {} pages",
                    self.settings.max_range_pages
                ),
            });
        }

        let results = join_all(pages.iter().map(|page| self.aggregate_page(record, *page))).await;

        let mut display_title = None;
        let mut sections = Vec::new();
        for result in results {
            let (page_title, page_sections) = result?;
            if display_title.is_none() {
                display_title = page_title;
            }
            sections.extend(page_sections.into_iter().map(Section::finalize));
        }

        let id = match end {
            Some(end) if end != start => format!("{}-{}", start, end),
            _ => start.to_string(),
        };
        Ok(PageDocument {
            id,
            title: display_title.unwrap_or_else(|| record.canonical_name.clone()),
            sections,
        })
    }

    /// The fetches for one page: the primary text first, then one per
    /// secondary source (two-sided titles only).
    pub fn requests(&self, title: &TitleRecord, page: PageId) -> Vec<FetchRequest> {
        let reference = format!("{}.{}", title.url_name(), page);
        match Flavor::of(title) {
            Flavor::Talmud => {
                let params: Vec<(String, String)> = [("commentary", "1"), ("pad", "0"), ("wrapLinks", "0")]
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                std::iter::once(String::new())
                    .chain(self.settings.secondary.iter().map(|s| s.ref_prefix.clone()))
                    .map(|prefix| FetchRequest {
                        reference: format!("{}{}", prefix, reference),
                        base_url: self.settings.talmud_base_url.clone(),
                        params: params.clone(),
                        timeout: self.settings.timeout,
                    })
                    .collect()
            }
            Flavor::Tanakh => vec![FetchRequest {
                reference,
                base_url: self.settings.tanakh_base_url.clone(),
                params: Vec::new(),
                timeout: self.settings.chapter_timeout,
            }],
        }
    }

    async fn aggregate_page(&self, title: &TitleRecord, page: PageId) -> Result<(Option<String>, Vec<Section>)> {
        let flavor = Flavor::of(title);
        let requests = self.requests(title, page);

        let started = Instant::now();
        let results = join_all(requests.iter().map(|r| self.source.fetch(r))).await;
        debug!(
            title = %title.canonical_name,
            %page,
            fetches = requests.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched page"
        );

        let mut responses = parse_responses(results)?.into_iter();
        let primary = responses.next().ok_or_else(|| Error::UpstreamFetch {
            bodies: vec!["no primary response".to_string()],
        })?;
        let display_title = primary.display_title();

        let hebrew = primary.he.clone().map(|t| t.into_vec()).unwrap_or_default();
        let english = primary.text.clone().map(|t| t.into_vec()).unwrap_or_default();
        let mut sections: Vec<Section> = align(hebrew, english)?
            .into_iter()
            .enumerate()
            .map(|(i, (he, en))| {
                Section::new(
                    self.formatter.primary_hebrew(&he),
                    self.formatter.primary_english(&en),
                    format!("{}.{}", primary.reference, i + 1),
                )
            })
            .collect();

        let prefix = format!("{}:", primary.reference);
        for fragment in &primary.commentary {
            self.place(&mut sections, fragment, &prefix);
        }

        if flavor == Flavor::Talmud {
            for (response, secondary) in responses.zip(&self.settings.secondary) {
                let prefix = format!("{}:", response.reference);
                for fragment in &response.commentary {
                    self.place_nested(&mut sections, fragment, &prefix, &secondary.kind);
                }
            }

            for section in &mut sections {
                self.policy.resolve(&mut section.commentary);
                section.mark_sugya_start();
                section.mark_hadran();
            }

            if let Some(synthetic) = synthetic_sections(&title.canonical_name, &page) {
                sections = synthetic;
            } else if page == title.end {
                sections.extend(self.ceremony.sections_for(title));
            }
        }

        if sections.is_empty() {
            warn!(title = %title.canonical_name, %page, "no sections");
        }
        Ok((display_title, sections))
    }

    fn comment(&self, fragment: &Fragment, kind: &str) -> Comment {
        Comment::create(fragment, kind, self.formatter.as_ref(), &self.index)
    }

    fn place(&self, sections: &mut [Section], fragment: &Fragment, prefix: &str) {
        if fragment.he.is_empty() && fragment.text.is_empty() {
            return;
        }
        let Some(kind) = self.taxonomy.classify(fragment) else {
            return;
        };
        match anchored_section(fragment, prefix).and_then(|i| sections.get_mut(i)) {
            Some(section) => {
                section.commentary.add(self.comment(fragment, &kind.english_name));
            }
            None => warn!(
                source_ref = %fragment.source_ref,
                anchors = ?fragment.anchor_ref_expanded,
                "unplaceable comment"
            ),
        }
    }

    fn place_nested(&self, sections: &mut [Section], fragment: &Fragment, prefix: &str, parent: &str) {
        if fragment.he.is_empty() && fragment.text.is_empty() {
            return;
        }
        let unplaceable = || {
            warn!(
                source_ref = %fragment.source_ref,
                anchors = ?fragment.anchor_ref_expanded,
                kind = parent,
                category = ?fragment.category,
                fragment_type = ?fragment.kind_type,
                "unplaceable second level comment"
            )
        };

        let Some(section) = anchored_section(fragment, prefix).and_then(|i| sections.get_mut(i)) else {
            unplaceable();
            return;
        };
        let Some(kind) = self.taxonomy.classify(fragment) else {
            return;
        };
        let comment = self.comment(fragment, &kind.english_name);
        if section.commentary.add_nested(parent, comment).is_err() {
            unplaceable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentary::{DuplicateRule, Removal};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        responses: HashMap<String, RawResponse>,
        failures: HashMap<String, String>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl FakeSource {
        fn with(mut self, reference: &str, body: Value) -> Self {
            self.responses
                .insert(reference.to_string(), RawResponse::ok(body.to_string()));
            self
        }

        fn with_status(mut self, reference: &str, status: u16, body: &str) -> Self {
            self.responses.insert(
                reference.to_string(),
                RawResponse {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }

        fn with_transport_error(mut self, reference: &str, message: &str) -> Self {
            self.failures
                .insert(reference.to_string(), message.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            let mut refs: Vec<String> = self
                .requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.reference.clone())
                .collect();
            refs.sort();
            refs
        }
    }

    #[async_trait]
    impl TextSource for FakeSource {
        async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<RawResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(message) = self.failures.get(&request.reference) {
                anyhow::bail!("{}", message);
            }
            Ok(self
                .responses
                .get(&request.reference)
                .cloned()
                .unwrap_or(RawResponse {
                    status: 404,
                    body: format!("no text for {}", request.reference),
                }))
        }
    }

    fn empty_commentary(reference: &str) -> Value {
        json!({"ref": reference, "commentary": []})
    }

    fn fragment(name: &str, reference: &str, anchor: &str, he: &str) -> Value {
        json!({
            "he": he,
            "text": format!("{} english", reference),
            "ref": reference,
            "sourceRef": reference,
            "sourceHeRef": "",
            "anchorRefExpanded": [anchor],
            "collectiveTitle": {"en": name},
        })
    }

    fn page(reference: &str, he: Value, en: Value, commentary: Value) -> Value {
        json!({"ref": reference, "indexTitle": "Berakhot", "he": he, "text": en, "commentary": commentary})
    }

    fn berakhot_2a(source: FakeSource) -> FakeSource {
        source
            .with(
                "Berakhot.2a",
                page(
                    "Berakhot 2a",
                    json!(["מאימתי", "גמרא"]),
                    json!(["From when", "Gemara"]),
                    json!([
                        fragment("Rashi", "Rashi on Berakhot 2a:1:1", "Berakhot 2a:1", "רש\"י"),
                        fragment("Steinsaltz", "Steinsaltz on Berakhot 2a:2", "Berakhot 2a:2", "<big>ג</big>מרא"),
                        fragment("Unknown Work", "Unknown 1", "Berakhot 2a:1", "x"),
                        fragment("Rashi", "Rashi on Berakhot 2a:9:1", "Berakhot 2a:9", "far"),
                        fragment("Tosafot", "Tosafot on Berakhot 3a:1:1", "Berakhot 3a:1", "elsewhere"),
                        {"he": "", "text": "", "ref": "Rashi on Berakhot 2a:1:2",
                         "anchorRefExpanded": ["Berakhot 2a:1"], "collectiveTitle": {"en": "Rashi"}},
                    ]),
                ),
            )
            .with(
                "Rashi_on_Berakhot.2a",
                json!({"ref": "Rashi on Berakhot 2a", "commentary": [
                    fragment("Otzar Laazei Rashi", "Otzar Laazei Rashi, Berakhot 2", "Rashi on Berakhot 2a:1:1", "לעז"),
                ]}),
            )
            .with(
                "Tosafot_on_Berakhot.2a",
                json!({"ref": "Tosafot on Berakhot 2a", "commentary": [
                    fragment("Gilyon HaShas", "Gilyon HaShas on Berakhot 2a:2", "Tosafot on Berakhot 2a:2:1", "גליון"),
                ]}),
            )
    }

    fn aggregator(source: Arc<FakeSource>) -> Aggregator {
        Aggregator::new(
            source,
            Arc::new(TitleIndex::builtin().unwrap()),
            ClosingCeremony::builtin().unwrap(),
            SourceSettings::default(),
        )
    }

    fn to_json(document: &PageDocument) -> Value {
        serde_json::to_value(document).unwrap()
    }

    #[tokio::test]
    async fn test_aggregates_talmud_page() {
        let source = Arc::new(berakhot_2a(FakeSource::default()));
        let document = aggregator(source.clone())
            .aggregate("Berakhot", PageId::front(2))
            .await
            .unwrap();

        assert_eq!(document.id, "2a");
        assert_eq!(document.title, "Berakhot");
        assert_eq!(document.sections.len(), 2);

        let json = to_json(&document);
        let first = &json["sections"][0];
        assert_eq!(first["ref"], "Berakhot 2a.1");
        assert_eq!(first["he"], "מאימתי");
        let rashi = &first["commentary"]["Rashi"];
        assert_eq!(rashi["comments"].as_array().unwrap().len(), 1);
        assert_eq!(
            rashi["commentary"]["Otzar Laazei Rashi"]["comments"][0]["he"],
            "לעז"
        );
        assert!(first["commentary"].get("Unknown Work").is_none());

        let second = &json["sections"][1];
        assert_eq!(second["steinsaltz_start_of_sugya"], true);
        // Nested under Tosafot, which has no top-level comment on this page.
        assert!(second["commentary"].get("Tosafot").is_none());
        assert!(second["commentary"].get("Gilyon HaShas").is_none());

        assert_eq!(
            source.requested(),
            vec!["Berakhot.2a", "Rashi_on_Berakhot.2a", "Tosafot_on_Berakhot.2a"]
        );
        let requests = source.requests.lock().unwrap();
        assert!(requests
            .iter()
            .all(|r| r.params.contains(&("commentary".to_string(), "1".to_string()))));
    }

    #[tokio::test]
    async fn test_trailing_hadran_without_translation() {
        let source = FakeSource::default()
            .with(
                "Berakhot.3a",
                page(
                    "Berakhot 3a",
                    json!(["א", "ב", "<br><big><strong>הדרן עלך מאימתי</strong></big>"]),
                    json!(["a", "b"]),
                    json!([fragment("Rashi", "Rashi on Berakhot 3a:3:1", "Berakhot 3a:3", "רש\"י")]),
                ),
            )
            .with("Rashi_on_Berakhot.3a", empty_commentary("Rashi on Berakhot 3a"))
            .with("Tosafot_on_Berakhot.3a", empty_commentary("Tosafot on Berakhot 3a"));
        let document = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::front(3))
            .await
            .unwrap();

        let last = document.sections.last().unwrap();
        assert!(last.hadran);
        assert!(last.commentary.is_empty());
        assert_eq!(last.en, "");
        assert_eq!(last.he, "<big><strong>הדרן עלך מאימתי</strong></big>");
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let source = FakeSource::default()
            .with(
                "Berakhot.3b",
                page("Berakhot 3b", json!(["א", "ב", "ג"]), json!(["a"]), json!([])),
            )
            .with("Rashi_on_Berakhot.3b", empty_commentary("Rashi on Berakhot 3b"))
            .with("Tosafot_on_Berakhot.3b", empty_commentary("Tosafot on Berakhot 3b"));
        let err = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::back(3))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::LengthMismatch {
                unmatched: vec!["ב".to_string(), "ג".to_string()]
            }
        );
        assert_eq!(err.internal_code(), Some(2));
    }

    #[tokio::test]
    async fn test_upstream_failures_are_aggregated() {
        let source = FakeSource::default()
            .with("Berakhot.4a", page("Berakhot 4a", json!([]), json!([]), json!([])))
            .with_status("Rashi_on_Berakhot.4a", 500, "rashi broke")
            .with_transport_error("Tosafot_on_Berakhot.4a", "connection refused");
        let err = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::front(4))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::UpstreamFetch {
                bodies: vec!["rashi broke".to_string(), "connection refused".to_string()]
            }
        );
        assert_eq!(err.to_string(), "rashi broke\nconnection refused");
    }

    #[tokio::test]
    async fn test_unparsable_body_is_a_fetch_failure() {
        let source = FakeSource::default()
            .with_status("Berakhot.4b", 200, "<html>not json</html>")
            .with("Rashi_on_Berakhot.4b", empty_commentary("Rashi on Berakhot 4b"))
            .with("Tosafot_on_Berakhot.4b", empty_commentary("Tosafot on Berakhot 4b"));
        let err = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::back(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch { .. }));
    }

    #[tokio::test]
    async fn test_zero_sections_is_success() {
        let source = FakeSource::default()
            .with(
                "Berakhot.5a",
                page(
                    "Berakhot 5a",
                    json!([]),
                    json!([]),
                    json!([fragment("Rashi", "Rashi on Berakhot 5a:1:1", "Berakhot 5a:1", "x")]),
                ),
            )
            .with("Rashi_on_Berakhot.5a", empty_commentary("Rashi on Berakhot 5a"))
            .with("Tosafot_on_Berakhot.5a", empty_commentary("Tosafot on Berakhot 5a"));
        let document = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::front(5))
            .await
            .unwrap();
        assert!(document.sections.is_empty());
        assert_eq!(to_json(&document)["sections"], json!([]));
    }

    #[tokio::test]
    async fn test_synthetic_page() {
        let source = FakeSource::default()
            .with("Nazir.33b", page("Nazir 33b", json!([]), json!([]), json!([])))
            .with("Rashi_on_Nazir.33b", empty_commentary("Rashi on Nazir 33b"))
            .with("Tosafot_on_Nazir.33b", empty_commentary("Tosafot on Nazir 33b"));
        let document = aggregator(Arc::new(source))
            .aggregate("Nazir", PageId::back(33))
            .await
            .unwrap();
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].reference, "synthetic");
        assert!(document.sections[0].en.starts_with("Nazir 33b has no Gemara"));
    }

    #[tokio::test]
    async fn test_last_page_appends_closing_ceremony() {
        let source = FakeSource::default()
            .with("Berakhot.64a", page("Berakhot 64a", json!(["סוף"]), json!(["end"]), json!([])))
            .with("Rashi_on_Berakhot.64a", empty_commentary("Rashi on Berakhot 64a"))
            .with("Tosafot_on_Berakhot.64a", empty_commentary("Tosafot on Berakhot 64a"));
        let document = aggregator(Arc::new(source))
            .aggregate("Berakhot", PageId::front(64))
            .await
            .unwrap();
        let ceremony = ClosingCeremony::builtin().unwrap();
        assert_eq!(document.sections.len(), 1 + ceremony.len());
        assert!(document.sections[1].en.contains("Berakhot"));
    }

    #[tokio::test]
    async fn test_chapter_title_uses_single_fetch() {
        let source = Arc::new(FakeSource::default().with(
            "Genesis.1",
            json!({"ref": "Genesis 1", "title": "Genesis", "he": ["בראשית"], "text": ["In the beginning"],
                   "commentary": [fragment("Rashi", "Rashi on Genesis 1:1:1", "Genesis 1:1", "רש\"י")]}),
        ));
        let aggregator = aggregator(source.clone());
        let document = aggregator.aggregate("Genesis", PageId::Chapter(1)).await.unwrap();

        assert_eq!(document.id, "1");
        assert_eq!(document.sections[0].reference, "Genesis 1.1");
        assert!(document.sections[0].commentary.contains_key("Rashi"));

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].base_url, aggregator.settings().tanakh_base_url);
        assert_eq!(requests[0].timeout, aggregator.settings().chapter_timeout);
    }

    #[tokio::test]
    async fn test_untitled_response_falls_back_to_canonical_name() {
        let source = Arc::new(FakeSource::default().with(
            "Song_of_Songs.2",
            json!({"ref": "Song of Songs 2", "he": ["א"], "text": ["a"], "commentary": []}),
        ));
        let document = aggregator(source)
            .aggregate("Shir HaShirim", PageId::Chapter(2))
            .await
            .unwrap();
        assert_eq!(document.title, "Song of Songs");
    }

    #[tokio::test]
    async fn test_range_concatenates_pages() {
        let mut source = berakhot_2a(FakeSource::default());
        source = source
            .with("Berakhot.2b", page("Berakhot 2b", json!(["ב"]), json!(["b"]), json!([])))
            .with("Rashi_on_Berakhot.2b", empty_commentary("Rashi on Berakhot 2b"))
            .with("Tosafot_on_Berakhot.2b", empty_commentary("Tosafot on Berakhot 2b"));
        let source = Arc::new(source);
        let document = aggregator(source.clone())
            .aggregate(
                "Berakhot",
                PageSpan {
                    start: PageId::back(2),
                    end: Some(PageId::front(2)),
                },
            )
            .await
            .unwrap();

        assert_eq!(document.id, "2a-2b");
        assert_eq!(
            document
                .sections
                .iter()
                .map(|s| s.reference.as_str())
                .collect::<Vec<_>>(),
            vec!["Berakhot 2a.1", "Berakhot 2a.2", "Berakhot 2b.1"]
        );
        assert_eq!(source.requested().len(), 6);
    }

    #[tokio::test]
    async fn test_range_validation() {
        let aggregator = aggregator(Arc::new(FakeSource::default()));
        let too_long = aggregator
            .aggregate(
                "Berakhot",
                PageSpan {
                    start: PageId::front(2),
                    end: Some(PageId::front(20)),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(too_long, Error::InvalidQuery { .. }));

        let missing = aggregator
            .aggregate("Berakhot", PageId::front(70))
            .await
            .unwrap_err();
        assert_eq!(missing.to_string(), "Berakhot 70a doesn't exist");

        let unknown = aggregator.aggregate("Nope", PageId::front(2)).await.unwrap_err();
        assert!(matches!(unknown, Error::UnknownTitle { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_policy_is_injected() {
        let source = FakeSource::default()
            .with(
                "Berakhot.6a",
                page(
                    "Berakhot 6a",
                    json!(["א"]),
                    json!(["a"]),
                    json!([
                        fragment("Rashi", "Rashi on Berakhot 6a:1:1", "Berakhot 6a:1", "רש\"י"),
                        fragment("Maharsha", "Chidushei Agadot 6a:1", "Berakhot 6a:1", "מהרש\"א"),
                    ]),
                ),
            )
            .with(
                "Rashi_on_Berakhot.6a",
                json!({"ref": "Rashi on Berakhot 6a", "commentary": [
                    fragment("Maharsha", "Chidushei Agadot 6a:1", "Rashi on Berakhot 6a:1:1", "מהרש\"א"),
                ]}),
            )
            .with("Tosafot_on_Berakhot.6a", empty_commentary("Tosafot on Berakhot 6a"));
        let source = Arc::new(source);

        let standard = aggregator(source.clone())
            .aggregate("Berakhot", PageId::front(6))
            .await
            .unwrap();
        let commentary = &standard.sections[0].commentary;
        assert!(!commentary.contains_key("Maharsha"));
        assert!(commentary["Rashi"].commentary.is_some());

        let keep_top_level = aggregator(source)
            .with_duplicate_policy(DuplicatePolicy::new(vec![DuplicateRule::pair(
                "Maharsha",
                "Maharsha",
                Removal::Nested,
            )]))
            .aggregate("Berakhot", PageId::front(6))
            .await
            .unwrap();
        let commentary = &keep_top_level.sections[0].commentary;
        assert!(commentary.contains_key("Maharsha"));
        assert!(commentary["Rashi"].commentary.is_none());
    }

    #[test]
    fn test_anchored_section() {
        let mut f = Fragment {
            anchor_ref_expanded: vec![
                "Berakhot 3a:1".into(),
                "Berakhot 2a:4".into(),
                "Berakhot 2a:5".into(),
            ],
            ..Fragment::default()
        };
        assert_eq!(anchored_section(&f, "Berakhot 2a:"), Some(3));
        assert_eq!(anchored_section(&f, "Berakhot 9a:"), None);
        f.anchor_ref_expanded = vec!["Berakhot 2a:0".into()];
        assert_eq!(anchored_section(&f, "Berakhot 2a:"), None);
    }

    #[test]
    fn test_synthetic_sections_only_for_known_gaps() {
        assert!(synthetic_sections("Nazir", &PageId::back(33)).is_some());
        assert!(synthetic_sections("Nazir", &PageId::front(33)).is_none());
    }
}
