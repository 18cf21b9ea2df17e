//! Query resolution for the `tp resolve` command and `GET /api/resolve`.

use anyhow::Result;
use serde::Serialize;

use talmud_page_core::hebrew::int_to_numeral;
use talmud_page_core::{resolve, Error, PageId, Side, TitleIndex};

/// A resolved query as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub title: String,
    pub start: PageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<PageId>,
    /// Site path, e.g. `/Bava_Metzia/2a/to/3b`.
    pub path: String,
    /// The reference in Hebrew, e.g. `ברכות ב.`.
    pub hebrew: String,
}

/// Hebrew label for a page: `ב.` / `ב:` for leaves, `ב` for chapters.
pub fn hebrew_label(page: &PageId) -> String {
    match *page {
        PageId::Amud { number, side } => {
            let mark = match side {
                Side::Front => '.',
                Side::Back => ':',
            };
            format!("{}{}", int_to_numeral(number), mark)
        }
        PageId::Chapter(number) => int_to_numeral(number),
    }
}

/// Resolves `query` against `index`, pulling whole-leaf endpoints that fall
/// outside the title back inside it.
///
/// Shared by the CLI and the HTTP server.
pub fn resolve_query(index: &TitleIndex, query: &str) -> Result<Resolution, Error> {
    let resolved = resolve(index, query)?;
    let title = index.title(&resolved.title)?;
    let result = resolved.normalized(title);

    let mut hebrew = format!("{} {}", title.hebrew_name, hebrew_label(&result.start));
    if let Some(end) = &result.end {
        hebrew.push_str(" - ");
        hebrew.push_str(&hebrew_label(end));
    }

    Ok(Resolution {
        path: result.to_url_pathname(),
        title: result.title,
        start: result.start,
        end: result.end,
        hebrew,
    })
}

/// CLI entry point for `tp resolve`.
pub fn run_resolve(index: &TitleIndex, query: &str) -> Result<()> {
    let resolution = resolve_query(index, query)?;
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
