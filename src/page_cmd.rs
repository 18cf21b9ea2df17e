//! Page rendering for the `tp page` command and the `/api/{title}/...` routes.

use anyhow::Result;
use std::sync::Arc;

use talmud_page_core::format::ApiFormatter;
use talmud_page_core::{Aggregator, Error, PageDocument, PageId, PageSpan, TitleIndex};

use crate::config::Config;
use crate::fetch::HttpTextSource;

/// Wires the HTTP text source, the title index and the configured
/// closing ceremony into an [`Aggregator`].
pub fn build_aggregator(config: &Config) -> Result<Aggregator> {
    let source = Arc::new(HttpTextSource::new()?);
    let index = Arc::new(TitleIndex::builtin()?);
    let ceremony = config.closing_ceremony()?;

    Ok(
        Aggregator::new(source, index, ceremony, config.source.settings())
            .with_formatter(Arc::new(ApiFormatter)),
    )
}

/// Parses a canonical page label as it appears in a URL or on the command
/// line (`2a`, `157b`, `12`).
pub fn parse_page(label: &str) -> Result<PageId, Error> {
    label.parse().map_err(|_| Error::InvalidQuery {
        tokens: vec![label.to_string()],
        message: format!("{} is not a valid page", label),
    })
}

/// Renders one page, or the range `page..=end`, of `title`.
///
/// Shared by the CLI and the HTTP server.
pub async fn render_page(
    aggregator: &Aggregator,
    title: &str,
    page: &str,
    end: Option<&str>,
) -> Result<PageDocument, Error> {
    let start = parse_page(page)?;
    let end = end.map(parse_page).transpose()?;
    aggregator.aggregate(title, PageSpan { start, end }).await
}

/// CLI entry point for `tp page`. Prints the page document as JSON.
pub async fn run_page(config: &Config, title: &str, page: &str, end: Option<&str>) -> Result<()> {
    let aggregator = build_aggregator(config)?;
    let document = render_page(&aggregator, title, page, end).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
