//! # talmud-page-core
//!
//! Reference resolution and commentary aggregation for the talmud-page
//! reader. This crate has no I/O of its own: text is fetched through the
//! [`TextSource`](source::TextSource) trait, which the binary implements over
//! HTTP and tests implement in memory.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`hebrew`] | Hebrew numerals and letter utilities |
//! | [`page`] | Page identifiers and page arithmetic |
//! | [`index`] | Canonical title index and alias lookup |
//! | [`resolver`] | Free-text query → [`QueryResult`](resolver::QueryResult) |
//! | [`taxonomy`] | Ordered commentary classification rules |
//! | [`source`] | Text-source trait and wire shapes |
//! | [`format`] | Text-formatting hooks |
//! | [`commentary`] | Comments, commentary trees, duplicate resolution |
//! | [`section`] | Sections and per-section post-processing |
//! | [`ceremony`] | Closing-ceremony sections for a title's last page |
//! | [`pipeline`] | The aggregation pipeline |
//! | [`error`] | Error taxonomy |

pub mod ceremony;
pub mod commentary;
pub mod error;
pub mod format;
pub mod hebrew;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod resolver;
pub mod section;
pub mod source;
pub mod taxonomy;

pub use error::{Error, Result};
pub use index::{TitleIndex, TitleRecord};
pub use page::{PageId, Side};
pub use pipeline::{Aggregator, PageDocument, PageSpan, SecondarySource, SourceSettings};
pub use resolver::{resolve, QueryResult};
pub use source::{FetchRequest, RawResponse, TextSource};
