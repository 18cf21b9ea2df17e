//! # talmud-page
//!
//! A reader for the Talmud and Tanakh. Resolves free-text references such as
//! `"Brachot 2a"` or `"ברכות ב."` and serves pages with their commentaries
//! stitched under each section.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ Text API │──▶│ talmud-page-core  │──▶│ PageDocument │
//! │  (HTTP)  │   │ resolve+aggregate │   │     JSON     │
//! └──────────┘   └─────────┬─────────┘   └──────────────┘
//!                          │
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   HTTP   │
//!           │   (tp)   │       │  server  │
//!           └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetch`] | HTTP text source |
//! | [`logging`] | Log subscriber setup |
//! | [`resolve_cmd`] | Reference resolution for CLI and server |
//! | [`page_cmd`] | Page rendering for CLI and server |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod fetch;
pub mod logging;
pub mod page_cmd;
pub mod resolve_cmd;
pub mod server;
