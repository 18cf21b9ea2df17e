//! # talmud-page CLI (`tp`)
//!
//! ## Usage
//!
//! ```bash
//! tp --config ./config/tp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tp resolve "<query>"` | Resolve a reference to a title and pages |
//! | `tp page <title> <page>` | Print a page with its commentary as JSON |
//! | `tp serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! tp resolve "Brachot 2a"
//! tp resolve "בבא מציעא ב. - ג:"
//! tp page Berakhot 2a
//! tp page Shabbat 100a --end 101b
//! tp serve --config ./config/tp.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use talmud_page::{config, logging, page_cmd, resolve_cmd, server};
use talmud_page_core::TitleIndex;

/// Talmud and Tanakh reader.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tp.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Resolve Talmud and Tanakh references and render pages with their commentary",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tp.toml`. `resolve` and `page` fall back to
    /// built-in defaults when the file does not exist; `serve` requires it.
    #[arg(long, global = true, default_value = "./config/tp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a free-text reference.
    ///
    /// Accepts English or Hebrew titles and page labels, and ranges joined
    /// with `to` or `-`. Prints the canonical title, pages and site path.
    Resolve {
        /// The reference, e.g. "Brachot 2a" or "Genesis 1 to 3".
        query: String,
    },

    /// Fetch and print one page, or a range of pages, as JSON.
    Page {
        /// Title in any known spelling (`Bava_Metzia`, `Bava Metzia`, `בבא מציעא`).
        title: String,

        /// Canonical page label (`2a`, `157b`, or a chapter number).
        page: String,

        /// Last page of a range.
        #[arg(long)]
        end: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.command {
        Commands::Serve => config::load_config(&cli.config)?,
        _ if !cli.config.exists() => config::Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };
    logging::init(&cfg.logging.filter);

    match cli.command {
        Commands::Resolve { query } => {
            let index = TitleIndex::builtin()?;
            resolve_cmd::run_resolve(&index, &query)?;
        }
        Commands::Page { title, page, end } => {
            page_cmd::run_page(&cfg, &title, &page, end.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
