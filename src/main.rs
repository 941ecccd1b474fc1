//! # Where Is My Mechanism CLI (`wimm`)
//!
//! ## Usage
//!
//! ```bash
//! wimm --config ./config/wimm.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wimm search "<query>"` | Run the full search-and-enrichment pipeline |
//! | `wimm table <file>` | Render a JSON array-of-arrays file as a grid |
//! | `wimm serve` | Start the HTTP server (`GET /search?query=<q>`) |
//!
//! ## Examples
//!
//! ```bash
//! # Look up a mechanism by HQ ID
//! wimm search 12345
//!
//! # Same, but print the raw report
//! wimm search 12345 --json
//!
//! # Render a table with a per-column substring filter
//! wimm table rows.json --filter OperatingUnit=Kenya --page-size 10
//!
//! # Serve searches over HTTP
//! wimm serve --config ./config/wimm.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use where_is_my_mech::{config, pipeline, server, table};

const DEFAULT_CONFIG_PATH: &str = "./config/wimm.toml";

/// Where Is My Mechanism — look up a funding mechanism in FactsInfo and
/// cross-reference it against DATIM.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, production defaults are used. See
/// `config/wimm.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wimm",
    about = "Where Is My Mechanism — cross-reference funding mechanism records between FactsInfo and DATIM",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a funding mechanism.
    ///
    /// Runs the four-step pipeline: FactsInfo tabular search, manifest
    /// discovery, metadata lookup by mechanism code, and agency/partner
    /// derivation. Double quotes and surrounding whitespace in the query
    /// are stripped before searching.
    Search {
        /// The search query (mechanism code, name, or partner).
        query: String,

        /// Print the raw report as JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },

    /// Render a JSON table file as a filterable grid.
    ///
    /// The file holds an array of arrays; row 0 is the header row. Filters
    /// are per-column substring matches.
    Table {
        /// Path to the JSON rows file.
        path: PathBuf,

        /// Column filter as `COLUMN=SUBSTRING` (repeatable).
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Zero-based page to print.
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Rows per page (defaults to the configured page size).
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Start the HTTP server.
    ///
    /// Exposes `GET /search?query=<q>` returning the search report as JSON,
    /// mirroring the query-parameter surface of the original web app.
    Serve,
}

/// Parse a `KEY=VALUE` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The default config path is optional; an explicitly given one is not.
    let cfg = if cli.config.as_os_str() == DEFAULT_CONFIG_PATH && !cli.config.exists() {
        config::Config::default()
    } else {
        config::load_config(&cli.config)?
    };

    match cli.command {
        Commands::Search { query, json } => {
            pipeline::run_search(cfg, &query, json).await?;
        }
        Commands::Table {
            path,
            filters,
            page,
            page_size,
        } => {
            table::run_table(&cfg, &path, &filters, page, page_size)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
