//! # Where Is My Mechanism
//!
//! A lookup tool that searches the FactsInfo tabular service for a funding
//! mechanism record, cross-references the match against a DHIS2-style
//! metadata API, and produces a formatted result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────────────┐
//! │  query   │──▶│        MechanismSearchPipeline       │
//! └──────────┘   │ FactsInfo ▶ manifest ▶ categoryOpts  │
//!                └──────────────────┬───────────────────┘
//!                                   │ SearchReport
//!                  ┌────────────────┤
//!                  ▼                ▼
//!             ┌──────────┐    ┌──────────┐
//!             │   CLI    │    │   HTTP   │
//!             │  (wimm)  │    │ /search  │
//!             └──────────┘    └──────────┘
//! ```
//!
//! A second, independent component projects rectangular row data into a
//! filterable, paginated grid (the [`table`] module).
//!
//! ## Quick Start
//!
//! ```bash
//! wimm search 12345             # look up a mechanism by code or name
//! wimm table rows.json          # render a JSON table file as a grid
//! wimm serve                    # expose GET /search?query=<q>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Wire shapes and the published report |
//! | [`client`] | Outbound HTTP with development-host headers |
//! | [`pipeline`] | The four-step search chain |
//! | [`table`] | Filterable-grid projection |
//! | [`format`] | Display-time text transforms |
//! | [`server`] | HTTP search endpoint |

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod table;
