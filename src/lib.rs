//! tbi_rs
//!
//! A lightweight Rust library for retrieving, caching, summarizing, and
//! plotting World Health Organization tuberculosis burden data. Pairs with
//! the `tbi` CLI.
//!
//! ### Features
//! - Fetch the WHO TB burden estimates and data dictionary, with a local
//!   download cache
//! - Summarize any metric across countries, WHO regions, custom country
//!   pools, and the world (rates, proportions, or mean/median with Monte
//!   Carlo uncertainty propagation)
//! - Save tables and summaries as CSV or JSON
//! - Generate SVG/PNG time-series charts with confidence ribbons
//!
//! ### Example
//! ```no_run
//! use tbi_rs::{Client, StatKind, SummaryOptions, stats, storage, viz};
//!
//! let client = Client::default();
//! let burden = client.fetch_burden()?;
//! let opts = SummaryOptions {
//!     metric: "e_inc_num".into(),
//!     stat: StatKind::Rate,
//!     countries: vec!["Germany".into()],
//!     compare_to_world: true,
//!     ..Default::default()
//! };
//! let summary = stats::summarise_metric_seeded(&burden, &opts, 42)?;
//! storage::save_summary_csv(&summary, &opts.metric, "incidence.csv")?;
//! viz::plot_summary(&summary, "TB incidence (number)", "incidence.svg", 1000, 600)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod dict;
pub mod models;
pub mod stats;
pub mod storage;
pub mod viz;

pub use api::Client;
pub use models::{
    CustomGroup, DictEntry, StatKind, SummaryError, SummaryOptions, SummaryRow, TbRecord,
};
pub use stats::{summarise_metric, summarise_metric_seeded};
