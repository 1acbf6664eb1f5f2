//! Synchronous client for the **WHO global TB programme CSV exports**.
//!
//! The WHO publishes its TB burden estimates and the matching data dictionary
//! as CSV downloads from one endpoint, selected by the `ds` query parameter.
//! Responses are parsed into tidy [`TbRecord`] / [`DictEntry`] rows; blank or
//! unparsable numeric cells become missing values rather than errors.
//!
//! Typical usage:
//! ```no_run
//! # use tbi_rs::Client;
//! let client = Client::default();
//! let burden = client.fetch_burden()?;
//! let dict = client.fetch_dictionary()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::models::{DictEntry, TbRecord};
use ahash::AHashMap;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Identifying string columns of the burden export; every other column is
/// treated as numeric.
const ID_COLUMNS: [&str; 5] = ["country", "iso2", "iso3", "iso_numeric", "g_whoregion"];

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("tbi_rs/", env!("CARGO_PKG_VERSION"))) // set user agent
            .build()
            .expect("reqwest client build");
        Self {
            base_url: "https://extranet.who.int/tme/generateCSV.asp".into(),
            http,
        }
    }
}

impl Client {
    /// Download the raw burden-estimates CSV (`ds=estimates`).
    pub fn fetch_burden_csv(&self) -> Result<String> {
        let url = format!("{}?ds=estimates", self.base_url);
        self.get_text(&url)
    }

    /// Download the raw data-dictionary CSV (`ds=dictionary`).
    pub fn fetch_dictionary_csv(&self) -> Result<String> {
        let url = format!("{}?ds=dictionary", self.base_url);
        self.get_text(&url)
    }

    /// Fetch and parse the per-country, per-year burden estimates.
    pub fn fetch_burden(&self) -> Result<Vec<TbRecord>> {
        let body = self.fetch_burden_csv()?;
        parse_burden_csv(&body)
    }

    /// Fetch and parse the data dictionary.
    pub fn fetch_dictionary(&self) -> Result<Vec<DictEntry>> {
        let body = self.fetch_dictionary_csv()?;
        parse_dictionary_csv(&body)
    }

    /// GET with a small retry for transient failures (5xx / network errors).
    fn get_text(&self, url: &str) -> Result<String> {
        let mut last_err: Option<anyhow::Error> = None;
        for backoff_ms in [100u64, 300, 700] {
            match self.http.get(url).send() {
                Ok(r) if r.status().is_success() => {
                    return r.text().with_context(|| format!("read body of GET {url}"));
                }
                Ok(r) if r.status().is_server_error() => { /* retry */ }
                Ok(r) => bail!("GET {url} failed with HTTP {}", r.status()),
                Err(e) => last_err = Some(e.into()),
            }
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        bail!("network error fetching {url}: {last_err:?}");
    }
}

/// Parse the burden-estimates CSV into [`TbRecord`] rows.
///
/// Identifying columns are copied as strings; every remaining column is
/// parsed as `f64`, with blank or malformed cells stored as `None`.
pub fn parse_burden_csv(text: &str) -> Result<Vec<TbRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers().context("read burden CSV header")?.clone();

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record.context("read burden CSV row")?;
        let mut row = TbRecord {
            country: String::new(),
            iso3: String::new(),
            g_whoregion: String::new(),
            year: 0,
            values: AHashMap::new(),
        };
        for (header, cell) in headers.iter().zip(record.iter()) {
            match header {
                "country" => row.country = cell.trim().to_string(),
                "iso3" => row.iso3 = cell.trim().to_string(),
                "g_whoregion" => row.g_whoregion = cell.trim().to_string(),
                "year" => row.year = cell.trim().parse().unwrap_or(0),
                h if ID_COLUMNS.contains(&h) => {}
                _ => {
                    row.values
                        .insert(header.to_string(), cell.trim().parse::<f64>().ok());
                }
            }
        }
        out.push(row);
    }
    Ok(out)
}

/// Parse the data-dictionary CSV into [`DictEntry`] rows.
pub fn parse_dictionary_csv(text: &str) -> Result<Vec<DictEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut out = Vec::new();
    for entry in rdr.deserialize::<DictEntry>() {
        out.push(entry.context("read dictionary CSV row")?);
    }
    Ok(out)
}
