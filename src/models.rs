use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors raised before any aggregation happens.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The requested statistic is not one of `mean`, `median`, `rate`, `prop`.
    #[error("unsupported statistic `{0}` (expected mean, median, rate or prop)")]
    UnsupportedStatistic(String),
    /// A custom comparison group is malformed (e.g. has no name).
    #[error("invalid group specification: {0}")]
    InvalidGroupSpecification(String),
}

/// One (country, year) observation row from the WHO TB burden table.
///
/// The WHO export carries a handful of identifying string columns followed by
/// several dozen numeric estimate columns (`e_inc_num`, `e_inc_num_lo`,
/// `e_pop_num`, …). The numeric columns are kept in a name-keyed map so the
/// summariser can address any metric and its bounds without a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TbRecord {
    pub country: String,
    pub iso3: String,
    /// WHO region code (`AFR`, `AMR`, `EMR`, `EUR`, `SEA`, `WPR`).
    pub g_whoregion: String,
    pub year: i32,
    /// Numeric columns keyed by CSV header; `None` marks a blank or
    /// unparsable cell.
    pub values: AHashMap<String, Option<f64>>,
}

impl TbRecord {
    /// Look up a numeric column by name; absent column and missing cell both
    /// read as `None`.
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    /// Whether the column exists in this row at all (even if the cell is blank).
    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }
}

/// One row of the WHO data dictionary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DictEntry {
    pub variable_name: String,
    pub dataset: String,
    pub code_list: String,
    pub definition: String,
}

/// Aggregation method applied to each (area, year) partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    /// Sample mean of pooled (optionally resampled) values with parametric
    /// 95% bounds.
    Mean,
    /// Sample median of pooled (optionally resampled) values with empirical
    /// 2.5/97.5 percentile bounds.
    Median,
    /// `sum(metric) / sum(denominator) * rate_scale`.
    Rate,
    /// Like `Rate` but the scale is forced to 1.
    Prop,
}

impl FromStr for StatKind {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(StatKind::Mean),
            "median" => Ok(StatKind::Median),
            "rate" => Ok(StatKind::Rate),
            "prop" => Ok(StatKind::Prop),
            other => Err(SummaryError::UnsupportedStatistic(other.to_string())),
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatKind::Mean => "mean",
            StatKind::Median => "median",
            StatKind::Rate => "rate",
            StatKind::Prop => "prop",
        };
        f.write_str(s)
    }
}

/// Whether the input table carries usable confidence-bound columns for the
/// summarised metric. Resolved once, up front, from the configured suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounds {
    /// No bound columns: every output interval is zero-width.
    PointOnly,
    /// Bound columns are present; `lo`/`hi` are full column names.
    Interval { lo: String, hi: String },
}

/// A user-named pool of countries summarised as one area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomGroup {
    pub name: String,
    pub countries: Vec<String>,
}

/// Everything the summariser needs to know, spelled out explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOptions {
    /// Primary metric column to summarise.
    pub metric: String,
    pub stat: StatKind,
    /// Denominator column for `Rate`/`Prop`; ignored otherwise.
    pub denominator: String,
    /// Multiplier applied to `Rate` results; forced to 1 for `Prop`.
    pub rate_scale: f64,
    /// Lower/upper bound column suffixes appended to `metric`
    /// (e.g. `("_lo", "_hi")`); `None` disables bounds entirely.
    pub conf: Option<(String, String)>,
    /// Countries reported individually, in this order.
    pub countries: Vec<String>,
    /// Pool each listed country's own WHO region.
    pub compare_to_region: bool,
    /// Pool every WHO region present in the data.
    pub compare_all_regions: bool,
    /// Pool all rows into a single `"Global"` area.
    pub compare_to_world: bool,
    pub custom_groups: Vec<CustomGroup>,
    /// Exact set of years to keep; `None` keeps all.
    pub years: Option<Vec<i32>>,
    /// Clamp numeric outputs to >= 0 (missing values stay missing).
    pub truncate_at_zero: bool,
    /// Replace each series by its year-over-year relative change.
    pub annual_change: bool,
    /// Draws per row for the Monte Carlo path (`Mean`/`Median` with bounds).
    pub samples: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            metric: "e_inc_num".into(),
            stat: StatKind::Rate,
            denominator: "e_pop_num".into(),
            rate_scale: 1e5,
            conf: Some(("_lo".into(), "_hi".into())),
            countries: Vec::new(),
            compare_to_region: false,
            compare_all_regions: false,
            compare_to_world: false,
            custom_groups: Vec::new(),
            years: None,
            truncate_at_zero: false,
            annual_change: false,
            samples: 1000,
        }
    }
}

/// One summarised observation: an area/year pair with a point estimate and
/// its (possibly zero-width) 95% interval. `None` marks a missing result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    pub area: String,
    pub year: i32,
    pub value: Option<f64>,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}
