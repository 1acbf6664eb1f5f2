//! Summarise TB burden metrics across countries, WHO regions, custom country
//! pools and the world.
//!
//! The pipeline selects the rows belonging to each requested area, computes
//! one statistic per (area, year) partition — pooled rates/proportions, or
//! mean/median with Monte Carlo uncertainty propagation when confidence
//! bounds are available — and returns ordered [`SummaryRow`]s: explicit
//! countries first (input order), then custom groups, then regions
//! (alphabetical), then `"Global"`.

use crate::models::{
    Bounds, StatKind, SummaryError, SummaryOptions, SummaryRow, TbRecord,
};
use log::warn;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// 97.5% normal quantile; a 95% CI under normality spans `2 * Z_95` standard
/// deviations.
const Z_95: f64 = 1.959_963_984_540_054;

/// Run the summariser with a fresh RNG seeded from `seed`.
///
/// Identical inputs and seed produce identical output, including the Monte
/// Carlo bounds.
pub fn summarise_metric_seeded(
    records: &[TbRecord],
    opts: &SummaryOptions,
    seed: u64,
) -> Result<Vec<SummaryRow>, SummaryError> {
    let mut rng = StdRng::seed_from_u64(seed);
    summarise_metric(records, opts, &mut rng)
}

/// Summarise one metric according to `opts`, drawing Monte Carlo samples from
/// `rng` when the statistic is `Mean`/`Median` and bound columns are present.
///
/// Returns rows ordered by area (countries, custom groups, regions, Global)
/// and then year ascending. Data-quality problems (zero denominators,
/// non-finite arithmetic) become missing values, never errors.
pub fn summarise_metric<R: Rng>(
    records: &[TbRecord],
    opts: &SummaryOptions,
    rng: &mut R,
) -> Result<Vec<SummaryRow>, SummaryError> {
    for g in &opts.custom_groups {
        if g.name.trim().is_empty() {
            return Err(SummaryError::InvalidGroupSpecification(
                "custom group without a name".into(),
            ));
        }
    }

    let bounds = resolve_bounds(records, opts);
    let groups = assemble_groups(records, opts);

    let mut out: Vec<SummaryRow> = Vec::new();
    for (label, members) in groups {
        let mut by_year: BTreeMap<i32, Vec<&TbRecord>> = BTreeMap::new();
        for r in members {
            let keep = opts.years.as_ref().is_none_or(|ys| ys.contains(&r.year));
            if keep {
                by_year.entry(r.year).or_default().push(r);
            }
        }
        for (year, rows) in by_year {
            let (value, lo, hi) = match opts.stat {
                StatKind::Rate | StatKind::Prop => pooled_rate(&rows, opts, &bounds),
                StatKind::Mean => {
                    let samples = pooled_samples(&rows, opts, &bounds, rng);
                    mean_interval(&samples)
                }
                StatKind::Median => {
                    let mut samples = pooled_samples(&rows, opts, &bounds, rng);
                    median_interval(&mut samples)
                }
            };
            out.push(SummaryRow {
                area: label.clone(),
                year,
                value: postprocess(value, opts),
                lo: postprocess(lo, opts),
                hi: postprocess(hi, opts),
            });
        }
    }

    if opts.annual_change {
        out = annual_change(out);
    }
    Ok(out)
}

/// Decide once whether the metric's bound columns exist in the data.
fn resolve_bounds(records: &[TbRecord], opts: &SummaryOptions) -> Bounds {
    let Some((lo_suffix, hi_suffix)) = &opts.conf else {
        return Bounds::PointOnly;
    };
    let lo = format!("{}{}", opts.metric, lo_suffix);
    let hi = format!("{}{}", opts.metric, hi_suffix);
    if records.iter().any(|r| r.has_field(&lo) && r.has_field(&hi)) {
        Bounds::Interval { lo, hi }
    } else {
        warn!(
            "confidence columns {lo}/{hi} not found; summarising point estimates only"
        );
        Bounds::PointOnly
    }
}

/// Build the (label, member rows) list in final output order.
fn assemble_groups<'a>(
    records: &'a [TbRecord],
    opts: &SummaryOptions,
) -> Vec<(String, Vec<&'a TbRecord>)> {
    let mut groups: Vec<(String, Vec<&TbRecord>)> = Vec::new();

    let mut seen_countries: BTreeSet<&str> = BTreeSet::new();
    for country in &opts.countries {
        if !seen_countries.insert(country.as_str()) {
            continue;
        }
        let members = records.iter().filter(|r| &r.country == country).collect();
        groups.push((country.clone(), members));
    }

    for custom in &opts.custom_groups {
        let members = records
            .iter()
            .filter(|r| custom.countries.contains(&r.country))
            .collect();
        groups.push((custom.name.clone(), members));
    }

    // BTreeSet keeps regions alphabetical.
    let mut regions: BTreeSet<String> = BTreeSet::new();
    if opts.compare_all_regions {
        regions.extend(
            records
                .iter()
                .filter(|r| !r.g_whoregion.is_empty())
                .map(|r| r.g_whoregion.clone()),
        );
    } else if opts.compare_to_region {
        regions.extend(
            records
                .iter()
                .filter(|r| opts.countries.contains(&r.country) && !r.g_whoregion.is_empty())
                .map(|r| r.g_whoregion.clone()),
        );
    }
    for region in regions {
        let members = records.iter().filter(|r| r.g_whoregion == region).collect();
        groups.push((region, members));
    }

    if opts.compare_to_world {
        groups.push(("Global".to_string(), records.iter().collect()));
    }

    groups
}

/// `sum(metric) / sum(denominator) * scale` over one (area, year) partition.
///
/// Missing metric/denominator cells count as zero in the sums; a missing
/// bound cell contributes the row's point value (zero-width interval). A zero
/// denominator sum yields a missing result.
fn pooled_rate(
    rows: &[&TbRecord],
    opts: &SummaryOptions,
    bounds: &Bounds,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    let scale = if opts.stat == StatKind::Prop {
        1.0
    } else {
        opts.rate_scale
    };

    let mut metric_sum = 0.0;
    let mut denom_sum = 0.0;
    let mut lo_sum = 0.0;
    let mut hi_sum = 0.0;
    for r in rows {
        let point = r.value(&opts.metric).unwrap_or(0.0);
        metric_sum += point;
        denom_sum += r.value(&opts.denominator).unwrap_or(0.0);
        if let Bounds::Interval { lo, hi } = bounds {
            lo_sum += r.value(lo).unwrap_or(point);
            hi_sum += r.value(hi).unwrap_or(point);
        }
    }

    if denom_sum == 0.0 {
        return (None, None, None);
    }
    let value = Some(metric_sum / denom_sum * scale);
    match bounds {
        Bounds::Interval { .. } => (
            value,
            Some(lo_sum / denom_sum * scale),
            Some(hi_sum / denom_sum * scale),
        ),
        Bounds::PointOnly => (value, value, value),
    }
}

/// Pool the partition's values for the `Mean`/`Median` paths.
///
/// With live bounds each row contributes `opts.samples` normal draws centred
/// on its point estimate with `sd = (hi - lo) / (2 * Z_95)`; without bounds
/// each row contributes its point value once. Rows with a missing point are
/// skipped.
fn pooled_samples<R: Rng>(
    rows: &[&TbRecord],
    opts: &SummaryOptions,
    bounds: &Bounds,
    rng: &mut R,
) -> Vec<f64> {
    let mut samples = Vec::new();
    for r in rows {
        let Some(point) = r.value(&opts.metric) else {
            continue;
        };
        match bounds {
            Bounds::Interval { lo, hi } => {
                let lo_v = r.value(lo).unwrap_or(point);
                let hi_v = r.value(hi).unwrap_or(point);
                let sd = ((hi_v - lo_v) / (2.0 * Z_95)).max(0.0);
                match Normal::new(point, sd) {
                    Ok(dist) => {
                        samples.extend(dist.sample_iter(&mut *rng).take(opts.samples));
                    }
                    // Non-finite sd; fall back to the point value.
                    Err(_) => samples.push(point),
                }
            }
            Bounds::PointOnly => samples.push(point),
        }
    }
    samples
}

/// Sample mean with parametric 95% bounds (`mean ± Z_95 * sd`).
fn mean_interval(samples: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if samples.is_empty() {
        return (None, None, None);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let sd = if samples.len() > 1 {
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    (Some(mean), Some(mean - Z_95 * sd), Some(mean + Z_95 * sd))
}

/// Sample median with empirical 2.5/97.5 percentile bounds.
fn median_interval(samples: &mut [f64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if samples.is_empty() {
        return (None, None, None);
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    (
        Some(quantile_sorted(samples, 0.5)),
        Some(quantile_sorted(samples, 0.025)),
        Some(quantile_sorted(samples, 0.975)),
    )
}

/// Linear-interpolation quantile of an ascending slice (R's default type 7).
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let idx = h.floor() as usize;
    let frac = h - idx as f64;
    if idx + 1 < n {
        sorted[idx] + frac * (sorted[idx + 1] - sorted[idx])
    } else {
        sorted[n - 1]
    }
}

/// Map non-finite results to missing and apply the zero clamp. Missing values
/// are never turned into zero.
fn postprocess(v: Option<f64>, opts: &SummaryOptions) -> Option<f64> {
    let v = v.filter(|x| x.is_finite());
    if opts.truncate_at_zero {
        v.map(|x| x.max(0.0))
    } else {
        v
    }
}

/// Replace each area's series with year-over-year relative change.
///
/// The first year of every series is dropped; a division by zero or missing
/// neighbour yields a missing value.
fn annual_change(rows: Vec<SummaryRow>) -> Vec<SummaryRow> {
    let relative = |prev: Option<f64>, cur: Option<f64>| -> Option<f64> {
        match (prev, cur) {
            (Some(p), Some(c)) => {
                let r = (c - p) / p;
                r.is_finite().then_some(r)
            }
            _ => None,
        }
    };

    let mut out = Vec::new();
    // Rows arrive grouped by area with years ascending.
    for pair in rows.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if prev.area != cur.area {
            continue;
        }
        out.push(SummaryRow {
            area: cur.area.clone(),
            year: cur.year,
            value: relative(prev.value, cur.value),
            lo: relative(prev.lo, cur.lo),
            hi: relative(prev.hi, cur.hi),
        });
    }
    out
}
