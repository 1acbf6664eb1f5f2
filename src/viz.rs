//! Render summarised TB burden series as SVG or PNG line charts, with a
//! translucent ribbon for the confidence interval where bounds are present.

use crate::models::SummaryRow;
use anyhow::{Result, anyhow};
use num_format::{Locale, ToFormattedString};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use std::collections::BTreeMap;
use std::path::Path;

/// Map a user-provided locale tag to a num-format Locale.
/// Supported tags (case-insensitive): "en", "de", "fr", "es", "it", "pt", "nl"
fn map_locale(tag: &str) -> &'static Locale {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => &Locale::de,
        "fr" | "fr_fr" => &Locale::fr,
        "es" | "es_es" => &Locale::es,
        "it" | "it_it" => &Locale::it,
        "pt" | "pt_pt" | "pt_br" => &Locale::pt,
        "nl" | "nl_nl" => &Locale::nl,
        _ => &Locale::en,
    }
}

/// Generate a per-area line chart of summary values (default locale = "en").
pub fn plot_summary<P: AsRef<Path>>(
    rows: &[SummaryRow],
    metric_label: &str,
    out_path: P,
    width: u32,
    height: u32,
) -> Result<()> {
    plot_summary_locale(rows, metric_label, out_path, width, height, "en")
}

/// Same as `plot_summary` but with a locale tag for label formatting.
pub fn plot_summary_locale<P: AsRef<Path>>(
    rows: &[SummaryRow],
    metric_label: &str,
    out_path: P,
    width: u32,
    height: u32,
    locale_tag: &str,
) -> Result<()> {
    if rows.is_empty() {
        return Err(anyhow!("no data to plot"));
    }

    let out_path = out_path.as_ref();
    let path_string = out_path.to_string_lossy().into_owned();

    let years: Vec<i32> = rows.iter().map(|r| r.year).collect();
    let (mut min_year, mut max_year) = (
        *years.iter().min().ok_or_else(|| anyhow!("no years"))?,
        *years.iter().max().ok_or_else(|| anyhow!("no years"))?,
    );
    if min_year == max_year {
        min_year -= 1;
        max_year += 1;
    }

    let values: Vec<f64> = rows
        .iter()
        .flat_map(|r| [r.value, r.lo, r.hi])
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(anyhow!("no numeric values to plot"));
    }
    let (mut min_val, mut max_val) = (
        values.iter().cloned().fold(f64::INFINITY, f64::min),
        values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    );
    if (max_val - min_val).abs() < f64::EPSILON {
        min_val -= 1.0;
        max_val += 1.0;
    }

    let num_locale = map_locale(locale_tag);

    if out_path.extension().and_then(|s| s.to_str()) == Some("svg") {
        let root = SVGBackend::new(path_string.as_str(), (width, height)).into_drawing_area();
        draw_chart(
            root, rows, metric_label, min_year, max_year, min_val, max_val, num_locale,
        )?;
    } else {
        let root = BitMapBackend::new(path_string.as_str(), (width, height)).into_drawing_area();
        draw_chart(
            root, rows, metric_label, min_year, max_year, min_val, max_val, num_locale,
        )?;
    }

    Ok(())
}

/// Helper that draws to any Plotters backend.
#[allow(clippy::too_many_arguments)]
fn draw_chart<DB>(
    root: DrawingArea<DB, Shift>,
    rows: &[SummaryRow],
    metric_label: &str,
    min_year: i32,
    max_year: i32,
    min_val: f64,
    max_val: f64,
    num_locale: &Locale,
) -> Result<()>
where
    DB: DrawingBackend,
{
    root.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(metric_label, ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 44)
        .build_cartesian_2d(min_year..max_year, min_val..max_val)
        .map_err(|e| anyhow!("{:?}", e))?;

    // Y labels: thousands separators for large values, two decimals otherwise.
    let y_label_fmt = move |v: &f64| {
        if v.abs() >= 1000.0 {
            ((*v).round() as i64).to_formatted_string(num_locale)
        } else {
            format!("{:.2}", v)
        }
    };
    let x_label_fmt = |y: &i32| y.to_string();

    // Limit label counts to avoid overlap
    let x_label_count = ((max_year - min_year + 1) as usize).min(12);
    let y_label_count = 10usize;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc(metric_label)
        .x_labels(x_label_count)
        .y_labels(y_label_count)
        .x_label_formatter(&x_label_fmt)
        .y_label_formatter(&y_label_fmt)
        .label_style(("sans-serif", 14))
        .axis_desc_style(("sans-serif", 16))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    let mut series: BTreeMap<&str, Vec<&SummaryRow>> = BTreeMap::new();
    for r in rows {
        series.entry(r.area.as_str()).or_default().push(r);
    }
    for rows in series.values_mut() {
        rows.sort_by_key(|r| r.year);
    }

    for (idx, (area, rows)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();

        // Confidence ribbon: lower bound forward, upper bound back.
        let mut band: Vec<(i32, f64)> = rows
            .iter()
            .filter_map(|r| r.lo.map(|lo| (r.year, lo)))
            .collect();
        let upper: Vec<(i32, f64)> = rows
            .iter()
            .filter_map(|r| r.hi.map(|hi| (r.year, hi)))
            .collect();
        if band.len() > 1 && band.len() == upper.len() {
            band.extend(upper.into_iter().rev());
            chart
                .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2))))
                .map_err(|e| anyhow!("{:?}", e))?;
        }

        let line: Vec<(i32, f64)> = rows
            .iter()
            .filter_map(|r| r.value.map(|v| (r.year, v)))
            .collect();
        let style = ShapeStyle {
            color: color.clone(),
            filled: false,
            stroke_width: 2,
        };
        chart
            .draw_series(LineSeries::new(line, style))
            .map_err(|e| anyhow!("{:?}", e))?
            .label(area.to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], color.clone()));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.85))
        .label_font(("sans-serif", 14))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    root.present().map_err(|e| anyhow!("{:?}", e))?;
    Ok(())
}
