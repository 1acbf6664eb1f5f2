use ahash::AHashMap;
use tbi_rs::models::{CustomGroup, StatKind, SummaryOptions, TbRecord};
use tbi_rs::stats::summarise_metric_seeded;

fn rec(country: &str, region: &str, year: i32, cells: &[(&str, Option<f64>)]) -> TbRecord {
    let mut values = AHashMap::new();
    for (k, v) in cells {
        values.insert((*k).to_string(), *v);
    }
    TbRecord {
        country: country.into(),
        iso3: country.chars().take(3).collect::<String>().to_uppercase(),
        g_whoregion: region.into(),
        year,
        values,
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn global_rate_matches_pooled_ratio() {
    // (10 + 5) / (1000 + 500) * 1e5 = 1000
    let rows = vec![
        rec("X", "EUR", 2019, &[("cases", Some(10.0)), ("e_pop_num", Some(1000.0))]),
        rec("Y", "EUR", 2019, &[("cases", Some(5.0)), ("e_pop_num", Some(500.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1e5,
        compare_to_world: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].area, "Global");
    assert_eq!(got[0].year, 2019);
    assert!(close(got[0].value.unwrap(), 1000.0));
}

#[test]
fn prop_is_rate_with_unit_scale() {
    let rows = vec![
        rec("X", "EUR", 2019, &[("cases", Some(10.0)), ("e_pop_num", Some(1000.0))]),
        rec("Y", "EUR", 2019, &[("cases", Some(5.0)), ("e_pop_num", Some(500.0))]),
    ];
    let rate_opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        compare_to_world: true,
        ..Default::default()
    };
    let prop_opts = SummaryOptions {
        stat: StatKind::Prop,
        rate_scale: 1e5, // caller-supplied scale must be ignored
        ..rate_opts.clone()
    };
    let rate = summarise_metric_seeded(&rows, &rate_opts, 7).unwrap();
    let prop = summarise_metric_seeded(&rows, &prop_opts, 7).unwrap();
    assert!(close(rate[0].value.unwrap(), prop[0].value.unwrap()));
    assert!(close(prop[0].value.unwrap(), 0.01));
}

#[test]
fn rate_pools_bounds_with_point_fallback() {
    // Y has no bound cells; its point value stands in for both.
    let rows = vec![
        rec(
            "X",
            "EUR",
            2019,
            &[
                ("cases", Some(10.0)),
                ("cases_lo", Some(8.0)),
                ("cases_hi", Some(12.0)),
                ("e_pop_num", Some(1000.0)),
            ],
        ),
        rec(
            "Y",
            "EUR",
            2019,
            &[
                ("cases", Some(5.0)),
                ("cases_lo", None),
                ("cases_hi", None),
                ("e_pop_num", Some(500.0)),
            ],
        ),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        compare_to_world: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert!(close(got[0].value.unwrap(), 15.0 / 1500.0));
    assert!(close(got[0].lo.unwrap(), 13.0 / 1500.0));
    assert!(close(got[0].hi.unwrap(), 17.0 / 1500.0));
}

#[test]
fn area_order_is_country_custom_regions_global() {
    let rows = vec![
        rec("Alpha", "EUR", 2019, &[("cases", Some(1.0)), ("e_pop_num", Some(10.0))]),
        rec("Beta", "AFR", 2019, &[("cases", Some(2.0)), ("e_pop_num", Some(10.0))]),
        rec("Gamma", "AMR", 2019, &[("cases", Some(3.0)), ("e_pop_num", Some(10.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["Gamma".into()],
        custom_groups: vec![CustomGroup {
            name: "My pool".into(),
            countries: vec!["Alpha".into(), "Beta".into()],
        }],
        compare_all_regions: true,
        compare_to_world: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    let areas: Vec<&str> = got.iter().map(|r| r.area.as_str()).collect();
    assert_eq!(
        areas,
        vec!["Gamma", "My pool", "AFR", "AMR", "EUR", "Global"]
    );
}

#[test]
fn years_filter_is_an_exact_set() {
    let rows = vec![
        rec("X", "EUR", 2018, &[("cases", Some(1.0)), ("e_pop_num", Some(10.0))]),
        rec("X", "EUR", 2019, &[("cases", Some(2.0)), ("e_pop_num", Some(10.0))]),
        rec("X", "EUR", 2020, &[("cases", Some(3.0)), ("e_pop_num", Some(10.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["X".into()],
        years: Some(vec![2018, 2020]),
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    let years: Vec<i32> = got.iter().map(|r| r.year).collect();
    assert_eq!(years, vec![2018, 2020]);
}

#[test]
fn annual_change_diffs_and_drops_first_year() {
    let rows = vec![
        rec("X", "EUR", 2018, &[("cases", Some(10.0)), ("e_pop_num", Some(100.0))]),
        rec("X", "EUR", 2019, &[("cases", Some(15.0)), ("e_pop_num", Some(100.0))]),
        // Single-year series: must vanish from the output entirely.
        rec("Y", "EUR", 2018, &[("cases", Some(5.0)), ("e_pop_num", Some(100.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["X".into(), "Y".into()],
        annual_change: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].area, "X");
    assert_eq!(got[0].year, 2019);
    // (0.15 - 0.10) / 0.10 = 0.5
    assert!(close(got[0].value.unwrap(), 0.5));
}

#[test]
fn annual_change_from_zero_is_missing() {
    let rows = vec![
        rec("X", "EUR", 2018, &[("cases", Some(0.0)), ("e_pop_num", Some(100.0))]),
        rec("X", "EUR", 2019, &[("cases", Some(15.0)), ("e_pop_num", Some(100.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["X".into()],
        annual_change: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].value, None);
}

#[test]
fn truncation_clamps_but_keeps_missing() {
    let rows = vec![
        rec("X", "EUR", 2019, &[("delta", Some(-4.0)), ("e_pop_num", Some(1.0))]),
        rec("Y", "EUR", 2019, &[("delta", Some(2.0)), ("e_pop_num", Some(0.0))]),
    ];
    let opts = SummaryOptions {
        metric: "delta".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["X".into(), "Y".into()],
        truncate_at_zero: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert_eq!(got[0].value, Some(0.0)); // clamped
    assert_eq!(got[1].value, None); // zero denominator stays missing
}

#[test]
fn seeded_monte_carlo_is_deterministic() {
    let rows = vec![
        rec(
            "X",
            "EUR",
            2019,
            &[
                ("rate", Some(50.0)),
                ("rate_lo", Some(40.0)),
                ("rate_hi", Some(60.0)),
            ],
        ),
        rec(
            "Y",
            "EUR",
            2019,
            &[
                ("rate", Some(70.0)),
                ("rate_lo", Some(55.0)),
                ("rate_hi", Some(85.0)),
            ],
        ),
    ];
    let opts = SummaryOptions {
        metric: "rate".into(),
        stat: StatKind::Mean,
        compare_to_world: true,
        samples: 500,
        ..Default::default()
    };
    let a = summarise_metric_seeded(&rows, &opts, 42).unwrap();
    let b = summarise_metric_seeded(&rows, &opts, 42).unwrap();
    assert_eq!(a, b);
    // The pooled mean sits between the two point estimates.
    let mean = a[0].value.unwrap();
    assert!(mean > 40.0 && mean < 85.0);
    assert!(a[0].lo.unwrap() < mean && mean < a[0].hi.unwrap());
}

#[test]
fn median_bounds_cover_the_pooled_draws() {
    let rows = vec![rec(
        "X",
        "EUR",
        2019,
        &[
            ("rate", Some(100.0)),
            ("rate_lo", Some(80.0)),
            ("rate_hi", Some(120.0)),
        ],
    )];
    let opts = SummaryOptions {
        metric: "rate".into(),
        stat: StatKind::Median,
        countries: vec!["X".into()],
        samples: 2000,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 9).unwrap();
    let (lo, med, hi) = (
        got[0].lo.unwrap(),
        got[0].value.unwrap(),
        got[0].hi.unwrap(),
    );
    assert!(lo < med && med < hi);
    // sd = 40 / (2 * 1.96) ≈ 10.2; the median of 2000 draws stays close to 100.
    assert!((med - 100.0).abs() < 2.0);
    assert!((lo - 80.0).abs() < 5.0);
    assert!((hi - 120.0).abs() < 5.0);
}

#[test]
fn missing_bound_columns_degrade_to_zero_width() {
    let rows = vec![
        rec("X", "EUR", 2019, &[("rate", Some(50.0))]),
        rec("Y", "EUR", 2019, &[("rate", Some(70.0))]),
    ];
    let opts = SummaryOptions {
        metric: "rate".into(),
        stat: StatKind::Mean,
        compare_to_world: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    // No resampling: the two point values are the whole sample set.
    assert!(close(got[0].value.unwrap(), 60.0));
    assert!(got[0].lo.unwrap() < 60.0 && got[0].hi.unwrap() > 60.0);

    // A single point-only row yields an exactly zero-width interval.
    let single = SummaryOptions {
        countries: vec!["X".into()],
        compare_to_world: false,
        ..opts
    };
    let got = summarise_metric_seeded(&rows, &single, 7).unwrap();
    assert_eq!(got[0].value, got[0].lo);
    assert_eq!(got[0].value, got[0].hi);
    assert!(close(got[0].value.unwrap(), 50.0));
}

#[test]
fn no_groups_requested_yields_only_country_rows() {
    let rows = vec![rec(
        "X",
        "EUR",
        2019,
        &[("cases", Some(1.0)), ("e_pop_num", Some(10.0))],
    )];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        ..Default::default()
    };
    // Nothing requested at all: empty result, not an error.
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    assert!(got.is_empty());
}

#[test]
fn own_region_resolves_from_listed_countries() {
    let rows = vec![
        rec("Alpha", "EUR", 2019, &[("cases", Some(1.0)), ("e_pop_num", Some(10.0))]),
        rec("Beta", "EUR", 2019, &[("cases", Some(3.0)), ("e_pop_num", Some(10.0))]),
        rec("Gamma", "AFR", 2019, &[("cases", Some(5.0)), ("e_pop_num", Some(10.0))]),
    ];
    let opts = SummaryOptions {
        metric: "cases".into(),
        stat: StatKind::Rate,
        rate_scale: 1.0,
        countries: vec!["Alpha".into()],
        compare_to_region: true,
        ..Default::default()
    };
    let got = summarise_metric_seeded(&rows, &opts, 7).unwrap();
    let areas: Vec<&str> = got.iter().map(|r| r.area.as_str()).collect();
    assert_eq!(areas, vec!["Alpha", "EUR"]);
    // EUR pools Alpha and Beta only.
    assert!(close(got[1].value.unwrap(), 4.0 / 20.0));
}

#[test]
fn unsupported_statistic_fails_at_parse_time() {
    use tbi_rs::models::SummaryError;
    let err = "geometric".parse::<StatKind>().unwrap_err();
    assert!(matches!(err, SummaryError::UnsupportedStatistic(_)));
    assert!("RATE".parse::<StatKind>().is_ok());
}
