use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::str::FromStr;
use tbi_rs::models::{CustomGroup, StatKind, SummaryOptions};
use tbi_rs::{Client, api, dict, stats, storage, viz};

#[derive(Parser, Debug)]
#[command(
    name = "tbi",
    version,
    about = "Fetch, cache, summarize & plot WHO TB burden data"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download (or reuse the cached) burden table and optionally save it.
    Get(GetArgs),
    /// Summarize a metric across countries, regions, custom groups, or the world.
    Summarise(SummariseArgs),
    /// Search the WHO data dictionary.
    Dict(DictArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Re-download even if a cached copy exists.
    #[arg(long, default_value_t = false)]
    refresh: bool,
    /// Save the table to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

#[derive(Args, Debug)]
struct SummariseArgs {
    /// Metric column to summarize (e.g., e_inc_num)
    #[arg(short, long, default_value = "e_inc_num")]
    metric: String,
    /// Statistic: mean, median, rate, or prop
    #[arg(short, long, default_value = "rate")]
    stat: String,
    /// Denominator column for rate/prop
    #[arg(long, default_value = "e_pop_num")]
    denominator: String,
    /// Scale applied to rate results (per 100k by default)
    #[arg(long, default_value_t = 1e5)]
    scale: f64,
    /// Countries separated by comma or semicolon (e.g., Germany,France)
    #[arg(short, long)]
    countries: Option<String>,
    /// Also pool each listed country's own WHO region.
    #[arg(long, default_value_t = false)]
    own_region: bool,
    /// Also pool every WHO region.
    #[arg(long, default_value_t = false)]
    all_regions: bool,
    /// Also pool all countries as "Global".
    #[arg(long, default_value_t = false)]
    world: bool,
    /// Custom group as NAME=Country1+Country2 (repeatable).
    #[arg(long = "group")]
    groups: Vec<String>,
    /// Years to keep, separated by comma or semicolon (e.g., 2018,2019)
    #[arg(short, long)]
    years: Option<String>,
    /// Clamp negative results to zero.
    #[arg(long, default_value_t = false)]
    truncate: bool,
    /// Report year-over-year relative change instead of levels.
    #[arg(long, default_value_t = false)]
    annual_change: bool,
    /// Monte Carlo draws per row for mean/median with confidence bounds.
    #[arg(long, default_value_t = 1000)]
    samples: usize,
    /// RNG seed for reproducible Monte Carlo bounds.
    #[arg(long)]
    seed: Option<u64>,
    /// Re-download the burden table even if a cached copy exists.
    #[arg(long, default_value_t = false)]
    refresh: bool,
    /// Save the summary to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Create a chart at the given path (.svg or .png).
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Width of the plot (default 1000).
    #[arg(long, default_value_t = 1000)]
    width: u32,
    /// Height of the plot (default 600).
    #[arg(long, default_value_t = 600)]
    height: u32,
}

#[derive(Args, Debug)]
struct DictArgs {
    /// Search terms (regular expressions) separated by comma or semicolon.
    #[arg(short, long)]
    terms: String,
    /// Also search variable definitions, not just names.
    #[arg(long, default_value_t = false)]
    definitions: bool,
    /// Re-download the dictionary even if a cached copy exists.
    #[arg(long, default_value_t = false)]
    refresh: bool,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Format up to 4 decimals, then trim trailing zeros and trailing dot.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn parse_group(s: &str) -> Result<CustomGroup> {
    let (name, members) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid --group, expected NAME=Country1+Country2"))?;
    Ok(CustomGroup {
        name: name.trim().to_string(),
        countries: members
            .split('+')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    })
}

fn load_burden(client: &Client, refresh: bool) -> Result<Vec<tbi_rs::TbRecord>> {
    let text = storage::cached_text("estimates.csv", refresh, || client.fetch_burden_csv())?;
    api::parse_burden_csv(&text)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Get(args) => cmd_get(args),
        Command::Summarise(args) => cmd_summarise(args),
        Command::Dict(args) => cmd_dict(args),
    }
}

fn cmd_get(args: GetArgs) -> Result<()> {
    let client = Client::default();
    let records = load_burden(&client, args.refresh)?;
    eprintln!("Loaded {} rows", records.len());

    if let Some(path) = args.out.as_ref() {
        let fmt = match args.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        match fmt.as_str() {
            "csv" => storage::save_csv(&records, path)?,
            "json" => storage::save_json(&records, path)?,
            other => anyhow::bail!("unsupported format: {}", other),
        }
        eprintln!("Saved {} rows to {}", records.len(), path.display());
    }

    Ok(())
}

fn cmd_summarise(args: SummariseArgs) -> Result<()> {
    // Validate the configuration before touching network or cache.
    let opts = SummaryOptions {
        metric: args.metric.clone(),
        stat: StatKind::from_str(&args.stat)?,
        denominator: args.denominator.clone(),
        rate_scale: args.scale,
        countries: args.countries.as_deref().map(parse_list).unwrap_or_default(),
        compare_to_region: args.own_region,
        compare_all_regions: args.all_regions,
        compare_to_world: args.world,
        custom_groups: args
            .groups
            .iter()
            .map(|g| parse_group(g))
            .collect::<Result<Vec<_>>>()?,
        years: args
            .years
            .as_deref()
            .map(|s| {
                parse_list(s)
                    .iter()
                    .map(|y| {
                        y.parse::<i32>()
                            .map_err(|_| anyhow::anyhow!("invalid year: {y}"))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?,
        truncate_at_zero: args.truncate,
        annual_change: args.annual_change,
        samples: args.samples,
        ..Default::default()
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let client = Client::default();
    let records = load_burden(&client, args.refresh)?;
    let summary = stats::summarise_metric(&records, &opts, &mut rng)?;

    for r in &summary {
        println!(
            "{}  {}  {}={} [{}, {}]",
            r.area,
            r.year,
            opts.metric,
            fmt_opt(r.value),
            fmt_opt(r.lo),
            fmt_opt(r.hi)
        );
    }

    if let Some(path) = args.out.as_ref() {
        let fmt = match args.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        match fmt.as_str() {
            "csv" => storage::save_summary_csv(&summary, &opts.metric, path)?,
            "json" => storage::save_summary_json(&summary, path)?,
            other => anyhow::bail!("unsupported format: {}", other),
        }
        eprintln!("Saved {} rows to {}", summary.len(), path.display());
    }

    if let Some(plot_path) = args.plot.as_ref() {
        viz::plot_summary(&summary, &opts.metric, plot_path, args.width, args.height)?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }

    Ok(())
}

fn cmd_dict(args: DictArgs) -> Result<()> {
    let client = Client::default();
    let text = storage::cached_text("dictionary.csv", args.refresh, || {
        client.fetch_dictionary_csv()
    })?;
    let entries = api::parse_dictionary_csv(&text)?;
    let terms = parse_list(&args.terms);
    let hits = dict::search_dictionary(&entries, &terms, args.definitions)?;
    for e in &hits {
        println!("{}  [{}]  {}", e.variable_name, e.dataset, e.definition);
    }
    eprintln!("{} of {} variables matched", hits.len(), entries.len());
    Ok(())
}
