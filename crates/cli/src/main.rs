//! wxkrige CLI - daily station kriging onto polygon grids

mod config;
mod logging;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::info;

use wxkrige_algorithms::interpolation::FitPolicy;
use wxkrige_algorithms::zones::ZoneIndex;
use wxkrige_core::io::{read_grid, read_stations};
use wxkrige_core::{GridDefinition, PredictionLattice, StationDataset};
use wxkrige_pipeline::{DayObserver, DayState, GeoTiffSink, Pipeline, RunReport, SurfaceSink};

use config::RunConfig;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wxkrige")]
#[command(author, version, about = "Daily station kriging onto polygon grids", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpolate every selected day and write the (day, cell) table
    Run(RunArgs),
    /// Summarise station data and grid without interpolating
    Info(InputArgs),
}

/// Input location overrides shared by every subcommand
#[derive(Args)]
struct InputArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Station observation CSV
    #[arg(long)]
    stations: Option<PathBuf>,
    /// Grid polygon GeoJSON
    #[arg(long)]
    grid: Option<PathBuf>,
    /// Working CRS EPSG code
    #[arg(long)]
    working_epsg: Option<u32>,
    /// Target number of prediction lattice points
    #[arg(long)]
    lattice_points: Option<usize>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Result CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Issue summary JSON
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Variogram diagnostics CSV
    #[arg(long)]
    diagnostics: Option<PathBuf>,
    /// Directory for GeoTIFF estimate/variance surfaces
    #[arg(long)]
    surfaces: Option<PathBuf>,
    /// First day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Explicit day to process; repeatable
    #[arg(long = "date")]
    dates: Vec<NaiveDate>,
    /// Variable to interpolate; repeatable
    #[arg(long = "variable")]
    variables: Vec<String>,
    /// Maximum worker threads
    #[arg(short = 'j', long)]
    workers: Option<usize>,
    /// Variogram fit policy: fixed or fit
    #[arg(long)]
    fit_policy: Option<String>,
    /// Number of variogram lag bins
    #[arg(long)]
    n_lags: Option<usize>,
    /// Local kriging neighbourhood size
    #[arg(long)]
    max_points: Option<usize>,
    /// Local kriging search radius (working CRS units)
    #[arg(long)]
    max_radius: Option<f64>,
    /// Per-day time limit in seconds
    #[arg(long)]
    timeout: Option<f64>,
    /// Also compute kriging variance
    #[arg(long)]
    variance: bool,
    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

// ─── Progress ───────────────────────────────────────────────────────────

/// Day progress bar; failed days are printed above it
struct DayProgress {
    bar: ProgressBar,
}

impl DayProgress {
    fn new(days: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(days as u64)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl DayObserver for DayProgress {
    fn day_finished(&self, date: NaiveDate, state: DayState, elapsed: Duration) {
        if state == DayState::Failed {
            self.bar.println(format!("  {date}: failed after {elapsed:.2?}"));
        }
        self.bar.inc(1);
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn load_config(args: &InputArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(path) = &args.stations {
        config.input.stations = Some(path.clone());
    }
    if let Some(path) = &args.grid {
        config.input.grid = Some(path.clone());
    }
    if let Some(epsg) = args.working_epsg {
        config.input.working_epsg = epsg;
    }
    if let Some(n) = args.lattice_points {
        config.pipeline.lattice_points = n;
    }
    Ok(config)
}

fn apply_run_overrides(config: &mut RunConfig, args: &RunArgs) -> Result<()> {
    let output = &mut config.output;
    if let Some(path) = &args.output {
        output.results = path.clone();
    }
    if args.summary.is_some() {
        output.summary = args.summary.clone();
    }
    if args.diagnostics.is_some() {
        output.diagnostics = args.diagnostics.clone();
    }
    if args.surfaces.is_some() {
        output.surfaces = args.surfaces.clone();
    }

    let pipeline = &mut config.pipeline;
    if args.start.is_some() {
        pipeline.days.start = args.start;
    }
    if args.end.is_some() {
        pipeline.days.end = args.end;
    }
    if !args.dates.is_empty() {
        pipeline.days.dates = args.dates.clone();
    }
    if !args.variables.is_empty() {
        pipeline.variables = args.variables.clone();
    }
    if args.workers.is_some() {
        pipeline.max_workers = args.workers;
    }
    if let Some(policy) = &args.fit_policy {
        pipeline.fit_policy = parse_fit_policy(policy)?;
    }
    if let Some(n) = args.n_lags {
        pipeline.n_lags = n;
    }
    if args.max_points.is_some() {
        pipeline.max_points = args.max_points;
    }
    if args.max_radius.is_some() {
        pipeline.max_radius = args.max_radius;
    }
    if args.timeout.is_some() {
        pipeline.day_timeout_secs = args.timeout;
    }
    if args.variance {
        pipeline.compute_variance = true;
    }
    Ok(())
}

fn parse_fit_policy(s: &str) -> Result<FitPolicy> {
    match s.to_lowercase().as_str() {
        "fixed" | "heuristic" => Ok(FitPolicy::Fixed),
        "fit" | "wls" => Ok(FitPolicy::Fit),
        _ => anyhow::bail!("Unknown fit policy: {}. Use fixed or fit.", s),
    }
}

fn load_inputs(config: &RunConfig) -> Result<(StationDataset, GridDefinition)> {
    let crs = config.working_crs()?;

    let stations_path = config.stations_path()?;
    let pb = spinner("Reading stations...");
    let dataset = read_stations(stations_path, &config.input.csv, crs)
        .with_context(|| format!("Failed to read stations from {}", stations_path.display()))?;
    pb.finish_and_clear();

    let grid_path = config.grid_path()?;
    let pb = spinner("Reading grid...");
    let grid = read_grid(grid_path, &config.input.geojson, crs)
        .with_context(|| format!("Failed to read grid from {}", grid_path.display()))?;
    pb.finish_and_clear();

    info!(
        "Loaded {} stations over {} days, {} grid cells in {}",
        dataset.stations().len(),
        dataset.day_count(),
        grid.len(),
        crs
    );
    Ok((dataset, grid))
}

fn write_outputs(report: &RunReport, config: &RunConfig) -> Result<()> {
    let output = &config.output;
    report
        .table
        .write_csv_path(&output.results)
        .with_context(|| format!("Failed to write {}", output.results.display()))?;
    println!("Results saved to: {}", output.results.display());

    if let Some(path) = &output.summary {
        report
            .write_summary_json_path(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Issue summary saved to: {}", path.display());
    }
    if let Some(path) = &output.diagnostics {
        report
            .write_diagnostics_csv_path(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Variogram diagnostics saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Days: {} ({} done, {} failed)",
        report.days.len(),
        report.days_done(),
        report.days_failed()
    );
    println!("Rows: {}", report.table.len());
    for (name, count) in report.table.variables().iter().zip(report.table.value_counts()) {
        println!("  {name}: {count} values");
    }
    if !report.issues.is_empty() {
        println!("Issues: {}", report.issues.len());
    }
    println!("  Processing time: {:.2?}", report.elapsed);
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

// ─── Commands ───────────────────────────────────────────────────────────

/// Returns whether any day produced a value
fn run(args: RunArgs) -> Result<bool> {
    let mut config = load_config(&args.input)?;
    apply_run_overrides(&mut config, &args)?;
    let (dataset, grid) = load_inputs(&config)?;

    let start = Instant::now();
    let pipeline = Pipeline::new(&dataset, &grid, config.pipeline.clone()).context("Setup failed")?;

    let sink = match &config.output.surfaces {
        Some(dir) => Some(
            GeoTiffSink::new(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?,
        ),
        None => None,
    };
    let days = pipeline.selected_days();
    let progress = DayProgress::new(days.len(), args.quiet);
    let report = pipeline
        .run(&progress, sink.as_ref().map(|s| s as &dyn SurfaceSink))
        .context("Run failed")?;
    progress.bar.finish_and_clear();
    info!("Pipeline finished in {:.2?}", start.elapsed());

    for path in [Some(&config.output.results), config.output.summary.as_ref(), config.output.diagnostics.as_ref()]
        .into_iter()
        .flatten()
    {
        ensure_parent(path)?;
    }
    write_outputs(&report, &config)?;
    print_summary(&report);

    if !report.is_success() {
        eprintln!(
            "No day produced a value: {} of {} day(s) failed",
            report.days_failed(),
            report.days.len()
        );
    }
    Ok(report.is_success())
}

fn info_cmd(args: InputArgs) -> Result<()> {
    let config = load_config(&args)?;
    let (dataset, grid) = load_inputs(&config)?;

    println!("Stations: {}", dataset.stations().len());
    match dataset.date_range() {
        Some((first, last)) => println!("Days: {} ({first} to {last})", dataset.day_count()),
        None => println!("Days: 0"),
    }
    println!("Variables:");
    for (name, count) in dataset.variables().iter().zip(dataset.coverage()) {
        println!("  {name}: {count} readings");
    }

    println!("Grid cells: {}", grid.len());
    println!("CRS: {}", grid.crs());
    let bounds = grid.bounds().context("Grid has no extent")?;
    println!(
        "Bounds: ({:.1}, {:.1}) - ({:.1}, {:.1})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );

    let lattice = PredictionLattice::from_extent(bounds, config.pipeline.lattice_points, grid.crs())
        .context("Failed to build prediction lattice")?;
    let zones = ZoneIndex::build(&grid, &lattice);
    let empty = zones.cells_per_zone().iter().filter(|&&c| c == 0).count();
    println!(
        "Lattice: {} x {} ({} points, cell size {:.1})",
        lattice.cols(),
        lattice.rows(),
        lattice.len(),
        lattice.cell_size()
    );
    println!(
        "  Inside grid: {} ({:.1}%)",
        zones.covered_cells(),
        100.0 * zones.covered_cells() as f64 / lattice.len() as f64
    );
    if empty > 0 {
        println!("  Cells without lattice points: {empty}");
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let success = match cli.command {
        Commands::Run(args) => run(args)?,
        Commands::Info(args) => {
            info_cmd(args)?;
            true
        }
    };
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::from(2) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn fit_policy_names() {
        assert_eq!(parse_fit_policy("Fixed").unwrap(), FitPolicy::Fixed);
        assert_eq!(parse_fit_policy("fit").unwrap(), FitPolicy::Fit);
        assert!(parse_fit_policy("gaussian").is_err());
    }

    #[test]
    fn command_line_overrides_config() {
        let cli = Cli::try_parse_from([
            "wxkrige", "run", "--stations", "s.csv", "--grid", "g.geojson", "--date", "2020-01-02",
            "--date", "2020-01-01", "--variable", "tmax", "-j", "2", "--fit-policy", "fit",
            "--variance", "-o", "out.csv",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut config = load_config(&args.input).unwrap();
        apply_run_overrides(&mut config, &args).unwrap();
        assert_eq!(config.stations_path().unwrap(), Path::new("s.csv"));
        assert_eq!(config.output.results, PathBuf::from("out.csv"));
        assert_eq!(config.pipeline.days.dates.len(), 2);
        assert_eq!(config.pipeline.variables, ["tmax"]);
        assert_eq!(config.pipeline.max_workers, Some(2));
        assert_eq!(config.pipeline.fit_policy, FitPolicy::Fit);
        assert!(config.pipeline.compute_variance);
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["wxkrige", "-vv", "info", "--stations", "s.csv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let stations = dir.path().join("stations.csv");
        let mut csv = String::from("station,date,lon,lat,tmax\n");
        for (i, (lon, lat)) in [(-99.9, 40.1), (-99.2, 40.8), (-98.6, 40.3), (-98.1, 40.9), (-99.5, 40.5)]
            .iter()
            .enumerate()
        {
            csv.push_str(&format!("S{i},2020-06-01,{lon},{lat},{}\n", 20.0 + i as f64));
            csv.push_str(&format!("S{i},2020-06-02,{lon},{lat},NA\n"));
        }
        std::fs::write(&stations, csv).unwrap();

        let grid = dir.path().join("grid.geojson");
        std::fs::write(
            &grid,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"id":"a"},"geometry":{"type":"Polygon",
                 "coordinates":[[[-100,40],[-99,40],[-99,41],[-100,41],[-100,40]]]}},
                {"type":"Feature","properties":{"id":"b"},"geometry":{"type":"Polygon",
                 "coordinates":[[[-99,40],[-98,40],[-98,41],[-99,41],[-99,40]]]}}]}"#,
        )
        .unwrap();

        let results = dir.path().join("out").join("results.csv");
        let summary = dir.path().join("out").join("summary.json");
        let argv: Vec<OsString> = vec![
            "wxkrige".into(),
            "run".into(),
            "--stations".into(),
            stations.into_os_string(),
            "--grid".into(),
            grid.into_os_string(),
            "--lattice-points".into(),
            "300".into(),
            "--quiet".into(),
            "-j".into(),
            "1".into(),
            "-o".into(),
            results.clone().into_os_string(),
            "--summary".into(),
            summary.clone().into_os_string(),
        ];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        assert!(run(args).unwrap());
        let text = std::fs::read_to_string(&results).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,cell_id,tmax");
        assert_eq!(lines.len(), 1 + 2 * 2);
        assert!(lines[3].ends_with("b,"), "second day is missing: {}", lines[3]);
        assert!(summary.exists());
    }
}
