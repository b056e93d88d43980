//! Atmospheric state interpolation service.
//!
//! Interpolates the atmospheric bands of a reference state raster onto a
//! target location grid and writes a BIL output raster, optionally smoothed.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use atm_interpolation::{atm_interpolation, InterpolationConfig, InterpolationPaths, TracingSink};

#[derive(Parser, Debug)]
#[command(name = "atm-interpolator")]
#[command(about = "Interpolate atmospheric state from reference pixels onto a target grid")]
struct Args {
    /// Reference state raster (atmosphere and reflectance bands)
    reference_state: PathBuf,

    /// Reference location raster (lat, lon, elevation)
    reference_locations: PathBuf,

    /// Target location raster (lat, lon, elevation)
    input_locations: PathBuf,

    /// Output raster path
    output: PathBuf,

    /// Segmentation label raster matching the target grid
    #[arg(long)]
    segmentation: Option<PathBuf>,

    /// Neighbors per local regression
    #[arg(long)]
    nneighbors: Option<usize>,

    /// Nodata value of target locations and output
    #[arg(long, allow_negative_numbers = true)]
    nodata_value: Option<f64>,

    /// Worker count, -1 for all available cores
    #[arg(long, allow_negative_numbers = true)]
    n_cores: Option<i64>,

    /// Gaussian smoothing sigma in pixels, 0 disables smoothing
    #[arg(long, allow_negative_numbers = true)]
    smoothing_sigma: Option<f64>,

    /// YAML configuration file
    #[arg(short, long, env = "ATM_CONFIG")]
    config: Option<PathBuf>,

    /// Write the run summary as YAML to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Log file (default: stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(args) {
        error!(error = %format!("{:#}", e), "Interpolation failed");
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let (writer, ansi) = match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(true);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.with_ansi(ansi).init();
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let paths = InterpolationPaths {
        reference_state: args.reference_state,
        reference_locations: args.reference_locations,
        input_locations: args.input_locations,
        segmentation: args.segmentation,
        output: args.output,
    };

    info!(
        reference_state = %paths.reference_state.display(),
        input_locations = %paths.input_locations.display(),
        output = %paths.output.display(),
        nneighbors = config.nneighbors,
        smoothing_sigma = config.smoothing_sigma,
        "Starting atmospheric interpolation"
    );

    let summary = atm_interpolation(&paths, &config, &TracingSink)
        .with_context(|| format!("interpolating into {}", paths.output.display()))?;

    if let Some(path) = &args.summary {
        let yaml = serde_yaml::to_string(&summary).context("serializing run summary")?;
        fs::write(path, yaml)
            .with_context(|| format!("writing run summary {}", path.display()))?;
    }

    Ok(())
}

/// Environment (or YAML file) first, then command-line overrides.
fn load_config(args: &Args) -> Result<InterpolationConfig> {
    let base = match &args.config {
        Some(path) => read_config_file(path)?,
        None => InterpolationConfig::from_env(),
    };
    apply_overrides(args, base)
}

fn apply_overrides(args: &Args, mut config: InterpolationConfig) -> Result<InterpolationConfig> {
    if let Some(n) = args.nneighbors {
        config.nneighbors = n;
    }
    if let Some(v) = args.nodata_value {
        config.nodata_value = v;
    }
    if let Some(n) = args.n_cores {
        config.n_workers = if n > 0 { Some(n as usize) } else { None };
    }
    if let Some(s) = args.smoothing_sigma {
        config.smoothing_sigma = s;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<InterpolationConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["atm-interpolator", "state", "ref_loc", "loc", "out"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_positional_arguments() {
        let args = parse(&[]);
        assert_eq!(args.reference_state, PathBuf::from("state"));
        assert_eq!(args.output, PathBuf::from("out"));
        assert!(args.segmentation.is_none());
        assert!(!args.json_logs);
    }

    fn overridden(extra: &[&str]) -> Result<InterpolationConfig> {
        apply_overrides(&parse(extra), InterpolationConfig::default())
    }

    #[test]
    fn test_cli_overrides() {
        let config = overridden(&[
            "--nneighbors",
            "25",
            "--n-cores",
            "3",
            "--smoothing-sigma",
            "0",
            "--nodata-value",
            "-1",
        ])
        .unwrap();
        assert_eq!(config.nneighbors, 25);
        assert_eq!(config.n_workers, Some(3));
        assert_eq!(config.smoothing_sigma, 0.0);
        assert_eq!(config.nodata_value, -1.0);
    }

    #[test]
    fn test_no_flags_keep_base_config() {
        let mut base = InterpolationConfig::default();
        base.nneighbors = 60;
        base.n_workers = Some(2);
        let config = apply_overrides(&parse(&[]), base.clone()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_all_cores() {
        assert_eq!(overridden(&["--n-cores", "-1"]).unwrap().n_workers, None);
    }

    #[test]
    fn test_yaml_config_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atm.yaml");
        fs::write(&path, "nneighbors: 80\nsmoothing_sigma: 1.5\n").unwrap();

        let config_arg = path.to_string_lossy().to_string();
        let args = parse(&["--config", &config_arg, "--smoothing-sigma", "3"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.nneighbors, 80);
        assert_eq!(config.smoothing_sigma, 3.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(overridden(&["--nneighbors", "0"]).is_err());
        assert!(overridden(&["--smoothing-sigma", "inf"]).is_err());
    }
}
