use std::path::{Path, PathBuf};
use std::time::Duration;

use vrt_lib::config::{validate_tolerance, DEFAULT_TOLERANCE};
use vrt_lib::{Config, Viewport, VrtError};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct FlagSources {
    pub tolerance: bool,
    pub quiet_period: bool,
    pub max_inflight: bool,
}

impl FlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            tolerance: flag_present(args, "--tolerance"),
            quiet_period: flag_present(args, "--quiet-period-ms"),
            max_inflight: flag_present(args, "--max-inflight"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// CLI values for the `test` command that may override the config file.
#[derive(Debug, Clone, Default)]
pub struct TestOverrides {
    pub viewports: Option<Vec<Viewport>>,
    pub fixtures_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub tolerance: f64,
    pub quiet_period_ms: u64,
    pub max_inflight: usize,
}

/// Merge CLI arguments into the config, preferring CLI when flags are present.
pub fn apply_test_overrides(mut config: Config, cli: TestOverrides, flags: &FlagSources) -> Config {
    if let Some(viewports) = cli.viewports.filter(|v| !v.is_empty()) {
        config.viewports = viewports;
    }
    if let Some(dir) = cli.fixtures_dir {
        config.fixtures_dir = dir;
    }
    if let Some(dir) = cli.results_dir {
        config.results_dir = dir;
    }
    if flags.tolerance {
        config.settings.tolerance = Some(cli.tolerance);
    }
    if flags.quiet_period {
        config.settings.quiet_period = Some(Duration::from_millis(cli.quiet_period_ms));
    }
    if flags.max_inflight {
        config.settings.max_inflight_requests = Some(cli.max_inflight);
    }
    config
}

/// Tolerance for the `diff` command: flag > config > default.
pub fn resolve_diff_tolerance(
    cli_tolerance: f64,
    config: &Config,
    flags: &FlagSources,
) -> Result<f64, VrtError> {
    let tolerance = if flags.tolerance {
        cli_tolerance
    } else {
        config.settings.tolerance.unwrap_or(DEFAULT_TOLERANCE)
    };
    validate_tolerance(tolerance)?;
    Ok(tolerance)
}

/// Load config from a TOML file, `./vrt.toml`, the central config, or return defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, VrtError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        VrtError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    validate_config(&cfg, path)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &Config, path: Option<&Path>) -> Result<(), VrtError> {
    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        VrtError::Config(prefix)
    })
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let viewports: Vec<String> = config.viewports.iter().map(Viewport::to_string).collect();
    let settings = vrt_lib::resolve_settings(
        &Default::default(),
        &Default::default(),
        &config.settings,
    );
    format!(
        "Effective config [{source}]: viewports=[{}], scale={}, fixtures={}, results={}, tolerance={}, idle={}ms/max {}, nav timeout={}s, pages={}",
        viewports.join(","),
        config.device_scale_factor,
        config.fixtures_dir.display(),
        config.results_dir.display(),
        settings.tolerance,
        settings.quiet_period.as_millis(),
        settings.max_inflight_requests,
        config.timeouts.navigation.as_secs(),
        config.page_limit()
    )
}
