use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::viewport::{CaptureMode, Viewport};
use crate::{Result, VrtError};

/// File name looked up in the working directory when no `--config` is given.
pub const LOCAL_CONFIG_FILE: &str = "vrt.toml";

pub const DEFAULT_VIEWPORTS: [u32; 6] = [320, 480, 760, 1000, 1300, 1760];
pub const DEFAULT_TOLERANCE: f64 = 0.0;
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_INFLIGHT_REQUESTS: usize = 0;
pub const DEFAULT_MASK_MARGIN: u32 = 1;
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Quiet period used by the `networkidle*` load-settled signals.
pub const LOAD_SETTLED_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Tester-wide configuration, usually read from `vrt.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub viewports: Vec<Viewport>,
    pub device_scale_factor: f64,
    pub fixtures_dir: PathBuf,
    pub results_dir: PathBuf,
    pub base_url: String,
    pub mode: CaptureMode,
    pub wait_until: WaitUntil,
    /// Viewport iterations allowed to hold an open page at the same time.
    pub max_concurrent_pages: usize,
    pub timeouts: Timeouts,
    /// Tester-level defaults for the layered settings.
    #[serde(flatten)]
    pub settings: SettingsLayer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewports: DEFAULT_VIEWPORTS.iter().copied().map(Viewport::new).collect(),
            device_scale_factor: 1.0,
            fixtures_dir: PathBuf::from("vrt/fixtures"),
            results_dir: PathBuf::from("vrt/results"),
            base_url: "http://localhost".to_string(),
            mode: CaptureMode::Auto,
            wait_until: WaitUntil::NetworkIdle0,
            max_concurrent_pages: 1,
            timeouts: Timeouts::default(),
            settings: SettingsLayer::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

/// Signal that marks a navigation as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitUntil {
    /// The page `load` event.
    #[serde(rename = "load")]
    Load,
    /// `load`, then no request in flight for 500ms.
    #[default]
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    /// `load`, then at most two requests in flight for 500ms.
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

impl WaitUntil {
    /// In-flight request count tolerated by the idle part of the signal.
    pub fn idle_threshold(self) -> Option<usize> {
        match self {
            WaitUntil::Load => None,
            WaitUntil::NetworkIdle0 => Some(0),
            WaitUntil::NetworkIdle2 => Some(2),
        }
    }
}

/// One layer of optional overrides.
///
/// Layers are stacked call-level > test-level > tester-level > built-in default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SettingsLayer {
    /// Per-pixel colour distance in `[0, 1]` below which pixels count as equal.
    pub tolerance: Option<f64>,
    /// How long the in-flight count must stay at or below the threshold.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub quiet_period: Option<Duration>,
    pub max_inflight_requests: Option<usize>,
    /// Outer margin (CSS px) added around every mask.
    pub mask_margin: Option<u32>,
}

impl SettingsLayer {
    /// Fills every unset field of `self` from `lower`.
    pub fn or(self, lower: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            tolerance: self.tolerance.or(lower.tolerance),
            quiet_period: self.quiet_period.or(lower.quiet_period),
            max_inflight_requests: self.max_inflight_requests.or(lower.max_inflight_requests),
            mask_margin: self.mask_margin.or(lower.mask_margin),
        }
    }

    pub fn with_idle(quiet_period: Duration, max_inflight_requests: usize) -> Self {
        SettingsLayer {
            quiet_period: Some(quiet_period),
            max_inflight_requests: Some(max_inflight_requests),
            ..SettingsLayer::default()
        }
    }
}

/// Fully resolved settings for one operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveSettings {
    pub tolerance: f64,
    pub quiet_period: Duration,
    pub max_inflight_requests: usize,
    pub mask_margin: u32,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            quiet_period: DEFAULT_QUIET_PERIOD,
            max_inflight_requests: DEFAULT_MAX_INFLIGHT_REQUESTS,
            mask_margin: DEFAULT_MASK_MARGIN,
        }
    }
}

impl EffectiveSettings {
    /// Rejects resolved values a diff cannot use, such as a NaN tolerance.
    pub fn validate(&self) -> Result<()> {
        validate_tolerance(self.tolerance)
    }
}

/// Resolves settings with precedence call > test > tester > built-in default.
pub fn resolve_settings(
    call: &SettingsLayer,
    test: &SettingsLayer,
    tester: &SettingsLayer,
) -> EffectiveSettings {
    let merged = call.or(*test).or(*tester);
    let defaults = EffectiveSettings::default();
    EffectiveSettings {
        tolerance: merged.tolerance.unwrap_or(defaults.tolerance),
        quiet_period: merged.quiet_period.unwrap_or(defaults.quiet_period),
        max_inflight_requests: merged
            .max_inflight_requests
            .unwrap_or(defaults.max_inflight_requests),
        mask_margin: merged.mask_margin.unwrap_or(defaults.mask_margin),
    }
}

impl Config {
    /// Load config from an explicit path, `./vrt.toml`, the central config, or defaults.
    /// Priority: explicit path > ./vrt.toml > ~/.config/vrt/config.toml > defaults
    pub fn load(path: Option<&Path>) -> Result<Config> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(VrtError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(central) = Self::central_config_path() {
            if central.exists() {
                return Self::from_file(&central);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config> {
        Ok(toml::from_str(raw)?)
    }

    /// `$XDG_CONFIG_HOME/vrt/config.toml`, else `~/.config/vrt/config.toml`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|v| !v.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join("vrt").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewports.is_empty() {
            return Err(VrtError::Config(
                "At least one viewport must be configured".to_string(),
            ));
        }
        if let Some(vp) = self.viewports.iter().find(|vp| vp.width == 0) {
            return Err(VrtError::Config(format!("Invalid viewport width: {}", vp)));
        }
        if !(self.device_scale_factor > 0.0) || !self.device_scale_factor.is_finite() {
            return Err(VrtError::Config(format!(
                "device_scale_factor must be positive, got {}",
                self.device_scale_factor
            )));
        }
        if let Some(tolerance) = self.settings.tolerance {
            validate_tolerance(tolerance)?;
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            VrtError::Config(format!("Invalid base_url {:?}: {}", self.base_url, e))
        })?;
        Ok(())
    }

    /// Device-scale factor for `viewport`.
    pub fn scale_for(&self, viewport: &Viewport) -> f64 {
        viewport.scale_or(self.device_scale_factor)
    }

    /// Concurrency limit, never below one.
    pub fn page_limit(&self) -> usize {
        self.max_concurrent_pages.max(1)
    }
}

pub fn validate_tolerance(tolerance: f64) -> Result<()> {
    if (0.0..=1.0).contains(&tolerance) {
        Ok(())
    } else {
        Err(VrtError::Config(format!(
            "tolerance must be within [0, 1], got {}",
            tolerance
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();

        let widths: Vec<u32> = cfg.viewports.iter().map(|vp| vp.width).collect();
        assert_eq!(widths, vec![320, 480, 760, 1000, 1300, 1760]);
        assert!((cfg.device_scale_factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.fixtures_dir, PathBuf::from("vrt/fixtures"));
        assert_eq!(cfg.results_dir, PathBuf::from("vrt/results"));
        assert_eq!(cfg.base_url, "http://localhost");
        assert_eq!(cfg.mode, CaptureMode::Auto);
        assert_eq!(cfg.wait_until, WaitUntil::NetworkIdle0);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(30));
        assert_eq!(cfg.settings, SettingsLayer::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_toml_with_humantime_durations() {
        let cfg = Config::from_toml(
            r#"
viewports = [320, "760@2"]
fixtures_dir = "tests/fixtures"
results_dir = "tests/results"
base_url = "http://localhost:61423"
mode = "square-auto"
wait_until = "networkidle2"
max_concurrent_pages = 2
tolerance = 0.1
quiet_period = "2s"
max_inflight_requests = 1

[timeouts]
navigation = "45s"
"#,
        )
        .expect("parse config");

        assert_eq!(cfg.viewports, vec![Viewport::new(320), Viewport::with_scale(760, 2.0)]);
        assert_eq!(cfg.fixtures_dir, PathBuf::from("tests/fixtures"));
        assert_eq!(cfg.mode, CaptureMode::SquareAuto);
        assert_eq!(cfg.wait_until, WaitUntil::NetworkIdle2);
        assert_eq!(cfg.page_limit(), 2);
        assert_eq!(cfg.settings.tolerance, Some(0.1));
        assert_eq!(cfg.settings.quiet_period, Some(Duration::from_secs(2)));
        assert_eq!(cfg.settings.max_inflight_requests, Some(1));
        assert_eq!(cfg.settings.mask_margin, None);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(45));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml("tolerance = 0.2\n").unwrap();
        assert_eq!(cfg.viewports.len(), 6);
        assert_eq!(cfg.timeouts.navigation, DEFAULT_NAVIGATION_TIMEOUT);
        assert_eq!(cfg.settings.tolerance, Some(0.2));
    }

    #[test]
    fn invalid_toml_is_a_config_parse_error() {
        let err = Config::from_toml("viewports = [0]").unwrap_err();
        assert!(matches!(err, VrtError::ConfigParse(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = Config {
            viewports: vec![],
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            device_scale_factor: 0.0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            settings: SettingsLayer {
                tolerance: Some(1.5),
                ..SettingsLayer::default()
            },
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resolve_uses_built_in_defaults_when_no_layer_sets_a_field() {
        let empty = SettingsLayer::default();
        let resolved = resolve_settings(&empty, &empty, &empty);
        assert_eq!(resolved, EffectiveSettings::default());
        assert_eq!(resolved.quiet_period, Duration::from_millis(500));
        assert_eq!(resolved.max_inflight_requests, 0);
        assert_eq!(resolved.mask_margin, 1);
    }

    #[test]
    fn resolve_prefers_call_then_test_then_tester() {
        let tester = SettingsLayer {
            tolerance: Some(0.3),
            quiet_period: Some(Duration::from_secs(3)),
            max_inflight_requests: Some(3),
            mask_margin: Some(3),
        };
        let test = SettingsLayer {
            tolerance: Some(0.2),
            quiet_period: Some(Duration::from_secs(2)),
            ..SettingsLayer::default()
        };
        let call = SettingsLayer {
            quiet_period: Some(Duration::from_secs(1)),
            ..SettingsLayer::default()
        };

        let resolved = resolve_settings(&call, &test, &tester);
        assert_eq!(resolved.quiet_period, Duration::from_secs(1));
        assert!((resolved.tolerance - 0.2).abs() < f64::EPSILON);
        assert_eq!(resolved.max_inflight_requests, 3);
        assert_eq!(resolved.mask_margin, 3);
    }

    #[test]
    fn load_reads_explicit_path_and_rejects_missing_one() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "viewports = [400]\n").unwrap();

        let cfg = Config::load(Some(&path)).expect("load config");
        assert_eq!(cfg.viewports, vec![Viewport::new(400)]);

        let missing = dir.path().join("missing.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn wait_until_thresholds() {
        assert_eq!(WaitUntil::Load.idle_threshold(), None);
        assert_eq!(WaitUntil::NetworkIdle0.idle_threshold(), Some(0));
        assert_eq!(WaitUntil::NetworkIdle2.idle_threshold(), Some(2));
    }

    #[test]
    fn effective_settings_reject_out_of_range_tolerance() {
        assert!(EffectiveSettings::default().validate().is_ok());
        for tolerance in [f64::NAN, 1.5, -0.1] {
            let settings = EffectiveSettings {
                tolerance,
                ..EffectiveSettings::default()
            };
            assert!(matches!(settings.validate(), Err(VrtError::Config(_))));
        }
    }
}
