use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vrt_lib::Viewport;

#[derive(Parser)]
#[command(name = "vrt")]
#[command(
    version,
    about = "Visual Regression Tester - Capture pages per viewport and diff them against fixtures",
    long_about = "Visual Regression Tester (VRT)\n\nModes:\n- diff: compare two stored images with the tolerant pixel diff.\n- test: open a URL at every configured viewport, mask dynamic regions, and compare against (or record) fixtures. Needs the `chromium` feature.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with viewports/directories/tolerance/timeouts; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diff a candidate image against a fixture image
    Diff {
        #[arg(long, help = "Reference image (PNG)")]
        fixture: PathBuf,

        #[arg(long, help = "Candidate image to compare against the fixture")]
        candidate: PathBuf,

        #[arg(
            long,
            default_value = "0",
            help = "Per-pixel colour distance in [0, 1] below which pixels count as equal"
        )]
        tolerance: f64,

        #[arg(long, value_name = "PATH", help = "Write the diff image here when pixels differ")]
        diff_out: Option<PathBuf>,

        #[arg(long, help = "Count anti-aliased pixels as differences")]
        no_anti_aliasing: bool,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Run one snapshot test against a URL at every viewport
    Test {
        #[arg(long, help = "Path (joined to base_url) or absolute URL to open")]
        url: String,

        #[arg(long, help = "Snapshot id used to name fixture and result files")]
        snapshot_id: String,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Viewports to test (comma-separated WIDTH or WIDTH@SCALE)"
        )]
        viewports: Option<Vec<Viewport>>,

        #[arg(long, value_name = "SELECTOR", help = "Capture only this element")]
        element: Option<String>,

        #[arg(
            long,
            value_name = "SELECTOR",
            help = "Mask elements matching this selector (repeatable)"
        )]
        mask: Vec<String>,

        #[arg(long, help = "Suffix appended to result file names")]
        suffix: Option<String>,

        #[arg(long, value_name = "PATH", help = "Directory holding fixtures")]
        fixtures_dir: Option<PathBuf>,

        #[arg(long, value_name = "PATH", help = "Directory receiving candidates and diffs")]
        results_dir: Option<PathBuf>,

        #[arg(
            long,
            default_value = "0",
            help = "Per-pixel colour distance in [0, 1] below which pixels count as equal"
        )]
        tolerance: f64,

        #[arg(
            long,
            default_value = "500",
            help = "Quiet period (milliseconds) the network must stay idle"
        )]
        quiet_period_ms: u64,

        #[arg(
            long,
            default_value = "0",
            help = "In-flight requests tolerated while waiting for idle"
        )]
        max_inflight: usize,

        #[arg(long, value_name = "PATH", help = "Chrome/Chromium executable")]
        chrome: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat};
    use clap::Parser;
    use vrt_lib::Viewport;

    #[test]
    fn diff_command_uses_defaults() {
        let cli = Cli::parse_from([
            "vrt",
            "diff",
            "--fixture",
            "a.png",
            "--candidate",
            "b.png",
        ]);

        match cli.command {
            Commands::Diff {
                tolerance,
                diff_out,
                no_anti_aliasing,
                format,
                output,
                ..
            } => {
                assert_eq!(tolerance, 0.0);
                assert!(diff_out.is_none());
                assert!(!no_anti_aliasing);
                assert!(matches!(format, OutputFormat::Json));
                assert!(output.is_none());
            }
            _ => panic!("expected diff command"),
        }
    }

    #[test]
    fn test_command_parses_viewports_and_repeated_masks() {
        let cli = Cli::parse_from([
            "vrt",
            "--verbose",
            "test",
            "--url",
            "/",
            "--snapshot-id",
            "home",
            "--viewports",
            "320,760@2",
            "--mask",
            ".clock",
            "--mask",
            ".ad",
            "--format",
            "pretty",
        ]);
        assert!(cli.verbose);

        match cli.command {
            Commands::Test {
                viewports,
                mask,
                snapshot_id,
                quiet_period_ms,
                max_inflight,
                format,
                ..
            } => {
                assert_eq!(
                    viewports,
                    Some(vec![Viewport::new(320), Viewport::with_scale(760, 2.0)])
                );
                assert_eq!(mask, vec![".clock".to_string(), ".ad".to_string()]);
                assert_eq!(snapshot_id, "home");
                assert_eq!(quiet_period_ms, 500);
                assert_eq!(max_inflight, 0);
                assert!(matches!(format, OutputFormat::Pretty));
            }
            _ => panic!("expected test command"),
        }
    }

    #[test]
    fn test_command_rejects_bad_viewport() {
        let result = Cli::try_parse_from([
            "vrt",
            "test",
            "--url",
            "/",
            "--snapshot-id",
            "home",
            "--viewports",
            "wide",
        ]);
        assert!(result.is_err());
    }
}
