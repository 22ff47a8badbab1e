use std::path::PathBuf;
use std::process::ExitCode;

use vrt_lib::output::VRT_OUTPUT_VERSION;
use vrt_lib::{diff_images, load_image, save_image, DiffOptions, DiffOutput, VrtError, VrtOutput};

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_result, render_error, write_output};
use crate::settings::{format_effective_config, load_config, resolve_diff_tolerance, FlagSources};

/// Run the diff command.
#[allow(clippy::too_many_arguments)]
pub fn run_diff(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    fixture: PathBuf,
    candidate: PathBuf,
    tolerance: f64,
    diff_out: Option<PathBuf>,
    no_anti_aliasing: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let flag_sources = FlagSources::from_args(raw_args);
    let tolerance = match resolve_diff_tolerance(tolerance, &config, &flag_sources) {
        Ok(t) => t,
        Err(err) => return render_error(err, format, output),
    };
    if verbose {
        tracing::info!("{}", format_effective_config(&config, config_path.as_deref()));
    }

    let fixture_image = match load_image(&fixture) {
        Ok(img) => img,
        Err(err) => return render_error(VrtError::from(err), format, output),
    };
    let candidate_image = match load_image(&candidate) {
        Ok(img) => img,
        Err(err) => return render_error(VrtError::from(err), format, output),
    };

    let options = DiffOptions {
        tolerance,
        detect_anti_aliasing: !no_anti_aliasing,
    };
    let result = diff_images(&fixture_image, &candidate_image, &options);

    let mut written_diff = None;
    if let (Some(path), Some(image)) = (diff_out, result.diff_image.as_ref()) {
        if let Err(err) = save_image(image, &path) {
            return render_error(VrtError::from(err), format, output);
        }
        written_diff = Some(path);
    }

    let passed = !result.is_regression();
    let body = VrtOutput::Diff(DiffOutput {
        version: VRT_OUTPUT_VERSION.to_string(),
        fixture,
        candidate,
        tolerance,
        differing_pixels: result.differing_pixels,
        differing_fraction: result.differing_fraction,
        passed,
        diff_image: written_diff,
    });

    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            VrtError::Unknown(format!("Failed to write output: {}", err)),
            format,
            output,
        );
    }

    exit_code_for_result(passed)
}
