use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vrt_lib::output::VRT_OUTPUT_VERSION;
use vrt_lib::{ErrorOutput, ViewportStatus, VrtError, VrtOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &VrtOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: VrtError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let error_payload = err.to_payload();
    let payload = VrtOutput::Error(ErrorOutput {
        version: VRT_OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is reserved for fatal errors; regressions use 1.
    ExitCode::from(2)
}

fn write_json_output(body: &VrtOutput, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &VrtOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &VrtOutput, colorize: bool) -> String {
    let status_label = |passed: bool| {
        let (text, code) = if passed { ("PASS", "32") } else { ("FAIL", "31") };
        color(text, code, colorize)
    };

    match body {
        VrtOutput::Diff(out) => {
            let mut buf = String::new();
            writeln!(
                buf,
                "{} {} vs {}",
                status_label(out.passed),
                out.fixture.display(),
                out.candidate.display()
            )
            .ok();
            writeln!(
                buf,
                "Differing: {} px ({:.4}%), tolerance {}",
                out.differing_pixels,
                out.differing_fraction * 100.0,
                out.tolerance
            )
            .ok();
            if let Some(path) = &out.diff_image {
                writeln!(buf, "Diff image: {}", path.display()).ok();
            }
            buf
        }
        VrtOutput::Test(out) => {
            let mut buf = String::new();
            writeln!(
                buf,
                "{} Snapshot {} ({})",
                status_label(out.passed),
                out.snapshot_id,
                out.url
            )
            .ok();
            for report in &out.viewports {
                let (label, code) = match report.status {
                    ViewportStatus::Recorded => ("recorded", "36"),
                    ViewportStatus::Passed => ("passed", "32"),
                    ViewportStatus::Regressed => ("regressed", "31"),
                };
                let mut line = format!("- {:10} {}", report.viewport.to_string(), color(label, code, colorize));
                if report.status == ViewportStatus::Regressed {
                    write!(line, " ({:.4}%)", report.differing_fraction * 100.0).ok();
                }
                writeln!(buf, "{line}").ok();
            }
            buf
        }
        VrtOutput::Error(out) => {
            let mut buf = String::new();
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
            buf
        }
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// 0 when nothing regressed, 1 otherwise.
pub fn exit_code_for_result(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
