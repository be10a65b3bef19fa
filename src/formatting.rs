use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vra_lib::output::{ErrorOutput, VRA_OUTPUT_VERSION};
use vra_lib::types::{CheckOutcome, Verdict};
use vra_lib::{VraError, VraOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &VraOutput,
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
pub fn render_error(err: VraError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let error_payload = err.to_payload();
    let payload = VraOutput::Error(ErrorOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
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

    // Exit code 2 is reserved for errors; failed checks use 1.
    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &VraOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &VraOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

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
pub fn format_pretty(body: &VraOutput, colorize: bool) -> String {
    let status = |passed: bool| {
        if passed {
            color("PASS", "32", colorize)
        } else {
            color("FAIL", "31", colorize)
        }
    };

    let mut buf = String::new();
    match body {
        VraOutput::Compare(out) => {
            writeln!(buf, "{} Visual regression check", status(out.passed)).ok();
            writeln!(buf, "Actual: {}", out.actual).ok();
            if let Some(baseline) = &out.baseline {
                writeln!(buf, "Baseline: {}", baseline).ok();
            }
            writeln!(buf, "Checks:").ok();
            for outcome in &out.report.outcomes {
                writeln!(buf, "{}", format_outcome(outcome, colorize)).ok();
            }
            if !out.report.skipped.is_empty() {
                let names = out
                    .report
                    .skipped
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(buf, "Skipped (missing inputs): {}", names).ok();
            }
            if let Some(kind) = out.report.halted_by {
                writeln!(buf, "Stopped early: {} is fail-fast", kind).ok();
            }
            if let Some(artifacts) = &out.artifacts {
                writeln!(buf, "Artifacts: {}", artifacts.directory.display()).ok();
                for file in &artifacts.files {
                    writeln!(buf, "  {}", file.display()).ok();
                }
            }
        }
        VraOutput::Locate(out) => {
            let r = &out.result;
            writeln!(buf, "Located {} in {}", out.needle, out.haystack).ok();
            writeln!(
                buf,
                "Score: {}",
                color(&format!("{:.4}", r.score), score_color_code(r.score), colorize)
            )
            .ok();
            writeln!(
                buf,
                "Region: ({}, {}) {}x{} at scale {:.2}",
                r.region.x, r.region.y, r.region.width, r.region.height, r.scale_used
            )
            .ok();
            if out.fitted {
                writeln!(buf, "Needle was shrunk to fit the haystack").ok();
            }
        }
        VraOutput::Features(out) => {
            let r = &out.result;
            writeln!(buf, "Feature match of {} in {}", out.object, out.scene).ok();
            writeln!(
                buf,
                "Inliers: {}/{} ({})",
                r.inliers,
                r.correspondences,
                color(
                    &format!("{:.3}", r.inlier_ratio),
                    score_color_code(r.inlier_ratio),
                    colorize
                )
            )
            .ok();
            match &r.transform {
                Some(h) => {
                    writeln!(buf, "Homography:").ok();
                    for row in h.0.iter() {
                        writeln!(buf, "  [{:>10.4} {:>10.4} {:>10.4}]", row[0], row[1], row[2])
                            .ok();
                    }
                }
                None => {
                    writeln!(buf, "{}", color("No homography found", "33", colorize)).ok();
                }
            }
        }
        VraOutput::Boxes(out) => {
            writeln!(buf, "Layout boxes in {}: {}", out.image, out.boxes.len()).ok();
            for b in &out.boxes {
                writeln!(buf, "- ({}, {}) {}x{}", b.x, b.y, b.width, b.height).ok();
            }
            if !out.gaps.is_empty() {
                let gaps = out
                    .gaps
                    .iter()
                    .map(|g| g.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(buf, "Gaps: {}", gaps).ok();
            }
        }
        VraOutput::Hash(out) => {
            writeln!(buf, "{}: {}", out.image, out.hash).ok();
            if let (Some(other), Some(other_hash)) = (&out.other, &out.other_hash) {
                writeln!(buf, "{}: {}", other, other_hash).ok();
            }
            if let Some(distance) = out.distance {
                writeln!(buf, "Hamming distance: {}", distance).ok();
            }
        }
        VraOutput::Contrast(out) => {
            writeln!(
                buf,
                "{} Contrast {} on {}",
                status(out.passed),
                out.fg,
                out.bg
            )
            .ok();
            writeln!(buf, "Ratio: {:.2}:1 (threshold {:.1}:1)", out.ratio, out.threshold).ok();
        }
        VraOutput::Error(out) => {
            let msg = out.message.as_deref().unwrap_or(&out.error.message);
            writeln!(buf, "{} {}", color("[ERROR]", "31", colorize), msg).ok();
            if let Some(hint) = &out.error.remediation {
                writeln!(buf, "Hint: {}", hint).ok();
            }
        }
    }
    buf.trim_end().to_string()
}

fn format_outcome(outcome: &CheckOutcome, colorize: bool) -> String {
    let (label, code) = match outcome.verdict {
        Verdict::Pass => ("pass", "32"),
        Verdict::Fail => ("FAIL", "31"),
        Verdict::ObservedOnly => ("observed", "33"),
    };
    let mut line = format!(
        "- {:<9} {:>10.4} {} {:<8} {}",
        outcome.check.as_str(),
        outcome.measured,
        outcome.comparison.symbol(),
        outcome.threshold,
        color(label, code, colorize)
    );
    if let Some(detail) = &outcome.detail {
        line.push_str(&format!(" ({})", detail));
    }
    line
}

fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// Map a 0..1 score to an ANSI color code.
fn score_color_code(score: f64) -> &'static str {
    if score >= 0.9 {
        "32"
    } else if score >= 0.7 {
        "33"
    } else {
        "31"
    }
}

/// Map a compare verdict to a process exit code.
pub fn exit_code_for_compare(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vra_lib::error::{ErrorCategory, ErrorPayload};
    use vra_lib::output::{CompareArtifacts, CompareOutput, ContrastOutput, HashOutput};
    use vra_lib::{CheckKind, CheckReport, Enforcement};

    #[test]
    fn exit_code_for_compare_maps_pass_fail() {
        assert_eq!(exit_code_for_compare(true), ExitCode::SUCCESS);
        assert_eq!(exit_code_for_compare(false), ExitCode::from(1));
    }

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(
            VraError::Config("boom".to_string()),
            OutputFormat::Json,
            None,
        );
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn format_pretty_lists_outcomes_skips_and_artifacts() {
        let report = CheckReport {
            outcomes: vec![
                CheckOutcome::evaluate(CheckKind::Ssim, 0.99, 0.985, Enforcement::CollectAll),
                CheckOutcome::evaluate(CheckKind::Diff, 4.2, 1.5, Enforcement::CollectAll)
                    .with_detail("420 of 10000 pixels changed"),
                CheckOutcome::evaluate(CheckKind::Contrast, 2.0, 4.5, Enforcement::LogOnly),
            ],
            skipped: vec![CheckKind::Template],
            ..CheckReport::default()
        };
        let output = VraOutput::Compare(CompareOutput {
            version: VRA_OUTPUT_VERSION.to_string(),
            actual: "actual.png".into(),
            baseline: Some("baseline.png".into()),
            passed: report.passed(),
            report,
            artifacts: Some(CompareArtifacts {
                directory: PathBuf::from("/tmp/vra-run"),
                files: vec![PathBuf::from("/tmp/vra-run/diff_overlay.png")],
            }),
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("FAIL Visual regression check"));
        assert!(pretty.contains("Baseline: baseline.png"));
        assert!(pretty.contains("ssim") && pretty.contains("0.9900"));
        assert!(pretty.contains("420 of 10000 pixels changed"));
        assert!(pretty.contains("observed"));
        assert!(pretty.contains("Skipped (missing inputs): template"));
        assert!(pretty.contains("diff_overlay.png"));
    }

    #[test]
    fn format_pretty_shows_hash_distance_and_contrast_ratio() {
        let hash = VraOutput::Hash(HashOutput {
            version: VRA_OUTPUT_VERSION.to_string(),
            image: "a.png".into(),
            hash: "00ff00ff00ff00ff".into(),
            other: Some("b.png".into()),
            other_hash: Some("00ff00ff00ff00fe".into()),
            distance: Some(1),
        });
        let pretty = format_pretty(&hash, false);
        assert!(pretty.contains("a.png: 00ff00ff00ff00ff"));
        assert!(pretty.contains("Hamming distance: 1"));

        let contrast = VraOutput::Contrast(ContrastOutput {
            version: VRA_OUTPUT_VERSION.to_string(),
            fg: "#000000".into(),
            bg: "#FFFFFF".into(),
            ratio: 21.0,
            threshold: 4.5,
            passed: true,
        });
        let pretty = format_pretty(&contrast, false);
        assert!(pretty.contains("PASS Contrast #000000 on #FFFFFF"));
        assert!(pretty.contains("21.00:1"));
    }

    #[test]
    fn format_pretty_handles_errors() {
        let output = VraOutput::Error(ErrorOutput {
            version: VRA_OUTPUT_VERSION.to_string(),
            message: Some("bad input".to_string()),
            error: ErrorPayload {
                category: ErrorCategory::Config,
                message: "bad input".to_string(),
                remediation: Some("check flags".to_string()),
            },
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("[ERROR] bad input"));
        assert!(pretty.contains("Hint: check flags"));
    }

    #[test]
    fn color_wraps_only_when_enabled() {
        assert_eq!(color("x", "31", false), "x");
        assert_eq!(color("x", "31", true), "\x1b[31mx\x1b[0m");
    }
}
