use std::path::{Path, PathBuf};
use std::process::ExitCode;

use image::DynamicImage;
use palette::Srgb;
use tracing::{debug, info};
use vra_lib::metrics::{parse_hex_color, Artifact};
use vra_lib::output::{CompareArtifacts, CompareOutput, VRA_OUTPUT_VERSION};
use vra_lib::{
    center_color, default_checks, ensure_initialized, load_image, run_checks, save_image,
    CheckInputs, CheckReport, Config, VraError, VraOutput,
};

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_compare, render_error, write_output};
use crate::settings::{
    apply_compare_overrides, format_effective_config, load_config, parse_check_kinds,
};

/// Images loaded for one compare run.
struct LoadedInputs {
    actual: DynamicImage,
    baseline: Option<DynamicImage>,
    mask: Option<DynamicImage>,
    element: Option<DynamicImage>,
    template: Option<DynamicImage>,
}

impl LoadedInputs {
    fn load(
        actual: &Path,
        baseline: Option<&Path>,
        mask: Option<&Path>,
        element: Option<&Path>,
        template: Option<&Path>,
    ) -> Result<Self, VraError> {
        let load_opt = |path: Option<&Path>| -> Result<Option<DynamicImage>, VraError> {
            path.map(load_image).transpose().map_err(VraError::from)
        };
        Ok(Self {
            actual: load_image(actual)?,
            baseline: load_opt(baseline)?,
            mask: load_opt(mask)?,
            element: load_opt(element)?,
            template: load_opt(template)?,
        })
    }

    fn check_inputs(&self, colors: Option<(Srgb<u8>, Srgb<u8>)>) -> CheckInputs<'_> {
        let mut inputs = CheckInputs::new(&self.actual);
        if let Some(baseline) = &self.baseline {
            inputs = inputs.with_baseline(baseline);
        }
        if let Some(mask) = &self.mask {
            inputs = inputs.with_mask(mask);
        }
        if let Some(element) = &self.element {
            inputs = inputs.with_element(element);
        }
        if let Some(template) = &self.template {
            inputs = inputs.with_template(template);
        }
        if let Some((fg, bg)) = colors {
            inputs = inputs.with_colors(fg, bg);
        }
        inputs
    }

    /// Contrast colours. Without `--bg`, the background is sampled from the
    /// centre of the element crop, or of the screenshot.
    fn resolve_colors(
        &self,
        fg: Option<&str>,
        bg: Option<&str>,
    ) -> Result<Option<(Srgb<u8>, Srgb<u8>)>, VraError> {
        let Some(fg) = fg else {
            if bg.is_some() {
                debug!("--bg given without --fg, contrast check has no input");
            }
            return Ok(None);
        };
        let fg = parse_hex_color(fg)?;
        let bg = match bg {
            Some(raw) => parse_hex_color(raw)?,
            None => {
                let source = self.element.as_ref().unwrap_or(&self.actual);
                center_color(source).ok_or_else(|| {
                    VraError::Config("Cannot sample background colour from an empty image".into())
                })?
            }
        };
        Ok(Some((fg, bg)))
    }
}

/// Run the compare command.
#[allow(clippy::too_many_arguments)]
pub fn run_compare(
    config_path: Option<PathBuf>,
    actual: PathBuf,
    baseline: Option<PathBuf>,
    mask: Option<PathBuf>,
    element: Option<PathBuf>,
    template: Option<PathBuf>,
    fg: Option<String>,
    bg: Option<String>,
    checks: Option<Vec<String>>,
    policy: Option<String>,
    noise_threshold: Option<u8>,
    artifacts_dir: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    if let Err(err) = apply_compare_overrides(&mut config, policy.as_deref(), noise_threshold) {
        return render_error(err, format, output);
    }
    debug!("{}", format_effective_config(config_path.as_deref(), &config));

    let selected = match parse_check_kinds(checks.as_deref()) {
        Ok(kinds) => kinds,
        Err(err) => return render_error(err, format, output),
    };

    let loaded = match LoadedInputs::load(
        &actual,
        baseline.as_deref(),
        mask.as_deref(),
        element.as_deref(),
        template.as_deref(),
    ) {
        Ok(loaded) => loaded,
        Err(err) => return render_error(err, format, output),
    };
    let colors = match loaded.resolve_colors(fg.as_deref(), bg.as_deref()) {
        Ok(colors) => colors,
        Err(err) => return render_error(err, format, output),
    };

    ensure_initialized();
    let report = match evaluate(&config, &selected, &loaded.check_inputs(colors)) {
        Ok(report) => report,
        Err(err) => return render_error(err, format, output),
    };

    let artifacts = match artifacts_dir {
        Some(dir) => match persist_artifacts(&dir, &report.artifacts) {
            Ok(files) => Some(CompareArtifacts {
                directory: dir,
                files,
            }),
            Err(err) => return render_error(err, format, output),
        },
        None => None,
    };

    let passed = report.passed();
    info!(
        passed,
        failures = report.failures().len(),
        skipped = report.skipped.len(),
        "compare finished"
    );

    let body = VraOutput::Compare(CompareOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        actual: actual.display().to_string(),
        baseline: baseline.map(|p| p.display().to_string()),
        passed,
        report,
        artifacts,
    });

    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            VraError::Config(format!("Failed to write output: {}", err)),
            format,
            output,
        );
    }
    exit_code_for_compare(passed)
}

fn evaluate(
    config: &Config,
    selected: &[vra_lib::CheckKind],
    inputs: &CheckInputs<'_>,
) -> Result<CheckReport, VraError> {
    let checks = default_checks(config);
    run_checks(&checks, selected, inputs, config)
}

/// Save every artifact as `<dir>/<name>.png`.
fn persist_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>, VraError> {
    std::fs::create_dir_all(dir)?;
    let mut files = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(format!("{}.png", artifact.name));
        save_image(&DynamicImage::ImageRgb8(artifact.image.clone()), &path)?;
        debug!(path = %path.display(), "artifact written");
        files.push(path);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use tempfile::TempDir;

    fn inputs_with(actual: DynamicImage, element: Option<DynamicImage>) -> LoadedInputs {
        LoadedInputs {
            actual,
            baseline: None,
            mask: None,
            element,
            template: None,
        }
    }

    #[test]
    fn background_defaults_to_element_centre() {
        let actual = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));
        let element = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let loaded = inputs_with(actual, Some(element));

        let (fg, bg) = loaded
            .resolve_colors(Some("#000000"), None)
            .expect("colors")
            .expect("contrast input");
        assert_eq!(fg, Srgb::new(0, 0, 0));
        assert_eq!(bg, Srgb::new(255, 255, 255));
    }

    #[test]
    fn explicit_background_wins_and_missing_fg_disables_contrast() {
        let actual = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));
        let loaded = inputs_with(actual, None);

        let (_, bg) = loaded
            .resolve_colors(Some("#FFA500"), Some("#123456"))
            .expect("colors")
            .expect("contrast input");
        assert_eq!(bg, Srgb::new(0x12, 0x34, 0x56));
        assert!(loaded.resolve_colors(None, Some("#fff")).expect("ok").is_none());
        assert!(loaded.resolve_colors(Some("orange"), None).is_err());
    }

    #[test]
    fn persist_artifacts_writes_named_pngs() {
        let dir = TempDir::new().expect("tempdir");
        let target = dir.path().join("run");
        let artifacts = vec![Artifact {
            name: "diff_overlay",
            image: RgbImage::from_pixel(3, 2, Rgb([255, 0, 0])),
        }];

        let files = persist_artifacts(&target, &artifacts).expect("persist");

        assert_eq!(files, vec![target.join("diff_overlay.png")]);
        let reloaded = load_image(&files[0]).expect("reload");
        assert_eq!(reloaded.dimensions(), (3, 2));
    }
}
