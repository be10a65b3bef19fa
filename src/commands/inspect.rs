//! Single-measurement commands: features, boxes, hash and contrast.

use std::path::PathBuf;
use std::process::ExitCode;

use vra_lib::metrics::{horizontal_gaps, parse_hex_color, to_hex};
use vra_lib::output::{
    BoxesOutput, ContrastOutput, FeaturesOutput, HashOutput, VRA_OUTPUT_VERSION,
};
use vra_lib::{
    detect_boxes, dhash64, hamming, load_image, match_with_homography, wcag_contrast_ratio,
    VraError, VraOutput,
};

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_compare, render_error, write_output};
use crate::settings::load_config;

fn emit(body: VraOutput, format: OutputFormat, output: Option<PathBuf>) -> Option<ExitCode> {
    match write_output(&body, format, output.clone()) {
        Ok(()) => None,
        Err(err) => Some(render_error(
            VraError::Config(format!("Failed to write output: {}", err)),
            format,
            output,
        )),
    }
}

pub fn run_features(
    config_path: Option<PathBuf>,
    scene: PathBuf,
    object: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let (scene_img, object_img) = match (load_image(&scene), load_image(&object)) {
        (Ok(s), Ok(o)) => (s, o),
        (Err(err), _) | (_, Err(err)) => return render_error(err.into(), format, output),
    };
    let result = match match_with_homography(&scene_img, &object_img, &config.feature) {
        Ok(result) => result,
        Err(err) => return render_error(err, format, output),
    };

    let body = VraOutput::Features(FeaturesOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        scene: scene.display().to_string(),
        object: object.display().to_string(),
        result,
    });
    emit(body, format, output).unwrap_or(ExitCode::SUCCESS)
}

pub fn run_boxes(image: PathBuf, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let img = match load_image(&image) {
        Ok(img) => img,
        Err(err) => return render_error(err.into(), format, output),
    };
    let boxes = match detect_boxes(&img) {
        Ok(boxes) => boxes,
        Err(err) => return render_error(err, format, output),
    };
    let gaps = horizontal_gaps(&boxes);

    let body = VraOutput::Boxes(BoxesOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        image: image.display().to_string(),
        boxes,
        gaps,
    });
    emit(body, format, output).unwrap_or(ExitCode::SUCCESS)
}

pub fn run_hash(
    image: PathBuf,
    other: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let hash_of = |path: &PathBuf| -> Result<u64, VraError> {
        let img = load_image(path)?;
        dhash64(&img)
    };
    let hash = match hash_of(&image) {
        Ok(hash) => hash,
        Err(err) => return render_error(err, format, output),
    };
    let other_hash = match other.as_ref().map(hash_of).transpose() {
        Ok(h) => h,
        Err(err) => return render_error(err, format, output),
    };

    let body = VraOutput::Hash(HashOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        image: image.display().to_string(),
        hash: format!("{:016x}", hash),
        other: other.map(|p| p.display().to_string()),
        other_hash: other_hash.map(|h| format!("{:016x}", h)),
        distance: other_hash.map(|h| hamming(hash, h)),
    });
    emit(body, format, output).unwrap_or(ExitCode::SUCCESS)
}

/// Exit code follows compare: 1 when the ratio is below the configured
/// contrast threshold.
pub fn run_contrast(
    config_path: Option<PathBuf>,
    fg: String,
    bg: String,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let colors = parse_hex_color(&fg).and_then(|f| parse_hex_color(&bg).map(|b| (f, b)));
    let (fg_color, bg_color) = match colors {
        Ok(colors) => colors,
        Err(err) => return render_error(err, format, output),
    };

    let ratio = wcag_contrast_ratio(fg_color, bg_color);
    let threshold = config.thresholds.contrast;
    let passed = ratio >= threshold;

    let body = VraOutput::Contrast(ContrastOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        fg: to_hex(fg_color),
        bg: to_hex(bg_color),
        ratio,
        threshold,
        passed,
    });
    emit(body, format, output).unwrap_or_else(|| exit_code_for_compare(passed))
}
