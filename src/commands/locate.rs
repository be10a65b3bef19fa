use std::path::PathBuf;
use std::process::ExitCode;

use image::GenericImageView;
use tracing::debug;
use vra_lib::image_loader::fit_within;
use vra_lib::output::{LocateOutput, VRA_OUTPUT_VERSION};
use vra_lib::{load_image, match_multi_scale, match_single_scale, VraError, VraOutput};

use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::{load_config, resolve_template_options};

/// Run the locate command.
#[allow(clippy::too_many_arguments)]
pub fn run_locate(
    config_path: Option<PathBuf>,
    haystack: PathBuf,
    needle: PathBuf,
    single_scale: bool,
    blur: Option<u32>,
    max_scale: Option<f64>,
    min_scale: Option<f64>,
    step: Option<f64>,
    fit: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let options = match resolve_template_options(blur, max_scale, min_scale, step, &config) {
        Ok(options) => options,
        Err(err) => return render_error(err, format, output),
    };

    let hay = match load_image(&haystack) {
        Ok(img) => img,
        Err(err) => return render_error(err.into(), format, output),
    };
    let raw_needle = match load_image(&needle) {
        Ok(img) => img,
        Err(err) => return render_error(err.into(), format, output),
    };

    let (needle_img, fitted) = if fit {
        let fitted = fit_within(&raw_needle, hay.dimensions());
        let changed = fitted.dimensions() != raw_needle.dimensions();
        (fitted, changed)
    } else {
        (raw_needle, false)
    };
    debug!(
        haystack = %haystack.display(),
        needle = %needle.display(),
        single_scale,
        fitted,
        "locating template"
    );

    let result = if single_scale {
        match_single_scale(&hay, &needle_img, options.blur_kernel)
    } else {
        match_multi_scale(&hay, &needle_img, &options)
    };
    let result = match result {
        Ok(result) => result,
        Err(err) => return render_error(err, format, output),
    };

    let body = VraOutput::Locate(LocateOutput {
        version: VRA_OUTPUT_VERSION.to_string(),
        haystack: haystack.display().to_string(),
        needle: needle.display().to_string(),
        fitted,
        single_scale,
        result,
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            VraError::Config(format!("Failed to write output: {}", err)),
            format,
            output,
        );
    }
    ExitCode::SUCCESS
}
