mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_boxes, run_compare, run_contrast, run_features, run_hash, run_locate};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose);
    vra_lib::ensure_initialized();

    match args.command {
        Commands::Compare {
            actual,
            baseline,
            mask,
            element,
            template,
            fg,
            bg,
            checks,
            policy,
            noise_threshold,
            artifacts_dir,
            format,
            output,
        } => run_compare(
            args.config,
            actual,
            baseline,
            mask,
            element,
            template,
            fg,
            bg,
            checks,
            policy,
            noise_threshold,
            artifacts_dir,
            format,
            output,
        ),
        Commands::Locate {
            haystack,
            needle,
            single_scale,
            blur,
            max_scale,
            min_scale,
            step,
            fit,
            format,
            output,
        } => run_locate(
            args.config,
            haystack,
            needle,
            single_scale,
            blur,
            max_scale,
            min_scale,
            step,
            fit,
            format,
            output,
        ),
        Commands::Features {
            scene,
            object,
            format,
            output,
        } => run_features(args.config, scene, object, format, output),
        Commands::Boxes {
            image,
            format,
            output,
        } => run_boxes(image, format, output),
        Commands::Hash {
            image,
            other,
            format,
            output,
        } => run_hash(image, other, format, output),
        Commands::Contrast {
            fg,
            bg,
            format,
            output,
        } => run_contrast(args.config, fg, bg, format, output),
    }
}

/// Logs go to stderr so stdout stays machine-readable. `--verbose` forces
/// debug; otherwise `RUST_LOG` applies, defaulting to warnings only.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
