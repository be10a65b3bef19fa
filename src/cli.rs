use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vra")]
#[command(
    version,
    about = "Visual Regression Assertions - Decide whether a screenshot has diverged from its baseline",
    long_about = "Visual Regression Assertions (VRA)\n\nModes:\n- compare: run thresholded checks (ssim, theme, diff, template, feature, contrast, hash) over a captured screenshot.\n- locate: find a template inside a larger image with multi-scale matching.\n- features: locate an object in a scene with keypoints and a RANSAC homography.\n- boxes: detect layout boxes and the gaps between them.\n- hash: compute difference hashes and their Hamming distance.\n- contrast: WCAG contrast ratio between two colours.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable debug logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with thresholds, matcher tuning and enforcement policies; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run thresholded checks on a screenshot against its baseline
    Compare {
        #[arg(long, help = "Freshly captured screenshot")]
        actual: PathBuf,

        #[arg(long, help = "Baseline screenshot (resized to the actual's size)")]
        baseline: Option<PathBuf>,

        #[arg(long, help = "Grayscale mask for the diff check (0 = ignore, 255 = check)")]
        mask: Option<PathBuf>,

        #[arg(long, help = "Element crop to search for the template in (defaults to --actual)")]
        element: Option<PathBuf>,

        #[arg(long, help = "Template image to locate (template and feature checks)")]
        template: Option<PathBuf>,

        #[arg(long, value_name = "HEX", help = "Foreground colour for the contrast check")]
        fg: Option<String>,

        #[arg(
            long,
            value_name = "HEX",
            help = "Background colour for the contrast check (defaults to the centre pixel of the element or screenshot)"
        )]
        bg: Option<String>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Checks to run, in order (ssim,theme,diff,template,feature,contrast,hash)"
        )]
        checks: Option<Vec<String>>,

        #[arg(
            long,
            value_name = "POLICY",
            help = "Enforcement policy for every check (fail-fast, log-only, collect-all)"
        )]
        policy: Option<String>,

        #[arg(long, value_name = "0-255", help = "Diff intensity treated as capture noise")]
        noise_threshold: Option<u8>,

        #[arg(
            long,
            value_name = "PATH",
            help = "Directory to write the diff overlay into; created if missing"
        )]
        artifacts_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Locate a template inside a larger image
    Locate {
        #[arg(long, help = "Image to search in")]
        haystack: PathBuf,

        #[arg(long, help = "Template to find")]
        needle: PathBuf,

        #[arg(long, help = "Match at the native scale only")]
        single_scale: bool,

        #[arg(long, value_name = "KERNEL", help = "Gaussian blur kernel (odd, >= 3; 0 disables)")]
        blur: Option<u32>,

        #[arg(long, help = "Largest template scale to try")]
        max_scale: Option<f64>,

        #[arg(long, help = "Smallest template scale to try")]
        min_scale: Option<f64>,

        #[arg(long, help = "Scale decrement between attempts")]
        step: Option<f64>,

        #[arg(long, help = "Shrink the needle to fit the haystack before matching")]
        fit: bool,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Locate an object in a scene with keypoint matching
    Features {
        #[arg(long, help = "Image to search in")]
        scene: PathBuf,

        #[arg(long, help = "Object to find")]
        object: PathBuf,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Detect layout boxes and horizontal gaps
    Boxes {
        #[arg(long, help = "Screenshot to analyse")]
        image: PathBuf,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Compute the 64-bit difference hash of an image
    Hash {
        #[arg(long, help = "Image to hash")]
        image: PathBuf,

        #[arg(long, help = "Second image; reports the Hamming distance between hashes")]
        other: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// WCAG contrast ratio between two colours
    Contrast {
        #[arg(long, value_name = "HEX", help = "Foreground colour, e.g. '#FFA500'")]
        fg: String,

        #[arg(long, value_name = "HEX", help = "Background colour, e.g. '#FFFFFF'")]
        bg: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
