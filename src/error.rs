use crate::image_loader::ImageLoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Width and height of an image, rendered as `WxH` in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims(pub u32, pub u32);

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

impl From<(u32, u32)> for Dims {
    fn from((w, h): (u32, u32)) -> Self {
        Dims(w, h)
    }
}

#[derive(Debug, Error)]
pub enum VraError {
    #[error("Invalid image '{name}': {dims} (image must be non-empty)")]
    InvalidImage { name: String, dims: Dims },

    #[error("Needle larger than haystack: haystack={haystack}, needle={needle}")]
    SizeMismatch { haystack: Dims, needle: Dims },

    #[error("Invalid scales: maxScale={max_scale}, minScale={min_scale}, step={step}")]
    InvalidRange {
        max_scale: f64,
        min_scale: f64,
        step: f64,
    },

    #[error(
        "No feasible scale found where needle fits haystack: haystack={haystack}, needle={needle}"
    )]
    NoFeasibleScale { haystack: Dims, needle: Dims },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Check error: {0}")]
    Check(String),
}

impl VraError {
    pub fn invalid_image(name: impl Into<String>, dims: impl Into<Dims>) -> Self {
        VraError::InvalidImage {
            name: name.into(),
            dims: dims.into(),
        }
    }

    pub fn size_mismatch(haystack: impl Into<Dims>, needle: impl Into<Dims>) -> Self {
        VraError::SizeMismatch {
            haystack: haystack.into(),
            needle: needle.into(),
        }
    }

    pub fn no_feasible_scale(haystack: impl Into<Dims>, needle: impl Into<Dims>) -> Self {
        VraError::NoFeasibleScale {
            haystack: haystack.into(),
            needle: needle.into(),
        }
    }

    pub fn check(message: impl Into<String>) -> Self {
        VraError::Check(message.into())
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            VraError::InvalidImage { .. } => ErrorPayload::new(
                ErrorCategory::Image,
                self.to_string(),
                "Check screenshot capture or the image path; empty buffers cannot be compared.",
            ),
            VraError::SizeMismatch { .. } => ErrorPayload::new(
                ErrorCategory::Matching,
                self.to_string(),
                "Use multi-scale matching or shrink the template to fit (locate --fit).",
            ),
            VraError::InvalidRange { .. } => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Require max-scale >= min-scale > 0 and step > 0.",
            ),
            VraError::NoFeasibleScale { .. } => ErrorPayload::new(
                ErrorCategory::Matching,
                self.to_string(),
                "Lower --min-scale or check that the needle was captured from the same page.",
            ),
            VraError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            VraError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify image path/format and readability.",
            ),
            VraError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON/serialization inputs; run with --verbose for details.",
            ),
            VraError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("file not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else if lower.contains("unknown check") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use one of: ssim, theme, diff, template, feature, contrast, hash.",
                    )
                } else if lower.contains("color") || lower.contains("colour") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Pass colors as hex codes, e.g. --fg '#FFA500'.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the [thresholds]/[template] sections of the config file.",
                    )
                }
            }
            VraError::Check(msg) => ErrorPayload::new(
                ErrorCategory::Check,
                msg.to_string(),
                "Inspect check inputs; try rerunning with --verbose.",
            ),
        }
    }
}

impl From<ImageLoadError> for VraError {
    fn from(err: ImageLoadError) -> Self {
        match err {
            ImageLoadError::Load(e) => VraError::Image(e),
            ImageLoadError::NotFound(path) => VraError::Config(format!("File not found: {}", path)),
            ImageLoadError::Save(msg) => VraError::Io(std::io::Error::other(format!(
                "Failed to save image: {}",
                msg
            ))),
        }
    }
}

pub type Result<T> = std::result::Result<T, VraError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Image,
    Matching,
    Check,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_payload_suggests_fitting() {
        let err = VraError::size_mismatch((10, 10), (20, 5));
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Matching);
        assert!(payload.message.contains("haystack=10x10"));
        assert!(payload.message.contains("needle=20x5"));
        let remediation = payload.remediation.unwrap_or_default();
        assert!(
            remediation.contains("--fit"),
            "expected fit remediation, got: {remediation}"
        );
    }

    #[test]
    fn invalid_range_is_a_config_error() {
        let err = VraError::InvalidRange {
            max_scale: 0.3,
            min_scale: 0.5,
            step: 0.05,
        };
        assert_eq!(err.to_payload().category, ErrorCategory::Config);
    }

    #[test]
    fn config_payload_includes_file_not_found_hint() {
        let err = VraError::Config("File not found: missing.png".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(
            remediation.to_ascii_lowercase().contains("absolute path"),
            "expected file path remediation, got: {remediation}"
        );
    }

    #[test]
    fn config_payload_lists_check_names_for_unknown_check() {
        let err = VraError::Config("Unknown check kind: blur".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("ssim") && remediation.contains("hash"));
    }

    #[test]
    fn config_payload_uses_default_remediation_for_other_messages() {
        let err = VraError::Config("Some other config issue".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("Check flags/paths"));
    }

    #[test]
    fn not_found_load_error_becomes_config_error() {
        let err: VraError = ImageLoadError::NotFound("baseline.png".to_string()).into();
        assert_eq!(format!("{}", err), "Configuration error: File not found: baseline.png");
    }

    #[test]
    fn every_category_serializes_to_a_known_name() {
        let errors = [
            VraError::invalid_image("img1", (0, 0)),
            VraError::size_mismatch((4, 4), (8, 8)),
            VraError::Config("bad".to_string()),
            VraError::check("template could not be measured"),
        ];
        let names: Vec<String> = errors
            .iter()
            .map(|e| serde_json::to_string(&e.to_payload().category).expect("serialize"))
            .collect();
        assert_eq!(names, ["\"image\"", "\"matching\"", "\"config\"", "\"check\""]);
    }
}
