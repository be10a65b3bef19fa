use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VraError;
use crate::types::{CheckKind, Enforcement};

/// Engine configuration: every threshold and tuning knob in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub template: TemplateOptions,
    pub feature: FeatureOptions,
    pub diff: DiffOptions,
    pub enforcement: EnforcementConfig,
}

/// Pass/fail cutoffs, one per check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub ssim: f64,
    pub theme: f64,
    pub diff_pct: f64,
    pub template: f64,
    pub contrast: f64,
    pub feature_inliers: f64,
    pub hash_distance: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ssim: 0.985,
            theme: 0.95,
            diff_pct: 1.5,
            template: 0.92,
            contrast: 4.5,
            feature_inliers: 0.5,
            hash_distance: 10,
        }
    }
}

impl Thresholds {
    pub fn for_check(&self, kind: CheckKind) -> f64 {
        match kind {
            CheckKind::Ssim => self.ssim,
            CheckKind::Theme => self.theme,
            CheckKind::Diff => self.diff_pct,
            CheckKind::Template => self.template,
            CheckKind::Feature => self.feature_inliers,
            CheckKind::Contrast => self.contrast,
            CheckKind::Hash => f64::from(self.hash_distance),
        }
    }
}

/// Multi-scale template search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    /// Odd and >= 3 enables Gaussian blur before matching; anything else disables it
    pub blur_kernel: u32,
    pub max_scale: f64,
    pub min_scale: f64,
    pub step: f64,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            blur_kernel: 3,
            max_scale: 1.0,
            min_scale: 0.35,
            step: 0.05,
        }
    }
}

impl TemplateOptions {
    pub fn validate(&self) -> Result<(), VraError> {
        let valid = self.max_scale.is_finite()
            && self.min_scale.is_finite()
            && self.step.is_finite()
            && self.min_scale > 0.0
            && self.step > 0.0
            && self.max_scale >= self.min_scale;
        if valid {
            Ok(())
        } else {
            Err(VraError::InvalidRange {
                max_scale: self.max_scale,
                min_scale: self.min_scale,
                step: self.step,
            })
        }
    }
}

/// Keypoint matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureOptions {
    pub max_features: usize,
    /// Lowe ratio: nearest distance must be below `ratio` times the second nearest
    pub ratio: f32,
    pub min_correspondences: usize,
    /// RANSAC reprojection threshold in pixels
    pub reprojection_threshold: f64,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            max_features: 1000,
            ratio: 0.75,
            min_correspondences: 6,
            reprojection_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Diff intensities at or below this value count as capture noise
    pub noise_threshold: u8,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            noise_threshold: 25,
        }
    }
}

/// Default enforcement policy with optional per-check overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    pub default: Enforcement,
    #[serde(flatten)]
    pub overrides: BTreeMap<CheckKind, Enforcement>,
}

impl Config {
    /// Load config from a TOML file, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Config, VraError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        if !path.exists() {
            return Err(VraError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        Config::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config, VraError> {
        toml::from_str(raw).map_err(|e| VraError::Config(format!("Invalid config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), VraError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("ssim", t.ssim),
            ("theme", t.theme),
            ("diff_pct", t.diff_pct),
            ("template", t.template),
            ("contrast", t.contrast),
            ("feature_inliers", t.feature_inliers),
        ] {
            if !value.is_finite() {
                return Err(VraError::Config(format!(
                    "threshold '{}' must be a finite number",
                    name
                )));
            }
        }
        if t.diff_pct < 0.0 {
            return Err(VraError::Config(
                "threshold 'diff_pct' must be non-negative".to_string(),
            ));
        }

        self.template.validate()?;

        let f = &self.feature;
        if f.max_features == 0 {
            return Err(VraError::Config(
                "feature.max_features must be positive".to_string(),
            ));
        }
        if !(f.ratio > 0.0 && f.ratio <= 1.0) {
            return Err(VraError::Config(format!(
                "feature.ratio must be in (0, 1], got {}",
                f.ratio
            )));
        }
        if !(f.reprojection_threshold.is_finite() && f.reprojection_threshold > 0.0) {
            return Err(VraError::Config(
                "feature.reprojection_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy_for(&self, kind: CheckKind) -> Enforcement {
        self.enforcement
            .overrides
            .get(&kind)
            .copied()
            .unwrap_or(self.enforcement.default)
    }
}
