use image::{DynamicImage, RgbImage};
use palette::Srgb;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::contrast::{to_hex, wcag_contrast_ratio};
use super::diff::diff_with_mask;
use super::hash::{dhash64, hamming};
use super::histogram::hsv_correlation;
use super::matcher::{FeatureMatcher, Matcher, TemplateMatcher};
use super::ssim::ssim;
use crate::config::Config;
use crate::error::VraError;
use crate::types::{CheckKind, CheckOutcome, Enforcement, Verdict};
use crate::Result;

/// Everything a check may look at. Checks whose inputs are absent are
/// skipped rather than failed.
#[derive(Debug, Clone, Copy)]
pub struct CheckInputs<'a> {
    /// Freshly captured screenshot
    pub actual: &'a DynamicImage,
    pub baseline: Option<&'a DynamicImage>,
    /// 0 = ignore, 255 = check
    pub mask: Option<&'a DynamicImage>,
    /// Element crop to search in; falls back to `actual`
    pub element: Option<&'a DynamicImage>,
    /// Template to locate in the element
    pub template: Option<&'a DynamicImage>,
    /// Foreground and background colour for the contrast check
    pub colors: Option<(Srgb<u8>, Srgb<u8>)>,
}

impl<'a> CheckInputs<'a> {
    pub fn new(actual: &'a DynamicImage) -> Self {
        Self {
            actual,
            baseline: None,
            mask: None,
            element: None,
            template: None,
            colors: None,
        }
    }

    pub fn with_baseline(mut self, baseline: &'a DynamicImage) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_mask(mut self, mask: &'a DynamicImage) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_element(mut self, element: &'a DynamicImage) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_template(mut self, template: &'a DynamicImage) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_colors(mut self, fg: Srgb<u8>, bg: Srgb<u8>) -> Self {
        self.colors = Some((fg, bg));
        self
    }

    /// Image that template and feature checks search in.
    pub fn scene(&self) -> &'a DynamicImage {
        self.element.unwrap_or(self.actual)
    }
}

/// A named image produced while measuring, e.g. the diff overlay.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: &'static str,
    pub image: RgbImage,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub value: f64,
    pub detail: Option<String>,
    pub artifact: Option<Artifact>,
}

impl Measurement {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            detail: None,
            artifact: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One thresholded check in a comparison run.
pub trait Check {
    fn kind(&self) -> CheckKind;
    /// `Ok(None)` when the inputs this check needs are not present.
    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>>;
}

pub struct SsimCheck;

impl Check for SsimCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Ssim
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some(baseline) = inputs.baseline else {
            return Ok(None);
        };
        Ok(Some(Measurement::new(ssim(inputs.actual, baseline)?)))
    }
}

pub struct ThemeCheck;

impl Check for ThemeCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Theme
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some(baseline) = inputs.baseline else {
            return Ok(None);
        };
        Ok(Some(Measurement::new(hsv_correlation(inputs.actual, baseline)?)))
    }
}

pub struct DiffCheck {
    pub noise_threshold: u8,
}

impl Check for DiffCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Diff
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some(baseline) = inputs.baseline else {
            return Ok(None);
        };
        let diff = diff_with_mask(inputs.actual, baseline, inputs.mask, self.noise_threshold)?;
        Ok(Some(Measurement {
            value: diff.changed_pct,
            detail: Some(format!(
                "{} of {} pixels changed",
                diff.changed_pixels, diff.total_pixels
            )),
            artifact: Some(Artifact {
                name: "diff_overlay",
                image: diff.overlay,
            }),
        }))
    }
}

pub struct HashCheck;

impl Check for HashCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Hash
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some(baseline) = inputs.baseline else {
            return Ok(None);
        };
        let a = dhash64(inputs.actual)?;
        let b = dhash64(baseline)?;
        Ok(Some(
            Measurement::new(f64::from(hamming(a, b)))
                .with_detail(format!("actual={:016x} baseline={:016x}", a, b)),
        ))
    }
}

pub struct ContrastCheck;

impl Check for ContrastCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Contrast
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some((fg, bg)) = inputs.colors else {
            return Ok(None);
        };
        Ok(Some(
            Measurement::new(wcag_contrast_ratio(fg, bg))
                .with_detail(format!("fg={} bg={}", to_hex(fg), to_hex(bg))),
        ))
    }
}

/// Template or feature location of `template` within the scene, through the
/// common [`Matcher`] interface.
pub struct MatcherCheck {
    kind: CheckKind,
    matcher: Box<dyn Matcher>,
}

impl MatcherCheck {
    pub fn new(kind: CheckKind, matcher: Box<dyn Matcher>) -> Self {
        Self { kind, matcher }
    }
}

impl Check for MatcherCheck {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    fn measure(&self, inputs: &CheckInputs<'_>) -> Result<Option<Measurement>> {
        let Some(template) = inputs.template else {
            return Ok(None);
        };
        let located = self.matcher.locate(inputs.scene(), template)?;
        let detail = match located.region {
            Some(r) => format!(
                "{} match at ({}, {}) size {}x{}",
                self.matcher.name(),
                r.x,
                r.y,
                r.width,
                r.height
            ),
            None => format!("{} match not found", self.matcher.name()),
        };
        Ok(Some(Measurement::new(located.confidence).with_detail(detail)))
    }
}

/// The full set of checks, configured from `config`.
pub fn default_checks(config: &Config) -> Vec<Box<dyn Check>> {
    vec![
        Box::new(SsimCheck),
        Box::new(ThemeCheck),
        Box::new(DiffCheck {
            noise_threshold: config.diff.noise_threshold,
        }),
        Box::new(MatcherCheck::new(
            CheckKind::Template,
            Box::new(TemplateMatcher {
                options: config.template,
                single_scale: false,
            }),
        )),
        Box::new(MatcherCheck::new(
            CheckKind::Feature,
            Box::new(FeatureMatcher {
                options: config.feature,
            }),
        )),
        Box::new(ContrastCheck),
        Box::new(HashCheck),
    ]
}

/// Outcome of a comparison run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub outcomes: Vec<CheckOutcome>,
    /// Requested checks whose inputs were missing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<CheckKind>,
    /// Set when a fail-fast check stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<CheckKind>,
    #[serde(skip)]
    pub artifacts: Vec<Artifact>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.verdict != Verdict::Fail)
    }

    pub fn failures(&self) -> Vec<&CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Fail)
            .collect()
    }

    pub fn outcome(&self, kind: CheckKind) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == kind)
    }
}

/// Run the selected checks (all when `selected` is empty) in the requested
/// order.
///
/// Requesting a check that is not registered is a configuration error.
/// Checks are independent. A check that errors is recorded as an unsatisfied
/// outcome carrying the error text, so its policy decides whether the run
/// fails, halts or only logs it. A fail-fast violation stops the remaining
/// checks.
pub fn run_checks(
    checks: &[Box<dyn Check>],
    selected: &[CheckKind],
    inputs: &CheckInputs<'_>,
    config: &Config,
) -> Result<CheckReport> {
    let desired: Vec<CheckKind> = if selected.is_empty() {
        CheckKind::all().to_vec()
    } else {
        selected.to_vec()
    };

    let missing: Vec<CheckKind> = desired
        .iter()
        .copied()
        .filter(|kind| !checks.iter().any(|c| c.kind() == *kind))
        .collect();
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(VraError::Config(format!(
            "Requested checks not available: {}",
            names
        )));
    }

    let mut report = CheckReport::default();
    for kind in desired {
        let Some(check) = checks.iter().find(|c| c.kind() == kind) else {
            continue;
        };
        let enforcement = config.policy_for(kind);
        let threshold = config.thresholds.for_check(kind);

        let outcome = match check.measure(inputs) {
            Ok(None) => {
                debug!(check = %kind, "inputs missing, skipping check");
                report.skipped.push(kind);
                continue;
            }
            Ok(Some(measurement)) => {
                let mut outcome =
                    CheckOutcome::evaluate(kind, measurement.value, threshold, enforcement);
                if let Some(detail) = measurement.detail {
                    outcome = outcome.with_detail(detail);
                }
                if let Some(artifact) = measurement.artifact {
                    report.artifacts.push(artifact);
                }
                info!(
                    check = %kind,
                    measured = outcome.measured,
                    threshold,
                    verdict = ?outcome.verdict,
                    "check evaluated"
                );
                if !outcome.satisfied {
                    warn!(
                        check = %kind,
                        measured = outcome.measured,
                        threshold,
                        comparison = outcome.comparison.symbol(),
                        policy = %enforcement,
                        "threshold violated"
                    );
                }
                outcome
            }
            Err(err) => {
                let err = VraError::check(format!("{} could not be measured: {}", kind, err));
                warn!(check = %kind, policy = %enforcement, error = %err, "check errored");
                CheckOutcome::errored(kind, threshold, enforcement, err.to_string())
            }
        };

        let halt = !outcome.satisfied && enforcement == Enforcement::FailFast;
        report.outcomes.push(outcome);
        if halt {
            warn!(check = %kind, "fail-fast check violated, stopping run");
            report.halted_by = Some(kind);
            break;
        }
    }

    Ok(report)
}
