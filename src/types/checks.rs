//! Check result types for orchestrated comparisons.

use crate::error::VraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of check being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Ssim,
    Theme,
    Diff,
    Template,
    Feature,
    Contrast,
    Hash,
}

impl CheckKind {
    pub const fn all() -> [CheckKind; 7] {
        [
            CheckKind::Ssim,
            CheckKind::Theme,
            CheckKind::Diff,
            CheckKind::Template,
            CheckKind::Feature,
            CheckKind::Contrast,
            CheckKind::Hash,
        ]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Ssim => "ssim",
            CheckKind::Theme => "theme",
            CheckKind::Diff => "diff",
            CheckKind::Template => "template",
            CheckKind::Feature => "feature",
            CheckKind::Contrast => "contrast",
            CheckKind::Hash => "hash",
        }
    }

    /// How the measured value is compared against its threshold.
    pub const fn comparison(&self) -> Comparison {
        match self {
            CheckKind::Diff => Comparison::Below,
            CheckKind::Hash => Comparison::AtMost,
            _ => Comparison::AtLeast,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = VraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ssim" => Ok(CheckKind::Ssim),
            "theme" => Ok(CheckKind::Theme),
            "diff" => Ok(CheckKind::Diff),
            "template" => Ok(CheckKind::Template),
            "feature" => Ok(CheckKind::Feature),
            "contrast" => Ok(CheckKind::Contrast),
            "hash" => Ok(CheckKind::Hash),
            _ => Err(VraError::Config(format!("Unknown check kind: {}", s))),
        }
    }
}

/// Direction of a threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// measured >= threshold
    AtLeast,
    /// measured < threshold
    Below,
    /// measured <= threshold
    AtMost,
}

impl Comparison {
    pub fn satisfied(&self, measured: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => measured >= threshold,
            Comparison::Below => measured < threshold,
            Comparison::AtMost => measured <= threshold,
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::Below => "<",
            Comparison::AtMost => "<=",
        }
    }
}

/// What happens when a check violates its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enforcement {
    /// Stop evaluating further checks at the first violation
    FailFast,
    /// Record and log the measurement, never fail
    LogOnly,
    /// Record the failure and keep evaluating
    #[default]
    CollectAll,
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Enforcement::FailFast => "fail-fast",
            Enforcement::LogOnly => "log-only",
            Enforcement::CollectAll => "collect-all",
        })
    }
}

impl FromStr for Enforcement {
    type Err = VraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(Enforcement::FailFast),
            "log-only" => Ok(Enforcement::LogOnly),
            "collect-all" => Ok(Enforcement::CollectAll),
            _ => Err(VraError::Config(format!("Unknown enforcement policy: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Pass,
    Fail,
    ObservedOnly,
}

impl Verdict {
    pub fn decide(satisfied: bool, enforcement: Enforcement) -> Self {
        match (enforcement, satisfied) {
            (Enforcement::LogOnly, _) => Verdict::ObservedOnly,
            (_, true) => Verdict::Pass,
            (_, false) => Verdict::Fail,
        }
    }
}

/// The measured result of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub measured: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub verdict: Verdict,
    pub enforcement: Enforcement,
    /// Whether the measurement met the threshold, independent of enforcement
    pub satisfied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckOutcome {
    pub fn evaluate(
        check: CheckKind,
        measured: f64,
        threshold: f64,
        enforcement: Enforcement,
    ) -> Self {
        let comparison = check.comparison();
        let satisfied = comparison.satisfied(measured, threshold);
        Self {
            check,
            measured,
            threshold,
            comparison,
            verdict: Verdict::decide(satisfied, enforcement),
            enforcement,
            satisfied,
            detail: None,
        }
    }

    /// Outcome for a check whose measurement raised an error. `measured` is
    /// zero and never satisfies the threshold; the policy still picks the
    /// verdict.
    pub fn errored(
        check: CheckKind,
        threshold: f64,
        enforcement: Enforcement,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check,
            measured: 0.0,
            threshold,
            comparison: check.comparison(),
            verdict: Verdict::decide(false, enforcement),
            enforcement,
            satisfied: false,
            detail: Some(message.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_kind_display_and_parse_round_trip() {
        for kind in CheckKind::all() {
            let parsed = CheckKind::from_str(&kind.to_string()).expect("parse should succeed");
            assert_eq!(parsed, kind);
        }
        assert_eq!(CheckKind::from_str("SSIM").unwrap(), CheckKind::Ssim);
        assert!(CheckKind::from_str("blur").is_err());
    }

    #[test]
    fn diff_passes_only_strictly_below_threshold() {
        let at = CheckOutcome::evaluate(CheckKind::Diff, 1.5, 1.5, Enforcement::CollectAll);
        assert_eq!(at.verdict, Verdict::Fail);
        let below = CheckOutcome::evaluate(CheckKind::Diff, 1.49, 1.5, Enforcement::CollectAll);
        assert_eq!(below.verdict, Verdict::Pass);
    }

    #[test]
    fn ssim_passes_at_threshold() {
        let outcome = CheckOutcome::evaluate(CheckKind::Ssim, 0.985, 0.985, Enforcement::FailFast);
        assert_eq!(outcome.verdict, Verdict::Pass);
    }

    #[test]
    fn log_only_never_fails_but_keeps_satisfaction() {
        let outcome = CheckOutcome::evaluate(CheckKind::Contrast, 2.0, 4.5, Enforcement::LogOnly);
        assert_eq!(outcome.verdict, Verdict::ObservedOnly);
        assert!(!outcome.satisfied);
    }

    #[test]
    fn enforcement_parses_kebab_and_snake_case() {
        assert_eq!(Enforcement::from_str("fail-fast").unwrap(), Enforcement::FailFast);
        assert_eq!(Enforcement::from_str("LOG_ONLY").unwrap(), Enforcement::LogOnly);
        assert!(Enforcement::from_str("sometimes").is_err());
    }
}
