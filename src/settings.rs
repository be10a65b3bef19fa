use std::path::Path;

use vra_lib::config::TemplateOptions;
use vra_lib::{CheckKind, Config, Enforcement, VraError};

/// Load config from a TOML file, or return defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, VraError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());
        VraError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        VraError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Apply compare flags on top of the loaded config. A CLI policy replaces the
/// default and every per-check override.
pub fn apply_compare_overrides(
    config: &mut Config,
    cli_policy: Option<&str>,
    cli_noise_threshold: Option<u8>,
) -> Result<(), VraError> {
    if let Some(raw) = cli_policy {
        let policy: Enforcement = raw.parse()?;
        config.enforcement.default = policy;
        config.enforcement.overrides.clear();
    }
    if let Some(noise) = cli_noise_threshold {
        config.diff.noise_threshold = noise;
    }
    Ok(())
}

/// Merge locate flags with the config's template section, preferring CLI.
pub fn resolve_template_options(
    cli_blur: Option<u32>,
    cli_max_scale: Option<f64>,
    cli_min_scale: Option<f64>,
    cli_step: Option<f64>,
    config: &Config,
) -> Result<TemplateOptions, VraError> {
    let options = TemplateOptions {
        blur_kernel: cli_blur.unwrap_or(config.template.blur_kernel),
        max_scale: cli_max_scale.unwrap_or(config.template.max_scale),
        min_scale: cli_min_scale.unwrap_or(config.template.min_scale),
        step: cli_step.unwrap_or(config.template.step),
    };
    options.validate()?;
    Ok(options)
}

/// Parse `--checks` values. An absent or empty list selects every check.
pub fn parse_check_kinds(raw: Option<&[String]>) -> Result<Vec<CheckKind>, VraError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut kinds = Vec::new();
    for name in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let kind: CheckKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// One-line summary of the settings a compare run uses.
pub fn format_effective_config(config_path: Option<&Path>, config: &Config) -> String {
    let source = config_path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "defaults/built-in".to_string());
    let t = &config.thresholds;
    let overrides = config
        .enforcement
        .overrides
        .iter()
        .map(|(kind, policy)| format!("{}={}", kind, policy))
        .collect::<Vec<_>>();
    format!(
        "Effective config (source: {}): ssim >= {}, theme >= {}, diff < {}%, template >= {}, feature >= {}, contrast >= {}, hash <= {}, noise {}, policy {}{}",
        source,
        t.ssim,
        t.theme,
        t.diff_pct,
        t.template,
        t.feature_inliers,
        t.contrast,
        t.hash_distance,
        config.diff.noise_threshold,
        config.enforcement.default,
        if overrides.is_empty() {
            String::new()
        } else {
            format!(" ({})", overrides.join(", "))
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Some(Path::new("/no/such/vra.toml"))).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Failed to read config /no/such/vra.toml"), "{msg}");
        assert!(msg.contains("not found"));
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("vra.toml");
        fs::write(&path, "[template]\nmin_scale = 0.0\n").expect("write config");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config ("), "{err}");
    }

    #[test]
    fn load_config_defaults_without_path() {
        let cfg = load_config(None).expect("defaults");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn cli_policy_replaces_overrides() {
        let mut cfg = Config::default();
        cfg.enforcement
            .overrides
            .insert(CheckKind::Contrast, Enforcement::LogOnly);

        apply_compare_overrides(&mut cfg, Some("fail-fast"), Some(12)).expect("apply");

        assert_eq!(cfg.enforcement.default, Enforcement::FailFast);
        assert!(cfg.enforcement.overrides.is_empty());
        assert_eq!(cfg.policy_for(CheckKind::Contrast), Enforcement::FailFast);
        assert_eq!(cfg.diff.noise_threshold, 12);
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        let mut cfg = Config::default();
        let err = apply_compare_overrides(&mut cfg, Some("sometimes"), None).unwrap_err();
        assert!(matches!(err, VraError::Config(_)));
    }

    #[test]
    fn template_options_prefer_cli_flags() {
        let cfg = Config::default();
        let options = resolve_template_options(Some(0), None, Some(0.5), None, &cfg).expect("resolve");
        assert_eq!(options.blur_kernel, 0);
        assert!((options.max_scale - 1.0).abs() < f64::EPSILON);
        assert!((options.min_scale - 0.5).abs() < f64::EPSILON);
        assert!((options.step - 0.05).abs() < f64::EPSILON);

        let err = resolve_template_options(None, Some(0.3), None, None, &cfg).unwrap_err();
        assert!(matches!(err, VraError::InvalidRange { .. }));
    }

    #[test]
    fn parse_check_kinds_keeps_order_and_drops_duplicates() {
        let raw = vec!["diff".to_string(), " SSIM ".to_string(), "diff".to_string()];
        let kinds = parse_check_kinds(Some(&raw)).expect("parse");
        assert_eq!(kinds, vec![CheckKind::Diff, CheckKind::Ssim]);

        assert!(parse_check_kinds(None).expect("none").is_empty());
        let bad = vec!["blur".to_string()];
        assert!(parse_check_kinds(Some(&bad)).is_err());
    }

    #[test]
    fn effective_config_lists_thresholds_and_policies() {
        let mut cfg = Config::default();
        cfg.enforcement
            .overrides
            .insert(CheckKind::Hash, Enforcement::LogOnly);
        let line = format_effective_config(None, &cfg);
        assert!(line.contains("defaults/built-in"));
        assert!(line.contains("ssim >= 0.985"));
        assert!(line.contains("diff < 1.5%"));
        assert!(line.contains("policy collect-all (hash=log-only)"));
    }
}
