use concilio_import::MatcherConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::statement::{BillingCycle, ReconcileConfig};
use crate::totals::TotalsConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Longest day span accepted for any window or offset.
pub const MAX_SPAN_DAYS: u32 = 366;

/// Rule tables to load instead of the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePaths {
    pub checking: Option<PathBuf>,
    pub card: Option<PathBuf>,
}

/// Every tunable of a run. All sections and fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub totals: TotalsConfig,
    pub reconcile: ReconcileConfig,
    pub matcher: MatcherConfig,
    pub rules: RulePaths,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let r = &self.reconcile;
        check_range("reconcile.first_period_days", r.first_period_days, 1, MAX_SPAN_DAYS)?;
        check_range("reconcile.one_off_window_days", r.one_off_window_days, 0, MAX_SPAN_DAYS)?;
        match r.cycle {
            BillingCycle::MonthlyClose { closing_day } => {
                check_range("reconcile.cycle.closing_day", closing_day, 1, 31)
            }
            BillingCycle::DaysBeforePayment { days } => {
                check_range("reconcile.cycle.days", days, 0, MAX_SPAN_DAYS)
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange { field, value, min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{BillingCycle, BoundaryConfidence};
    use concilio_core::{CategoryKind, Money};
    use rust_decimal::Decimal;

    #[test]
    fn empty_file_is_default() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s.totals, TotalsConfig::default());
        assert_eq!(s.reconcile, ReconcileConfig::default());
        assert_eq!(s.matcher.min_token_len, 3);
        assert!(s.rules.checking.is_none());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let s = Settings::from_toml(
            r#"
[totals]
initial_capital = "2500.00"
plug_threshold = "100"

[reconcile]
tight_tolerance_pct = "0.25"
boundaries = "estimated"
cycle = { rule = "days_before_payment", days = 22 }

[matcher]
min_token_len = 4

[rules]
card = "rules/card.toml"
"#,
        )
        .unwrap();
        assert_eq!(s.totals.initial_capital, Money::from_cents(250_000));
        assert_eq!(s.totals.plug_threshold, Some(Money::from_cents(10_000)));
        assert_eq!(s.reconcile.tight_tolerance_pct, Decimal::new(25, 2));
        assert_eq!(s.reconcile.boundaries, BoundaryConfidence::Estimated);
        assert_eq!(s.reconcile.cycle, BillingCycle::DaysBeforePayment { days: 22 });
        assert_eq!(s.reconcile.one_off_window_days, 7);
        assert_eq!(s.reconcile.payment_kind, CategoryKind::CardPayment);
        assert_eq!(s.matcher.min_token_len, 4);
        assert_eq!(s.rules.card, Some(PathBuf::from("rules/card.toml")));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Settings::from_toml("[reconcile]\npayment_kind = \"bogus\"").unwrap_err();
        assert!(matches!(err, SettingsError::Toml(_)));
    }

    #[test]
    fn rejects_out_of_range_spans() {
        let err = Settings::from_toml("[reconcile]\nfirst_period_days = 4000000000").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::OutOfRange { field: "reconcile.first_period_days", value: 4_000_000_000, .. }
        ));

        let err = Settings::from_toml("[reconcile]\ncycle = { rule = \"days_before_payment\", days = 4000000000 }")
            .unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { field: "reconcile.cycle.days", .. }));

        let err = Settings::from_toml("[reconcile]\ncycle = { rule = \"monthly_close\", closing_day = 0 }")
            .unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { field: "reconcile.cycle.closing_day", .. }));

        assert!(Settings::from_toml("[reconcile]\nfirst_period_days = 366").is_ok());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concilio.toml");
        std::fs::write(&path, "[totals]\ninitial_capital = \"10\"\n").unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.totals.initial_capital, Money::from_cents(1_000));
    }

    #[test]
    fn load_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concilio.toml");
        std::fs::write(&path, "[reconcile]\none_off_window_days = 1000\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { max: MAX_SPAN_DAYS, .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Settings::load(Path::new("/nonexistent/concilio.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
