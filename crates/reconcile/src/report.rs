use concilio_import::{
    defaults, load_roster, parse_card, parse_checking, Categorizer, CrossSourceMatcher,
    CrossSourceReport, RosterError, RowError, RuleError, RuleStats, StatementProfile,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::audit::{AuditStep, AuditTrail};
use crate::hash::content_digest;
use crate::settings::Settings;
use crate::statement::{Reconciliation, StatementReconciler};
use crate::summary::{summarize_card, summarize_checking, StatementSummary};
use crate::totals::{compute_totals, FinancialTotals, TotalsError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Rule table error: {0}")]
    Rules(#[from] RuleError),
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Totals(#[from] TotalsError),
}

/// Raw export text for one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub checking: &'a str,
    pub card: &'a str,
    pub roster: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDigest {
    pub name: &'static str,
    pub sha256: String,
    pub records: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRows {
    pub checking: Vec<RowError>,
    pub card: Vec<RowError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategorizationStats {
    pub checking: RuleStats,
    pub card: RuleStats,
}

/// Everything one run produces. Contains no timestamps, so identical inputs
/// serialize to identical JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub inputs: Vec<InputDigest>,
    pub rejected_rows: RejectedRows,
    pub categorization: CategorizationStats,
    pub totals: FinancialTotals,
    pub checking_summary: StatementSummary,
    pub card_summary: StatementSummary,
    pub reconciliation: Reconciliation,
    pub cross_source: Option<CrossSourceReport>,
    pub audit: AuditTrail,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse → categorize → totals / reconciliation / cross-source, wired from
/// one set of settings and two rule tables.
pub struct Pipeline {
    settings: Settings,
    checking_rules: Categorizer,
    card_rules: Categorizer,
}

impl Pipeline {
    pub fn new(settings: Settings, checking_rules: Categorizer, card_rules: Categorizer) -> Self {
        Self {
            settings,
            checking_rules,
            card_rules,
        }
    }

    /// Uses the built-in checking and card rule tables.
    pub fn with_default_rules(settings: Settings) -> Result<Self, RuleError> {
        Ok(Self::new(
            settings,
            Categorizer::new(defaults::checking_rules())?,
            Categorizer::new(defaults::card_rules())?,
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn run(&self, inputs: ReportInputs<'_>) -> Result<Report, ReportError> {
        let mut checking = parse_checking(inputs.checking, &StatementProfile::for_account("checking"));
        let mut card = parse_card(inputs.card, &StatementProfile::for_account("card"));

        let mut digests = vec![
            InputDigest {
                name: "checking",
                sha256: content_digest(inputs.checking),
                records: checking.records.len(),
                rejected: checking.rejected.len(),
            },
            InputDigest {
                name: "card",
                sha256: content_digest(inputs.card),
                records: card.records.len(),
                rejected: card.rejected.len(),
            },
        ];

        let categorization = CategorizationStats {
            checking: self.checking_rules.apply(&mut checking.records),
            card: self.card_rules.apply(&mut card.records),
        };

        let mut audit = AuditTrail::new();
        let totals = compute_totals(&checking.records, &card.records, &self.settings.totals, &mut audit)?;

        let reconciliation = StatementReconciler::new(self.settings.reconcile.clone())
            .reconcile(&checking.records, &card.records, &mut audit);

        let cross_source = match inputs.roster {
            Some(content) => {
                let roster = load_roster(content)?;
                digests.push(InputDigest {
                    name: "roster",
                    sha256: content_digest(content),
                    records: roster.len(),
                    rejected: 0,
                });
                let report = CrossSourceMatcher::new(self.settings.matcher.clone()).reconcile(
                    &roster,
                    &checking.records,
                    &card.records,
                );
                audit.record(
                    AuditStep::MatchRoster,
                    "Match roster parties to checking and card outflows by name tokens",
                    json!({ "parties": roster.len() }),
                    json!({
                        "expected_total": report.expected_total,
                        "matched_total": report.matched_total,
                        "variance": report.variance,
                        "unclaimed": report.unclaimed.len(),
                    }),
                );
                Some(report)
            }
            None => None,
        };

        Ok(Report {
            inputs: digests,
            rejected_rows: RejectedRows {
                checking: checking.rejected,
                card: card.rejected,
            },
            categorization,
            checking_summary: summarize_checking(&checking.records),
            card_summary: summarize_card(&card.records),
            totals,
            reconciliation,
            cross_source,
            audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concilio_core::Money;

    const CHECKING: &str = "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
CREDIT,01/02/2024,ONLINE TRANSFER FROM CHK ...1234,2153.00,ACCT_XFER,2178.00,
CREDIT,01/05/2024,\"ACH CREDIT LAUREL MANAGEMEN PAYMENT\",1340.00,ACH_CREDIT,3518.00,
DEBIT,02/19/2024,CHASE CREDIT CRD AUTOPAY,-800.00,ACH_DEBIT,2718.00,
";

    const CARD: &str = "\
Card,Transaction Date,Post Date,Description,Category,Type,Amount,Memo
1234,01/05/2024,01/06/2024,GITHUB,Shopping,Sale,500.00,
1234,01/20/2024,01/21/2024,\"UNITED AIRLINES, INC\",Travel,Sale,300.00,
1234,02/19/2024,02/19/2024,AUTOMATIC PAYMENT - THANK,,Payment,800.00,
";

    fn pipeline() -> Pipeline {
        Pipeline::with_default_rules(Settings::default()).unwrap()
    }

    fn inputs<'a>(roster: Option<&'a str>) -> ReportInputs<'a> {
        ReportInputs {
            checking: CHECKING,
            card: CARD,
            roster,
        }
    }

    #[test]
    fn end_to_end_report() {
        let report = pipeline().run(inputs(None)).unwrap();
        assert_eq!(report.inputs.len(), 2);
        assert_eq!(report.inputs[0].records, 3);
        assert_eq!(report.totals.business_revenue, Money::from_cents(134_000));
        assert_eq!(report.totals.owner_capital_contributions, Money::from_cents(215_300));
        assert_eq!(report.totals.card_total_expenses, Money::from_cents(80_000));
        assert_eq!(report.totals.current_cash_balance, Money::from_cents(271_800));
        assert!(report.totals.balance_equation_holds());

        assert_eq!(report.reconciliation.periods.len(), 1);
        let period = &report.reconciliation.periods[0];
        assert_eq!(period.charges_total, Money::from_cents(80_000));
        assert!(period.is_reconciled);
        assert!(report.cross_source.is_none());
    }

    #[test]
    fn identical_inputs_give_identical_json() {
        let a = pipeline().run(inputs(None)).unwrap().to_json().unwrap();
        let b = pipeline().run(inputs(None)).unwrap().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn roster_adds_cross_source_section() {
        let roster = "name,expected_total\nLaurel Management,0\n";
        let report = pipeline().run(inputs(Some(roster))).unwrap();
        assert_eq!(report.inputs.len(), 3);
        assert_eq!(report.inputs[2].name, "roster");
        assert!(report.cross_source.is_some());
        assert_eq!(
            report.audit.steps().last(),
            Some(AuditStep::MatchRoster)
        );
    }

    #[test]
    fn bad_roster_is_an_error() {
        let err = pipeline().run(inputs(Some("who,what\nx,y\n"))).unwrap_err();
        assert!(matches!(err, ReportError::Roster(RosterError::MissingColumn("name"))));
    }

    #[test]
    fn malformed_rows_are_reported_not_fatal() {
        let checking = format!("{CHECKING}DEBIT,not a date,JUNK,-1.00,ACH_DEBIT,,\n\n");
        let report = pipeline()
            .run(ReportInputs {
                checking: &checking,
                card: CARD,
                roster: None,
            })
            .unwrap();
        assert_eq!(report.inputs[0].records, 3);
        assert_eq!(report.rejected_rows.checking.len(), 1);
    }
}
