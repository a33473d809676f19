pub mod audit;
pub mod hash;
pub mod report;
pub mod settings;
pub mod statement;
pub mod summary;
pub mod totals;

pub use audit::{AuditEntry, AuditStep, AuditTrail};
pub use report::{Pipeline, Report, ReportError, ReportInputs};
pub use settings::{Settings, SettingsError};
pub use statement::{
    BillingCycle, BoundaryConfidence, ClassifiedPayment, PaymentClass, PeriodConfidence,
    ReconcileConfig, Reconciliation, StatementPeriod, StatementReconciler,
};
pub use summary::{summarize_card, summarize_checking, StatementSummary};
pub use totals::{compute_totals, FinancialTotals, TotalsConfig, TotalsError};
