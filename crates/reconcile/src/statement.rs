use chrono::{Days, NaiveDate};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use concilio_core::period::{day_in_previous_month, month_key};
use concilio_core::{CardDirection, CardTransaction, Category, CategoryKind, DateRange, Money, Transaction};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditStep, AuditTrail};

/// How a statement's closing date is derived from the payment that settles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BillingCycle {
    /// The statement closes on `closing_day` of the month before the payment.
    MonthlyClose { closing_day: u32 },
    /// The statement closes a fixed number of days before the payment.
    DaysBeforePayment { days: u32 },
}

impl BillingCycle {
    /// Saturates at the earliest representable date.
    pub fn closing_date(self, payment_date: NaiveDate) -> NaiveDate {
        match self {
            BillingCycle::MonthlyClose { closing_day } => {
                day_in_previous_month(payment_date, closing_day)
            }
            BillingCycle::DaysBeforePayment { days } => {
                payment_date
                    .checked_sub_days(Days::new(u64::from(days)))
                    .unwrap_or(NaiveDate::MIN)
            }
        }
    }
}

impl Default for BillingCycle {
    fn default() -> Self {
        BillingCycle::MonthlyClose { closing_day: 25 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryConfidence {
    Known,
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Percent tolerance when billing boundaries are known.
    pub tight_tolerance_pct: Decimal,
    /// Percent tolerance when boundaries are estimated.
    pub estimated_tolerance_pct: Decimal,
    pub boundaries: BoundaryConfidence,
    /// Days either side of a one-off card payment within which a checking
    /// payment of the same amount is considered the same money.
    pub one_off_window_days: u32,
    /// Card payment descriptions that mark a recurring autopay.
    pub regular_payment_patterns: Vec<String>,
    /// Checking category kind that denotes a card payment.
    pub payment_kind: CategoryKind,
    /// Variance beyond which a period gets a directional note.
    pub large_variance: Money,
    pub cycle: BillingCycle,
    pub first_period_days: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tight_tolerance_pct: Decimal::new(1, 1),
            estimated_tolerance_pct: Decimal::new(5, 0),
            boundaries: BoundaryConfidence::Known,
            one_off_window_days: 7,
            regular_payment_patterns: vec![
                "AUTOMATIC PAYMENT".to_string(),
                "ATT*BILL PAYMENT".to_string(),
            ],
            payment_kind: CategoryKind::CardPayment,
            large_variance: Money::from_cents(100_000),
            cycle: BillingCycle::default(),
            first_period_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentClass {
    Regular,
    OneOff,
}

/// A card-side payment labeled by regularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedPayment {
    pub date: NaiveDate,
    pub settled_on: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub class: PaymentClass,
}

/// A checking payment kept out of period matching because it mirrors a
/// one-off card payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedPayment {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub one_off_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeLine {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category: Option<Category>,
}

impl From<&CardTransaction> for ChargeLine {
    fn from(tx: &CardTransaction) -> Self {
        ChargeLine {
            date: tx.date,
            description: tx.description.clone(),
            amount: tx.amount,
            category: tx.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodConfidence {
    High,
    Medium,
    Low,
}

impl PeriodConfidence {
    fn from_percent(pct: Decimal) -> Self {
        if pct <= Decimal::ONE {
            PeriodConfidence::High
        } else if pct <= Decimal::new(5, 0) {
            PeriodConfidence::Medium
        } else {
            PeriodConfidence::Low
        }
    }
}

/// The window of card charges one checking payment is presumed to settle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementPeriod {
    pub period_id: String,
    pub window: DateRange,
    pub payment_date: NaiveDate,
    pub payment_description: String,
    pub payment_amount: Money,
    pub charges: Vec<ChargeLine>,
    pub charges_total: Money,
    pub variance: Money,
    pub percent_variance: Decimal,
    pub is_reconciled: bool,
    pub confidence: PeriodConfidence,
    pub boundary: BoundaryConfidence,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationSummary {
    pub total_payments: Money,
    pub total_charges: Money,
    pub total_variance: Money,
    pub reconciled_count: usize,
    pub unreconciled_count: usize,
    pub one_off_payments: Vec<ClassifiedPayment>,
    pub one_off_total: Money,
    pub excluded_payments: Vec<ExcludedPayment>,
    /// Charges outside every period window.
    pub unassigned_charges: Vec<ChargeLine>,
    pub unassigned_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub payments: Vec<ClassifiedPayment>,
    pub periods: Vec<StatementPeriod>,
    pub summary: ReconciliationSummary,
}

/// Maps lump-sum card payments seen in checking to the card charges they
/// settle. Never drops or adjusts a period; judgment lives in the variance
/// and tolerance fields.
pub struct StatementReconciler {
    config: ReconcileConfig,
    patterns: Vec<String>,
}

impl StatementReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        let patterns = config
            .regular_payment_patterns
            .iter()
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { config, patterns }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Labels every card payment line. Refunds are credits but do not settle
    /// the card, so they are not classified.
    pub fn classify_payments(&self, card: &[CardTransaction]) -> Vec<ClassifiedPayment> {
        card.iter()
            .filter(|tx| tx.direction == CardDirection::Payment)
            .map(|tx| ClassifiedPayment {
                date: tx.date,
                settled_on: tx.settled_on(),
                description: tx.description.clone(),
                amount: tx.amount,
                class: self.payment_class(&tx.description),
            })
            .collect()
    }

    fn payment_class(&self, description: &str) -> PaymentClass {
        let upper = description.to_uppercase();
        if self.patterns.iter().any(|p| upper.contains(p.as_str())) {
            PaymentClass::Regular
        } else {
            PaymentClass::OneOff
        }
    }

    /// Splits checking card-payment debits into those that take part in
    /// period matching and those mirrored by a one-off card payment. Each
    /// one-off excludes at most one checking payment: the unclaimed one of
    /// equal amount nearest its settlement date, the later line on a tie.
    pub fn filter_payments<'a>(
        &self,
        checking: &'a [Transaction],
        classified: &[ClassifiedPayment],
    ) -> (Vec<&'a Transaction>, Vec<ExcludedPayment>) {
        let window = i64::from(self.config.one_off_window_days);
        let mut payments: Vec<&Transaction> = checking
            .iter()
            .filter(|tx| tx.is_debit() && tx.category_or_default().kind == self.config.payment_kind)
            .collect();
        payments.sort_by_key(|tx| tx.date);

        let mut one_offs: Vec<&ClassifiedPayment> = classified
            .iter()
            .filter(|p| p.class == PaymentClass::OneOff)
            .collect();
        one_offs.sort_by_key(|p| p.settled_on);

        let mut mirrors: Vec<Option<NaiveDate>> = vec![None; payments.len()];
        for one_off in one_offs {
            let nearest = payments
                .iter()
                .enumerate()
                .filter(|(i, tx)| mirrors[*i].is_none() && tx.amount.abs() == one_off.amount)
                .map(|(i, tx)| (i, (one_off.settled_on - tx.date).num_days().abs()))
                .filter(|(_, gap)| *gap <= window)
                .min_by_key(|(i, gap)| (*gap, Reverse(*i)));
            if let Some((i, _)) = nearest {
                mirrors[i] = Some(one_off.settled_on);
            }
        }

        let mut kept = Vec::new();
        let mut excluded = Vec::new();
        for (tx, mirror) in payments.into_iter().zip(mirrors) {
            match mirror {
                Some(one_off_date) => excluded.push(ExcludedPayment {
                    date: tx.date,
                    description: tx.description.clone(),
                    amount: tx.amount.abs(),
                    one_off_date,
                }),
                None => kept.push(tx),
            }
        }
        (kept, excluded)
    }

    pub fn reconcile(
        &self,
        checking: &[Transaction],
        card: &[CardTransaction],
        trail: &mut AuditTrail,
    ) -> Reconciliation {
        let classified = self.classify_payments(card);
        let one_off_payments: Vec<ClassifiedPayment> = classified
            .iter()
            .filter(|p| p.class == PaymentClass::OneOff)
            .cloned()
            .collect();
        let one_off_total: Money = one_off_payments.iter().map(|p| p.amount).sum();
        trail.record(
            AuditStep::ClassifyPayments,
            "Label card payments as regular autopay or one-off",
            json!({
                "card_payments": classified.len(),
                "regular_patterns": self.patterns,
            }),
            json!({
                "regular": classified.len() - one_off_payments.len(),
                "one_off": one_off_payments.len(),
                "one_off_total": one_off_total,
            }),
        );

        let (payments, excluded_payments) = self.filter_payments(checking, &classified);
        trail.record(
            AuditStep::FilterPayments,
            "Drop checking payments that mirror a one-off card payment",
            json!({
                "payment_kind": self.config.payment_kind,
                "window_days": self.config.one_off_window_days,
            }),
            json!({
                "kept": payments.len(),
                "excluded": excluded_payments
                    .iter()
                    .map(|p| json!({ "date": p.date, "amount": p.amount }))
                    .collect::<Vec<_>>(),
            }),
        );

        let charges: Vec<&CardTransaction> = card.iter().filter(|tx| tx.is_charge()).collect();
        let mut periods: Vec<StatementPeriod> = Vec::with_capacity(payments.len());
        let mut previous: Option<DateRange> = None;
        let mut id_counts: BTreeMap<String, usize> = BTreeMap::new();

        for payment in payments {
            let close = self.config.cycle.closing_date(payment.date);
            let mut notes = Vec::new();
            let (window, boundary) = match previous {
                None => {
                    notes.push(format!(
                        "Period start estimated from a {}-day window",
                        self.config.first_period_days
                    ));
                    (
                        DateRange::ending_on(close, self.config.first_period_days),
                        BoundaryConfidence::Estimated,
                    )
                }
                Some(prev) if close > prev.end => {
                    (DateRange::new(prev.next_start(), close), self.config.boundaries)
                }
                Some(prev) => {
                    tracing::warn!(
                        payment_date = %payment.date,
                        %close,
                        previous_end = %prev.end,
                        "billing window collapsed"
                    );
                    notes.push(format!(
                        "Billing window collapsed: closing date {close} is not after the previous period end {}",
                        prev.end
                    ));
                    (DateRange::new(prev.next_start(), prev.end), self.config.boundaries)
                }
            };
            previous = Some(window);

            // Collapsed windows can share a closing month; later ones get a suffix.
            let month = month_key(close);
            let seen = id_counts.entry(month.clone()).or_insert(0);
            *seen += 1;
            let period_id = if *seen == 1 { month } else { format!("{month}-{seen}") };

            let period_charges: Vec<ChargeLine> = charges
                .iter()
                .filter(|tx| window.contains(tx.date))
                .map(|tx| ChargeLine::from(*tx))
                .collect();
            let period = self.score(period_id, payment, window, boundary, period_charges, notes);
            trail.record(
                AuditStep::ExtractCharges,
                format!("Sum card charges dated {window}"),
                json!({ "window": window }),
                json!({ "count": period.charges.len(), "total": period.charges_total }),
            );
            trail.record(
                AuditStep::MapPeriod,
                format!("Match payment of {} on {} to period {}", period.payment_amount, period.payment_date, period.period_id),
                json!({
                    "payment": period.payment_amount,
                    "charges_total": period.charges_total,
                    "boundary": period.boundary,
                }),
                json!({
                    "variance": period.variance,
                    "percent_variance": period.percent_variance,
                    "is_reconciled": period.is_reconciled,
                }),
            );
            if !period.is_reconciled {
                tracing::warn!(
                    period = %period.period_id,
                    variance = %period.variance,
                    pct = %period.percent_variance,
                    "period not reconciled"
                );
            }
            periods.push(period);
        }

        let unassigned_charges: Vec<ChargeLine> = charges
            .iter()
            .filter(|tx| !periods.iter().any(|p| p.window.contains(tx.date)))
            .map(|tx| ChargeLine::from(*tx))
            .collect();
        let unassigned_total: Money = unassigned_charges.iter().map(|c| c.amount).sum();

        let total_payments: Money = periods.iter().map(|p| p.payment_amount).sum();
        let total_charges: Money = periods.iter().map(|p| p.charges_total).sum();
        let reconciled_count = periods.iter().filter(|p| p.is_reconciled).count();
        let summary = ReconciliationSummary {
            total_payments,
            total_charges,
            total_variance: total_payments - total_charges,
            reconciled_count,
            unreconciled_count: periods.len() - reconciled_count,
            one_off_payments,
            one_off_total,
            excluded_payments,
            unassigned_charges,
            unassigned_total,
        };
        trail.record(
            AuditStep::CalculateSummary,
            "Summarize reconciliation across all periods",
            json!({ "periods": periods.len() }),
            json!({
                "total_payments": summary.total_payments,
                "total_charges": summary.total_charges,
                "total_variance": summary.total_variance,
                "reconciled": summary.reconciled_count,
                "unreconciled": summary.unreconciled_count,
                "unassigned_total": summary.unassigned_total,
            }),
        );
        tracing::info!(
            periods = periods.len(),
            reconciled = summary.reconciled_count,
            excluded = summary.excluded_payments.len(),
            "statement reconciliation complete"
        );

        Reconciliation {
            payments: classified,
            periods,
            summary,
        }
    }

    fn score(
        &self,
        period_id: String,
        payment: &Transaction,
        window: DateRange,
        boundary: BoundaryConfidence,
        charges: Vec<ChargeLine>,
        mut notes: Vec<String>,
    ) -> StatementPeriod {
        let charges_total: Money = charges.iter().map(|c| c.amount).sum();
        let payment_amount = payment.amount.abs();
        let variance = payment_amount - charges_total;
        let exact_pct = variance.abs().exact_percent_of(payment_amount.max(charges_total));
        let tolerance = match boundary {
            BoundaryConfidence::Known => self.config.tight_tolerance_pct,
            BoundaryConfidence::Estimated => self.config.estimated_tolerance_pct,
        };
        let is_reconciled = exact_pct <= tolerance;
        let percent_variance = exact_pct.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);

        if charges.is_empty() {
            notes.push("No card charges fall within this period".to_string());
        }
        if !variance.is_zero() {
            notes.push(format!("Variance of {variance} ({percent_variance}%)"));
        }
        let large = self.config.large_variance.abs();
        if variance > large {
            notes.push("Payment significantly exceeds charges".to_string());
        } else if -variance > large {
            notes.push("Charges significantly exceed payment".to_string());
        }

        StatementPeriod {
            period_id,
            window,
            payment_date: payment.date,
            payment_description: payment.description.clone(),
            payment_amount,
            charges,
            charges_total,
            variance,
            percent_variance,
            is_reconciled,
            confidence: PeriodConfidence::from_percent(exact_pct),
            boundary,
            notes,
        }
    }
}

impl Default for StatementReconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}
