use concilio_core::{CardTransaction, Category, CategoryKind, Money, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::audit::{AuditStep, AuditTrail};

#[derive(Debug, Error)]
pub enum TotalsError {
    #[error("Unaccounted credits of {plug} exceed the sanity threshold of {threshold}")]
    BalanceEquationViolation {
        plug: Money,
        threshold: Money,
        totals: Box<FinancialTotals>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalsConfig {
    /// Owner equity on hand before the first statement line.
    pub initial_capital: Money,
    /// Largest plug accepted before the snapshot is treated as a defect.
    pub plug_threshold: Option<Money>,
}

impl Default for TotalsConfig {
    fn default() -> Self {
        Self {
            initial_capital: Money::zero(),
            plug_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsultantShare {
    pub name: String,
    pub amount: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardCategoryShare {
    pub name: String,
    pub kind: CategoryKind,
    pub amount: Money,
    pub count: usize,
}

/// The golden record: every reporting view derives from one of these.
///
/// `initial_capital + owner_capital_contributions + net_income + other_credits
/// + unaccounted_credits == current_cash_balance` holds exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialTotals {
    pub business_revenue: Money,

    pub consultant_expenses: Money,
    pub consultant_breakdown: Vec<ConsultantShare>,

    pub card_operating_expenses: Money,
    pub card_travel_expenses: Money,
    pub card_meals_expenses: Money,
    pub card_utilities_expenses: Money,
    pub card_other_expenses: Money,
    pub card_total_expenses: Money,
    pub card_category_breakdown: Vec<CardCategoryShare>,

    pub auto_loan_expenses: Money,
    pub bank_fees_expenses: Money,
    pub business_services_expenses: Money,
    pub total_business_expenses: Money,
    pub net_income: Money,

    /// Checking-side autopay transfers to the card. Not an expense.
    pub card_payments: Money,
    pub card_reconciliation_variance: Money,

    pub initial_capital: Money,
    pub owner_capital_contributions: Money,
    pub other_credits: Money,
    pub unaccounted_credits: Money,
    pub total_owner_equity: Money,
    pub current_cash_balance: Money,

    pub uncategorized_net: Money,
    pub uncategorized_count: usize,
}

impl FinancialTotals {
    pub fn balance_equation_holds(&self) -> bool {
        self.initial_capital
            + self.owner_capital_contributions
            + self.net_income
            + self.other_credits
            + self.unaccounted_credits
            == self.current_cash_balance
    }
}

/// Builds the totals snapshot for one checking account, with card sub-buckets
/// drawn only from the card stream's own categories.
///
/// `checking` is expected in ascending date order, as the parser emits it.
pub fn compute_totals(
    checking: &[Transaction],
    card: &[CardTransaction],
    config: &TotalsConfig,
    trail: &mut AuditTrail,
) -> Result<FinancialTotals, TotalsError> {
    let signed_sum = |kind: CategoryKind| -> Money {
        checking
            .iter()
            .filter(|tx| tx.category_or_default().kind == kind)
            .map(|tx| tx.amount)
            .sum()
    };
    let abs_sum = |kind: CategoryKind| -> Money {
        checking
            .iter()
            .filter(|tx| tx.category_or_default().kind == kind)
            .map(|tx| tx.amount.abs())
            .sum()
    };

    let business_revenue = signed_sum(CategoryKind::ClientPayment);
    let owner_capital_contributions = signed_sum(CategoryKind::OwnerTransfer);
    let other_credits = signed_sum(CategoryKind::OtherCredit);
    let uncategorized_net = signed_sum(CategoryKind::Uncategorized);
    let uncategorized_count = checking
        .iter()
        .filter(|tx| tx.category_or_default().is_uncategorized())
        .count();

    let consultant_expenses = abs_sum(CategoryKind::Consultant);
    let consultant_breakdown = consultant_breakdown(checking);
    let auto_loan_expenses = abs_sum(CategoryKind::AutoLoan);
    let bank_fees_expenses = abs_sum(CategoryKind::BankFees);
    let business_services_expenses = abs_sum(CategoryKind::BusinessServices);
    let card_payments = abs_sum(CategoryKind::CardPayment);

    let buckets = CardBuckets::collect(card);

    let total_business_expenses = consultant_expenses
        + buckets.total
        + auto_loan_expenses
        + bank_fees_expenses
        + business_services_expenses;
    let net_income = business_revenue - total_business_expenses;

    let current_cash_balance = checking
        .iter()
        .filter_map(|tx| tx.running_balance.map(|balance| (tx.date, balance)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, balance)| balance)
        .unwrap_or_default();

    let modeled = config.initial_capital + owner_capital_contributions + net_income + other_credits;
    let unaccounted_credits = current_cash_balance - modeled;

    let totals = FinancialTotals {
        business_revenue,
        consultant_expenses,
        consultant_breakdown,
        card_operating_expenses: buckets.operating,
        card_travel_expenses: buckets.travel,
        card_meals_expenses: buckets.meals,
        card_utilities_expenses: buckets.utilities,
        card_other_expenses: buckets.other,
        card_total_expenses: buckets.total,
        card_category_breakdown: buckets.breakdown,
        auto_loan_expenses,
        bank_fees_expenses,
        business_services_expenses,
        total_business_expenses,
        net_income,
        card_payments,
        card_reconciliation_variance: card_payments - buckets.total,
        initial_capital: config.initial_capital,
        owner_capital_contributions,
        other_credits,
        unaccounted_credits,
        total_owner_equity: modeled + unaccounted_credits,
        current_cash_balance,
        uncategorized_net,
        uncategorized_count,
    };

    trail.record(
        AuditStep::ComputeTotals,
        "Aggregate categorized checking and card lines into the totals snapshot",
        json!({
            "checking_lines": checking.len(),
            "card_lines": card.len(),
            "initial_capital": config.initial_capital,
        }),
        json!({
            "business_revenue": totals.business_revenue,
            "total_business_expenses": totals.total_business_expenses,
            "net_income": totals.net_income,
            "owner_capital_contributions": totals.owner_capital_contributions,
            "other_credits": totals.other_credits,
            "current_cash_balance": totals.current_cash_balance,
            "unaccounted_credits": totals.unaccounted_credits,
        }),
    );

    if !unaccounted_credits.is_zero() {
        tracing::warn!(
            plug = %unaccounted_credits,
            uncategorized = uncategorized_count,
            "cash balance not explained by categorized activity"
        );
    }

    if let Some(threshold) = config.plug_threshold {
        if unaccounted_credits.abs() > threshold.abs() {
            return Err(TotalsError::BalanceEquationViolation {
                plug: unaccounted_credits,
                threshold,
                totals: Box::new(totals),
            });
        }
    }

    Ok(totals)
}

/// Display name for a consultant category: `Bulgaria (Pepi)` → `Pepi`.
pub fn consultant_name(category: &Category) -> &str {
    let sub = category.subcategory.trim();
    if let Some(open) = sub.find('(') {
        let rest = &sub[open + 1..];
        if let Some(close) = rest.find(')') {
            let inner = rest[..close].trim();
            if !inner.is_empty() {
                return inner;
            }
        }
    }
    if !sub.is_empty() {
        return sub;
    }
    category
        .name
        .split_whitespace()
        .last()
        .unwrap_or(category.name.as_str())
}

fn consultant_breakdown(checking: &[Transaction]) -> Vec<ConsultantShare> {
    let mut by_name: BTreeMap<String, (Money, usize)> = BTreeMap::new();
    for tx in checking {
        let Some(category) = tx.category.as_ref() else {
            continue;
        };
        if category.kind != CategoryKind::Consultant {
            continue;
        }
        let entry = by_name
            .entry(consultant_name(category).to_string())
            .or_insert((Money::zero(), 0));
        entry.0 += tx.amount.abs();
        entry.1 += 1;
    }
    let mut shares: Vec<ConsultantShare> = by_name
        .into_iter()
        .map(|(name, (amount, count))| ConsultantShare { name, amount, count })
        .collect();
    shares.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));
    shares
}

#[derive(Default)]
struct CardBuckets {
    operating: Money,
    travel: Money,
    meals: Money,
    utilities: Money,
    other: Money,
    total: Money,
    breakdown: Vec<CardCategoryShare>,
}

impl CardBuckets {
    fn collect(card: &[CardTransaction]) -> Self {
        let mut buckets = CardBuckets::default();
        let mut by_detail: BTreeMap<(String, CategoryKind), (Money, usize)> = BTreeMap::new();

        for tx in card.iter().filter(|tx| tx.is_charge()) {
            let category = tx.category_or_default();
            if !category.kind.is_card_expense() {
                continue;
            }
            let slot = match category.kind {
                CategoryKind::Operating => &mut buckets.operating,
                CategoryKind::Travel => &mut buckets.travel,
                CategoryKind::Meals => &mut buckets.meals,
                CategoryKind::Utilities => &mut buckets.utilities,
                _ => &mut buckets.other,
            };
            *slot += tx.amount;
            buckets.total += tx.amount;

            let entry = by_detail
                .entry((category.detail().to_string(), category.kind))
                .or_insert((Money::zero(), 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        }

        buckets.breakdown = by_detail
            .into_iter()
            .map(|((name, kind), (amount, count))| CardCategoryShare {
                name,
                kind,
                amount,
                count,
            })
            .collect();
        buckets
            .breakdown
            .sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concilio_core::CardDirection;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(day: u32, cents: i64, category: Category) -> Transaction {
        let mut t = Transaction::new(date(2024, 3, day), "LINE", Money::from_cents(cents), "");
        t.category = Some(category);
        t
    }

    fn charge(cents: i64, category: Category) -> CardTransaction {
        let mut t = CardTransaction::new(
            date(2024, 3, 5),
            "CHARGE",
            Money::from_cents(cents),
            CardDirection::Charge,
        );
        t.category = Some(category);
        t
    }

    fn compute(checking: &[Transaction], card: &[CardTransaction]) -> FinancialTotals {
        compute_totals(checking, card, &TotalsConfig::default(), &mut AuditTrail::new()).unwrap()
    }

    // ── empty input ──────────────────────────────────────────────────────────

    #[test]
    fn empty_input_is_all_zero() {
        let totals = compute(&[], &[]);
        assert!(totals.business_revenue.is_zero());
        assert!(totals.current_cash_balance.is_zero());
        assert!(totals.unaccounted_credits.is_zero());
        assert!(totals.balance_equation_holds());
    }

    // ── buckets ──────────────────────────────────────────────────────────────

    #[test]
    fn revenue_and_expenses() {
        let checking = vec![
            tx(1, 1_000_000, Category::new("Client Payment", "Laurel", CategoryKind::ClientPayment)),
            tx(2, -200_000, Category::new("Consultant", "Bulgaria (Pepi)", CategoryKind::Consultant)),
            tx(3, -45_000, Category::new("Auto Loan", "", CategoryKind::AutoLoan)),
            tx(4, -1_500, Category::new("Bank Fees", "Monthly Bank Fees", CategoryKind::BankFees)),
            tx(5, -9_900, Category::new("Business Services", "Bill.com", CategoryKind::BusinessServices)),
        ];
        let totals = compute(&checking, &[]);
        assert_eq!(totals.business_revenue, Money::from_cents(1_000_000));
        assert_eq!(totals.consultant_expenses, Money::from_cents(200_000));
        assert_eq!(totals.auto_loan_expenses, Money::from_cents(45_000));
        assert_eq!(totals.bank_fees_expenses, Money::from_cents(1_500));
        assert_eq!(totals.business_services_expenses, Money::from_cents(9_900));
        assert_eq!(totals.total_business_expenses, Money::from_cents(256_400));
        assert_eq!(totals.net_income, Money::from_cents(743_600));
    }

    #[test]
    fn card_autopay_is_not_an_expense() {
        let checking = vec![tx(
            10,
            -80_000,
            Category::new("Credit Card Payment", "Credit Card Autopay", CategoryKind::CardPayment),
        )];
        let card = vec![
            charge(50_000, Category::new("Operating Expenses", "Software", CategoryKind::Operating)),
            charge(30_000, Category::new("Travel & Lodging", "Hotels", CategoryKind::Travel)),
        ];
        let totals = compute(&checking, &card);
        assert_eq!(totals.card_payments, Money::from_cents(80_000));
        assert_eq!(totals.card_total_expenses, Money::from_cents(80_000));
        assert_eq!(totals.total_business_expenses, Money::from_cents(80_000));
        assert!(totals.card_reconciliation_variance.is_zero());
    }

    #[test]
    fn card_buckets_follow_kind() {
        let card = vec![
            charge(1_000, Category::new("Operating Expenses", "Software", CategoryKind::Operating)),
            charge(2_000, Category::new("Travel & Lodging", "Airfare", CategoryKind::Travel)),
            charge(3_000, Category::new("Meals & Entertainment", "Restaurants", CategoryKind::Meals)),
            charge(4_000, Category::new("Bills & Utilities", "Internet", CategoryKind::Utilities)),
            charge(500, Category::uncategorized()),
            charge(99, Category::new("Excluded", "Test Transaction", CategoryKind::Excluded)),
            charge(700, Category::new("Payments & Fees", "Interest", CategoryKind::PaymentsAndFees)),
        ];
        let totals = compute(&[], &card);
        assert_eq!(totals.card_operating_expenses, Money::from_cents(1_000));
        assert_eq!(totals.card_travel_expenses, Money::from_cents(2_000));
        assert_eq!(totals.card_meals_expenses, Money::from_cents(3_000));
        assert_eq!(totals.card_utilities_expenses, Money::from_cents(4_000));
        assert_eq!(totals.card_other_expenses, Money::from_cents(500));
        assert_eq!(totals.card_total_expenses, Money::from_cents(10_500));
    }

    #[test]
    fn card_refunds_and_payments_are_ignored() {
        let mut refund = charge(5_000, Category::new("Operating Expenses", "Software", CategoryKind::Operating));
        refund.direction = CardDirection::Refund;
        let mut payment = charge(9_000, Category::new("Payments & Fees", "Payment", CategoryKind::PaymentsAndFees));
        payment.direction = CardDirection::Payment;
        let totals = compute(&[], &[refund, payment]);
        assert!(totals.card_total_expenses.is_zero());
        assert!(totals.card_category_breakdown.is_empty());
    }

    #[test]
    fn card_breakdown_sorted_by_amount_then_name() {
        let card = vec![
            charge(1_000, Category::new("Operating Expenses", "Software", CategoryKind::Operating)),
            charge(1_000, Category::new("Operating Expenses", "Office Rent", CategoryKind::Operating)),
            charge(5_000, Category::new("Travel & Lodging", "Hotels", CategoryKind::Travel)),
            charge(500, Category::new("Operating Expenses", "Software", CategoryKind::Operating)),
        ];
        let totals = compute(&[], &card);
        let names: Vec<&str> = totals
            .card_category_breakdown
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Hotels", "Software", "Office Rent"]);
        assert_eq!(totals.card_category_breakdown[1].count, 2);
        assert_eq!(totals.card_category_breakdown[1].amount, Money::from_cents(1_500));
    }

    // ── consultants ──────────────────────────────────────────────────────────

    #[test]
    fn consultant_name_extraction() {
        let paren = Category::new("Consultant", "Bulgaria (Pepi)", CategoryKind::Consultant);
        assert_eq!(consultant_name(&paren), "Pepi");
        let plain = Category::new("Consultant", "Swan Softweb", CategoryKind::Consultant);
        assert_eq!(consultant_name(&plain), "Swan Softweb");
        let bare = Category::new("Consultant Carmen", "", CategoryKind::Consultant);
        assert_eq!(consultant_name(&bare), "Carmen");
        let unclosed = Category::new("Consultant", "Bulgaria (Pepi", CategoryKind::Consultant);
        assert_eq!(consultant_name(&unclosed), "Bulgaria (Pepi");
    }

    #[test]
    fn consultant_breakdown_groups_by_name() {
        let checking = vec![
            tx(1, -100_000, Category::new("Consultant", "Bulgaria (Pepi)", CategoryKind::Consultant)),
            tx(2, -50_000, Category::new("Consultant", "Romania (Ivana)", CategoryKind::Consultant)),
            tx(3, -100_000, Category::new("Consultant", "Bulgaria (Pepi)", CategoryKind::Consultant)),
        ];
        let totals = compute(&checking, &[]);
        assert_eq!(totals.consultant_breakdown.len(), 2);
        assert_eq!(totals.consultant_breakdown[0].name, "Pepi");
        assert_eq!(totals.consultant_breakdown[0].amount, Money::from_cents(200_000));
        assert_eq!(totals.consultant_breakdown[0].count, 2);
        assert_eq!(totals.consultant_breakdown[1].name, "Ivana");
    }

    // ── balance equation ─────────────────────────────────────────────────────

    #[test]
    fn cash_comes_from_last_balance() {
        let checking = vec![
            tx(1, 10_000, Category::uncategorized()).with_balance(Money::from_cents(10_000)),
            tx(2, -2_500, Category::uncategorized()).with_balance(Money::from_cents(7_500)),
            tx(3, 1, Category::uncategorized()),
        ];
        let totals = compute(&checking, &[]);
        assert_eq!(totals.current_cash_balance, Money::from_cents(7_500));
        assert_eq!(totals.uncategorized_count, 3);
        assert_eq!(totals.uncategorized_net, Money::from_cents(7_501));
    }

    #[test]
    fn same_day_balance_uses_file_order() {
        let checking = vec![
            tx(1, 100, Category::uncategorized()).with_balance(Money::from_cents(100)),
            tx(1, 100, Category::uncategorized()).with_balance(Money::from_cents(200)),
        ];
        assert_eq!(compute(&checking, &[]).current_cash_balance, Money::from_cents(200));
    }

    #[test]
    fn plug_closes_the_equation() {
        let checking = vec![
            tx(1, 500_000, Category::new("Account Transfer", "Owner Capital", CategoryKind::OwnerTransfer))
                .with_balance(Money::from_cents(500_000)),
            tx(2, 12_345, Category::uncategorized()).with_balance(Money::from_cents(512_345)),
        ];
        let config = TotalsConfig {
            initial_capital: Money::from_cents(1_000),
            plug_threshold: None,
        };
        let totals = compute_totals(&checking, &[], &config, &mut AuditTrail::new()).unwrap();
        assert_eq!(totals.unaccounted_credits, Money::from_cents(11_345));
        assert!(totals.balance_equation_holds());
        assert_eq!(totals.total_owner_equity, totals.current_cash_balance);
    }

    #[test]
    fn plug_over_threshold_is_an_error() {
        let checking = vec![tx(1, 50_000, Category::uncategorized()).with_balance(Money::from_cents(50_000))];
        let config = TotalsConfig {
            initial_capital: Money::zero(),
            plug_threshold: Some(Money::from_cents(10_000)),
        };
        let err = compute_totals(&checking, &[], &config, &mut AuditTrail::new()).unwrap_err();
        let TotalsError::BalanceEquationViolation { plug, totals, .. } = err;
        assert_eq!(plug, Money::from_cents(50_000));
        assert!(totals.balance_equation_holds());
    }

    #[test]
    fn records_audit_entry() {
        let mut trail = AuditTrail::new();
        compute_totals(&[], &[], &TotalsConfig::default(), &mut trail).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.entries()[0].step, AuditStep::ComputeTotals);
        assert_eq!(trail.entries()[0].result["net_income"], "0.00");
    }
}
