use chrono::NaiveDate;
use concilio_core::period::month_key;
use concilio_core::{CardTransaction, Category, CategoryKind, DateRange, Money, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// `Category - Subcategory` label.
    pub category: String,
    pub kind: CategoryKind,
    /// Sum of absolute amounts.
    pub amount: Money,
    pub net: Money,
    pub count: usize,
    /// Share of the stream's total absolute activity.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyFlow {
    pub month: String,
    pub debits: Money,
    pub credits: Money,
    pub net: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementSummary {
    pub count: usize,
    pub date_range: Option<DateRange>,
    /// Closing running balance, when the export carries one.
    pub balance: Option<Money>,
    /// Absolute sum of outflows.
    pub total_debits: Money,
    pub total_credits: Money,
    pub net: Money,
    pub categories: Vec<CategorySummary>,
    pub monthly: Vec<MonthlyFlow>,
}

/// One statement line reduced to what a summary needs.
struct Line {
    date: NaiveDate,
    amount: Money,
    category: Category,
}

pub fn summarize_checking(transactions: &[Transaction]) -> StatementSummary {
    let balance = transactions
        .iter()
        .filter_map(|tx| tx.running_balance.map(|b| (tx.date, b)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, b)| b);
    let lines = transactions.iter().map(|tx| Line {
        date: tx.date,
        amount: tx.amount,
        category: tx.category_or_default(),
    });
    summarize(lines, balance)
}

/// Card lines are signed the way checking is: charges negative.
pub fn summarize_card(transactions: &[CardTransaction]) -> StatementSummary {
    let lines = transactions.iter().map(|tx| Line {
        date: tx.date,
        amount: tx.signed_amount(),
        category: tx.category_or_default(),
    });
    summarize(lines, None)
}

fn summarize(lines: impl Iterator<Item = Line>, balance: Option<Money>) -> StatementSummary {
    let mut count = 0;
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;
    let mut total_debits = Money::zero();
    let mut total_credits = Money::zero();
    let mut by_category: BTreeMap<Category, (Money, Money, usize)> = BTreeMap::new();
    let mut by_month: BTreeMap<String, MonthlyFlow> = BTreeMap::new();

    for line in lines {
        count += 1;
        first = Some(first.map_or(line.date, |d| d.min(line.date)));
        last = Some(last.map_or(line.date, |d| d.max(line.date)));

        let month = by_month
            .entry(month_key(line.date))
            .or_insert_with_key(|key| MonthlyFlow {
                month: key.clone(),
                debits: Money::zero(),
                credits: Money::zero(),
                net: Money::zero(),
                count: 0,
            });
        if line.amount.is_negative() {
            total_debits += line.amount.abs();
            month.debits += line.amount.abs();
        } else {
            total_credits += line.amount;
            month.credits += line.amount;
        }
        month.net += line.amount;
        month.count += 1;

        let entry = by_category
            .entry(line.category)
            .or_insert((Money::zero(), Money::zero(), 0));
        entry.0 += line.amount.abs();
        entry.1 += line.amount;
        entry.2 += 1;
    }

    let activity = total_debits + total_credits;
    let mut categories: Vec<CategorySummary> = by_category
        .into_iter()
        .map(|(category, (amount, net, count))| CategorySummary {
            category: category.to_string(),
            kind: category.kind,
            amount,
            net,
            count,
            percentage: amount.percent_of(activity),
        })
        .collect();
    categories.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));

    StatementSummary {
        count,
        date_range: first.zip(last).map(|(start, end)| DateRange::new(start, end)),
        balance,
        total_debits,
        total_credits,
        net: total_credits - total_debits,
        categories,
        monthly: by_month.into_values().collect(),
    }
}
