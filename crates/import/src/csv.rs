use chrono::NaiveDate;
use concilio_core::{CardDirection, CardTransaction, Money, Transaction};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Why a statement row was left out. Rows are dropped, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RowError {
    #[error("line {line}: missing {field}")]
    MissingField { line: u64, field: &'static str },
    #[error("line {line}: invalid date '{value}'")]
    InvalidDate { line: u64, value: String },
    #[error("line {line}: invalid amount '{value}'")]
    InvalidAmount { line: u64, value: String },
    #[error("line {line}: zero amount")]
    ZeroAmount { line: u64 },
    #[error("line {line}: unreadable row: {message}")]
    Unreadable { line: u64, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementProfile {
    pub account: String,
    pub has_header: bool,
    pub delimiter: String,
    pub date_format: String,
}

impl Default for StatementProfile {
    fn default() -> Self {
        Self {
            account: String::new(),
            has_header: true,
            delimiter: ",".to_string(),
            date_format: "%m/%d/%Y".to_string(),
        }
    }
}

impl StatementProfile {
    pub fn for_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
            ..Self::default()
        }
    }
}

/// Rows kept, in ascending date order, plus the rows that were dropped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RowError>,
}

// Checking export: details, posting date, description, amount, type, balance, check #.
const CHK_DATE: usize = 1;
const CHK_DESCRIPTION: usize = 2;
const CHK_AMOUNT: usize = 3;
const CHK_TYPE: usize = 4;
const CHK_BALANCE: usize = 5;

// Card export: card, transaction date, post date, description, category, type, amount, memo.
const CARD_ID: usize = 0;
const CARD_DATE: usize = 1;
const CARD_POST_DATE: usize = 2;
const CARD_DESCRIPTION: usize = 3;
const CARD_CATEGORY: usize = 4;
const CARD_TYPE: usize = 5;
const CARD_AMOUNT: usize = 6;
const CARD_MEMO: usize = 7;

pub fn parse_checking(content: &str, profile: &StatementProfile) -> Parsed<Transaction> {
    let parsed = read_rows(content, profile, |record, line| {
        let date = parse_date(field(record, CHK_DATE, "date", line)?, &profile.date_format)
            .ok_or_else(|| RowError::InvalidDate {
                line,
                value: record.get(CHK_DATE).unwrap_or_default().to_string(),
            })?;
        let amount = parse_nonzero_amount(field(record, CHK_AMOUNT, "amount", line)?, line)?;
        let running_balance = record
            .get(CHK_BALANCE)
            .filter(|s| !s.is_empty())
            .and_then(|s| Money::from_str(s).ok());

        Ok(Transaction {
            date,
            description: record.get(CHK_DESCRIPTION).unwrap_or_default().to_string(),
            amount,
            type_code: record.get(CHK_TYPE).unwrap_or_default().to_string(),
            running_balance,
            account: profile.account.clone(),
            category: None,
        })
    });
    sorted(parsed, |t| t.date, "checking")
}

pub fn parse_card(content: &str, profile: &StatementProfile) -> Parsed<CardTransaction> {
    let parsed = read_rows(content, profile, |record, line| {
        let date = parse_date(field(record, CARD_DATE, "transaction date", line)?, &profile.date_format)
            .ok_or_else(|| RowError::InvalidDate {
                line,
                value: record.get(CARD_DATE).unwrap_or_default().to_string(),
            })?;
        let amount = parse_nonzero_amount(field(record, CARD_AMOUNT, "amount", line)?, line)?.abs();
        let description = record.get(CARD_DESCRIPTION).unwrap_or_default().to_string();
        let type_label = record.get(CARD_TYPE).unwrap_or_default().to_string();
        let post_date = record
            .get(CARD_POST_DATE)
            .and_then(|s| parse_date(s, &profile.date_format));

        Ok(CardTransaction {
            card: record.get(CARD_ID).unwrap_or_default().to_string(),
            date,
            post_date,
            direction: infer_direction(&type_label, &description),
            description,
            issuer_category: record.get(CARD_CATEGORY).unwrap_or_default().to_string(),
            type_label,
            amount,
            memo: record
                .get(CARD_MEMO)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            account: profile.account.clone(),
            category: None,
        })
    });
    sorted(parsed, |t| t.date, "card")
}

/// Card amounts are unsigned, so the direction comes from the type label and
/// description: payments first, then returns, everything else is a charge.
pub fn infer_direction(type_label: &str, description: &str) -> CardDirection {
    let label = type_label.to_lowercase();
    let desc = description.to_lowercase();
    if label.contains("payment") || desc.contains("payment") || desc.contains("autopay") {
        CardDirection::Payment
    } else if label.contains("return")
        || label.contains("refund")
        || desc.contains("return")
        || desc.contains("refund")
    {
        CardDirection::Refund
    } else {
        CardDirection::Charge
    }
}

fn read_rows<T, F>(content: &str, profile: &StatementProfile, mut build: F) -> Parsed<T>
where
    F: FnMut(&csv::StringRecord, u64) -> Result<T, RowError>,
{
    let delimiter = profile.delimiter.as_bytes().first().copied().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(profile.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let outcome = match result {
            Ok(record) => {
                let line = record.position().map_or(idx as u64 + 1, |p| p.line());
                build(&record, line)
            }
            Err(e) => Err(RowError::Unreadable {
                line: e.position().map_or(idx as u64 + 1, |p| p.line()),
                message: e.to_string(),
            }),
        };
        match outcome {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::debug!(%err, "dropping statement row");
                rejected.push(err);
            }
        }
    }

    Parsed { records, rejected }
}

fn sorted<T, K: Ord>(mut parsed: Parsed<T>, key: impl FnMut(&T) -> K, kind: &str) -> Parsed<T> {
    // Stable, so same-day rows keep file order.
    parsed.records.sort_by_key(key);
    tracing::info!(
        kind,
        kept = parsed.records.len(),
        dropped = parsed.rejected.len(),
        "parsed statement export"
    );
    parsed
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &'static str,
    line: u64,
) -> Result<&'r str, RowError> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or(RowError::MissingField { line, field: name })
}

fn parse_nonzero_amount(s: &str, line: u64) -> Result<Money, RowError> {
    let amount = Money::from_str(s).map_err(|_| RowError::InvalidAmount {
        line,
        value: s.to_string(),
    })?;
    if amount.is_zero() {
        return Err(RowError::ZeroAmount { line });
    }
    Ok(amount)
}

fn parse_date(s: &str, format: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, format) {
        return Some(date);
    }

    ["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%Y/%m/%d", "%m/%d/%y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
