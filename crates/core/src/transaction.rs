use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::Category;
use super::money::Money;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("Invalid money amount: '{0}'")]
    InvalidMoney(String),
    #[error("Transaction is already categorized as {0}")]
    AlreadyCategorized(Category),
}

/// Anything the categorizer can classify.
pub trait Categorizable {
    fn description(&self) -> &str;
    /// Issuer-supplied type string. Advisory only.
    fn type_code(&self) -> &str;
    fn amount(&self) -> Money;
    fn category(&self) -> Option<&Category>;
    /// Categories are assigned once; a second assignment is rejected.
    fn set_category(&mut self, category: Category) -> Result<(), LedgerError>;
}

/// One checking-account statement line. `amount` is signed: credits positive,
/// debits negative, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub type_code: String,
    pub running_balance: Option<Money>,
    pub account: String,
    pub category: Option<Category>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: &str, amount: Money, type_code: &str) -> Self {
        Transaction {
            date,
            description: description.to_string(),
            amount,
            type_code: type_code.to_string(),
            running_balance: None,
            account: String::new(),
            category: None,
        }
    }

    pub fn with_balance(mut self, balance: Money) -> Self {
        self.running_balance = Some(balance);
        self
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_negative()
    }

    /// The assigned category, or the uncategorized sentinel.
    pub fn category_or_default(&self) -> Category {
        self.category.clone().unwrap_or_else(Category::uncategorized)
    }
}

impl Categorizable for Transaction {
    fn description(&self) -> &str {
        &self.description
    }

    fn type_code(&self) -> &str {
        &self.type_code
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    fn set_category(&mut self, category: Category) -> Result<(), LedgerError> {
        assign_once(&mut self.category, category)
    }
}

/// How a card row moves the card balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardDirection {
    /// A purchase; debits the card.
    Charge,
    /// Money sent to the card from elsewhere.
    Payment,
    /// A merchant return credited back.
    Refund,
}

impl CardDirection {
    pub fn is_credit(self) -> bool {
        !matches!(self, CardDirection::Charge)
    }
}

/// One credit-card statement line. `amount` is unsigned; `direction` carries
/// the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub card: String,
    pub date: NaiveDate,
    pub post_date: Option<NaiveDate>,
    pub description: String,
    pub issuer_category: String,
    pub type_label: String,
    pub amount: Money,
    pub memo: Option<String>,
    pub direction: CardDirection,
    pub account: String,
    pub category: Option<Category>,
}

impl CardTransaction {
    pub fn new(date: NaiveDate, description: &str, amount: Money, direction: CardDirection) -> Self {
        CardTransaction {
            card: String::new(),
            date,
            post_date: None,
            description: description.to_string(),
            issuer_category: String::new(),
            type_label: String::new(),
            amount: amount.abs(),
            memo: None,
            direction,
            account: String::new(),
            category: None,
        }
    }

    pub fn is_charge(&self) -> bool {
        self.direction == CardDirection::Charge
    }

    /// Amount signed the way the checking stream signs it: charges negative.
    pub fn signed_amount(&self) -> Money {
        if self.is_charge() {
            -self.amount
        } else {
            self.amount
        }
    }

    /// Posting date when the issuer supplied one.
    pub fn settled_on(&self) -> NaiveDate {
        self.post_date.unwrap_or(self.date)
    }

    pub fn category_or_default(&self) -> Category {
        self.category.clone().unwrap_or_else(Category::uncategorized)
    }
}

impl Categorizable for CardTransaction {
    fn description(&self) -> &str {
        &self.description
    }

    fn type_code(&self) -> &str {
        &self.type_label
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    fn set_category(&mut self, category: Category) -> Result<(), LedgerError> {
        assign_once(&mut self.category, category)
    }
}

fn assign_once(slot: &mut Option<Category>, category: Category) -> Result<(), LedgerError> {
    match slot {
        Some(existing) => Err(LedgerError::AlreadyCategorized(existing.clone())),
        None => {
            *slot = Some(category);
            Ok(())
        }
    }
}
