use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic grouping a category rolls up into. Checking-account lines use the
/// first block of kinds, card lines the second; `Uncategorized` is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    ClientPayment,
    Consultant,
    OwnerTransfer,
    CardPayment,
    AutoLoan,
    BankFees,
    BusinessServices,
    OtherCredit,

    Operating,
    Travel,
    Meals,
    Utilities,
    PaymentsAndFees,
    Excluded,

    Uncategorized,
}

impl CategoryKind {
    /// Card kinds that count as business spending.
    pub fn is_card_expense(self) -> bool {
        !matches!(
            self,
            CategoryKind::PaymentsAndFees | CategoryKind::Excluded
        )
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CategoryKind::ClientPayment => "Client Payment",
            CategoryKind::Consultant => "Consultant",
            CategoryKind::OwnerTransfer => "Owner Transfer",
            CategoryKind::CardPayment => "Card Payment",
            CategoryKind::AutoLoan => "Auto Loan",
            CategoryKind::BankFees => "Bank Fees",
            CategoryKind::BusinessServices => "Business Services",
            CategoryKind::OtherCredit => "Other Credit",
            CategoryKind::Operating => "Operating Expenses",
            CategoryKind::Travel => "Travel",
            CategoryKind::Meals => "Meals & Entertainment",
            CategoryKind::Utilities => "Bills & Utilities",
            CategoryKind::PaymentsAndFees => "Payments & Fees",
            CategoryKind::Excluded => "Excluded",
            CategoryKind::Uncategorized => "Uncategorized",
        };
        write!(f, "{label}")
    }
}

/// A `(category, subcategory)` pair plus the kind the totals engine keys off.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub subcategory: String,
    pub kind: CategoryKind,
}

impl Category {
    pub fn new(name: &str, subcategory: &str, kind: CategoryKind) -> Self {
        Category {
            name: name.to_string(),
            subcategory: subcategory.to_string(),
            kind,
        }
    }

    /// The sentinel bucket for lines no rule claims.
    pub fn uncategorized() -> Self {
        Category::new("Miscellaneous", "Uncategorized", CategoryKind::Uncategorized)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.kind == CategoryKind::Uncategorized
    }

    /// Most specific label available: the subcategory, else the category name.
    pub fn detail(&self) -> &str {
        if self.subcategory.is_empty() {
            &self.name
        } else {
            &self.subcategory
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subcategory.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} - {}", self.name, self.subcategory)
        }
    }
}
