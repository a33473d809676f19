//! Built-in rule tables for the firm's checking account and business card.
//!
//! Order is significant: a key that contains another key (`YSI*HIGHLAND`
//! vs `YSI*`, `SPI*DUKE-ENERGY` vs `DUKE-ENERGY`) must come first.

use concilio_core::{Category, CategoryKind, Money};

use crate::rules::{Condition, RuleTable};

use CategoryKind::*;

/// (key, category, subcategory, kind)
pub const CHECKING_VENDORS: &[(&str, &str, &str, CategoryKind)] = &[
    ("LAUREL MANAGEMEN", "Client Payment", "Laurel Management", ClientPayment),
    ("METROPOLITAN", "Client Payment", "Metropolitan Partners", ClientPayment),
    ("PETRANA", "Consultant", "Bulgaria (Petrana)", Consultant),
    ("PEPI", "Consultant", "Bulgaria (Pepi)", Consultant),
    ("IVANA", "Consultant", "Slovakia (Ivana)", Consultant),
    ("CARMEN", "Consultant", "Spain (Carmen)", Consultant),
    ("SWAN SOFTWEB", "Consultant", "Swan", Consultant),
    ("CHASE CREDIT CRD", "Credit Card Payment", "Credit Card Autopay", CardPayment),
    ("AUTO LOAN", "Auto Loan", "Auto Loan Payment", AutoLoan),
    ("SERVICE CHARGES", "Bank Fees", "Monthly Bank Fees", BankFees),
    ("BILL.COM", "Business Services", "Bill.com", BusinessServices),
];

pub const CARD_VENDORS: &[(&str, &str, &str, CategoryKind)] = &[
    // AI and software
    ("ANTHROPIC", "Software & Subscriptions", "AI Services", Operating),
    ("OPENAI", "Software & Subscriptions", "AI Services", Operating),
    ("CHATGPT", "Software & Subscriptions", "AI Services", Operating),
    ("MIDJOURNEY", "Software & Subscriptions", "AI Services", Operating),
    ("GITHUB", "Software & Subscriptions", "Development Tools", Operating),
    ("VERCEL", "Software & Subscriptions", "Cloud Services", Operating),
    ("MONGODBCLOUD", "Software & Subscriptions", "Cloud Services", Operating),
    ("FIVERR", "Software & Subscriptions", "Freelance Services", Operating),
    ("UPWORK", "Software & Subscriptions", "Freelance Services", Operating),
    ("PANDADOC", "Software & Subscriptions", "Document Management", Operating),
    ("ESET", "Software & Subscriptions", "Security Software", Operating),
    ("ELEMENTOR", "Software & Subscriptions", "Website Builder", Operating),
    ("SQUARESPACE", "Software & Subscriptions", "Website Hosting", Operating),
    ("BILL*BILL", "Software & Subscriptions", "Payment Processing", Operating),
    ("MICROSOFT", "Software & Subscriptions", "Office Software", Operating),
    ("GOOGLE", "Software & Subscriptions", "Cloud Services", Operating),
    ("AWS", "Software & Subscriptions", "Cloud Services", Operating),
    ("FIREBASE", "Software & Subscriptions", "Cloud Services", Operating),
    ("YOUTUBE", "Software & Subscriptions", "Media Services", Operating),
    ("GODADDY", "Software & Subscriptions", "Domain & Hosting", Operating),
    // Travel
    ("TESLA SUPERCHARGER", "Travel & Transportation", "Vehicle Fuel", Travel),
    ("TESLA SERVICE", "Travel & Transportation", "Vehicle Maintenance", Travel),
    ("UBER", "Travel & Transportation", "Ground Transportation", Travel),
    ("DELTA AIR", "Travel & Transportation", "Air Travel", Travel),
    ("AMERICAN AIRLINES", "Travel & Transportation", "Air Travel", Travel),
    ("UNITED", "Travel & Transportation", "Air Travel", Travel),
    ("TOBACCO ROAD HARLEY", "Travel & Transportation", "Vehicle Maintenance", Travel),
    ("RENAISSANCE", "Travel & Lodging", "Hotels", Travel),
    ("WESTIN", "Travel & Lodging", "Hotels", Travel),
    ("W SAN FRANCISCO", "Travel & Lodging", "Hotels", Travel),
    ("MARRIOTT", "Travel & Lodging", "Hotels", Travel),
    ("HILTON", "Travel & Lodging", "Hotels", Travel),
    ("HYATT", "Travel & Lodging", "Hotels", Travel),
    // Office
    ("YSI*HIGHLAND", "Office & Real Estate", "Office Rent", Operating),
    ("YSI*", "Office & Real Estate", "Property Management", Operating),
    // Meals
    ("BAR TACO NORTH HILLS", "Meals & Entertainment", "Client Meals", Meals),
    ("BAR TACO", "Meals & Entertainment", "Client Meals", Meals),
    ("RUTH'S CHRIS", "Meals & Entertainment", "Client Meals", Meals),
    ("FIREBIRDS", "Meals & Entertainment", "Client Meals", Meals),
    ("CAPITAL GRILLE", "Meals & Entertainment", "Client Meals", Meals),
    ("RH RALEIGH RESTAURANT", "Meals & Entertainment", "Client Meals", Meals),
    ("J ALEXANDER", "Meals & Entertainment", "Client Meals", Meals),
    ("YARD HOUSE", "Meals & Entertainment", "Client Meals", Meals),
    ("ANGUS BARN", "Meals & Entertainment", "Client Meals", Meals),
    ("TST*", "Meals & Entertainment", "Client Meals", Meals),
    ("CLYDES", "Meals & Entertainment", "Client Meals", Meals),
    ("PICCOLO FORNO", "Meals & Entertainment", "Client Meals", Meals),
    ("UMSTEAD", "Meals & Entertainment", "Client Meals", Meals),
    ("CHUY'S", "Meals & Entertainment", "Client Meals", Meals),
    ("GOODNIGHTS", "Meals & Entertainment", "Client Meals", Meals),
    ("LAWRENCE FOOD CO", "Meals & Entertainment", "Client Meals", Meals),
    ("CHUKO RAMEN", "Meals & Entertainment", "Client Meals", Meals),
    ("CAVA", "Meals & Entertainment", "Client Meals", Meals),
    ("COQUETTE", "Meals & Entertainment", "Client Meals", Meals),
    ("SHARKYS", "Meals & Entertainment", "Client Meals", Meals),
    ("CARY SPORTS", "Meals & Entertainment", "Team Events", Meals),
    ("TOP GOLF", "Meals & Entertainment", "Team Events", Meals),
    // Utilities
    ("ATT*BILL", "Bills & Utilities", "Telecommunications", Utilities),
    ("SPECTRUM", "Bills & Utilities", "Internet", Utilities),
    ("SPI*DUKE-ENERGY", "Bills & Utilities", "Electricity", Utilities),
    ("DUKE-ENERGY", "Bills & Utilities", "Electricity", Utilities),
    ("GOV*", "Bills & Utilities", "Government Fees", Utilities),
    ("STATE FARM", "Bills & Utilities", "Insurance", Utilities),
    // Equipment
    ("RESTORATION HARDWARE", "Office & Equipment", "Office Furniture", Operating),
    ("AMAZON", "Office & Equipment", "Office Supplies", Operating),
    ("STAPLES", "Office & Equipment", "Office Supplies", Operating),
    ("APPLE STORE", "Office & Equipment", "Technology Equipment", Operating),
    ("COSTCO WHSE", "Office & Equipment", "Office Supplies", Operating),
    // Issuer fees and payments
    ("ANNUAL MEMBERSHIP FEE", "Bank Fees", "Annual Fees", PaymentsAndFees),
    ("INTEREST CHARGE", "Bank Fees", "Interest & Fees", PaymentsAndFees),
    ("LATE FEE", "Bank Fees", "Interest & Fees", PaymentsAndFees),
    ("AUTOMATIC PAYMENT", "Payments", "Credit Card Payment", PaymentsAndFees),
    ("PAYMENT THANK YOU", "Payments", "Credit Card Payment", PaymentsAndFees),
];

/// Checking-account table: vendor names first, then type-code fallbacks.
pub fn checking_rules() -> RuleTable {
    let table = from_vendors(CHECKING_VENDORS);
    table
        .pattern(
            "wire-reversal",
            vec![
                all(&["WIRE"]),
                any(&["REVERSAL", "REVERSE", "RETURN"]),
            ],
            Category::new("Other Credits", "Wire Transfer Reversal", OtherCredit),
        )
        .pattern(
            "account-verification",
            vec![any(&["ACCOUNT VERIFICATION", "ACCTVERIFY", "ACCT VERIFY"])],
            Category::new("Other Credits", "Account Verification", OtherCredit),
        )
        .pattern(
            "international-consultant",
            vec![
                all(&["WIRE TRANSFER"]),
                any(&["CONSULTANCY", "SPAIN", "BULGARIA", "SLOVAKIA"]),
            ],
            Category::new("Consultant", "International", Consultant),
        )
        .pattern(
            "card-autopay",
            vec![all(&["CHASE CREDIT"]), Condition::TypeCode(vec!["ACH_DEBIT".into()])],
            Category::new("Credit Card Payment", "Credit Card Autopay", CardPayment),
        )
        .pattern(
            "loan-payment",
            vec![Condition::TypeCode(vec!["LOAN_PMT".into()])],
            Category::new("Auto Loan", "Auto Loan Payment", AutoLoan),
        )
        .pattern(
            "bank-fee",
            vec![Condition::TypeCode(vec!["FEE_TRANSACTION".into()])],
            Category::new("Bank Fees", "Monthly Bank Fees", BankFees),
        )
        .pattern(
            "account-transfer",
            vec![Condition::TypeCode(vec!["ACCT_XFER".into()])],
            Category::new("Account Transfer", "Owner Capital", OwnerTransfer),
        )
}

/// Card table: merchant names first, then keyword families for unmapped merchants.
pub fn card_rules() -> RuleTable {
    let table = from_vendors(CARD_VENDORS);
    table
        .pattern(
            "test-transaction",
            vec![
                Condition::AmountAtMost(Money::from_cents(100)),
                any(&["MARKMAN GROUP", "TEST"]),
            ],
            Category::new("Excluded", "Test Transaction", Excluded),
        )
        .pattern(
            "payment",
            vec![any(&["PAYMENT", "AUTOPAY"])],
            Category::new("Payments", "Credit Card Payment", PaymentsAndFees),
        )
        .pattern(
            "interest-or-fee",
            vec![any(&["INTEREST", "FEE", "ANNUAL"])],
            Category::new("Bank Fees", "Interest & Fees", PaymentsAndFees),
        )
        .pattern(
            "transfer",
            vec![any(&["TRANSFER"])],
            Category::new("Transfers", "Account Transfer", PaymentsAndFees),
        )
        .pattern(
            "restaurant",
            vec![any(&["RESTAURANT", "GRILL", "BISTRO", "CAFE", "STEAKHOUSE", "TAVERN"])],
            Category::new("Meals & Entertainment", "Client Meals", Meals),
        )
        .pattern(
            "subscription",
            vec![all(&["*"]), any(&["SUBSCRIPTION", "MONTHLY", "ANNUAL"])],
            Category::new("Software & Subscriptions", "Subscription Services", Operating),
        )
}

fn from_vendors(vendors: &[(&str, &str, &str, CategoryKind)]) -> RuleTable {
    vendors
        .iter()
        .fold(RuleTable::default(), |table, (key, name, sub, kind)| {
            table.vendor(key, Category::new(name, sub, *kind))
        })
}

fn any(words: &[&str]) -> Condition {
    Condition::AnyKeyword(words.iter().map(|w| w.to_string()).collect())
}

fn all(words: &[&str]) -> Condition {
    Condition::AllKeywords(words.iter().map(|w| w.to_string()).collect())
}
