use concilio_core::{Categorizable, Category, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to parse rule table: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid regex in rule '{key}': {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },
    #[error("Rule '{0}' has nothing to match on")]
    EmptyPattern(String),
}

/// A single test a pattern rule applies. Keyword tests are case-insensitive
/// substring checks against the description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    AnyKeyword(Vec<String>),
    AllKeywords(Vec<String>),
    /// Exact (case-insensitive) match against the issuer type code.
    TypeCode(Vec<String>),
    Regex(String),
    /// Absolute amount no larger than this.
    AmountAtMost(Money),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRule {
    pub key: String,
    pub category: Category,
}

/// Matches when every condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub key: String,
    pub conditions: Vec<Condition>,
    pub category: Category,
}

/// Ordered rule table. Vendors are tried in declaration order, then patterns,
/// then `default`; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default = "Category::uncategorized")]
    pub default: Category,
    #[serde(default, rename = "vendor")]
    pub vendors: Vec<VendorRule>,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            default: Category::uncategorized(),
            vendors: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl RuleTable {
    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn vendor(mut self, key: &str, category: Category) -> Self {
        self.vendors.push(VendorRule {
            key: key.to_string(),
            category,
        });
        self
    }

    pub fn pattern(mut self, key: &str, conditions: Vec<Condition>, category: Category) -> Self {
        self.patterns.push(PatternRule {
            key: key.to_string(),
            conditions,
            category,
        });
        self
    }
}

/// Which rule produced a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "key", rename_all = "snake_case")]
pub enum MatchSource {
    Vendor(String),
    Pattern(String),
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub vendor: usize,
    pub pattern: usize,
    pub default: usize,
    pub already_categorized: usize,
}

enum CompiledCondition {
    AnyKeyword(Vec<String>),
    AllKeywords(Vec<String>),
    TypeCode(Vec<String>),
    Regex(regex::Regex),
    AmountAtMost(Money),
}

/// Vendor key uppercased once up front.
struct CompiledVendor {
    needle: String,
    rule: VendorRule,
}

struct CompiledPattern {
    conditions: Vec<CompiledCondition>,
    rule: PatternRule,
}

/// Pure categorizer over a precompiled [`RuleTable`]. Always returns a
/// category: lines no rule claims fall to the table's default.
pub struct Categorizer {
    default: Category,
    vendors: Vec<CompiledVendor>,
    patterns: Vec<CompiledPattern>,
}

impl Categorizer {
    pub fn new(table: RuleTable) -> Result<Self, RuleError> {
        let vendors = table
            .vendors
            .into_iter()
            .map(|rule| {
                let needle = rule.key.trim().to_uppercase();
                if needle.is_empty() {
                    return Err(RuleError::EmptyPattern(rule.key));
                }
                Ok(CompiledVendor { needle, rule })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let patterns = table
            .patterns
            .into_iter()
            .map(|rule| {
                if rule.conditions.is_empty() {
                    return Err(RuleError::EmptyPattern(rule.key));
                }
                let conditions = rule
                    .conditions
                    .iter()
                    .map(|c| compile_condition(&rule.key, c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledPattern { conditions, rule })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            default: table.default,
            vendors,
            patterns,
        })
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        Self::new(RuleTable::from_toml(toml_content)?)
    }

    pub fn categorize<T: Categorizable + ?Sized>(&self, tx: &T) -> Categorization {
        let upper = tx.description().to_uppercase();

        if let Some(v) = self.vendors.iter().find(|v| upper.contains(&v.needle)) {
            return Categorization {
                category: v.rule.category.clone(),
                source: MatchSource::Vendor(v.rule.key.clone()),
            };
        }

        if let Some(p) = self
            .patterns
            .iter()
            .find(|p| p.conditions.iter().all(|c| condition_holds(c, &upper, tx)))
        {
            return Categorization {
                category: p.rule.category.clone(),
                source: MatchSource::Pattern(p.rule.key.clone()),
            };
        }

        Categorization {
            category: self.default.clone(),
            source: MatchSource::Default,
        }
    }

    /// Assigns a category to every line that does not have one yet.
    pub fn apply<T: Categorizable>(&self, transactions: &mut [T]) -> RuleStats {
        let mut stats = RuleStats::default();
        for tx in transactions.iter_mut() {
            if tx.category().is_some() {
                stats.already_categorized += 1;
                continue;
            }
            let Categorization { category, source } = self.categorize(&*tx);
            match source {
                MatchSource::Vendor(_) => stats.vendor += 1,
                MatchSource::Pattern(_) => stats.pattern += 1,
                MatchSource::Default => stats.default += 1,
            }
            if let Err(err) = tx.set_category(category) {
                tracing::debug!(%err, "category already assigned");
            }
        }
        tracing::info!(
            vendor = stats.vendor,
            pattern = stats.pattern,
            uncategorized = stats.default,
            "categorized transactions"
        );
        stats
    }
}

fn compile_condition(key: &str, condition: &Condition) -> Result<CompiledCondition, RuleError> {
    Ok(match condition {
        Condition::AnyKeyword(words) => CompiledCondition::AnyKeyword(uppercase_all(key, words)?),
        Condition::AllKeywords(words) => CompiledCondition::AllKeywords(uppercase_all(key, words)?),
        Condition::TypeCode(codes) => CompiledCondition::TypeCode(uppercase_all(key, codes)?),
        Condition::Regex(pattern) => CompiledCondition::Regex(
            regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidRegex {
                    key: key.to_string(),
                    source,
                })?,
        ),
        Condition::AmountAtMost(limit) => CompiledCondition::AmountAtMost(*limit),
    })
}

fn uppercase_all(key: &str, words: &[String]) -> Result<Vec<String>, RuleError> {
    let words: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_uppercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Err(RuleError::EmptyPattern(key.to_string()));
    }
    Ok(words)
}

fn condition_holds<T: Categorizable + ?Sized>(
    condition: &CompiledCondition,
    upper: &str,
    tx: &T,
) -> bool {
    match condition {
        CompiledCondition::AnyKeyword(words) => words.iter().any(|w| upper.contains(w.as_str())),
        CompiledCondition::AllKeywords(words) => words.iter().all(|w| upper.contains(w.as_str())),
        CompiledCondition::TypeCode(codes) => {
            let code = tx.type_code().trim().to_uppercase();
            codes.iter().any(|c| *c == code)
        }
        CompiledCondition::Regex(re) => re.is_match(tx.description()),
        CompiledCondition::AmountAtMost(limit) => tx.amount().abs() <= *limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concilio_core::{CategoryKind, Transaction};

    fn make_tx(desc: &str, type_code: &str, cents: i64) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            desc,
            Money::from_cents(cents),
            type_code,
        )
    }

    fn cat(name: &str, sub: &str, kind: CategoryKind) -> Category {
        Category::new(name, sub, kind)
    }

    fn engine(table: RuleTable) -> Categorizer {
        Categorizer::new(table).unwrap()
    }

    fn office_table(specific_first: bool) -> RuleTable {
        let specific = cat("Office & Real Estate", "Office Rent", CategoryKind::Operating);
        let general = cat("Office & Real Estate", "Property Management", CategoryKind::Operating);
        if specific_first {
            RuleTable::default()
                .vendor("YSI*HIGHLAND", specific)
                .vendor("YSI*", general)
        } else {
            RuleTable::default()
                .vendor("YSI*", general)
                .vendor("YSI*HIGHLAND", specific)
        }
    }

    // ── vendor rules ──────────────────────────────────────────────────────────

    #[test]
    fn vendor_match_case_insensitive() {
        let e = engine(RuleTable::default().vendor("github", cat("Software", "Dev Tools", CategoryKind::Operating)));
        let c = e.categorize(&make_tx("GitHub, Inc.", "Sale", -2100));
        assert_eq!(c.category.subcategory, "Dev Tools");
        assert_eq!(c.source, MatchSource::Vendor("github".to_string()));
    }

    #[test]
    fn vendor_beats_pattern() {
        let table = RuleTable::default()
            .vendor("CHASE CREDIT CRD", cat("Credit Card Payment", "Autopay", CategoryKind::CardPayment))
            .pattern(
                "payment",
                vec![Condition::AnyKeyword(vec!["PAYMENT".into()])],
                cat("Payments", "Other", CategoryKind::PaymentsAndFees),
            );
        let c = engine(table).categorize(&make_tx("CHASE CREDIT CRD AUTOPAY PAYMENT", "ACH_DEBIT", -80000));
        assert_eq!(c.category.kind, CategoryKind::CardPayment);
    }

    #[test]
    fn specific_vendor_before_general_prefix() {
        let tx = make_tx("YSI*Highland North Hills", "Sale", -350000);
        let right = engine(office_table(true)).categorize(&tx);
        assert_eq!(right.category.subcategory, "Office Rent");
    }

    #[test]
    fn reordering_overlapping_vendors_changes_result() {
        let tx = make_tx("YSI*Highland North Hills", "Sale", -350000);
        let specific_first = engine(office_table(true)).categorize(&tx);
        let general_first = engine(office_table(false)).categorize(&tx);
        assert_ne!(specific_first.category, general_first.category);
        assert_eq!(general_first.category.subcategory, "Property Management");
    }

    #[test]
    fn reordering_disjoint_vendors_is_harmless() {
        let a = cat("Travel", "Ground", CategoryKind::Travel);
        let b = cat("Software", "AI", CategoryKind::Operating);
        let forward = engine(RuleTable::default().vendor("UBER", a.clone()).vendor("OPENAI", b.clone()));
        let reverse = engine(RuleTable::default().vendor("OPENAI", b).vendor("UBER", a));
        for desc in ["UBER *TRIP", "OPENAI *CHATGPT SUBSCR", "STARBUCKS"] {
            let tx = make_tx(desc, "Sale", -1000);
            assert_eq!(forward.categorize(&tx), reverse.categorize(&tx));
        }
    }

    // ── pattern rules ─────────────────────────────────────────────────────────

    #[test]
    fn all_conditions_must_hold() {
        let table = RuleTable::default().pattern(
            "international-wire",
            vec![
                Condition::AllKeywords(vec!["WIRE TRANSFER".into()]),
                Condition::AnyKeyword(vec!["SPAIN".into(), "BULGARIA".into()]),
            ],
            cat("Consultant", "International", CategoryKind::Consultant),
        );
        let e = engine(table);
        assert_eq!(
            e.categorize(&make_tx("WIRE TRANSFER TO BULGARIA", "WIRE_OUTGOING", -100)).category.kind,
            CategoryKind::Consultant
        );
        assert!(e
            .categorize(&make_tx("WIRE TRANSFER TO FRANCE", "WIRE_OUTGOING", -100))
            .category
            .is_uncategorized());
    }

    #[test]
    fn type_code_condition() {
        let table = RuleTable::default().pattern(
            "loan",
            vec![Condition::TypeCode(vec!["LOAN_PMT".into()])],
            cat("Auto Loan", "", CategoryKind::AutoLoan),
        );
        let e = engine(table);
        assert_eq!(e.categorize(&make_tx("ONLINE PMT", "loan_pmt", -45000)).category.kind, CategoryKind::AutoLoan);
        assert!(e.categorize(&make_tx("ONLINE PMT", "ACH_DEBIT", -45000)).category.is_uncategorized());
    }

    #[test]
    fn amount_ceiling_condition() {
        let table = RuleTable::default().pattern(
            "test-charge",
            vec![
                Condition::AmountAtMost(Money::from_cents(100)),
                Condition::AnyKeyword(vec!["TEST".into()]),
            ],
            cat("Excluded", "Test Transaction", CategoryKind::Excluded),
        );
        let e = engine(table);
        assert_eq!(e.categorize(&make_tx("TEST CHARGE", "Sale", -100)).category.kind, CategoryKind::Excluded);
        assert!(e.categorize(&make_tx("TEST CHARGE", "Sale", -101)).category.is_uncategorized());
    }

    #[test]
    fn regex_condition() {
        let table = RuleTable::default().pattern(
            "amazon",
            vec![Condition::Regex(r"^amzn|amazon".into())],
            cat("Office", "Supplies", CategoryKind::Operating),
        );
        let e = engine(table);
        assert_eq!(e.categorize(&make_tx("AMZN Mktp US", "Sale", -1999)).category.kind, CategoryKind::Operating);
        assert!(e.categorize(&make_tx("WHOLE FOODS", "Sale", -1999)).category.is_uncategorized());
    }

    // ── default and totality ──────────────────────────────────────────────────

    #[test]
    fn empty_table_always_returns_default() {
        let e = engine(RuleTable::default());
        for desc in ["", "ANYTHING", "ünïcödé"] {
            let c = e.categorize(&make_tx(desc, "", 1));
            assert!(c.category.is_uncategorized());
            assert_eq!(c.source, MatchSource::Default);
        }
    }

    #[test]
    fn categorize_is_deterministic() {
        let e = engine(office_table(true));
        let tx = make_tx("YSI*HIGHLAND", "Sale", -1);
        assert_eq!(e.categorize(&tx), e.categorize(&tx));
    }

    #[test]
    fn apply_skips_already_categorized() {
        let e = engine(RuleTable::default().vendor("UBER", cat("Travel", "Ground", CategoryKind::Travel)));
        let mut txs = vec![make_tx("UBER TRIP", "Sale", -1500), make_tx("MYSTERY", "Sale", -10)];
        let preset = cat("Travel", "Manual", CategoryKind::Travel);
        txs[0].set_category(preset.clone()).unwrap();

        let stats = e.apply(&mut txs);
        assert_eq!(stats.already_categorized, 1);
        assert_eq!(stats.default, 1);
        assert_eq!(txs[0].category.as_ref(), Some(&preset));
        assert!(txs[1].category.as_ref().is_some_and(Category::is_uncategorized));
    }

    // ── table construction ────────────────────────────────────────────────────

    #[test]
    fn from_toml_preserves_order() {
        let toml = r#"
            [default]
            name = "Miscellaneous"
            subcategory = "Uncategorized"
            kind = "uncategorized"

            [[vendor]]
            key = "YSI*HIGHLAND"
            category = { name = "Office & Real Estate", subcategory = "Office Rent", kind = "operating" }

            [[vendor]]
            key = "YSI*"
            category = { name = "Office & Real Estate", subcategory = "Property Management", kind = "operating" }

            [[pattern]]
            key = "payments"
            conditions = [{ any_keyword = ["PAYMENT", "AUTOPAY"] }]
            category = { name = "Payments", subcategory = "Credit Card Payment", kind = "payments_and_fees" }
        "#;
        let table = RuleTable::from_toml(toml).unwrap();
        assert_eq!(table.vendors[0].key, "YSI*HIGHLAND");
        assert_eq!(table.vendors[1].key, "YSI*");
        assert_eq!(
            table.patterns[0].conditions,
            vec![Condition::AnyKeyword(vec!["PAYMENT".into(), "AUTOPAY".into()])]
        );

        let e = engine(table);
        assert_eq!(e.categorize(&make_tx("YSI*HIGHLAND", "Sale", -1)).category.subcategory, "Office Rent");
        assert_eq!(e.categorize(&make_tx("AUTOPAY", "", 1)).category.kind, CategoryKind::PaymentsAndFees);
    }

    #[test]
    fn from_toml_amount_condition() {
        let toml = r#"
            [[pattern]]
            key = "tiny"
            conditions = [{ amount_at_most = "1.00" }]
            category = { name = "Excluded", kind = "excluded" }
        "#;
        let e = Categorizer::from_toml(toml).unwrap();
        assert_eq!(e.categorize(&make_tx("X", "", -100)).category.kind, CategoryKind::Excluded);
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(matches!(RuleTable::from_toml("[[vendor]\nkey ="), Err(RuleError::Toml(_))));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let table = RuleTable::default().pattern(
            "broken",
            vec![Condition::Regex("(unclosed".into())],
            Category::uncategorized(),
        );
        assert!(matches!(Categorizer::new(table), Err(RuleError::InvalidRegex { .. })));
    }

    #[test]
    fn empty_rules_are_errors() {
        let no_conditions = RuleTable::default().pattern("nothing", vec![], Category::uncategorized());
        assert!(matches!(Categorizer::new(no_conditions), Err(RuleError::EmptyPattern(_))));

        let blank_vendor = RuleTable::default().vendor("  ", Category::uncategorized());
        assert!(matches!(Categorizer::new(blank_vendor), Err(RuleError::EmptyPattern(_))));

        let blank_keyword = RuleTable::default().pattern(
            "blank",
            vec![Condition::AnyKeyword(vec![String::new()])],
            Category::uncategorized(),
        );
        assert!(matches!(Categorizer::new(blank_keyword), Err(RuleError::EmptyPattern(_))));
    }
}
