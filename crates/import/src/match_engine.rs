use chrono::NaiveDate;
use concilio_core::{CardTransaction, Category, CategoryKind, Money, Transaction};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::util::similarity;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("line {line}: invalid expected total '{value}'")]
    InvalidAmount { line: u64, value: String },
}

/// One named party from an external ledger, with the total it expects to
/// have been paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub expected_total: Money,
    pub source: Option<String>,
}

impl RosterEntry {
    pub fn new(name: &str, expected_total: Money) -> Self {
        Self {
            name: name.to_string(),
            expected_total,
            source: None,
        }
    }
}

/// Reads a roster CSV with a header row: `name,expected_total[,source]`.
/// Column order is free; rows with a blank name are skipped.
pub fn load_roster(content: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers = reader.headers()?.clone();
    let column = |wanted: &[&str]| {
        headers
            .iter()
            .position(|h| wanted.iter().any(|w| h.eq_ignore_ascii_case(w)))
    };
    let name_col = column(&["name"]).ok_or(RosterError::MissingColumn("name"))?;
    let total_col = column(&["expected_total", "total"])
        .ok_or(RosterError::MissingColumn("expected_total"))?;
    let source_col = column(&["source"]);

    let mut roster = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let name = record.get(name_col).unwrap_or_default();
        if name.is_empty() {
            tracing::debug!(line, "skipping roster row without a name");
            continue;
        }
        let raw_total = record.get(total_col).unwrap_or_default();
        let expected_total = Money::from_str(raw_total).map_err(|_| RosterError::InvalidAmount {
            line,
            value: raw_total.to_string(),
        })?;
        let source = source_col
            .and_then(|c| record.get(c))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        roster.push(RosterEntry {
            name: name.to_string(),
            expected_total,
            source,
        });
    }
    Ok(roster)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Name tokens shorter than this are ignored.
    pub min_token_len: usize,
    /// Levenshtein similarity a description word needs to count as a near hit.
    pub fuzzy_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            fuzzy_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Checking,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub source: SourceKind,
    pub date: NaiveDate,
    pub description: String,
    /// Outflow size, always positive.
    pub amount: Money,
    /// Share of the party's tokens found, with near hits counting half.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyMatch {
    pub name: String,
    pub roster_source: Option<String>,
    pub tokens: Vec<String>,
    pub expected_total: Money,
    pub checking_total: Money,
    pub card_total: Money,
    pub matched_total: Money,
    /// `expected_total - matched_total`.
    pub variance: Money,
    pub confidence: MatchConfidence,
    pub candidates: Vec<Candidate>,
}

/// A consultant payment in the checking stream that no roster party claimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnclaimedLine {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossSourceReport {
    pub parties: Vec<PartyMatch>,
    pub unclaimed: Vec<UnclaimedLine>,
    pub expected_total: Money,
    pub matched_total: Money,
    pub variance: Money,
}

/// Best-effort name matcher tying a roster of payees to the two transaction
/// streams. Output is a review worklist, not an authoritative figure.
pub struct CrossSourceMatcher {
    config: MatcherConfig,
}

impl Default for CrossSourceMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

/// Outflow line from either stream, flattened for scoring.
struct Outflow<'a> {
    index: usize,
    source: SourceKind,
    date: NaiveDate,
    description: &'a str,
    subcategory: String,
    amount: Money,
}

impl CrossSourceMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Lowercased name tokens, split on whitespace and hyphens, stripped of
    /// punctuation, at least `min_token_len` characters, first occurrence kept.
    pub fn significant_tokens(&self, name: &str) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for raw in name.split(|c: char| c.is_whitespace() || c == '-') {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if token.chars().count() >= self.config.min_token_len && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }

    pub fn reconcile(
        &self,
        roster: &[RosterEntry],
        checking: &[Transaction],
        card: &[CardTransaction],
    ) -> CrossSourceReport {
        let outflows = collect_outflows(checking, card);
        let mut claimed_checking = vec![false; checking.len()];

        let parties: Vec<PartyMatch> = roster
            .iter()
            .map(|entry| {
                let tokens = self.significant_tokens(&entry.name);
                let mut candidates = Vec::new();
                for line in &outflows {
                    let score = self.score(&tokens, line);
                    if score < 0.5 {
                        continue;
                    }
                    if line.source == SourceKind::Checking {
                        claimed_checking[line.index] = true;
                    }
                    candidates.push(Candidate {
                        source: line.source,
                        date: line.date,
                        description: line.description.to_string(),
                        amount: line.amount,
                        score,
                    });
                }
                candidates.sort_by_key(|c| c.date);
                summarize(entry, tokens, candidates)
            })
            .collect();

        let unclaimed: Vec<UnclaimedLine> = checking
            .iter()
            .zip(&claimed_checking)
            .filter(|(tx, claimed)| {
                !**claimed
                    && tx.is_debit()
                    && tx.category.as_ref().is_some_and(|c| c.kind == CategoryKind::Consultant)
            })
            .map(|(tx, _)| UnclaimedLine {
                date: tx.date,
                description: tx.description.clone(),
                amount: tx.amount.abs(),
                category: tx.category_or_default(),
            })
            .collect();

        let expected_total: Money = parties.iter().map(|p| p.expected_total).sum();
        let matched_total: Money = parties.iter().map(|p| p.matched_total).sum();

        tracing::info!(
            parties = parties.len(),
            matched = parties
                .iter()
                .filter(|p| p.confidence != MatchConfidence::None)
                .count(),
            unclaimed = unclaimed.len(),
            "cross-source matching complete"
        );

        CrossSourceReport {
            parties,
            unclaimed,
            expected_total,
            matched_total,
            variance: expected_total - matched_total,
        }
    }

    /// Each token scores 1.0 when it appears in the description or the
    /// line's subcategory, 0.5 when a description word is a near miss.
    fn score(&self, tokens: &[String], line: &Outflow<'_>) -> f32 {
        if tokens.is_empty() {
            return 0.0;
        }
        let text = line.description.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= self.config.min_token_len)
            .collect();

        let total: f32 = tokens
            .iter()
            .map(|token| {
                if text.contains(token.as_str()) || line.subcategory.contains(token.as_str()) {
                    1.0
                } else if words
                    .iter()
                    .any(|w| similarity(w, token) >= self.config.fuzzy_threshold)
                {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        total / tokens.len() as f32
    }
}

fn collect_outflows<'a>(checking: &'a [Transaction], card: &'a [CardTransaction]) -> Vec<Outflow<'a>> {
    let checking_lines = checking
        .iter()
        .enumerate()
        .filter(|(_, tx)| tx.is_debit())
        .map(|(index, tx)| Outflow {
            index,
            source: SourceKind::Checking,
            date: tx.date,
            description: &tx.description,
            subcategory: subcategory_text(tx.category.as_ref()),
            amount: tx.amount.abs(),
        });
    let card_lines = card
        .iter()
        .enumerate()
        .filter(|(_, tx)| tx.is_charge())
        .map(|(index, tx)| Outflow {
            index,
            source: SourceKind::Card,
            date: tx.date,
            description: &tx.description,
            subcategory: subcategory_text(tx.category.as_ref()),
            amount: tx.amount,
        });
    checking_lines.chain(card_lines).collect()
}

fn subcategory_text(category: Option<&Category>) -> String {
    category.map(|c| c.subcategory.to_lowercase()).unwrap_or_default()
}

fn summarize(entry: &RosterEntry, tokens: Vec<String>, candidates: Vec<Candidate>) -> PartyMatch {
    let total_for = |source: SourceKind| -> Money {
        candidates
            .iter()
            .filter(|c| c.source == source)
            .map(|c| c.amount)
            .sum()
    };
    let checking_total = total_for(SourceKind::Checking);
    let card_total = total_for(SourceKind::Card);
    let matched_total = checking_total + card_total;
    let variance = entry.expected_total - matched_total;

    let confidence = if candidates.is_empty() {
        MatchConfidence::None
    } else {
        let base = entry.expected_total.abs().max(matched_total);
        let pct = variance.abs().percent_of(base);
        let all_exact = candidates.iter().all(|c| c.score >= 1.0);
        if pct <= rust_decimal::Decimal::ONE && all_exact {
            MatchConfidence::High
        } else if pct <= rust_decimal::Decimal::from(5) {
            MatchConfidence::Medium
        } else {
            MatchConfidence::Low
        }
    };

    PartyMatch {
        name: entry.name.clone(),
        roster_source: entry.source.clone(),
        tokens,
        expected_total: entry.expected_total,
        checking_total,
        card_total,
        matched_total,
        variance,
        confidence,
        candidates,
    }
}
