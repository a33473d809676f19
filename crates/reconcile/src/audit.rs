use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    ComputeTotals,
    ClassifyPayments,
    FilterPayments,
    ExtractCharges,
    MapPeriod,
    CalculateSummary,
    MatchRoster,
}

/// One replayable calculation: what was computed, from which inputs, and
/// what it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub seq: usize,
    pub step: AuditStep,
    pub description: String,
    pub inputs: Value,
    pub result: Value,
}

/// Append-only, ordered record of calculation steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: AuditStep, description: impl Into<String>, inputs: Value, result: Value) {
        let seq = self.entries.len() + 1;
        self.entries.push(AuditEntry {
            seq,
            step,
            description: description.into(),
            inputs,
            result,
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn steps(&self) -> impl Iterator<Item = AuditStep> + '_ {
        self.entries.iter().map(|e| e.step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
