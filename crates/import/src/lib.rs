pub mod csv;
pub mod defaults;
pub mod match_engine;
pub mod rules;
pub(crate) mod util;

pub use self::csv::{infer_direction, parse_card, parse_checking, Parsed, RowError, StatementProfile};
pub use match_engine::{
    load_roster, CrossSourceMatcher, CrossSourceReport, MatchConfidence, MatcherConfig,
    PartyMatch, RosterEntry, RosterError, SourceKind,
};
pub use rules::{
    Categorization, Categorizer, Condition, MatchSource, RuleError, RuleStats, RuleTable,
};
