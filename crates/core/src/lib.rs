pub mod category;
pub mod money;
pub mod period;
pub mod transaction;

pub use category::{Category, CategoryKind};
pub use money::Money;
pub use period::DateRange;
pub use transaction::{CardDirection, CardTransaction, Categorizable, LedgerError, Transaction};
