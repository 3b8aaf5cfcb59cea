//! Paper-trading bookkeeping: the operation ledger, its statistics, and
//! resolution of a signal against the candles that followed it.
//!
//! No order ever leaves this crate.

pub mod ledger;
pub mod simulate;

pub use ledger::{ClassStats, Ledger, LedgerEntry, Statistics};
pub use simulate::simulate;
