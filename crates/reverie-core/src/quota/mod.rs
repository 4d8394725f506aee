//! Interpretation quota: the admission policy and the ledger that applies it.

pub mod ledger;
pub mod policy;

pub use ledger::QuotaLedger;
pub use policy::{QuotaCharge, QuotaPolicy};
