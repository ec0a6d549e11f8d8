pub mod idempotency;
pub mod ledger;

pub use idempotency::IdempotencyRegistry;
pub use ledger::LedgerStore;
