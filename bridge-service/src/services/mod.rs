//! Sync engine services.

pub mod comparator;
pub mod contacts;
pub mod locator;
pub mod mapping;
pub mod payments;
pub mod scheduler;
pub mod synchronizer;
pub mod warnings;

pub use comparator::{compare_documents, Comparison};
pub use contacts::ContactReconciler;
pub use locator::{locate_document, LocatorOutcome};
pub use payments::PaymentReconciler;
pub use scheduler::{Scheduler, SyncStatus};
pub use synchronizer::Synchronizer;
pub use warnings::WarningLedger;

use rust_decimal::Decimal;

/// Two monetary amounts are treated as equal when they differ by no more
/// than this. Differences at exactly the tolerance still count as equal.
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Largest payment shortfall the engine will close on its own with a
/// rounding adjustment; anything larger needs an operator.
pub const ROUNDING_BOUND: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Whether two amounts agree within [`TOLERANCE`].
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= TOLERANCE
}
