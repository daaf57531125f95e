use uuid::Uuid;

/// All entities are identified by time-ordered, opaque 128-bit ids.
pub type Id = Uuid;

/// Mint a fresh identifier. Time-ordered (v7) so index locality favors
/// recently-created rows, matching every entity's `created_at`-descending
/// default listing order.
#[must_use]
pub fn new_id() -> Id {
    Uuid::now_v7()
}
