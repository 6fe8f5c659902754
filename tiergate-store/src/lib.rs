//! Persistence adapters for Tiergate.
//!
//! The entitlement engine sees the persisted store through two narrow
//! traits:
//! - [`MembershipStore`]: read, upsert and status transitions of per-user
//!   membership records
//! - [`UsageStore`]: per-period resource counts and monthly counters
//!
//! Two implementations are provided: [`MemoryStore`] for tests and
//! embedding, and [`SqliteStore`] backed by a single SQLite file. Neither
//! retries failed operations; that is left to the caller.

mod error;
mod memory;
mod sqlite;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{MembershipStore, UsageStore};
