//! Hash cache
//!
//! Maps installed file paths to the SHA-1 computed at a given modification
//! time, so files that have not changed since the previous run are not
//! re-hashed. The table is loaded once at the start of a sync run, updated in
//! memory as hashes are computed, and written back once when the run ends.
//!
//! - [`format`] - line codec for the persisted table
//! - [`manager`] - the in-memory table and its load/persist logic

pub mod format;
pub mod manager;

pub use format::CacheRecord;
pub use manager::HashCache;
