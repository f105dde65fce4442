//! pulse-storage — interchangeable persistence backends for metrics.
//!
//! The collector talks to storage only through the [`MetricStore`]
//! trait. Two backends satisfy the same contract:
//!
//! ```text
//! MemoryStore — RwLock'd map, periodic JSON snapshot to a file,
//!               optional restore at startup
//! PgStore     — Postgres upserts via sqlx, transactional batches
//! ```
//!
//! The contract that matters is merge semantics: `save` overwrites
//! (gauge), `accumulate` adds to the running total (counter) without
//! lost updates under concurrency, and `apply_batch` is all-or-nothing.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::MetricStore;
