//! pulse-server — the collector's core.
//!
//! ```text
//! Aggregator
//!   ├── ingest()        ← one metric: validate, verify tag, merge by kind
//!   ├── ingest_batch()  ← all-or-nothing batch
//!   └── load()/list()   → read-side, re-signed when a secret is set
//!
//! Flusher
//!   └── run() → periodic store flush + one final flush on shutdown
//! ```
//!
//! The aggregator owns the merge rules (gauge overwrites, counter
//! accumulates) and depends only on the `MetricStore` trait, handed in
//! at construction.

pub mod aggregator;
pub mod error;
pub mod flusher;

pub use aggregator::Aggregator;
pub use error::{ServerError, ServerResult};
pub use flusher::Flusher;
