//! pulse-agent — the producing-node side of PulseGrid.
//!
//! # Architecture
//!
//! ```text
//! Sampler ──(poll tick)──▶ DeliveryQueue (bounded, backpressure)
//!                              │
//!                  (report tick broadcast)
//!                              ▼
//!                     worker pool ──▶ Transport ──▶ collector /update
//! ```
//!
//! Sampling and reporting run on independent cadences. A full queue
//! blocks the sampler rather than dropping telemetry; delivery workers
//! drain the queue concurrently on every report tick, each delivery
//! signed and retried with capped exponential backoff.

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod sampler;
pub mod transport;

pub use dispatcher::{AgentConfig, Dispatcher};
pub use error::{AgentError, AgentResult};
pub use sampler::Sampler;
pub use transport::{Deliver, Transport, TransportConfig};
