//! pulse-model — the PulseGrid metric domain model.
//!
//! A [`Metric`] is the unit of telemetry flowing from agents to the
//! collector. Two kinds exist with different merge semantics:
//!
//! ```text
//! Gauge    — absolute reading, each update replaces the prior value
//! Counter  — delta since last report, the collector keeps a running sum
//! ```
//!
//! The model enforces the shape invariant (a gauge carries `value`, a
//! counter carries `delta`, never both, never neither) and provides the
//! keyed integrity tag agents attach when a shared secret is configured.

pub mod error;
pub mod integrity;
pub mod metric;

pub use error::{ModelError, ModelResult};
pub use metric::{Metric, MetricKind};
