//! The `Metric` type and its shape validation.
//!
//! Wire format is JSON: `{id, kind, value|delta, tag?}`. The absent
//! value field and the tag are omitted entirely rather than sent null.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// The two recognized metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Absolute reading; each update replaces the stored value.
    Gauge,
    /// Delta since the last report; the collector accumulates a sum.
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// A single named telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub kind: MetricKind,
    /// Present iff `kind == Gauge`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Present iff `kind == Counter`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// Keyed integrity tag, present only when a secret is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Metric {
    /// Build a gauge metric.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            value: Some(value),
            delta: None,
            tag: None,
        }
    }

    /// Build a counter metric.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            value: None,
            delta: Some(delta),
            tag: None,
        }
    }

    /// Build and validate a metric from loosely-typed wire parts.
    ///
    /// The kind arrives as a string so an unrecognized kind surfaces as
    /// [`ModelError::UnknownKind`] rather than a decode failure.
    pub fn from_parts(
        id: impl Into<String>,
        kind: &str,
        value: Option<f64>,
        delta: Option<i64>,
        tag: Option<String>,
    ) -> ModelResult<Self> {
        let metric = Self {
            id: id.into(),
            kind: kind.parse()?,
            value,
            delta,
            tag,
        };
        metric.validate()?;
        Ok(metric)
    }

    /// Build a metric from a kind string and a textual value, as used by
    /// the URL-path ingestion variant.
    pub fn from_string(id: impl Into<String>, kind: &str, raw: &str) -> ModelResult<Self> {
        let id = id.into();
        let metric = match kind.parse()? {
            MetricKind::Gauge => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| ModelError::UnparsableValue(id.clone(), raw.to_string()))?;
                Self::gauge(id, value)
            }
            MetricKind::Counter => {
                let delta: i64 = raw
                    .parse()
                    .map_err(|_| ModelError::UnparsableValue(id.clone(), raw.to_string()))?;
                Self::counter(id, delta)
            }
        };
        metric.validate()?;
        Ok(metric)
    }

    /// Check the shape invariant: non-empty id, and exactly the value
    /// field matching the kind is populated.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.is_empty() {
            return Err(ModelError::EmptyId);
        }

        match self.kind {
            MetricKind::Gauge => {
                if self.delta.is_some() {
                    return Err(ModelError::ConflictingFields(self.id.clone()));
                }
                if self.value.is_none() {
                    return Err(ModelError::MissingValue(self.id.clone()));
                }
            }
            MetricKind::Counter => {
                if self.value.is_some() {
                    return Err(ModelError::ConflictingFields(self.id.clone()));
                }
                if self.delta.is_none() {
                    return Err(ModelError::MissingDelta(self.id.clone()));
                }
            }
        }

        Ok(())
    }

    /// Canonical textual form of the carried value.
    ///
    /// Shortest round-trippable decimal for gauges, plain decimal for
    /// counters. Locale-independent; the integrity tag is computed over
    /// this form, so it must be stable bit-for-bit.
    pub fn canonical_value(&self) -> ModelResult<String> {
        match self.kind {
            MetricKind::Gauge => self
                .value
                .map(|v| v.to_string())
                .ok_or_else(|| ModelError::MissingValue(self.id.clone())),
            MetricKind::Counter => self
                .delta
                .map(|d| d.to_string())
                .ok_or_else(|| ModelError::MissingDelta(self.id.clone())),
        }
    }
}
