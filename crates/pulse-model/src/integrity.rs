//! Keyed integrity tags for metrics.
//!
//! `tag = hex(HMAC-SHA256(secret, "<id>:<kind>:<canonical_value>"))`.
//! The tag proves a metric was produced by a holder of the shared
//! secret and was not altered in transit. Computation is pure: the same
//! metric and secret always reproduce the same tag.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ModelResult;
use crate::metric::Metric;

type HmacSha256 = Hmac<Sha256>;

/// Compute the integrity tag for a metric under the given secret.
pub fn compute_tag(metric: &Metric, secret: &[u8]) -> ModelResult<String> {
    let payload = format!(
        "{}:{}:{}",
        metric.id,
        metric.kind,
        metric.canonical_value()?
    );

    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl Metric {
    /// Attach the integrity tag computed under `secret`.
    pub fn sign(&mut self, secret: &[u8]) -> ModelResult<()> {
        self.tag = Some(compute_tag(self, secret)?);
        Ok(())
    }

    /// Verify the attached tag against `secret`.
    ///
    /// Returns `false` when the tag is absent, undecodable, or does not
    /// match the recomputation; constant-time on the MAC comparison.
    pub fn verify_tag(&self, secret: &[u8]) -> ModelResult<bool> {
        let Some(tag) = &self.tag else {
            return Ok(false);
        };
        let Ok(raw) = hex::decode(tag) else {
            return Ok(false);
        };

        let payload = format!("{}:{}:{}", self.id, self.kind, self.canonical_value()?);
        let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());

        Ok(mac.verify_slice(&raw).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_deterministic() {
        let metric = Metric::gauge("temp", 23.5);
        let a = compute_tag(&metric, b"k1").unwrap();
        let b = compute_tag(&metric, b"k1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tag_depends_on_every_signed_field() {
        let base = compute_tag(&Metric::gauge("temp", 23.5), b"k1").unwrap();

        assert_ne!(base, compute_tag(&Metric::gauge("temp2", 23.5), b"k1").unwrap());
        assert_ne!(base, compute_tag(&Metric::gauge("temp", 23.6), b"k1").unwrap());
        assert_ne!(base, compute_tag(&Metric::counter("temp", 23), b"k1").unwrap());
    }

    #[test]
    fn sign_then_verify_accepts() {
        let mut metric = Metric::counter("hits", 7);
        metric.sign(b"k1").unwrap();
        assert!(metric.verify_tag(b"k1").unwrap());
    }

    #[test]
    fn wrong_secret_rejected() {
        let mut metric = Metric::counter("hits", 7);
        metric.sign(b"k1").unwrap();
        assert!(!metric.verify_tag(b"k2").unwrap());
    }

    #[test]
    fn missing_or_garbage_tag_rejected() {
        let metric = Metric::gauge("temp", 1.0);
        assert!(!metric.verify_tag(b"k1").unwrap());

        let mut tampered = Metric::gauge("temp", 1.0);
        tampered.tag = Some("not-hex".to_string());
        assert!(!tampered.verify_tag(b"k1").unwrap());
    }

    #[test]
    fn tampered_value_rejected() {
        let mut metric = Metric::gauge("temp", 23.5);
        metric.sign(b"k1").unwrap();
        metric.value = Some(99.9);
        assert!(!metric.verify_tag(b"k1").unwrap());
    }
}
