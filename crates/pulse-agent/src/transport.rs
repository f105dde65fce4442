//! Outbound HTTP delivery with pooled connections and bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Uri;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use pulse_model::Metric;

use crate::error::{AgentError, AgentResult};

/// Anything that can push one metric to the collector.
///
/// The dispatcher depends on this seam, not on the HTTP client, so the
/// worker pool can be exercised without a network.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, metric: &Metric) -> AgentResult<()>;
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Collector ingestion endpoint, e.g. `http://collector:8080/update`.
    pub endpoint: String,
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Backoff floor; doubles per retry.
    pub retry_wait: Duration,
    /// Backoff ceiling.
    pub retry_max_wait: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Shared secret for integrity tags.
    pub secret: Option<Vec<u8>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/update".to_string(),
            max_idle_per_host: 15,
            retry_count: 3,
            retry_wait: Duration::from_millis(100),
            retry_max_wait: Duration::from_millis(900),
            timeout: Duration::from_secs(5),
            secret: None,
        }
    }
}

/// HTTP delivery client.
pub struct Transport {
    client: Client<HttpConnector, Full<Bytes>>,
    endpoint: Uri,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> AgentResult<Self> {
        let endpoint: Uri = config
            .endpoint
            .parse()
            .map_err(|_| AgentError::Endpoint(config.endpoint.clone()))?;

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build_http();

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Sign (when a secret is configured) and serialize one metric.
    fn encode(metric: &Metric, secret: Option<&[u8]>) -> AgentResult<Bytes> {
        let mut metric = metric.clone();
        if let Some(secret) = secret {
            metric.sign(secret)?;
        }
        let data =
            serde_json::to_vec(&metric).map_err(|e| AgentError::Encode(e.to_string()))?;
        Ok(Bytes::from(data))
    }

    async fn post_once(&self, body: Bytes) -> AgentResult<()> {
        let request = http::Request::builder()
            .method(http::Method::POST)
            .uri(self.endpoint.clone())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| AgentError::Encode(e.to_string()))?;

        let response = tokio::time::timeout(self.config.timeout, self.client.request(request))
            .await
            .map_err(|_| AgentError::Timeout)?
            .map_err(|e| AgentError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Next backoff interval: double, capped.
fn next_wait(wait: Duration, max: Duration) -> Duration {
    (wait * 2).min(max)
}

#[async_trait]
impl Deliver for Transport {
    async fn deliver(&self, metric: &Metric) -> AgentResult<()> {
        let body = Self::encode(metric, self.config.secret.as_deref())?;

        let mut wait = self.config.retry_wait;
        let mut attempt = 0u32;
        loop {
            match self.post_once(body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.config.retry_count => {
                    attempt += 1;
                    debug!(error = %e, attempt, wait_ms = wait.as_millis() as u64, id = %metric.id, "delivery retry");
                    tokio::time::sleep(wait).await;
                    wait = next_wait(wait, self.config.retry_max_wait);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
