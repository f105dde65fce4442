//! pulse-api — REST API for the PulseGrid collector.
//!
//! Thin translation layer: handlers parse the wire shape, delegate to
//! the [`Aggregator`], and map its errors onto status codes. No merge
//! or validation logic lives here.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/update` | Ingest one metric (JSON body) |
//! | POST | `/updates` | Ingest a batch atomically (JSON array) |
//! | POST | `/update/{kind}/{id}/{value}` | Ingest one metric from path parts |
//! | POST | `/value` | Look up a metric (JSON body), JSON reply |
//! | GET | `/value/{kind}/{id}` | Look up a metric, plain-text value |
//! | GET | `/` | HTML list of all stored metrics |
//! | GET | `/healthz` | Storage reachability probe |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use pulse_server::Aggregator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<Aggregator>,
}

/// Build the collector's router over an aggregator.
pub fn build_router(aggregator: Arc<Aggregator>) -> Router {
    let state = ApiState { aggregator };

    Router::new()
        .route("/", get(handlers::list_metrics))
        .route("/healthz", get(handlers::healthz))
        .route("/update", post(handlers::update_with_body))
        .route("/updates", post(handlers::update_batch))
        .route("/update/{kind}/{id}/{value}", post(handlers::update_with_path))
        .route("/value", post(handlers::value_with_body))
        .route("/value/{kind}/{id}", get(handlers::value_with_path))
        .with_state(state)
}
