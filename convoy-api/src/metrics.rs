use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Counters for validation outcomes and committed mutations.
pub struct ApiMetrics {
    registry: Registry,
    denied: IntCounterVec,
    mutations: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let denied = IntCounterVec::new(
            opts!("convoy_decisions_denied_total", "Mutations denied by the validation gateway"),
            &["action", "code"],
        )?;
        let mutations = IntCounterVec::new(
            opts!("convoy_mutations_total", "Mutations committed to the store"),
            &["action"],
        )?;

        registry.register(Box::new(denied.clone()))?;
        registry.register(Box::new(mutations.clone()))?;

        Ok(Self {
            registry,
            denied,
            mutations,
        })
    }

    pub fn record_denial(&self, action: &str, code: &str) {
        self.denied.with_label_values(&[action, code]).inc();
    }

    pub fn record_mutation(&self, action: &str) {
        self.mutations.with_label_values(&[action]).inc();
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
