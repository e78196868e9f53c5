//! Client for the external delay-risk scoring service.
//!
//! The service exposes `POST /predict`, takes the six-value feature vector
//! and answers with a verdict, a confidence in `0..=1` and a per-feature
//! weight map. Inference never happens in this crate.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::risk::PredictionFeatures;

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringResponse {
    pub prediction: String,
    pub confidence: f64,
    #[serde(default)]
    pub reason: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("failed to reach scoring service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scoring service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("undecodable scoring response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ScoringClient {
    client: Client,
    base_url: String,
}

impl ScoringClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn score(
        &self,
        features: &PredictionFeatures,
    ) -> Result<ScoringResponse, ScoringError> {
        let url = format!("{}/predict", self.base_url);
        debug!(?features, %url, "sending features to scoring service");

        let response = self.client.post(&url).json(features).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "scoring service rejected request");
            return Err(ScoringError::Status { status, body });
        }

        let scored: ScoringResponse = response.json().await.map_err(|err| {
            warn!(%status, error = %err, "scoring service sent an unreadable body");
            ScoringError::Decode(err)
        })?;
        debug!(
            prediction = %scored.prediction,
            confidence = scored.confidence,
            "received prediction"
        );
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use tokio::net::TcpListener;

    async fn serve_body(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let router = Router::new().route("/predict", post(move || async move { body }));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    fn features() -> PredictionFeatures {
        PredictionFeatures {
            attendance: 0.85,
            progress: 0.5,
            published: 1,
            extensions: 0,
            delay: 0.0,
            score: 5.0,
        }
    }

    #[tokio::test]
    async fn unreadable_success_body_is_a_decode_error() {
        let base = serve_body("model warming up").await;
        let client = ScoringClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.score(&features()).await.unwrap_err();
        assert!(matches!(err, ScoringError::Decode(_)), "{err}");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let client = ScoringClient::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();

        let err = client.score(&features()).await.unwrap_err();
        assert!(matches!(err, ScoringError::Transport(_)), "{err}");
    }
}
