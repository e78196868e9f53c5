use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{load_scholar, required_email, save_scholar};
use crate::error::AppResult;
use crate::models::Prediction;
use crate::risk::PredictionFeatures;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    email: Option<String>,
}

/// Scores a scholar's delay risk and appends the verdict to their history.
///
/// The document is only written once the scoring service answered, so a
/// failed call leaves the scholar untouched.
pub async fn request_prediction(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let email = required_email(body.email, "Email is required")?;

    let mut scholar = load_scholar(state.store.as_ref(), &email).await?;
    let attendance = state.store.attendance_for_scholar(&email).await?;
    let features = PredictionFeatures::from_scholar(&scholar, &attendance);

    let scored = state.scoring.score(&features).await?;
    info!(
        %email,
        prediction = %scored.prediction,
        confidence = scored.confidence,
        "prediction received"
    );

    let now = Utc::now();
    scholar.predictions.push(Prediction {
        date: now,
        result: scored.prediction.clone(),
        confidence: scored.confidence,
        parameters: scored.reason.clone(),
    });
    scholar.metrics = Some(features.to_metrics(now));
    save_scholar(state.store.as_ref(), &mut scholar).await?;

    Ok(Json(json!({
        "success": true,
        "prediction": {
            "result": scored.prediction,
            "confidence": (scored.confidence * 100.0).round(),
            "parameters": scored.reason,
        },
        "features": features,
    })))
}
