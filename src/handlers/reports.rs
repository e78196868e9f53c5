use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::{required_email, CreatedByQuery};
use crate::error::AppResult;
use crate::report;
use crate::state::SharedState;

pub async fn program_report(
    State(state): State<SharedState>,
    query: Result<Query<CreatedByQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let created_by = required_email(query.created_by, "Missing createdBy parameter")?;

    let scholars = state.store.scholars_created_by(&created_by).await?;
    let attendance = state.store.attendance_created_by(&created_by).await?;
    let report = report::build_report(
        Some(&created_by),
        Utc::now().date_naive(),
        &scholars,
        &attendance,
    );

    Ok(Json(json!({ "success": true, "report": report })))
}
