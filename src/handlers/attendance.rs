use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{required, required_email, CreatedByQuery};
use crate::error::{AppError, AppResult};
use crate::models::{parse_date, Attendance, AttendanceStatus};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAttendance {
    scholar_email: Option<String>,
    status: Option<String>,
    date: Option<String>,
    created_by: Option<String>,
}

pub async fn save_attendance(
    State(state): State<SharedState>,
    payload: Result<Json<SaveAttendance>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let missing = "Missing required fields";
    let scholar_email = required_email(body.scholar_email, missing)?;
    let status = required(body.status, missing)?;
    let date = required(body.date, missing)?;
    let created_by = required_email(body.created_by, missing)?;

    let status: AttendanceStatus = status.parse().map_err(AppError::BadRequest)?;
    let date = parse_date(&date).map_err(AppError::BadRequest)?;

    let saved = state
        .store
        .save_attendance(&Attendance {
            scholar_email,
            date,
            status,
            created_by,
        })
        .await?;

    info!(email = %saved.scholar_email, %date, status = saved.status.as_str(), "attendance saved");
    Ok(Json(json!({ "success": true, "data": saved })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarAttendance {
    scholar_email: Option<String>,
}

pub async fn attendance_for_scholar(
    State(state): State<SharedState>,
    payload: Result<Json<ScholarAttendance>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let email = required_email(body.scholar_email, "Missing scholar email")?;

    let records = state.store.attendance_for_scholar(&email).await?;
    Ok(Json(json!({ "success": true, "attendance": records })))
}

pub async fn attendance_created_by(
    State(state): State<SharedState>,
    query: Result<Query<CreatedByQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let created_by = required_email(query.created_by, "Missing createdBy parameter")?;

    let records = state.store.attendance_created_by(&created_by).await?;
    Ok(Json(json!({ "success": true, "attendance": records })))
}
