use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{
    load_scholar, present, required, required_email, save_scholar, CreatedByQuery, EmailQuery,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    flexible_date, normalize_email, AcademicContribution, Milestone, MilestonePatch, Scholar,
    ScholarProfileView,
};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddScholar {
    #[serde(default)]
    name: String,
    email: Option<String>,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    department: String,
    #[serde(default)]
    supervisor: String,
    #[serde(default)]
    research_area: String,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    expected_completion: Option<NaiveDate>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    milestones: Vec<Milestone>,
    created_by: Option<String>,
}

pub async fn add_scholar(
    State(state): State<SharedState>,
    payload: Result<Json<AddScholar>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let created_by = required_email(body.created_by, "Missing createdBy field")?;
    let email = required_email(body.email, "Scholar email is required")?;

    let mut scholar = Scholar::new(body.name.trim(), &email);
    scholar.phone = body.phone;
    scholar.department = body.department;
    scholar.supervisor = body.supervisor;
    scholar.research_area = body.research_area;
    scholar.start_date = body.start_date;
    scholar.expected_completion = body.expected_completion;
    scholar.description = body.description;
    scholar.milestones = body.milestones;
    scholar.created_by = Some(created_by);

    if !state.store.insert_scholar(&scholar).await? {
        return Err(AppError::Conflict("Scholar already exists"));
    }

    info!(email = %scholar.email, id = %scholar.id, "scholar created");
    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

pub async fn list_scholars(
    State(state): State<SharedState>,
    query: Result<Query<CreatedByQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let created_by = required_email(query.created_by, "Missing createdBy parameter")?;

    let scholars = state.store.scholars_created_by(&created_by).await?;
    Ok(Json(json!({ "success": true, "scholars": scholars })))
}

#[derive(Debug, Deserialize)]
pub struct ScholarLookup {
    email: Option<String>,
}

pub async fn get_scholar(
    State(state): State<SharedState>,
    payload: Result<Json<ScholarLookup>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let email = required_email(body.email, "Scholar email is required")?;

    let scholar = load_scholar(state.store.as_ref(), &email).await?;
    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

pub async fn get_scholar_by_id(
    State(state): State<SharedState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let raw = required(query.id, "Missing id parameter")?;
    let id = Uuid::parse_str(&raw).map_err(|_| AppError::bad_request("Invalid scholar id"))?;

    let scholar = state
        .store
        .scholar_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Scholar not found"))?;
    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneUpdate {
    email: Option<String>,
    milestone_index: Option<usize>,
    updated_milestone: Option<MilestonePatch>,
}

pub async fn update_milestone(
    State(state): State<SharedState>,
    payload: Result<Json<MilestoneUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let (Some(email), Some(index), Some(patch)) =
        (body.email, body.milestone_index, body.updated_milestone)
    else {
        return Err(AppError::bad_request("Missing fields"));
    };

    let mut scholar = load_scholar(state.store.as_ref(), &normalize_email(&email)).await?;
    let milestone = scholar
        .milestones
        .get_mut(index)
        .ok_or_else(|| AppError::bad_request("Invalid milestone index"))?;
    milestone.apply(patch);

    save_scholar(state.store.as_ref(), &mut scholar).await?;
    info!(email = %scholar.email, index, "milestone updated");
    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

/// Profile fields an admin may edit. The email is the key and cannot change here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    email: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    department: Option<String>,
    supervisor: Option<String>,
    research_area: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::patch")]
    start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "flexible_date::patch")]
    expected_completion: Option<Option<NaiveDate>>,
    description: Option<String>,
    milestones: Option<Vec<Milestone>>,
    supervisor_notes: Option<String>,
}

impl ProfileUpdate {
    fn apply(self, scholar: &mut Scholar) {
        if let Some(name) = self.name {
            scholar.name = name;
        }
        if let Some(phone) = self.phone {
            scholar.phone = phone;
        }
        if let Some(department) = self.department {
            scholar.department = department;
        }
        if let Some(supervisor) = self.supervisor {
            scholar.supervisor = supervisor;
        }
        if let Some(area) = self.research_area {
            scholar.research_area = area;
        }
        if let Some(start_date) = self.start_date {
            scholar.start_date = start_date;
        }
        if let Some(expected_completion) = self.expected_completion {
            scholar.expected_completion = expected_completion;
        }
        if let Some(description) = self.description {
            scholar.description = description;
        }
        if let Some(milestones) = self.milestones {
            scholar.milestones = milestones;
        }
        if let Some(notes) = self.supervisor_notes {
            scholar.supervisor_notes = Some(notes);
        }
    }
}

pub async fn update_profile(
    State(state): State<SharedState>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(mut body) = payload?;
    let email = required_email(body.email.take(), "Scholar email is required")?;

    let mut scholar = load_scholar(state.store.as_ref(), &email).await?;
    body.apply(&mut scholar);
    save_scholar(state.store.as_ref(), &mut scholar).await?;

    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

pub async fn scholar_profile(
    State(state): State<SharedState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let email = required_email(query.email, "Scholar email is required")?;

    let scholar = load_scholar(state.store.as_ref(), &email).await?;
    Ok(Json(json!({ "success": true, "profile": ScholarProfileView::from(&scholar) })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsUpdate {
    email: Option<String>,
    academic_contributions: Option<Vec<AcademicContribution>>,
}

pub async fn update_contributions(
    State(state): State<SharedState>,
    payload: Result<Json<ContributionsUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let email = required_email(body.email, "Scholar email is required")?;
    let contributions = body
        .academic_contributions
        .ok_or_else(|| AppError::bad_request("Missing academicContributions"))?;

    let mut scholar = load_scholar(state.store.as_ref(), &email).await?;
    scholar.academic_contributions = contributions;
    save_scholar(state.store.as_ref(), &mut scholar).await?;

    Ok(Json(json!({ "success": true, "scholar": scholar })))
}

#[derive(Debug, Deserialize)]
pub struct RatingUpdate {
    email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    rating: Option<Option<f64>>,
    #[serde(default)]
    feedback: Option<String>,
}

pub async fn update_rating(
    State(state): State<SharedState>,
    payload: Result<Json<RatingUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let email = required_email(body.email, "Scholar email is required")?;

    if let Some(Some(rating)) = body.rating {
        if !(1.0..=10.0).contains(&rating) {
            return Err(AppError::bad_request("Rating must be between 1 and 10"));
        }
    }

    let mut scholar = load_scholar(state.store.as_ref(), &email).await?;
    if let Some(rating) = body.rating {
        scholar.rating = rating;
    }
    if let Some(feedback) = body.feedback {
        scholar.feedback = Some(feedback);
    }
    save_scholar(state.store.as_ref(), &mut scholar).await?;

    info!(email = %scholar.email, rating = ?scholar.rating, "scholar rated");
    Ok(Json(json!({
        "success": true,
        "message": "Scholar updated successfully",
        "scholar": scholar
    })))
}
