use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{required, required_email, EmailQuery};
use crate::error::{AppError, AppResult};
use crate::models::{Role, Scholar, User};
use crate::state::SharedState;

const CLEARED_TOKEN_COOKIE: &str =
    "token=; HttpOnly; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT";

async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")??;
    Ok(matches)
}

#[derive(Debug, Deserialize)]
pub struct Register {
    fullname: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(default)]
    role: Role,
}

pub async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<Register>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let fullname = required(body.fullname, "Full name is required")?;
    let email = required_email(body.email, "Email is required")?;
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("Password is required"))?;

    if state.store.find_user(&email).await?.is_some() {
        return Err(AppError::bad_request("User already exists"));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        fullname,
        email,
        password_hash: hash_password(password, state.config.bcrypt_cost).await?,
        role: body.role,
        created_at: now,
        updated_at: now,
    };

    if !state.store.insert_user(&user).await? {
        return Err(AppError::bad_request("User already exists"));
    }

    if user.role == Role::Scholar && state.store.scholar_by_email(&user.email).await?.is_none() {
        let scholar = Scholar::new(&user.fullname, &user.email);
        if state.store.insert_scholar(&scholar).await? {
            info!(email = %user.email, "created scholar profile for new user");
        } else {
            debug!(email = %user.email, "scholar profile already existed for new user");
        }
    }

    info!(email = %user.email, role = ?user.role, "user registered");
    Ok(Json(json!({
        "message": "User created successfully",
        "success": true,
        "savedUser": user.profile()
    })))
}

#[derive(Debug, Deserialize)]
pub struct Login {
    email: Option<String>,
    password: Option<String>,
}

pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<Login>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let invalid = || AppError::bad_request("Invalid credentials");
    let email = required_email(body.email, "Email is required")?;
    let password = body.password.ok_or_else(invalid)?;

    let Some(user) = state.store.find_user(&email).await? else {
        warn!(%email, "login for unknown user");
        return Err(invalid());
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        warn!(%email, "login with wrong password");
        return Err(invalid());
    }

    info!(%email, "user logged in");
    Ok(Json(json!({
        "message": "Login successful",
        "success": true,
        "user": user.profile()
    })))
}

pub async fn logout() -> Response {
    (
        [(SET_COOKIE, CLEARED_TOKEN_COOKIE)],
        Json(json!({ "message": "Logout successful", "success": true })),
    )
        .into_response()
}

pub async fn profile(
    State(state): State<SharedState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let email = required_email(query.email, "Email is required")?;

    let user = state
        .store
        .find_user(&email)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(Json(json!({
        "message": "Profile fetched successfully",
        "success": true,
        "user": user.profile()
    })))
}
