use std::time::Duration;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{attendance, prediction, reports, scholars, users};
use crate::state::SharedState;

async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.kind(),
    }))
}

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .route("/api/scholars", put(scholars::update_rating))
        .route("/api/scholars/add", post(scholars::add_scholar))
        .route(
            "/api/scholars/get",
            get(scholars::list_scholars).post(scholars::get_scholar),
        )
        .route("/api/scholars/get-by-id", get(scholars::get_scholar_by_id))
        .route("/api/scholars/update", put(scholars::update_milestone))
        .route("/api/scholars/update-profile", put(scholars::update_profile))
        .route(
            "/api/scholars/profile",
            get(scholars::scholar_profile).put(scholars::update_contributions),
        )
        .route("/api/attendance/save", post(attendance::save_attendance))
        .route(
            "/api/attendance/get",
            get(attendance::attendance_created_by).post(attendance::attendance_for_scholar),
        )
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/logout", post(users::logout))
        .route("/api/users/profile", get(users::profile))
        .route("/api/predict", post(prediction::request_prediction))
        .route("/api/reports", get(reports::program_report))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
