use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State as AxumState, http::StatusCode, routing::post, Json, Router};
use scholar_progress::{build_router, config::Config, db::Store, memory::MemoryStore, State};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

type Received = Arc<Mutex<Vec<Value>>>;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{address}")
}

async fn scoring_stub(healthy: bool) -> (String, Received) {
    let received: Received = Arc::default();

    async fn score(
        AxumState((healthy, received)): AxumState<(bool, Received)>,
        Json(features): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        received.lock().await.push(features);
        if !healthy {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": "model warming up" })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "prediction": "Delayed",
                "confidence": 0.823,
                "reason": { "attendance": -0.12, "progress": 0.31, "score": 0.05 }
            })),
        )
    }

    let router = Router::new()
        .route("/predict", post(score))
        .with_state((healthy, received.clone()));
    (spawn(router).await, received)
}

struct TestApp {
    base: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestApp {
    async fn start(ml_model_url: &str) -> Self {
        let config = Config {
            port: 0,
            database_url: None,
            database_max_connections: 1,
            ml_model_url: ml_model_url.to_string(),
            ml_timeout: Duration::from_secs(5),
            bcrypt_cost: 4,
        };
        let store = Arc::new(MemoryStore::default());
        let state = State::new(config, store.clone()).expect("state");

        Self {
            base: spawn(build_router(state)).await,
            store,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut request = self.client.request(method, format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("request");
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.expect("json body");
        (status, body)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::PUT, path, Some(body)).await
    }

    async fn add_scholar(&self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/scholars/add",
                json!({
                    "name": "Avery Lee",
                    "email": email,
                    "department": "Computer Science",
                    "supervisor": "Dr. Ingrid Holm",
                    "startDate": "2024-09-01",
                    "expectedCompletion": "2027-08-31T00:00:00.000Z",
                    "milestones": [
                        { "name": "Proposal", "status": "Completed", "startDate": "2024-09-01", "endDate": "2024-12-20" },
                        { "name": "Fieldwork", "status": "In Progress", "startDate": "2025-01-06", "endDate": "" }
                    ],
                    "createdBy": "admin@example.edu"
                }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        body["scholar"].clone()
    }
}

const UNUSED_SCORING_URL: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn duplicate_scholar_email_conflicts() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    app.add_scholar("avery@example.edu").await;

    let (status, body) = app
        .post(
            "/api/scholars/add",
            json!({ "name": "Avery L.", "email": "AVERY@example.edu", "createdBy": "admin@example.edu" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body, json!({ "success": false, "error": "Scholar already exists" }));

    let (status, body) = app
        .post("/api/scholars/add", json!({ "name": "Kiara", "email": "kiara@example.edu" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Missing createdBy field");
}

#[tokio::test]
async fn scholars_are_fetched_by_creator_email_and_id() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let scholar = app.add_scholar("avery@example.edu").await;
    let id = scholar["id"].as_str().expect("id");

    assert_eq!(scholar["milestones"][1]["endDate"], Value::Null);
    assert_eq!(scholar["expectedCompletion"], "2027-08-31");

    let (status, body) = app.get("/api/scholars/get?createdBy=admin@example.edu").await;
    assert_eq!(status, 200);
    assert_eq!(body["scholars"].as_array().map(Vec::len), Some(1));

    let (status, body) = app.post("/api/scholars/get", json!({ "email": "avery@example.edu" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["id"], id);

    let (status, body) = app.get(&format!("/api/scholars/get-by-id?id={id}")).await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["email"], "avery@example.edu");

    let (status, _) = app.get("/api/scholars/get-by-id?id=not-a-uuid").await;
    assert_eq!(status, 400);

    let (status, body) = app.post("/api/scholars/get", json!({ "email": "nobody@example.edu" })).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Scholar not found");

    let (status, _) = app.get("/api/scholars/get").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn attendance_save_is_idempotent_per_day() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let entry = |status: &str| {
        json!({
            "scholarEmail": "avery@example.edu",
            "status": status,
            "date": "2025-03-10",
            "createdBy": "admin@example.edu"
        })
    };

    let (status, _) = app.post("/api/attendance/save", entry("Present")).await;
    assert_eq!(status, 200);
    let (status, body) = app.post("/api/attendance/save", entry("Leave")).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "Leave");

    let (_, body) = app.get("/api/attendance/get?createdBy=admin@example.edu").await;
    let records = body["attendance"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "Leave");
    assert_eq!(records[0]["date"], "2025-03-10");

    let (_, body) = app
        .post("/api/attendance/get", json!({ "scholarEmail": "Avery@Example.edu" }))
        .await;
    assert_eq!(body["attendance"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.post("/api/attendance/save", entry("Sick")).await;
    assert_eq!(status, 400);

    let (status, body) = app
        .post("/api/attendance/save", json!({ "scholarEmail": "avery@example.edu" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
async fn rating_must_stay_within_bounds() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    app.add_scholar("avery@example.edu").await;

    for rating in [0.0, 10.5, -3.0] {
        let (status, body) = app
            .put("/api/scholars", json!({ "email": "avery@example.edu", "rating": rating }))
            .await;
        assert_eq!(status, 400, "rating {rating}");
        assert_eq!(body["error"], "Rating must be between 1 and 10");
    }

    let (status, body) = app
        .put(
            "/api/scholars",
            json!({ "email": "avery@example.edu", "rating": 7, "feedback": "Solid progress" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["rating"], 7.0);
    assert_eq!(body["scholar"]["feedback"], "Solid progress");

    let (_, body) = app
        .put("/api/scholars", json!({ "email": "avery@example.edu", "rating": null }))
        .await;
    assert_eq!(body["scholar"]["rating"], Value::Null);
    assert_eq!(body["scholar"]["feedback"], "Solid progress");

    let (status, _) = app
        .put("/api/scholars", json!({ "email": "ghost@example.edu", "rating": 5 }))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn milestones_profile_and_contributions_update() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    app.add_scholar("avery@example.edu").await;

    let (status, body) = app
        .put(
            "/api/scholars/update",
            json!({
                "email": "avery@example.edu",
                "milestoneIndex": 1,
                "updatedMilestone": { "status": "Completed", "notes": "wrapped up early" }
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["milestones"][1]["status"], "Completed");
    assert_eq!(body["scholar"]["milestones"][1]["name"], "Fieldwork");

    let (status, body) = app
        .put(
            "/api/scholars/update",
            json!({ "email": "avery@example.edu", "milestoneIndex": 5, "updatedMilestone": {} }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid milestone index");

    let (status, body) = app
        .put(
            "/api/scholars/update-profile",
            json!({ "email": "avery@example.edu", "researchArea": "Consensus protocols", "phone": "555-0101" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["researchArea"], "Consensus protocols");
    assert_eq!(body["scholar"]["department"], "Computer Science");

    let (status, _) = app
        .put(
            "/api/scholars/profile",
            json!({
                "email": "avery@example.edu",
                "academicContributions": [
                    { "title": "Raft under partitions", "type": "Publication", "isPublished": true, "delay": 10 }
                ]
            }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/api/scholars/profile?email=avery@example.edu").await;
    assert_eq!(status, 200);
    let profile = &body["profile"];
    assert_eq!(profile["researchArea"], "Consensus protocols");
    assert_eq!(profile["academicContributions"][0]["type"], "Publication");
    assert!(profile.get("milestones").is_none());
}

#[tokio::test]
async fn patched_dates_can_be_cleared() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    app.add_scholar("avery@example.edu").await;

    let (status, body) = app
        .put(
            "/api/scholars/update",
            json!({
                "email": "avery@example.edu",
                "milestoneIndex": 0,
                "updatedMilestone": { "endDate": null }
            }),
        )
        .await;
    assert_eq!(status, 200);
    let proposal = &body["scholar"]["milestones"][0];
    assert_eq!(proposal["endDate"], Value::Null);
    assert_eq!(proposal["startDate"], "2024-09-01");

    let (status, body) = app
        .put(
            "/api/scholars/update-profile",
            json!({ "email": "avery@example.edu", "expectedCompletion": "" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["scholar"]["expectedCompletion"], Value::Null);
    assert_eq!(body["scholar"]["startDate"], "2024-09-01");
}

#[tokio::test]
async fn register_login_and_profile() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let registration = json!({
        "fullname": "Kiara Patel",
        "email": " Kiara@Example.edu ",
        "password": "correct horse",
        "role": "scholar"
    });

    let (status, body) = app.post("/api/users/register", registration.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(body["savedUser"]["email"], "kiara@example.edu");
    assert!(body["savedUser"].get("passwordHash").is_none());

    let scholar = app
        .store
        .scholar_by_email("kiara@example.edu")
        .await
        .expect("lookup")
        .expect("scholar profile created on registration");
    assert_eq!(scholar.name, "Kiara Patel");

    let (status, body) = app.post("/api/users/register", registration).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "User already exists");

    let (status, body) = app
        .post("/api/users/login", json!({ "email": "kiara@example.edu", "password": "wrong" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = app
        .post("/api/users/login", json!({ "email": "kiara@example.edu", "password": "correct horse" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["role"], "scholar");

    let (status, body) = app.get("/api/users/profile?email=kiara@example.edu").await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["fullname"], "Kiara Patel");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = app.get("/api/users/profile?email=ghost@example.edu").await;
    assert_eq!(status, 404);

    let response = app
        .client
        .post(format!("{}/api/users/logout", app.base))
        .send()
        .await
        .expect("logout");
    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("cookie cleared");
    assert!(cookie.starts_with("token=;"));
}

#[tokio::test]
async fn registration_keeps_existing_scholar_profile() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let scholar = app.add_scholar("avery@example.edu").await;

    let (status, _) = app
        .post(
            "/api/users/register",
            json!({ "fullname": "A. Lee", "email": "Avery@example.edu", "password": "pw" }),
        )
        .await;
    assert_eq!(status, 200);

    let stored = app
        .store
        .scholar_by_email("avery@example.edu")
        .await
        .expect("lookup")
        .expect("scholar");
    assert_eq!(stored.id.to_string(), scholar["id"].as_str().expect("id"));
    assert_eq!(stored.name, "Avery Lee");
}

#[tokio::test]
async fn admin_registration_creates_no_scholar() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let (status, _) = app
        .post(
            "/api/users/register",
            json!({ "fullname": "Dr. Holm", "email": "holm@example.edu", "password": "pw", "role": "admin" }),
        )
        .await;
    assert_eq!(status, 200);
    assert!(app
        .store
        .scholar_by_email("holm@example.edu")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn prediction_is_scored_and_recorded() {
    let (scoring_url, received) = scoring_stub(true).await;
    let app = TestApp::start(&scoring_url).await;
    app.add_scholar("avery@example.edu").await;

    let (status, body) = app.post("/api/predict", json!({ "email": "Avery@Example.edu" })).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["prediction"]["result"], "Delayed");
    assert_eq!(body["prediction"]["confidence"], 82.0);
    assert_eq!(body["prediction"]["parameters"]["progress"], 0.31);

    let sent = received.lock().await.clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        json!({
            "attendance": 0.85,
            "progress": 0.5,
            "published": 0,
            "extensions": 0,
            "delay": 0.0,
            "score": 5.0
        })
    );

    let scholar = app
        .store
        .scholar_by_email("avery@example.edu")
        .await
        .expect("lookup")
        .expect("scholar");
    assert_eq!(scholar.predictions.len(), 1);
    assert_eq!(scholar.predictions[0].result, "Delayed");
    assert!((scholar.predictions[0].confidence - 0.823).abs() < 1e-9);
    let metrics = scholar.metrics.expect("metrics refreshed");
    assert!((metrics.progress_percentage - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn prediction_failure_leaves_scholar_untouched() {
    let (scoring_url, received) = scoring_stub(false).await;
    let app = TestApp::start(&scoring_url).await;
    app.add_scholar("avery@example.edu").await;

    let (status, body) = app.post("/api/predict", json!({ "email": "avery@example.edu" })).await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "success": false, "error": "Failed to generate prediction" }));
    assert_eq!(received.lock().await.len(), 1);

    let scholar = app
        .store
        .scholar_by_email("avery@example.edu")
        .await
        .expect("lookup")
        .expect("scholar");
    assert!(scholar.predictions.is_empty());
    assert!(scholar.metrics.is_none());

    let (status, _) = app.post("/api/predict", json!({ "email": "ghost@example.edu" })).await;
    assert_eq!(status, 404);
    let (status, _) = app.post("/api/predict", json!({})).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn report_aggregates_admin_cohort() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    app.add_scholar("avery@example.edu").await;
    for (date, status) in [("2025-03-10", "Present"), ("2025-03-11", "Absent")] {
        app.post(
            "/api/attendance/save",
            json!({
                "scholarEmail": "avery@example.edu",
                "status": status,
                "date": date,
                "createdBy": "admin@example.edu"
            }),
        )
        .await;
    }

    let (status, body) = app.get("/api/reports?createdBy=admin@example.edu").await;
    assert_eq!(status, 200);
    let report = &body["report"];
    assert_eq!(report["overview"]["scholarsWithAttendance"], 1);
    assert_eq!(report["overview"]["atRisk"], 1);
    assert_eq!(report["progress"][0]["progress"], 50);
    assert_eq!(report["progress"][0]["status"], "On Track");
    assert_eq!(report["attendance"][0]["percent"], 50);
    assert_eq!(report["performance"]["totalScholars"], 1);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let response = app
        .client
        .post(format!("{}/api/scholars/add", app.base))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_reports_store_kind() {
    let app = TestApp::start(UNUSED_SCORING_URL).await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["store"], "memory");
}
