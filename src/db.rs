use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::models::{
    normalize_email, Attendance, AttendanceStatus, Milestone, MilestoneStatus, Scholar, User,
};

/// Document persistence for users, scholars and attendance.
///
/// Inserts report `false` instead of failing when the unique email is already
/// taken, leaving the status code choice to the caller.
#[async_trait]
pub trait Store: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn insert_user(&self, user: &User) -> anyhow::Result<bool>;
    async fn find_user(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn insert_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool>;
    async fn scholar_by_email(&self, email: &str) -> anyhow::Result<Option<Scholar>>;
    async fn scholar_by_id(&self, id: Uuid) -> anyhow::Result<Option<Scholar>>;
    async fn scholars_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Scholar>>;
    /// Whole-document replace keyed by id. `false` when the scholar is gone.
    async fn replace_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool>;

    /// Upserts on (scholar email, date).
    async fn save_attendance(&self, record: &Attendance) -> anyhow::Result<Attendance>;
    async fn attendance_for_scholar(&self, email: &str) -> anyhow::Result<Vec<Attendance>>;
    async fn attendance_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Attendance>>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn scholar_from_row(row: PgRow) -> anyhow::Result<Scholar> {
    let Json(scholar): Json<Scholar> = row.try_get("document")?;
    Ok(scholar)
}

fn attendance_from_row(row: PgRow) -> anyhow::Result<Attendance> {
    let status: String = row.try_get("status")?;
    Ok(Attendance {
        scholar_email: row.try_get("scholar_email")?,
        date: row.try_get("date")?,
        status: status.parse().map_err(anyhow::Error::msg)?,
        created_by: row.try_get("created_by")?,
    })
}

#[async_trait]
impl Store for PgStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO scholar_progress.users (email, document, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&user.email)
        .bind(Json(user))
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_user(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT document FROM scholar_progress.users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(user): Json<User> = row.try_get("document")?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn insert_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO scholar_progress.scholars (id, email, created_by, document, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(scholar.id)
        .bind(&scholar.email)
        .bind(&scholar.created_by)
        .bind(Json(scholar))
        .bind(scholar.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scholar_by_email(&self, email: &str) -> anyhow::Result<Option<Scholar>> {
        sqlx::query("SELECT document FROM scholar_progress.scholars WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(scholar_from_row)
            .transpose()
    }

    async fn scholar_by_id(&self, id: Uuid) -> anyhow::Result<Option<Scholar>> {
        sqlx::query("SELECT document FROM scholar_progress.scholars WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(scholar_from_row)
            .transpose()
    }

    async fn scholars_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Scholar>> {
        let rows = sqlx::query(
            r#"
            SELECT document FROM scholar_progress.scholars
            WHERE created_by = $1
            ORDER BY document->>'name', email
            "#,
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(scholar_from_row).collect()
    }

    async fn replace_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scholar_progress.scholars
            SET document = $2, created_by = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(scholar.id)
        .bind(Json(scholar))
        .bind(&scholar.created_by)
        .bind(scholar.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_attendance(&self, record: &Attendance) -> anyhow::Result<Attendance> {
        let row = sqlx::query(
            r#"
            INSERT INTO scholar_progress.attendance (scholar_email, date, status, created_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scholar_email, date) DO UPDATE
            SET status = EXCLUDED.status, created_by = EXCLUDED.created_by
            RETURNING scholar_email, date, status, created_by
            "#,
        )
        .bind(&record.scholar_email)
        .bind(record.date)
        .bind(record.status.as_str())
        .bind(&record.created_by)
        .fetch_one(&self.pool)
        .await?;

        attendance_from_row(row)
    }

    async fn attendance_for_scholar(&self, email: &str) -> anyhow::Result<Vec<Attendance>> {
        let rows = sqlx::query(
            r#"
            SELECT scholar_email, date, status, created_by
            FROM scholar_progress.attendance
            WHERE scholar_email = $1
            ORDER BY date
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(attendance_from_row).collect()
    }

    async fn attendance_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Attendance>> {
        let rows = sqlx::query(
            r#"
            SELECT scholar_email, date, status, created_by
            FROM scholar_progress.attendance
            WHERE created_by = $1
            ORDER BY date, scholar_email
            "#,
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(attendance_from_row).collect()
    }
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

fn milestone(
    name: &str,
    status: MilestoneStatus,
    start: NaiveDate,
    end: NaiveDate,
) -> Milestone {
    Milestone {
        name: name.to_string(),
        status,
        notes: String::new(),
        start_date: Some(start),
        end_date: Some(end),
        completion_date: None,
    }
}

/// Loads a small cohort owned by `created_by`. Existing scholars are left alone.
pub async fn seed(store: &dyn Store, created_by: &str) -> anyhow::Result<usize> {
    let created_by = normalize_email(created_by);
    let scholars = vec![
        (
            "Avery Lee",
            "avery.lee@groupscholar.com",
            "Computer Science",
            "Dr. Ingrid Holm",
            "Distributed systems",
            vec![
                milestone(
                    "Coursework",
                    MilestoneStatus::Completed,
                    date(2024, 1, 8)?,
                    date(2024, 6, 30)?,
                ),
                milestone(
                    "Proposal defense",
                    MilestoneStatus::Completed,
                    date(2024, 7, 1)?,
                    date(2024, 12, 15)?,
                ),
                milestone(
                    "Data collection",
                    MilestoneStatus::InProgress,
                    date(2025, 1, 6)?,
                    date(2026, 3, 31)?,
                ),
            ],
            Some(8.0),
        ),
        (
            "Jules Moreno",
            "jules.moreno@groupscholar.com",
            "Biology",
            "Dr. Samir Haddad",
            "Marine ecology",
            vec![
                milestone(
                    "Coursework",
                    MilestoneStatus::Completed,
                    date(2023, 9, 1)?,
                    date(2024, 5, 31)?,
                ),
                milestone(
                    "Field study",
                    MilestoneStatus::Delayed,
                    date(2024, 6, 1)?,
                    date(2025, 2, 28)?,
                ),
            ],
            Some(6.0),
        ),
        (
            "Kiara Patel",
            "kiara.patel@groupscholar.com",
            "Economics",
            "Dr. Ingrid Holm",
            "Labour markets",
            vec![
                milestone(
                    "Coursework",
                    MilestoneStatus::InProgress,
                    date(2024, 9, 1)?,
                    date(2025, 5, 31)?,
                ),
                milestone(
                    "Ethics approval",
                    MilestoneStatus::Missed,
                    date(2024, 10, 1)?,
                    date(2024, 12, 1)?,
                ),
            ],
            None,
        ),
    ];

    let mut inserted = 0usize;
    for (name, email, department, supervisor, area, milestones, rating) in scholars {
        let mut scholar = Scholar::new(name, email);
        scholar.department = department.to_string();
        scholar.supervisor = supervisor.to_string();
        scholar.research_area = area.to_string();
        scholar.start_date = milestones.first().and_then(|m| m.start_date);
        scholar.expected_completion = milestones.last().and_then(|m| m.end_date);
        scholar.milestones = milestones;
        scholar.rating = rating;
        scholar.created_by = Some(created_by.clone());

        if store.insert_scholar(&scholar).await? {
            inserted += 1;
        }
    }

    let attendance = vec![
        ("avery.lee@groupscholar.com", date(2025, 2, 3)?, AttendanceStatus::Present),
        ("avery.lee@groupscholar.com", date(2025, 2, 4)?, AttendanceStatus::Present),
        ("jules.moreno@groupscholar.com", date(2025, 2, 3)?, AttendanceStatus::Absent),
        ("jules.moreno@groupscholar.com", date(2025, 2, 4)?, AttendanceStatus::Present),
        ("kiara.patel@groupscholar.com", date(2025, 2, 3)?, AttendanceStatus::Leave),
        ("kiara.patel@groupscholar.com", date(2025, 2, 4)?, AttendanceStatus::Absent),
    ];

    for (email, day, status) in attendance {
        store
            .save_attendance(&Attendance {
                scholar_email: email.to_string(),
                date: day,
                status,
                created_by: created_by.clone(),
            })
            .await?;
    }

    info!(inserted, store = store.kind(), "seeded scholars");
    Ok(inserted)
}

/// Imports attendance rows (`scholar_email,date,status,created_by`), upserting each.
pub async fn import_attendance_csv(
    store: &dyn Store,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        scholar_email: String,
        date: NaiveDate,
        status: String,
        created_by: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut saved = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed row {}", line + 1))?;
        let status: AttendanceStatus = row
            .status
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("row {}", line + 1))?;

        store
            .save_attendance(&Attendance {
                scholar_email: normalize_email(&row.scholar_email),
                date: row.date,
                status,
                created_by: normalize_email(&row.created_by),
            })
            .await?;
        saved += 1;
    }

    Ok(saved)
}
