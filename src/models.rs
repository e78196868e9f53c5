use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emails are the join key between users, scholars and attendance.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.date_naive())
        .map_err(|_| format!("invalid date: {value}"))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; blank strings read as absent.
pub mod flexible_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => super::parse_date(value).map(Some).map_err(de::Error::custom),
        }
    }

    /// For patches: absent keeps, `null` or blank clears, anything else sets.
    pub fn patch<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize(deserializer).map(Some)
    }

    pub fn required<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Scholar,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What leaves the service for a user: everything but the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            fullname: self.fullname.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MilestoneStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Pending,
    Completed,
    Delayed,
    Missed,
}

impl MilestoneStatus {
    pub fn is_open(self) -> bool {
        matches!(self, MilestoneStatus::NotStarted | MilestoneStatus::InProgress)
    }

    pub fn label(self) -> &'static str {
        match self {
            MilestoneStatus::NotStarted => "Not Started",
            MilestoneStatus::InProgress => "In Progress",
            MilestoneStatus::Pending => "Pending",
            MilestoneStatus::Completed => "Completed",
            MilestoneStatus::Delayed => "Delayed",
            MilestoneStatus::Missed => "Missed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub completion_date: Option<NaiveDate>,
}

/// Partial milestone update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonePatch {
    pub name: Option<String>,
    pub status: Option<MilestoneStatus>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::patch")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "flexible_date::patch")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "flexible_date::patch")]
    pub completion_date: Option<Option<NaiveDate>>,
}

impl Milestone {
    pub fn apply(&mut self, patch: MilestonePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
        if let Some(completion_date) = patch.completion_date {
            self.completion_date = completion_date;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionType {
    Publication,
    Conference,
    Award,
    Collaboration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicContribution {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: Option<ContributionType>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub journal_or_event: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub extensions: Option<Extensions>,
    /// Days delayed.
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarMetrics {
    pub attendance_percentage: f64,
    pub progress_percentage: f64,
    pub publications_count: u32,
    pub total_extensions: u32,
    pub average_delay: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub date: DateTime<Utc>,
    pub result: String,
    pub confidence: f64,
    /// Per-feature weights exactly as the scoring service returned them.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scholar {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub supervisor: String,
    #[serde(default)]
    pub research_area: String,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub expected_completion: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub academic_contributions: Vec<AcademicContribution>,
    #[serde(default)]
    pub metrics: Option<ScholarMetrics>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub supervisor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scholar {
    pub fn new(name: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: normalize_email(email),
            phone: String::new(),
            department: String::new(),
            supervisor: String::new(),
            research_area: String::new(),
            start_date: None,
            expected_completion: None,
            description: String::new(),
            created_by: None,
            milestones: Vec::new(),
            academic_contributions: Vec::new(),
            metrics: None,
            predictions: Vec::new(),
            rating: None,
            feedback: None,
            supervisor_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn completed_milestones(&self) -> usize {
        self.milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Completed)
            .count()
    }
}

/// The subset of a scholar shown on the scholar-facing profile page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub research_area: String,
    pub rating: Option<f64>,
    pub feedback: Option<String>,
    pub academic_contributions: Vec<AcademicContribution>,
}

impl From<&Scholar> for ScholarProfileView {
    fn from(scholar: &Scholar) -> Self {
        Self {
            id: scholar.id,
            name: scholar.name.clone(),
            email: scholar.email.clone(),
            department: scholar.department.clone(),
            research_area: scholar.research_area.clone(),
            rating: scholar.rating,
            feedback: scholar.feedback.clone(),
            academic_contributions: scholar.academic_contributions.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
        }
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Leave" => Ok(AttendanceStatus::Leave),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub scholar_email: String,
    #[serde(deserialize_with = "flexible_date::required")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub created_by: String,
}
