use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Attendance, AttendanceStatus, MilestoneStatus, Scholar, ScholarMetrics,
};

pub const DEFAULT_ATTENDANCE_RATIO: f64 = 0.85;
pub const DEFAULT_SCORE: f64 = 5.0;
pub const ON_TRACK_ATTENDANCE: f64 = 0.75;

/// Feature vector posted to the scoring service. Field names are the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFeatures {
    pub attendance: f64,
    pub progress: f64,
    pub published: u32,
    pub extensions: u32,
    pub delay: f64,
    pub score: f64,
}

impl PredictionFeatures {
    pub fn from_scholar(scholar: &Scholar, attendance: &[Attendance]) -> Self {
        let contributions = &scholar.academic_contributions;

        let published = contributions.iter().filter(|c| c.is_published).count() as u32;
        let extensions = contributions
            .iter()
            .map(|c| c.extensions.as_ref().map_or(0, |e| e.count))
            .sum();
        let delay = if contributions.is_empty() {
            0.0
        } else {
            contributions.iter().map(|c| c.delay.unwrap_or(0.0)).sum::<f64>()
                / contributions.len() as f64
        };

        Self {
            attendance: attendance_ratio(attendance).unwrap_or(DEFAULT_ATTENDANCE_RATIO),
            progress: progress_ratio(scholar),
            published,
            extensions,
            delay,
            score: scholar.rating.unwrap_or(DEFAULT_SCORE),
        }
    }

    pub fn to_metrics(&self, at: DateTime<Utc>) -> ScholarMetrics {
        ScholarMetrics {
            attendance_percentage: self.attendance * 100.0,
            progress_percentage: self.progress * 100.0,
            publications_count: self.published,
            total_extensions: self.extensions,
            average_delay: self.delay,
            last_updated: at,
        }
    }
}

/// Present share of the given records, `None` when there are none.
pub fn attendance_ratio(records: &[Attendance]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    Some(present as f64 / records.len() as f64)
}

pub fn progress_ratio(scholar: &Scholar) -> f64 {
    if scholar.milestones.is_empty() {
        return 0.0;
    }
    scholar.completed_milestones() as f64 / scholar.milestones.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStatus {
    Ahead,
    #[serde(rename = "On Track")]
    OnTrack,
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl ProgressStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProgressStatus::Ahead => "Ahead",
            ProgressStatus::OnTrack => "On Track",
            ProgressStatus::AtRisk => "At Risk",
        }
    }
}

pub fn progress_status(progress_percent: u32) -> ProgressStatus {
    if progress_percent >= 75 {
        ProgressStatus::Ahead
    } else if progress_percent >= 50 {
        ProgressStatus::OnTrack
    } else {
        ProgressStatus::AtRisk
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Urgent,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRisk {
    pub scholar_name: String,
    pub scholar_email: String,
    pub risk: RiskLevel,
    pub priority: Priority,
    pub reason: String,
    pub recommendation: String,
}

/// Flags the first missed or delayed milestone of a scholar.
pub fn milestone_risk(scholar: &Scholar) -> Option<MilestoneRisk> {
    let flagged = scholar
        .milestones
        .iter()
        .find(|m| matches!(m.status, MilestoneStatus::Missed | MilestoneStatus::Delayed))?;

    let (risk, priority) = if flagged.status == MilestoneStatus::Missed {
        (RiskLevel::High, Priority::Urgent)
    } else {
        (RiskLevel::Medium, Priority::Medium)
    };

    Some(MilestoneRisk {
        scholar_name: scholar.name.clone(),
        scholar_email: scholar.email.clone(),
        risk,
        priority,
        reason: format!("{} is {}", flagged.name, flagged.status.label()),
        recommendation: "Follow up required".to_string(),
    })
}

pub fn assess_risks(scholars: &[Scholar]) -> Vec<MilestoneRisk> {
    let mut risks: Vec<MilestoneRisk> = scholars.iter().filter_map(milestone_risk).collect();
    risks.sort_by_key(|r| match r.risk {
        RiskLevel::High => 0,
        RiskLevel::Medium => 1,
    });
    risks
}
