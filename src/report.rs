use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{Attendance, AttendanceStatus, MilestoneStatus, Scholar};
use crate::risk::{self, MilestoneRisk, ProgressStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub scholars_with_attendance: usize,
    pub on_track: usize,
    pub at_risk: usize,
    pub on_track_percent: u32,
    pub completed_milestones: usize,
    pub upcoming_deadlines: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRow {
    pub name: String,
    pub email: String,
    pub department: String,
    pub progress: u32,
    pub status: ProgressStatus,
    pub next_milestone: Option<String>,
    pub days_to_deadline: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub name: String,
    pub email: String,
    pub present: usize,
    pub absent: usize,
    pub leave: usize,
    pub total: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub average_completion_months: f64,
    pub success_rate: u32,
    pub on_time_rate: u32,
    pub total_scholars: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramReport {
    pub generated_for: Option<String>,
    pub generated_on: NaiveDate,
    pub overview: Overview,
    pub progress: Vec<ProgressRow>,
    pub attendance: Vec<AttendanceRow>,
    pub performance: Performance,
    pub risks: Vec<MilestoneRisk>,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        (part as f64 / whole as f64 * 100.0).round() as u32
    }
}

fn group_by_scholar(attendance: &[Attendance]) -> BTreeMap<&str, Vec<&Attendance>> {
    let mut grouped: BTreeMap<&str, Vec<&Attendance>> = BTreeMap::new();
    for record in attendance {
        grouped
            .entry(record.scholar_email.as_str())
            .or_default()
            .push(record);
    }
    grouped
}

pub fn overview(scholars: &[Scholar], attendance: &[Attendance], today: NaiveDate) -> Overview {
    let grouped = group_by_scholar(attendance);
    let total = grouped.len();
    let on_track = grouped
        .values()
        .filter(|records| {
            let present = records
                .iter()
                .filter(|r| r.status == AttendanceStatus::Present)
                .count();
            present as f64 / records.len() as f64 >= risk::ON_TRACK_ATTENDANCE
        })
        .count();

    let completed_milestones = scholars.iter().map(Scholar::completed_milestones).sum();
    let upcoming_deadlines = scholars
        .iter()
        .flat_map(|s| s.milestones.iter())
        .filter(|m| {
            m.status != MilestoneStatus::Completed && m.end_date.is_some_and(|end| end > today)
        })
        .count();

    Overview {
        scholars_with_attendance: total,
        on_track,
        at_risk: total - on_track,
        on_track_percent: percent(on_track, total),
        completed_milestones,
        upcoming_deadlines,
    }
}

pub fn progress_rows(scholars: &[Scholar], today: NaiveDate) -> Vec<ProgressRow> {
    scholars
        .iter()
        .map(|scholar| {
            let progress = percent(scholar.completed_milestones(), scholar.milestones.len());
            let next = scholar.milestones.iter().find(|m| m.status.is_open());

            ProgressRow {
                name: scholar.name.clone(),
                email: scholar.email.clone(),
                department: scholar.department.clone(),
                progress,
                status: risk::progress_status(progress),
                next_milestone: next.map(|m| m.name.clone()),
                days_to_deadline: next
                    .and_then(|m| m.end_date)
                    .map(|end| (end - today).num_days()),
            }
        })
        .collect()
}

pub fn attendance_rows(scholars: &[Scholar], attendance: &[Attendance]) -> Vec<AttendanceRow> {
    let grouped = group_by_scholar(attendance);
    scholars
        .iter()
        .map(|scholar| {
            let records = grouped.get(scholar.email.as_str()).map_or(&[][..], Vec::as_slice);
            let count =
                |status: AttendanceStatus| records.iter().filter(|r| r.status == status).count();
            let present = count(AttendanceStatus::Present);

            AttendanceRow {
                name: scholar.name.clone(),
                email: scholar.email.clone(),
                present,
                absent: count(AttendanceStatus::Absent),
                leave: count(AttendanceStatus::Leave),
                total: records.len(),
                percent: percent(present, records.len()),
            }
        })
        .collect()
}

fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end.year() - start.year()) as i64 * 12 + end.month() as i64 - start.month() as i64
}

pub fn performance(scholars: &[Scholar], today: NaiveDate) -> Performance {
    let durations: Vec<i64> = scholars
        .iter()
        .filter_map(|s| {
            let start = s.start_date?;
            Some(months_between(start, s.expected_completion.unwrap_or(today)))
        })
        .collect();
    let average_completion_months = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    let succeeded = scholars
        .iter()
        .filter(|s| !s.milestones.is_empty() && s.completed_milestones() == s.milestones.len())
        .count();

    // A completed milestone is late only when its recorded completion passed the end date.
    let on_time = scholars
        .iter()
        .filter(|s| {
            s.milestones.iter().all(|m| {
                m.status != MilestoneStatus::Completed
                    || match (m.completion_date, m.end_date) {
                        (Some(done), Some(due)) => done <= due,
                        _ => true,
                    }
            })
        })
        .count();

    Performance {
        average_completion_months,
        success_rate: percent(succeeded, scholars.len()),
        on_time_rate: percent(on_time, scholars.len()),
        total_scholars: scholars.len(),
    }
}

pub fn build_report(
    created_by: Option<&str>,
    today: NaiveDate,
    scholars: &[Scholar],
    attendance: &[Attendance],
) -> ProgramReport {
    ProgramReport {
        generated_for: created_by.map(str::to_string),
        generated_on: today,
        overview: overview(scholars, attendance, today),
        progress: progress_rows(scholars, today),
        attendance: attendance_rows(scholars, attendance),
        performance: performance(scholars, today),
        risks: risk::assess_risks(scholars),
    }
}

pub fn render_markdown(report: &ProgramReport) -> String {
    let mut output = String::new();
    let label = report.generated_for.as_deref().unwrap_or("all scholars");

    let _ = writeln!(output, "# Scholar Progress Report");
    let _ = writeln!(output, "Generated for {} on {}", label, report.generated_on);
    let _ = writeln!(output);

    let overview = &report.overview;
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- {} of {} scholars on track by attendance ({}%), {} at risk",
        overview.on_track,
        overview.scholars_with_attendance,
        overview.on_track_percent,
        overview.at_risk
    );
    let _ = writeln!(output, "- {} milestones completed", overview.completed_milestones);
    let _ = writeln!(output, "- {} upcoming deadlines", overview.upcoming_deadlines);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Progress");
    if report.progress.is_empty() {
        let _ = writeln!(output, "No scholars recorded.");
    } else {
        for row in report.progress.iter() {
            let next = match (&row.next_milestone, row.days_to_deadline) {
                (Some(name), Some(days)) => format!("next: {name} in {days} days"),
                (Some(name), None) => format!("next: {name}"),
                _ => "no open milestones".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} ({}) {}% {}, {}",
                row.name,
                row.department,
                row.progress,
                row.status.label(),
                next
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");
    if report.attendance.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        for row in report.attendance.iter() {
            let _ = writeln!(
                output,
                "- {}: {}% present ({} present, {} absent, {} leave)",
                row.name, row.percent, row.present, row.absent, row.leave
            );
        }
    }

    let performance = &report.performance;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance");
    let _ = writeln!(
        output,
        "- Average completion time: {:.1} months",
        performance.average_completion_months
    );
    let _ = writeln!(output, "- Success rate: {}%", performance.success_rate);
    let _ = writeln!(output, "- On-time completion: {}%", performance.on_time_rate);
    let _ = writeln!(output, "- Total scholars: {}", performance.total_scholars);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Assessment");
    if report.risks.is_empty() {
        let _ = writeln!(output, "No missed or delayed milestones.");
    } else {
        for risk in report.risks.iter() {
            let _ = writeln!(
                output,
                "- {} ({:?} risk, {:?}): {}. {}",
                risk.scholar_name, risk.risk, risk.priority, risk.reason, risk.recommendation
            );
        }
    }

    output
}
