//! Analytics data model
//!
//! Records produced by the history walk and the aggregated dashboard payload.
//! Field names serialize in camelCase, which is what the dashboard consumes.

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

/// One commit read from the workspace history.
///
/// Only lives for the duration of a single analytics call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub short_hash: String,
    pub author: String,
    pub timestamp: DateTime<Local>,
    pub message_summary: String,
    pub files_changed: usize,
    pub additions: usize,
    pub deletions: usize,
}

/// Aggregate for one distinct author inside the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorStat {
    pub name: String,
    pub commits: usize,
    pub additions: usize,
    pub deletions: usize,
    pub activity_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub commit_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_commits: usize,
    pub total_contributors: usize,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub active_days: usize,
}

/// Top-level payload returned by `analyze`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsResult {
    pub summary: Summary,
    pub contributors: Vec<ContributorStat>,
    pub timeline: Vec<TimelinePoint>,
}
