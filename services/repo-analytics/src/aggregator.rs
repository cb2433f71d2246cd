//! Commit aggregation
//!
//! Reduces a window of commit records into the dashboard payload: summary
//! totals, the most active contributors and a per-day commit timeline.

use crate::model::{AnalyticsResult, CommitRecord, ContributorStat, Summary, TimelinePoint};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

pub const TOP_CONTRIBUTORS: usize = 5;
pub const TIMELINE_DAYS: usize = 14;
pub const CONTRIBUTOR_NAME_LEN: usize = 15;
const MAX_ACTIVITY_SCORE: usize = 100;

#[derive(Debug, Default)]
struct AuthorTotals {
    commits: usize,
    additions: usize,
    deletions: usize,
}

/// Heuristic engagement proxy: two points per commit plus one per hundred
/// added lines, capped at 100. Not normalized against anything.
pub fn activity_score(commits: usize, additions: usize) -> u32 {
    let raw = commits.saturating_mul(2).saturating_add(additions / 100);
    raw.min(MAX_ACTIVITY_SCORE) as u32
}

pub fn aggregate(commits: &[CommitRecord]) -> AnalyticsResult {
    if commits.is_empty() {
        return AnalyticsResult::default();
    }

    // Authors in first-appearance order so the stable sort below breaks ties
    // the same way every time.
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, AuthorTotals> = HashMap::new();
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for commit in commits {
        let entry = totals.entry(commit.author.as_str()).or_insert_with(|| {
            order.push(commit.author.as_str());
            AuthorTotals::default()
        });
        entry.commits += 1;
        entry.additions += commit.additions;
        entry.deletions += commit.deletions;

        *days.entry(commit.timestamp.date_naive()).or_insert(0) += 1;
    }

    let mut contributors: Vec<ContributorStat> = order
        .iter()
        .map(|author| {
            let t = &totals[author];
            ContributorStat {
                name: author.chars().take(CONTRIBUTOR_NAME_LEN).collect(),
                commits: t.commits,
                additions: t.additions,
                deletions: t.deletions,
                activity_score: activity_score(t.commits, t.additions),
            }
        })
        .collect();
    contributors.sort_by(|a, b| b.commits.cmp(&a.commits));
    contributors.truncate(TOP_CONTRIBUTORS);

    let active_days = days.len();
    let timeline: Vec<TimelinePoint> = days
        .into_iter()
        .skip(active_days.saturating_sub(TIMELINE_DAYS))
        .map(|(date, commit_count)| TimelinePoint { date, commit_count })
        .collect();

    AnalyticsResult {
        summary: Summary {
            total_commits: commits.len(),
            total_contributors: order.len(),
            total_additions: commits.iter().map(|c| c.additions).sum(),
            total_deletions: commits.iter().map(|c| c.deletions).sum(),
            active_days,
        },
        contributors,
        timeline,
    }
}
