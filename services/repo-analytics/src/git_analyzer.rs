//! Git History Extractor
//!
//! Walks a workspace's commit log newest-first and turns each commit inside
//! the time window into a [`CommitRecord`], stopping at the commit cap.

use crate::error::ExtractionError;
use crate::model::CommitRecord;
use chrono::{DateTime, Duration, Local};
use git2::{Commit, DiffStats, ErrorCode, Oid, Repository, Sort};
use std::path::Path;
use tracing::{debug, info};

const SHORT_HASH_LEN: usize = 7;
const MESSAGE_SUMMARY_LEN: usize = 50;

/// Consecutive out-of-window commits tolerated before the walk stops. Commit
/// dates are not strictly monotonic, so a single old commit does not end it.
const OUT_OF_WINDOW_SLOP: usize = 5;

pub struct HistoryExtractor {
    repo: Repository,
}

impl HistoryExtractor {
    pub fn open(repo_path: &Path) -> Result<Self, ExtractionError> {
        let repo = Repository::open(repo_path).map_err(|source| ExtractionError::Open {
            path: repo_path.to_path_buf(),
            source,
        })?;

        debug!("📂 Opened git repository at {:?}", repo_path);
        Ok(Self { repo })
    }

    /// Records for commits from the last `window_days` days, at most `max_commits`.
    ///
    /// The walk is newest-first by commit time and ends once more than
    /// `OUT_OF_WINDOW_SLOP` consecutive commits fall before the window, so an
    /// in-window commit hidden behind a longer run of back-dated commits is
    /// not reported.
    pub fn extract(&self, window_days: u32, max_commits: usize) -> Result<Vec<CommitRecord>, ExtractionError> {
        self.extract_since(window_start(Local::now(), window_days), max_commits)
    }

    /// Same as [`extract`](Self::extract) with an explicit lower bound; `None`
    /// reads the whole history up to the cap.
    pub fn extract_since(
        &self,
        since: Option<DateTime<Local>>,
        max_commits: usize,
    ) -> Result<Vec<CommitRecord>, ExtractionError> {
        match since {
            Some(since) => info!("🔍 Reading commits since {} (cap {})", since.format("%Y-%m-%d %H:%M"), max_commits),
            None => info!("🔍 Reading full history (cap {})", max_commits),
        }

        match self.repo.head() {
            Ok(_) => {}
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                info!("Repository has no commits");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ExtractionError::Walk(e)),
        }

        let mut revwalk = self.repo.revwalk().map_err(ExtractionError::Walk)?;
        revwalk.set_sorting(Sort::TIME).map_err(ExtractionError::Walk)?;
        revwalk.push_head().map_err(ExtractionError::Walk)?;

        let since_secs = since.map_or(i64::MIN, |since| since.timestamp());
        let mut commits = Vec::new();
        let mut out_of_window = 0;

        for oid in revwalk {
            if commits.len() >= max_commits {
                break;
            }
            let oid = oid.map_err(ExtractionError::Walk)?;
            let commit = self.repo.find_commit(oid).map_err(|source| ExtractionError::Commit {
                sha: oid.to_string(),
                source,
            })?;

            if commit.time().seconds() < since_secs {
                out_of_window += 1;
                if out_of_window > OUT_OF_WINDOW_SLOP {
                    break;
                }
                continue;
            }
            out_of_window = 0;

            commits.push(self.to_record(&commit)?);
        }

        info!("✅ Extracted {} commits", commits.len());
        Ok(commits)
    }

    fn to_record(&self, commit: &Commit) -> Result<CommitRecord, ExtractionError> {
        let oid = commit.id();
        let seconds = commit.time().seconds();
        let timestamp = DateTime::from_timestamp(seconds, 0)
            .map(|utc| utc.with_timezone(&Local))
            .ok_or_else(|| ExtractionError::Timestamp {
                sha: oid.to_string(),
                seconds,
            })?;

        let stats = self.diff_stats(commit).map_err(|source| ExtractionError::Commit {
            sha: oid.to_string(),
            source,
        })?;

        let author = commit.author();
        Ok(CommitRecord {
            short_hash: short_hash(oid),
            author: strip_domain(&String::from_utf8_lossy(author.name_bytes())),
            timestamp,
            message_summary: summarize_message(&String::from_utf8_lossy(commit.message_bytes())),
            files_changed: stats.files_changed(),
            additions: stats.insertions(),
            deletions: stats.deletions(),
        })
    }

    /// Diff against the first parent, or the empty tree for root commits and
    /// shallow-clone boundaries whose parent was never fetched.
    fn diff_stats(&self, commit: &Commit) -> Result<DiffStats, git2::Error> {
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            match commit.parent(0) {
                Ok(parent) => Some(parent.tree()?),
                Err(e) if e.code() == ErrorCode::NotFound => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let diff = self.repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        diff.stats()
    }
}

/// Start of a window of `window_days` days ending at `now`, or `None` when it
/// reaches back past the earliest representable date.
fn window_start(now: DateTime<Local>, window_days: u32) -> Option<DateTime<Local>> {
    now.checked_sub_signed(Duration::days(i64::from(window_days)))
}

fn short_hash(oid: Oid) -> String {
    oid.to_string().chars().take(SHORT_HASH_LEN).collect()
}

/// "alice@example.com" -> "alice"
fn strip_domain(author: &str) -> String {
    author.split('@').next().unwrap_or_default().to_string()
}

fn summarize_message(message: &str) -> String {
    message
        .split('\n')
        .next()
        .unwrap_or_default()
        .chars()
        .take(MESSAGE_SUMMARY_LEN)
        .collect()
}
