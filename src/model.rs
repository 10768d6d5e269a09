use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifiers (`namespace/name`) of projects already written to the table.
pub type ProcessedProjectSet = BTreeSet<String>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// One entry of a commit listing, before its stats are fetched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub authored_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LineStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitDetail {
    pub id: String,
    pub author_name: String,
    pub stats: LineStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub project: String,
    pub author_name: String,
    pub branch: String,
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub project: String,
    pub author_name: String,
    pub branch: String,
}

impl From<&CommitRecord> for AggregateKey {
    fn from(record: &CommitRecord) -> Self {
        Self {
            project: record.project.clone(),
            author_name: record.author_name.clone(),
            branch: record.branch.clone(),
        }
    }
}

/// Field order is the column order of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedRow {
    pub project: String,
    pub author_name: String,
    pub branch: String,
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
    pub commit_count: u32,
}

impl AggregatedRow {
    pub fn new(key: AggregateKey) -> Self {
        Self {
            project: key.project,
            author_name: key.author_name,
            branch: key.branch,
            additions: 0,
            deletions: 0,
            total: 0,
            commit_count: 0,
        }
    }

    pub fn add_record(&mut self, record: &CommitRecord) {
        self.additions += record.additions;
        self.deletions += record.deletions;
        self.total += record.total;
        self.commit_count += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub owned_projects: usize,
    pub already_processed: usize,
    pub processed: usize,
    pub missing_branch: usize,
    pub lookup_failed: usize,
    pub commits_recorded: usize,
    pub commits_dropped: usize,
    pub rows_written: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_range_bounds_are_inclusive() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let range = DateRange::new().with_since(since).with_until(until);

        assert!(range.contains(&since));
        assert!(range.contains(&until));
        assert!(!range.contains(&(since - chrono::Duration::seconds(1))));
        assert!(!range.contains(&(until + chrono::Duration::seconds(1))));
    }

    #[test]
    fn commit_summary_accepts_offset_timestamps() {
        let summary: CommitSummary = serde_json::from_str(
            r#"{"id":"abc","authored_date":"2024-03-01T10:00:00.000+02:00","title":"x"}"#,
        )
        .unwrap();
        assert_eq!(summary.authored_date, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn commit_detail_requires_stats() {
        let missing = serde_json::from_str::<CommitDetail>(r#"{"id":"a","author_name":"x"}"#);
        assert!(missing.is_err());

        let detail: CommitDetail = serde_json::from_str(
            r#"{"id":"a","author_name":"x","stats":{"additions":3,"deletions":1,"total":4}}"#,
        )
        .unwrap();
        assert_eq!(detail.stats, LineStats { additions: 3, deletions: 1, total: 4 });
    }
}
