pub mod client;

pub use client::GitLabClient;

use crate::error::Result;
use crate::model::{Branch, CommitDetail, CommitSummary, DateRange, Project};

/// What the walker needs from a hosting platform.
pub trait ProjectSource {
    /// Every project owned by the authenticated user.
    fn owned_projects(&self) -> Result<Vec<Project>>;

    /// Fails with `StatsError::BranchNotFound` when the project has no such branch.
    fn branch(&self, project: &Project, name: &str) -> Result<Branch>;

    /// Commits reachable from `branch` inside `window`.
    fn commits(&self, project: &Project, branch: &Branch, window: &DateRange) -> Result<Vec<CommitSummary>>;

    fn commit_stats(&self, project: &Project, sha: &str) -> Result<CommitDetail>;
}
