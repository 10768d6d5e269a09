use crate::aggregate::aggregate;
use crate::checkpoint::CheckpointStore;
use crate::error::{Result, StatsError};
use crate::gitlab::ProjectSource;
use crate::model::{Branch, CommitRecord, DateRange, ProcessedProjectSet, Project, RunSummary};
use crate::table::TableWriter;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub branch: String,
    pub window: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    Collected,
    /// The designated branch does not exist in this project.
    MissingBranch,
    /// Branch lookup or commit listing failed for another reason.
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReport {
    pub outcome: ProjectOutcome,
    pub records: Vec<CommitRecord>,
    pub dropped_commits: usize,
}

impl ProjectReport {
    fn empty(outcome: ProjectOutcome) -> Self {
        Self {
            outcome,
            records: Vec::new(),
            dropped_commits: 0,
        }
    }
}

/// Receives progress while the walker runs.
pub trait WalkObserver {
    /// `position` is 1-based among all owned projects, including skipped ones.
    fn project_started(&mut self, _position: usize, _total: usize, _project: &Project) {}

    fn project_finished(&mut self, _project: &Project, _report: &ProjectReport, _rows: usize) {}
}

pub struct NoProgress;

impl WalkObserver for NoProgress {}

pub struct ConsoleProgress {
    pb: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { pb }
    }

    /// Handle for the log writer, so log lines are printed above the bar.
    pub fn bar(&self) -> ProgressBar {
        self.pb.clone()
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkObserver for ConsoleProgress {
    fn project_started(&mut self, position: usize, total: usize, project: &Project) {
        self.pb.set_length(total as u64);
        self.pb.set_position(position as u64);
        self.pb.set_message(project.path_with_namespace.clone());
    }
}

/// Walks owned projects, skipping checkpointed ones, and appends their
/// aggregated commit stats to the table.
pub struct ProjectWalker<S: ProjectSource> {
    source: S,
    config: WalkerConfig,
    checkpoint: CheckpointStore,
    table: TableWriter,
}

impl<S: ProjectSource> ProjectWalker<S> {
    pub fn new(source: S, config: WalkerConfig, checkpoint: CheckpointStore, table: TableWriter) -> Self {
        Self {
            source,
            config,
            checkpoint,
            table,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Only listing the projects, saving the checkpoint, or writing the table
    /// can fail the run. Per-project and per-commit failures are logged and
    /// counted in the summary.
    pub fn run(&self, processed: &mut ProcessedProjectSet, observer: &mut dyn WalkObserver) -> Result<RunSummary> {
        let projects = self.source.owned_projects()?;
        let total = projects.len();
        info!(total, already_processed = processed.len(), "Listed owned projects");

        let mut summary = RunSummary {
            owned_projects: total,
            ..RunSummary::default()
        };

        for (position, project) in projects.iter().enumerate().map(|(i, p)| (i + 1, p)) {
            if processed.contains(&project.path_with_namespace) {
                debug!(project = %project.path_with_namespace, "Already processed, skipping");
                summary.already_processed += 1;
                continue;
            }

            observer.project_started(position, total, project);

            let report = self.collect(project);

            processed.insert(project.path_with_namespace.clone());
            self.checkpoint.save(processed)?;

            let rows = aggregate(&report.records);
            let written = self.table.write(&rows)?;

            info!(
                project = %project.path_with_namespace,
                commits = report.records.len(),
                dropped = report.dropped_commits,
                rows = written,
                "Processed project"
            );

            summary.processed += 1;
            summary.commits_recorded += report.records.len();
            summary.commits_dropped += report.dropped_commits;
            summary.rows_written += written;
            match report.outcome {
                ProjectOutcome::MissingBranch => summary.missing_branch += 1,
                ProjectOutcome::LookupFailed => summary.lookup_failed += 1,
                ProjectOutcome::Collected => {}
            }

            observer.project_finished(project, &report, written);
        }

        Ok(summary)
    }

    /// Commit records for one project. Never fails: a missing branch or a
    /// failed listing yields an empty report, a failed commit is dropped.
    pub fn collect(&self, project: &Project) -> ProjectReport {
        let branch = match self.source.branch(project, &self.config.branch) {
            Ok(branch) => branch,
            Err(StatsError::BranchNotFound { project: name, branch }) => {
                warn!(project = %name, %branch, "Project has no such branch, skipping");
                return ProjectReport::empty(ProjectOutcome::MissingBranch);
            }
            Err(err) => {
                warn!(
                    project = %project.path_with_namespace,
                    branch = %self.config.branch,
                    error = %err,
                    "Branch lookup failed, skipping"
                );
                return ProjectReport::empty(ProjectOutcome::LookupFailed);
            }
        };

        let commits = match self.source.commits(project, &branch, &self.config.window) {
            Ok(commits) => commits,
            Err(err) => {
                warn!(
                    project = %project.path_with_namespace,
                    branch = %branch.name,
                    error = %err,
                    "Listing commits failed, skipping"
                );
                return ProjectReport::empty(ProjectOutcome::LookupFailed);
            }
        };

        let mut report = ProjectReport::empty(ProjectOutcome::Collected);
        for commit in commits.iter().filter(|c| self.config.window.contains(&c.authored_date)) {
            match self.record(project, &branch, &commit.id) {
                Ok(record) => report.records.push(record),
                Err(err) => {
                    warn!(
                        project = %project.path_with_namespace,
                        commit = %commit.id,
                        error = %err,
                        "Fetching commit stats failed, dropping commit"
                    );
                    report.dropped_commits += 1;
                }
            }
        }
        report
    }

    fn record(&self, project: &Project, branch: &Branch, sha: &str) -> Result<CommitRecord> {
        let detail = self.source.commit_stats(project, sha)?;
        Ok(CommitRecord {
            project: project.path_with_namespace.clone(),
            author_name: detail.author_name,
            branch: branch.name.clone(),
            additions: detail.stats.additions,
            deletions: detail.stats.deletions,
            total: detail.stats.total,
        })
    }
}
