use crate::checkpoint::CheckpointStore;
use crate::config::{Overrides, Settings};
use crate::gitlab::GitLabClient;
use crate::model::RunSummary;
use crate::table::TableWriter;
use crate::walker::{ConsoleProgress, NoProgress, ProjectWalker, WalkerConfig};
use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "gitlab-stats")]
#[command(about = "Per-author commit statistics for every GitLab project you own, appended to a CSV table")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "Config file (default: gitlab-stats.toml in the working directory, if present)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "GitLab base URL")]
    pub url: Option<String>,

    #[arg(long, help = "Personal access token (prefer GITLAB_STATS_PRIVATE_TOKEN)")]
    pub token: Option<String>,

    #[arg(long, help = "Window start, inclusive (RFC3339 or YYYY-MM-DD)")]
    pub since: Option<String>,

    #[arg(long, help = "Window end, inclusive (RFC3339 or YYYY-MM-DD)")]
    pub until: Option<String>,

    #[arg(long, help = "Branch to read commits from in every project")]
    pub branch: Option<String>,

    #[arg(long, help = "Path to the processed-projects checkpoint file")]
    pub checkpoint: Option<PathBuf>,

    #[arg(long, help = "Path to the output CSV table")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Hide the progress bar")]
    pub no_progress: bool,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            base_url: self.url.clone(),
            private_token: self.token.clone(),
            since: self.since.clone(),
            until: self.until.clone(),
            branch: self.branch.clone(),
            checkpoint_path: self.checkpoint.clone(),
            output_path: self.output.clone(),
        }
    }

    pub fn execute(self) -> Result<()> {
        let progress = (!self.no_progress).then(ConsoleProgress::new);
        crate::logging::init(self.verbose, progress.as_ref().map(ConsoleProgress::bar));

        let settings = Settings::load(&self.overrides()).context("Failed to load configuration")?;
        let window = settings.window().context("Failed to resolve time window")?;

        let checkpoint = CheckpointStore::new(&settings.checkpoint_path);
        let mut processed = checkpoint.load().context("Failed to load checkpoint")?;
        info!(
            path = %checkpoint.path().display(),
            processed = processed.len(),
            "Loaded checkpoint"
        );

        let client = GitLabClient::connect(&settings).map_err(|err| {
            let hint = if err.is_auth() { " (check the private token)" } else { "" };
            anyhow::Error::new(err).context(format!("Failed to connect to {}{hint}", settings.base_url))
        })?;

        let walker = ProjectWalker::new(
            client,
            WalkerConfig {
                branch: settings.branch.clone(),
                window,
            },
            checkpoint,
            TableWriter::new(&settings.output_path),
        );

        let result = match progress {
            Some(mut progress) => {
                let result = walker.run(&mut processed, &mut progress);
                progress.finish();
                result
            }
            None => walker.run(&mut processed, &mut NoProgress),
        };
        let summary = result.context("Run aborted")?;

        output_summary(&summary, &settings.branch, &settings.output_path);
        Ok(())
    }
}

fn output_summary(summary: &RunSummary, branch: &str, output: &Path) {
    println!("{}", style("Run Summary").bold());
    println!("{}", "─".repeat(50));
    println!("Owned projects: {}", style(summary.owned_projects).cyan());
    println!("Already processed: {}", style(summary.already_processed).dim());
    println!("Processed now: {}", style(summary.processed).cyan());
    if summary.missing_branch > 0 {
        println!("Without branch '{}': {}", branch, style(summary.missing_branch).yellow());
    }
    if summary.lookup_failed > 0 {
        println!("Failed lookups: {}", style(summary.lookup_failed).red());
    }
    println!("Commits recorded: {}", style(summary.commits_recorded).green());
    if summary.commits_dropped > 0 {
        println!("Commits dropped: {}", style(summary.commits_dropped).red());
    }
    println!("Rows appended: {} to {}", style(summary.rows_written).green(), output.display());
}
