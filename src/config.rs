use crate::error::{Result, StatsError};
use crate::model::DateRange;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "gitlab-stats";
pub const ENV_PREFIX: &str = "GITLAB_STATS";

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";
pub const DEFAULT_SINCE: &str = "2024-01-01T00:00:00Z";
pub const DEFAULT_UNTIL: &str = "2024-12-31T23:59:59Z";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_CHECKPOINT_PATH: &str = "processed_projects.json";
pub const DEFAULT_OUTPUT_PATH: &str = "gitlab.csv";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    #[serde(default)]
    pub private_token: String,
    pub since: String,
    pub until: String,
    pub branch: String,
    pub checkpoint_path: PathBuf,
    pub output_path: PathBuf,
    pub request_timeout: String,
}

/// Values that take precedence over the config file and environment,
/// usually filled from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub private_token: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub branch: Option<String>,
    pub checkpoint_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

impl Settings {
    /// Defaults, then the config file, then `GITLAB_STATS_*` variables, then `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("since", DEFAULT_SINCE)?
            .set_default("until", DEFAULT_UNTIL)?
            .set_default("branch", DEFAULT_BRANCH)?
            .set_default("checkpoint_path", DEFAULT_CHECKPOINT_PATH)?
            .set_default("output_path", DEFAULT_OUTPUT_PATH)?
            .set_default("request_timeout", DEFAULT_REQUEST_TIMEOUT)?;

        builder = match &overrides.config_file {
            Some(path) => builder.add_source(ConfigFile::from(path.as_path()).required(true)),
            None => builder.add_source(ConfigFile::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .set_override_option("base_url", overrides.base_url.clone())?
            .set_override_option("private_token", overrides.private_token.clone())?
            .set_override_option("since", overrides.since.clone())?
            .set_override_option("until", overrides.until.clone())?
            .set_override_option("branch", overrides.branch.clone())?
            .set_override_option("checkpoint_path", path_value(&overrides.checkpoint_path))?
            .set_override_option("output_path", path_value(&overrides.output_path))?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.private_token.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "private_token is required (set {ENV_PREFIX}_PRIVATE_TOKEN or pass --token)"
            ))
            .into());
        }
        if self.branch.trim().is_empty() {
            return Err(ConfigError::Message("branch must not be empty".to_string()).into());
        }
        self.window()?;
        self.timeout()?;
        Ok(())
    }

    /// The commit time window, inclusive at both ends.
    pub fn window(&self) -> Result<DateRange> {
        let since = parse_instant(&self.since)?;
        let until = parse_instant(&self.until)?;
        if since > until {
            return Err(StatsError::InvalidDate(format!(
                "Invalid range: since ({}) is after until ({})",
                since, until
            )));
        }
        Ok(DateRange::new().with_since(since).with_until(until))
    }

    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout).map_err(|e| {
            StatsError::Config(ConfigError::Message(format!(
                "Invalid request_timeout '{}': {e}",
                self.request_timeout
            )))
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("private_token", &"<redacted>")
            .field("since", &self.since)
            .field("until", &self.until)
            .field("branch", &self.branch)
            .field("checkpoint_path", &self.checkpoint_path)
            .field("output_path", &self.output_path)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn path_value(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

/// RFC 3339, or `YYYY-MM-DD` as midnight UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    Err(StatsError::InvalidDate(format!(
        "'{input}' is neither RFC 3339 nor YYYY-MM-DD"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn with_token() -> Overrides {
        Overrides {
            private_token: Some("glpat-test".to_string()),
            ..Overrides::default()
        }
    }

    #[test]
    fn defaults_apply_when_only_token_given() {
        let settings = Settings::load(&with_token()).unwrap();

        assert_eq!(settings.branch, DEFAULT_BRANCH);
        assert_eq!(settings.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(settings.checkpoint_path, PathBuf::from(DEFAULT_CHECKPOINT_PATH));
        assert_eq!(settings.timeout().unwrap(), Duration::from_secs(30));

        let window = settings.window().unwrap();
        assert_eq!(window.since, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(window.until, Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn overrides_beat_config_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("stats.toml");
        fs::write(
            &file,
            "base_url = \"https://git.example.com\"\nbranch = \"main\"\nprivate_token = \"from-file\"\n",
        )
        .unwrap();

        let settings = Settings::load(&Overrides {
            config_file: Some(file),
            branch: Some("develop".to_string()),
            output_path: Some(dir.path().join("out.csv")),
            ..Overrides::default()
        })
        .unwrap();

        assert_eq!(settings.base_url, "https://git.example.com");
        assert_eq!(settings.private_token, "from-file");
        assert_eq!(settings.branch, "develop");
        assert_eq!(settings.output_path, dir.path().join("out.csv"));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempdir().unwrap();
        let result = Settings::load(&Overrides {
            config_file: Some(dir.path().join("missing.toml")),
            ..with_token()
        });
        assert!(matches!(result, Err(StatsError::Config(_))));
    }

    #[test]
    fn blank_token_is_rejected() {
        let result = Settings::load(&Overrides {
            private_token: Some("  ".to_string()),
            ..Overrides::default()
        });
        assert!(matches!(result, Err(StatsError::Config(_))));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let result = Settings::load(&Overrides {
            since: Some("2024-06-01".to_string()),
            until: Some("2024-01-01".to_string()),
            ..with_token()
        });
        assert!(matches!(result, Err(StatsError::InvalidDate(_))));
    }

    #[test]
    fn parses_dates_and_offsets() {
        assert_eq!(
            parse_instant("2024-02-03").unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2024-02-03T08:00:00+08:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap()
        );
        assert!(parse_instant("last week").is_err());
    }

    #[test]
    fn debug_output_hides_token() {
        let settings = Settings::load(&with_token()).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("glpat-test"));
        assert!(debug.contains("<redacted>"));
    }
}
