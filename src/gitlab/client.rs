use super::ProjectSource;
use crate::config::Settings;
use crate::error::{Result, StatsError};
use crate::model::{Branch, CommitDetail, CommitSummary, DateRange, Project};
use chrono::SecondsFormat;
use reqwest::blocking::{Client as HttpClient, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const PER_PAGE: &str = "100";
const NEXT_PAGE_HEADER: &str = "x-next-page";
const TOKEN_HEADER: &str = "private-token";
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

/// Blocking client for the GitLab REST API (v4). One attempt per request.
pub struct GitLabClient {
    http: HttpClient,
    api: Url,
}

impl GitLabClient {
    pub fn new(base_url: &str, private_token: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_builder(private_token, timeout)?.build()?,
            api: api_root(base_url)?,
        })
    }

    /// Build a client from settings and verify the credential.
    pub fn connect(settings: &Settings) -> Result<Self> {
        let client = Self::new(&settings.base_url, &settings.private_token, settings.timeout()?)?;
        let user: CurrentUser = client.get_json(client.endpoint(&["user"])?)?;
        info!(user = %user.username, url = %settings.base_url, "Authenticated");
        Ok(client)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| StatsError::InvalidUrl(self.api.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> Result<Response> {
        debug!(%url, "GET");
        let response = self.http.get(url.clone()).send()?;
        check_status(url, response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        Ok(self.get(url)?.json()?)
    }

    /// Follows `X-Next-Page` until the server stops sending one.
    fn get_paginated<T: DeserializeOwned>(&self, base: Url, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut url = base.clone();
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in query {
                    pairs.append_pair(key, value);
                }
                pairs.append_pair("per_page", PER_PAGE).append_pair("page", &page.to_string());
            }

            let response = self.get(url)?;
            let next = next_page(response.headers());
            let batch: Vec<T> = response.json()?;
            items.extend(batch);

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }

        Ok(items)
    }

    fn project_endpoint(&self, project: &Project, rest: &[&str]) -> Result<Url> {
        let id = project.id.to_string();
        let mut segments = vec!["projects", id.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }
}

impl ProjectSource for GitLabClient {
    fn owned_projects(&self) -> Result<Vec<Project>> {
        let query = [
            ("owned", "true".to_string()),
            ("simple", "true".to_string()),
            ("order_by", "id".to_string()),
            ("sort", "asc".to_string()),
        ];
        self.get_paginated(self.endpoint(&["projects"])?, &query)
    }

    fn branch(&self, project: &Project, name: &str) -> Result<Branch> {
        let url = self.project_endpoint(project, &["repository", "branches", name])?;
        match self.get_json(url) {
            Err(StatsError::NotFound(_)) => Err(StatsError::BranchNotFound {
                project: project.path_with_namespace.clone(),
                branch: name.to_string(),
            }),
            other => other,
        }
    }

    /// Only the lower bound goes to the server: GitLab's `until` compares the commit date, which
    /// would hide commits authored in the window but committed after it. Callers filter on
    /// `authored_date`.
    fn commits(&self, project: &Project, branch: &Branch, window: &DateRange) -> Result<Vec<CommitSummary>> {
        let mut query = vec![("ref_name", branch.name.clone())];
        if let Some(since) = window.since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        self.get_paginated(self.project_endpoint(project, &["repository", "commits"])?, &query)
    }

    fn commit_stats(&self, project: &Project, sha: &str) -> Result<CommitDetail> {
        let mut url = self.project_endpoint(project, &["repository", "commits", sha])?;
        url.query_pairs_mut().append_pair("stats", "true");
        self.get_json(url)
    }
}

fn http_builder(private_token: &str, timeout: Duration) -> Result<ClientBuilder> {
    let mut token = HeaderValue::from_str(private_token)
        .map_err(|_| StatsError::Auth("private token contains invalid characters".to_string()))?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(TOKEN_HEADER, token);

    Ok(HttpClient::builder()
        .default_headers(headers)
        .timeout(timeout)
        .user_agent(concat!("gitlab-stats/", env!("CARGO_PKG_VERSION"))))
}

/// `{base_url}/api/v4/`, keeping any path prefix of a self-hosted instance.
fn api_root(base_url: &str) -> Result<Url> {
    let root = format!("{}/api/v4/", base_url.trim().trim_end_matches('/'));
    let url = Url::parse(&root).map_err(|e| StatsError::InvalidUrl(format!("{base_url}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StatsError::InvalidUrl(format!("{base_url}: unsupported scheme '{other}'"))),
    }
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers.get(NEXT_PAGE_HEADER)?.to_str().ok()?.trim().parse().ok()
}

fn check_status(url: Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(StatsError::Auth(format!("{status} for {}", redact(&url))))
        }
        StatusCode::NOT_FOUND => Err(StatsError::NotFound(redact(&url))),
        _ => {
            let mut message = response.text().unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|&i| message.is_char_boundary(i)).unwrap_or(0);
                message.truncate(cut);
            }
            Err(StatsError::Api {
                status: status.as_u16(),
                url: redact(&url),
                message,
            })
        }
    }
}

/// URL without its query string, for error messages.
fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
