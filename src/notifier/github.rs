//! GitHub REST client implementing [`Notifier`] and [`IssueTracker`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::{info, warn};

use super::{IssueTracker, Notifier};
use crate::config::GithubConfig;
use crate::gateway::BoxFuture;
use crate::models::issue::Issue;
use crate::models::session::IssueRef;
use crate::{AppError, Result};

/// GitHub issues client.
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
}

impl GithubClient {
    /// Build a client; requests are unauthenticated when no token is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the token is not a valid header value
    /// and `AppError::Notifier` if the HTTP client cannot be constructed.
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("issue-agent-bridge"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = config.token.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("token {token}"))
                    .map_err(|err| AppError::Config(format!("invalid github token: {err}")))?,
            );
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|err| AppError::Notifier(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        })
    }

    fn issue_url(&self, issue: &IssueRef) -> String {
        format!(
            "{}/repos/{}/issues/{}",
            self.api_base, issue.repo, issue.issue_number
        )
    }
}

impl Notifier for GithubClient {
    fn post_comment(&self, issue: &IssueRef, body: &str) -> BoxFuture<'_, Result<()>> {
        let url = format!("{}/comments", self.issue_url(issue));
        let payload = json!({ "body": body });
        let target = issue.to_string();
        Box::pin(async move {
            let response = self
                .http
                .post(url)
                .json(&payload)
                .send()
                .await
                .map_err(|err| AppError::Notifier(format!("post comment on {target}: {err}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Notifier(format!(
                    "post comment on {target}: HTTP {status}"
                )));
            }

            info!(issue = %target, "posted issue comment");
            Ok(())
        })
    }
}

impl IssueTracker for GithubClient {
    fn get_issue(&self, issue: &IssueRef) -> BoxFuture<'_, Result<Issue>> {
        let url = self.issue_url(issue);
        let target = issue.to_string();
        Box::pin(async move {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|err| AppError::Notifier(format!("fetch issue {target}: {err}")))?;

            match response.status() {
                status if status.is_success() => response.json::<Issue>().await.map_err(|err| {
                    AppError::Notifier(format!("fetch issue {target}: invalid json: {err}"))
                }),
                StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("issue {target} not found"))),
                status => Err(AppError::Notifier(format!(
                    "fetch issue {target}: HTTP {status}"
                ))),
            }
        })
    }

    fn list_issues(
        &self,
        repo: &str,
        state: &str,
        labels: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Issue>>> {
        let repo = repo.to_owned();
        let mut params = vec![("state", state.to_owned())];
        if let Some(labels) = labels.filter(|l| !l.is_empty()) {
            params.push(("labels", labels.to_owned()));
        }
        Box::pin(async move {
            IssueRef::split_repo(&repo)?;
            let url = Url::parse_with_params(
                &format!("{}/repos/{repo}/issues", self.api_base),
                &params,
            )
            .map_err(|err| AppError::InvalidInput(format!("invalid issues url: {err}")))?;

            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|err| AppError::Notifier(format!("list issues for {repo}: {err}")))?;

            let status = response.status();
            if !status.is_success() {
                warn!(repo, %status, "issue listing rejected");
                return Err(AppError::Notifier(format!(
                    "list issues for {repo}: HTTP {status}"
                )));
            }

            let issues: Vec<Issue> = response.json().await.map_err(|err| {
                AppError::Notifier(format!("list issues for {repo}: invalid json: {err}"))
            })?;

            Ok(issues
                .into_iter()
                .filter(|issue| !issue.is_pull_request())
                .collect())
        })
    }
}
