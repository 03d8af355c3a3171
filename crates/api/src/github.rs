//! Public repository languages of a GitHub user.

use std::{collections::HashMap, time::Duration};

use futures::future::join_all;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
  config::GithubSettings,
  error::{ApiError, ApiResult},
  verification::RepoLanguages,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "imara-api";
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct Repo {
  name: String,
  languages_url: String,
}

#[derive(Debug, Clone)]
pub struct GithubClient {
  http: Client,
  api_url: String,
  token: Option<SecretString>,
}

impl GithubClient {
  pub fn new(settings: &GithubSettings) -> ApiResult<Self> {
    let http = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| ApiError::Github(e.to_string()))?;

    Ok(Self {
      http,
      api_url: settings.api_url.trim_end_matches('/').to_string(),
      token: settings.token.clone().map(SecretString::from),
    })
  }

  /// Languages of each public repository. Repositories whose languages can't be read are skipped.
  #[instrument(skip(self))]
  pub async fn repo_languages(&self, username: &str) -> ApiResult<Vec<RepoLanguages>> {
    let url = format!("{}/users/{}/repos", self.api_url, username);
    let response = self
      .get(&url)
      .send()
      .await
      .map_err(|e| ApiError::Github(e.to_string()))?;

    match response.status() {
      StatusCode::OK => {},
      StatusCode::NOT_FOUND => return Err(ApiError::InvalidInput(format!("GitHub user `{username}` not found"))),
      status => return Err(ApiError::Github(format!("listing repositories returned {status}"))),
    }

    let repos = response
      .json::<Vec<Repo>>()
      .await
      .map_err(|e| ApiError::Github(e.to_string()))?;

    debug!("GitHub user {} has {} public repositories", username, repos.len());

    let languages = join_all(repos.iter().map(|repo| self.languages(&repo.languages_url))).await;

    Ok(
      repos
        .into_iter()
        .zip(languages)
        .filter_map(|(repo, languages)| match languages {
          Ok(languages) => Some(RepoLanguages {
            name: repo.name,
            languages,
          }),
          Err(e) => {
            warn!("Skipping languages of repository {}: {}", repo.name, e);
            None
          },
        })
        .collect(),
    )
  }

  async fn languages(&self, url: &str) -> ApiResult<Vec<String>> {
    let languages = self
      .get(url)
      .send()
      .await
      .and_then(|response| response.error_for_status())
      .map_err(|e| ApiError::Github(e.to_string()))?
      .json::<HashMap<String, u64>>()
      .await
      .map_err(|e| ApiError::Github(e.to_string()))?;

    Ok(languages.into_keys().collect())
  }

  fn get(&self, url: &str) -> RequestBuilder {
    let request = self.http.get(url).header(reqwest::header::ACCEPT, ACCEPT);

    match &self.token {
      Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {}", token.expose_secret())),
      None => request,
    }
  }
}
