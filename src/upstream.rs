use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE, REFERER};
use reqwest::Client;
use tracing::debug;

use crate::error::GpaError;

/// Supplies raw transcript markup for a student at a record level.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_markup(
        &self,
        stnum: &str,
        level: &str,
        session: Option<&str>,
    ) -> Result<String, GpaError>;
}

/// Supplies the per-student GPA summary used to build a ranking cohort.
#[async_trait]
pub trait GpaSource: Send + Sync {
    async fn fetch_gpa(&self, stnum: u32, level: &str) -> Result<HashMap<String, String>, GpaError>;
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

pub struct HttpTranscriptSource {
    client: Client,
    url: String,
    referer: String,
}

impl HttpTranscriptSource {
    pub fn new(client: Client, url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            referer: referer.into(),
        }
    }
}

#[async_trait]
impl TranscriptSource for HttpTranscriptSource {
    async fn fetch_markup(
        &self,
        stnum: &str,
        level: &str,
        session: Option<&str>,
    ) -> Result<String, GpaError> {
        debug!(stnum, level, "Fetching transcript markup");

        let mut request = self
            .client
            .get(&self.url)
            .query(&[("task", "lvlfilt"), ("stnum", stnum), ("rlevel", level)])
            .header(REFERER, &self.referer);

        if let Some(session) = session {
            request = request.header(COOKIE, format!("PHPSESSID={session}"));
        }

        let response = request.send().await.map_err(GpaError::UpstreamFetch)?;

        if !response.status().is_success() {
            return Err(GpaError::UpstreamStatus(response.status()));
        }

        response.text().await.map_err(GpaError::UpstreamFetch)
    }
}

pub struct HttpGpaSource {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpGpaSource {
    pub fn new(client: Client, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl GpaSource for HttpGpaSource {
    async fn fetch_gpa(&self, stnum: u32, level: &str) -> Result<HashMap<String, String>, GpaError> {
        let stnum = stnum.to_string();
        let mut request = self
            .client
            .get(&self.url)
            .query(&[("stnum", stnum.as_str()), ("rlevel", level)]);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(GpaError::UpstreamFetch)?;

        if !response.status().is_success() {
            return Err(GpaError::UpstreamStatus(response.status()));
        }

        response.json().await.map_err(GpaError::UpstreamFetch)
    }
}
