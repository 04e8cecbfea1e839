// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use leadbook_app::{FetchParams, Lead, LeadApi, LeadId, LeadStatus, NewLead, Page};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Blocking client for the leads HTTP API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        // A trailing slash makes joined paths land under any base prefix.
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("server.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "server.base_url must use http or https, got {:?}",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn list_leads(&self, params: &FetchParams) -> Result<Page<Lead>> {
        let mut url = self.endpoint("leads")?;
        url.query_pairs_mut().extend_pairs(params.to_query_pairs());
        debug!(%url, "GET leads");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| self.connection_error(error))?;
        decode(response, "decode lead page")
    }

    pub fn create_lead(&self, payload: &NewLead) -> Result<Lead> {
        let url = self.endpoint("leads")?;
        debug!(%url, name = %payload.name, "POST lead");
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .map_err(|error| self.connection_error(error))?;
        decode(response, "decode created lead")
    }

    pub fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<Lead> {
        let mut url = self.endpoint(&format!("leads/{id}/status"))?;
        url.query_pairs_mut()
            .append_pair("new_status", status.as_str());
        debug!(%url, "POST status");
        let response = self
            .http
            .post(url)
            .send()
            .map_err(|error| self.connection_error(error))?;
        decode(response, "decode updated lead")
    }

    /// Fetches a single row to prove the server answers.
    pub fn ping(&self) -> Result<usize> {
        let page = self.list_leads(&FetchParams {
            q: None,
            status: None,
            limit: 1,
            offset: 0,
        })?;
        Ok(page.total)
    }

    fn connection_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            return anyhow!(
                "{} did not answer within {:?} -- raise [server].timeout or check the API server",
                self.base_url(),
                self.timeout
            );
        }
        anyhow!(
            "cannot reach {} -- check that the API server is running or set [server].base_url ({})",
            self.base_url(),
            error
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("build URL for {path}"))
    }
}

impl LeadApi for Client {
    fn list_leads(&self, params: &FetchParams) -> Result<Page<Lead>> {
        Client::list_leads(self, params)
    }

    fn create_lead(&self, payload: &NewLead) -> Result<Lead> {
        Client::create_lead(self, payload)
    }

    fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<Lead> {
        Client::set_status(self, id, status)
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let error = clean_error_response(status, &body);
        warn!(status = status.as_u16(), %error, "request failed");
        return Err(error);
    }
    response.json().context(what)
}


fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(detail) = parsed.detail.and_then(ErrorDetail::into_message)
    {
        return anyhow!("server error ({}): {}", status.as_u16(), detail);
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<ErrorDetail>,
}

/// `detail` is a plain message, or a list of field issues on 422.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Issues(Vec<ErrorIssue>),
}

#[derive(Debug, Deserialize)]
struct ErrorIssue {
    #[serde(default)]
    loc: Vec<serde_json::Value>,
    msg: String,
}

impl ErrorDetail {
    fn into_message(self) -> Option<String> {
        let message = match self {
            Self::Message(message) => message,
            Self::Issues(issues) => issues
                .into_iter()
                .map(|issue| {
                    let path = issue
                        .loc
                        .iter()
                        .skip_while(|part| part.as_str() == Some("body"))
                        .map(|part| match part {
                            serde_json::Value::String(name) => name.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    if path.is_empty() {
                        issue.msg
                    } else {
                        format!("{path}: {}", issue.msg)
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        };
        (!message.is_empty()).then_some(message)
    }
}
