//! Authorization against an external policy decision point
//!
//! Every failure on the way to a decision (transport error, non-2xx status,
//! unparseable body, missing or non-boolean decision) denies the request.
//! Callers only learn allowed or denied; the reason is logged here.

use crate::error::{CarInfoError, Result};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default location of the decision inside the policy response
pub const DEFAULT_DECISION_PATH: &str = "result/allowed";

/// The question put to the policy decision point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionInput {
    /// Path segments of the resource, e.g. `["cars", "car3", "status"]`
    pub resource: Vec<String>,
    /// Caller identity, taken verbatim from the request
    pub subject: Option<String>,
    /// HTTP verb
    pub action: String,
}

impl DecisionInput {
    /// Build an input from borrowed parts
    pub fn new(resource: &[&str], subject: Option<&str>, action: &str) -> Self {
        DecisionInput {
            resource: resource.iter().map(|s| s.to_string()).collect(),
            subject: subject.map(str::to_string),
            action: action.to_string(),
        }
    }
}

#[derive(Serialize)]
struct DecisionRequest<'a> {
    input: &'a DecisionInput,
}

/// Why a policy query produced no usable decision
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Request could not be sent or the response not read
    #[error("policy request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Policy service answered with a non-success status
    #[error("policy service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for the log
        body: String,
    },

    /// Response body was not JSON
    #[error("policy response is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Response had nothing at the decision path
    #[error("policy response has no '{0}' field")]
    MissingDecision(String),

    /// Decision field held something other than a boolean
    #[error("policy decision at '{path}' is not a boolean: {value}")]
    NotBoolean {
        /// Decision path
        path: String,
        /// What was found there
        value: serde_json::Value,
    },
}

/// HTTP client for a policy decision point
#[derive(Debug, Clone)]
pub struct PolicyClient {
    client: reqwest::Client,
    url: String,
    decision_path: String,
}

impl PolicyClient {
    /// Create a client posting to `url` and reading the decision at
    /// `decision_path` (slash separated, e.g. `result/allowed`)
    pub fn new(url: impl Into<String>, decision_path: &str, timeout: Duration) -> Result<Self> {
        let decision_path = decision_path.trim_matches('/');
        if decision_path.is_empty() {
            return Err(CarInfoError::ConfigError(
                "decision path must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(PolicyClient {
            client,
            url: url.into(),
            decision_path: decision_path.to_string(),
        })
    }

    /// Endpoint this client queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the policy service for a decision
    pub async fn query(&self, input: &DecisionInput) -> std::result::Result<bool, PolicyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&DecisionRequest { input })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PolicyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)?;
        self.extract_decision(&document)
    }

    fn extract_decision(&self, document: &serde_json::Value) -> std::result::Result<bool, PolicyError> {
        let pointer = format!("/{}", self.decision_path);
        match document.pointer(&pointer) {
            None => Err(PolicyError::MissingDecision(self.decision_path.clone())),
            Some(serde_json::Value::Bool(allowed)) => Ok(*allowed),
            Some(other) => Err(PolicyError::NotBoolean {
                path: self.decision_path.clone(),
                value: other.clone(),
            }),
        }
    }
}

/// Source of allow/deny decisions
#[derive(Debug, Clone)]
pub enum Authorizer {
    /// No policy endpoint configured; everything is allowed
    Open,
    /// Fixed answer regardless of input
    Fixed(bool),
    /// Ask a remote policy decision point
    Remote(PolicyClient),
}

impl Authorizer {
    /// Short name of the mode, for logs and diagnostics
    pub fn mode_name(&self) -> &'static str {
        match self {
            Authorizer::Open => "open",
            Authorizer::Fixed(true) => "allow-all",
            Authorizer::Fixed(false) => "deny-all",
            Authorizer::Remote(_) => "http",
        }
    }

    /// Decide whether `input` is permitted. Any failure denies.
    pub async fn decide(&self, input: &DecisionInput) -> bool {
        let allowed = match self {
            Authorizer::Open => true,
            Authorizer::Fixed(allowed) => *allowed,
            Authorizer::Remote(client) => match client.query(input).await {
                Ok(allowed) => allowed,
                Err(e @ PolicyError::Transport(_)) => {
                    error!(url = %client.url(), error = %e, "policy service unreachable, denying");
                    false
                }
                Err(e) => {
                    warn!(url = %client.url(), error = %e, "unusable policy response, denying");
                    false
                }
            },
        };

        info!(
            resource = ?input.resource,
            subject = ?input.subject,
            action = %input.action,
            mode = self.mode_name(),
            decision = allowed,
            "authorization decision"
        );
        allowed
    }
}
