// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Secrets backend: fetch-by-path against an external secrets service.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secrets backend unavailable: {0}")]
    Unavailable(String),
    #[error("secrets backend rejected credentials")]
    Unauthorized,
}

/// Connectivity report for `/secrets/status`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait SecretsBackend: Send + Sync {
    async fn status(&self) -> SecretsStatus;
    /// Key names under a path; values are never listed.
    async fn list(&self, path: &str) -> Result<Vec<String>, SecretsError>;
    async fn get(&self, path: &str, key: &str) -> Result<String, SecretsError>;
    /// Drop any cached material and re-read from the backend.
    async fn refresh(&self) -> Result<(), SecretsError>;
}

#[derive(Deserialize)]
struct SecretEntry {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct SecretsPayload {
    #[serde(default)]
    secrets: Vec<SecretEntry>,
}

/// HTTP secrets service client with bearer-token auth.
pub struct HttpSecretsBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpSecretsBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, SecretsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into(), token: token.into() })
    }

    async fn fetch(&self, path: &str) -> Result<SecretsPayload, SecretsError> {
        let url = format!("{}/v1/secrets?path={}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;
        match response.status().as_u16() {
            200 => response
                .json::<SecretsPayload>()
                .await
                .map_err(|e| SecretsError::Unavailable(e.to_string())),
            401 | 403 => Err(SecretsError::Unauthorized),
            code => Err(SecretsError::Unavailable(format!("HTTP {}", code))),
        }
    }
}

#[async_trait]
impl SecretsBackend for HttpSecretsBackend {
    async fn status(&self) -> SecretsStatus {
        match self.fetch("/").await {
            Ok(_) => SecretsStatus { connected: true, error: None },
            Err(e) => SecretsStatus { connected: false, error: Some(e.to_string()) },
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, SecretsError> {
        Ok(self.fetch(path).await?.secrets.into_iter().map(|s| s.key).collect())
    }

    async fn get(&self, path: &str, key: &str) -> Result<String, SecretsError> {
        self.fetch(path)
            .await?
            .secrets
            .into_iter()
            .find(|s| s.key == key)
            .map(|s| s.value)
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    async fn refresh(&self) -> Result<(), SecretsError> {
        // Stateless client; refresh is a connectivity check.
        self.fetch("/").await.map(|_| ())
    }
}
