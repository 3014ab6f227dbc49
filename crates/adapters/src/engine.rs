// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Container engine adapter: a thin typed surface over the local engine
//! socket.
//!
//! Speaks HTTP/1.1 directly over the Unix socket with `Connection: close`
//! framing. Responses are read by Content-Length, chunked decoding, or EOF,
//! whichever the engine picks per endpoint. No retries here; the deploy
//! orchestrator decides what a failure means.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Errors from engine operations, tagged with the operation name.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{op}: {message}")]
    Api { op: &'static str, message: String },
    #[error("{op}: request timed out")]
    Timeout { op: &'static str },
    #[error("{op}: malformed engine response: {message}")]
    Parse { op: &'static str, message: String },
}

/// Registry credentials for authenticated pulls.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    pub server: String,
}

impl RegistryAuth {
    /// Encode as the engine's `X-Registry-Auth` header value.
    fn header_value(&self) -> String {
        let json = serde_json::json!({
            "username": self.username,
            "password": self.password,
            "serveraddress": self.server,
        });
        BASE64.encode(json.to_string())
    }
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    pub image: String,
    pub command: Vec<String>,
    /// `KEY=VALUE` bindings.
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub host_network: bool,
    pub restart_policy: String,
}

/// Simplified view of one container from `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub status: String,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn pull(
        &self,
        image: &str,
        tag: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), EngineError>;
    /// Returns the new container id.
    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<String, EngineError>;
    async fn start(&self, id: &str) -> Result<(), EngineError>;
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError>;
    async fn remove(&self, id: &str) -> Result<(), EngineError>;
    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError>;
    /// Returns bytes reclaimed.
    async fn prune_images(&self) -> Result<u64, EngineError>;
}

/// Production engine over the local Docker socket.
pub struct DockerEngine {
    socket: PathBuf,
    call_timeout: Duration,
    pull_timeout: Duration,
}

impl DockerEngine {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            call_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(600),
        }
    }

    async fn request(
        &self,
        op: &'static str,
        method: &str,
        path: &str,
        body: Option<String>,
        auth_header: Option<String>,
        timeout: Duration,
    ) -> Result<(u16, String), EngineError> {
        let mut request = format!("{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n", method, path);
        if let Some(auth) = auth_header {
            request.push_str(&format!("X-Registry-Auth: {}\r\n", auth));
        }
        match body {
            Some(body) => {
                request.push_str(&format!(
                    "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                ));
            }
            None => request.push_str("\r\n"),
        }

        tokio::time::timeout(timeout, self.send(op, &request))
            .await
            .map_err(|_| EngineError::Timeout { op })?
    }

    async fn send(&self, op: &'static str, request: &str) -> Result<(u16, String), EngineError> {
        tracing::debug!(op, socket = %self.socket.display(), "engine request");
        let mut stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|e| EngineError::Api { op, message: format!("connect failed: {}", e) })?;
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| EngineError::Api { op, message: format!("write failed: {}", e) })?;

        let mut reader = BufReader::new(&mut stream);
        read_response(op, &mut reader).await
    }
}

/// Read an HTTP/1.1 response: status line, headers, then a body framed by
/// Content-Length, chunked encoding, or connection close.
async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    op: &'static str,
    reader: &mut BufReader<R>,
) -> Result<(u16, String), EngineError> {
    let io_err = |e: std::io::Error| EngineError::Api { op, message: format!("read failed: {}", e) };

    let mut status_line = String::new();
    reader.read_line(&mut status_line).await.map_err(io_err)?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| EngineError::Parse { op, message: format!("bad status line: {}", status_line.trim()) })?;

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.map_err(io_err)?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(val) = lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().ok();
        } else if let Some(val) = lower.strip_prefix("transfer-encoding:") {
            chunked = val.trim() == "chunked";
        }
    }

    let body = if chunked {
        read_chunked(op, reader).await?
    } else if let Some(len) = content_length {
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(io_err)?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map_err(io_err)?;
        String::from_utf8_lossy(&buf).into_owned()
    };

    Ok((status, body))
}

async fn read_chunked<R: tokio::io::AsyncRead + Unpin>(
    op: &'static str,
    reader: &mut BufReader<R>,
) -> Result<String, EngineError> {
    let io_err = |e: std::io::Error| EngineError::Api { op, message: format!("read failed: {}", e) };
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).await.map_err(io_err)?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| EngineError::Parse { op, message: format!("bad chunk size: {}", size_line.trim()) })?;
        if size == 0 {
            let mut trailer = String::new();
            reader.read_line(&mut trailer).await.map_err(io_err)?;
            break;
        }
        let mut chunk = vec![0u8; size + 2]; // chunk data + CRLF
        reader.read_exact(&mut chunk).await.map_err(io_err)?;
        chunk.truncate(size);
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn engine_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Deserialize)]
struct ListedContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull(
        &self,
        image: &str,
        tag: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), EngineError> {
        let path = format!("/images/create?fromImage={}&tag={}", image, tag);
        let auth_header = auth.map(RegistryAuth::header_value);
        let (status, body) = self
            .request("pull-image", "POST", &path, None, auth_header, self.pull_timeout)
            .await?;
        if status >= 400 {
            return Err(EngineError::Api { op: "pull-image", message: engine_message(&body) });
        }
        // Pulls stream progress as JSON lines; a failure mid-stream still
        // arrives with HTTP 200.
        for line in body.lines() {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(err) = v.get("error").and_then(|e| e.as_str()) {
                    return Err(EngineError::Api { op: "pull-image", message: err.to_string() });
                }
            }
        }
        Ok(())
    }

    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "Image": spec.image,
            "Cmd": spec.command,
            "Env": spec.env,
            "Labels": spec.labels,
            "HostConfig": {
                "NetworkMode": if spec.host_network { "host" } else { "bridge" },
                "RestartPolicy": { "Name": spec.restart_policy },
            },
        });
        let path = format!("/containers/create?name={}", name);
        let (status, body) = self
            .request("create-container", "POST", &path, Some(body.to_string()), None, self.call_timeout)
            .await?;
        if status >= 400 {
            return Err(EngineError::Api { op: "create-container", message: engine_message(&body) });
        }
        serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("Id").and_then(|id| id.as_str()).map(str::to_string))
            .ok_or_else(|| EngineError::Parse {
                op: "create-container",
                message: "missing Id in create response".to_string(),
            })
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        let path = format!("/containers/{}/start", id);
        let (status, body) =
            self.request("start-container", "POST", &path, None, None, self.call_timeout).await?;
        // 304: already started
        if status >= 400 {
            return Err(EngineError::Api { op: "start-container", message: engine_message(&body) });
        }
        Ok(())
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let path = format!("/containers/{}/stop?t={}", id, grace.as_secs());
        // The engine blocks for up to the grace period before killing.
        let timeout = self.call_timeout + grace;
        let (status, body) =
            self.request("stop-container", "POST", &path, None, None, timeout).await?;
        // 304: already stopped
        if status >= 400 {
            return Err(EngineError::Api { op: "stop-container", message: engine_message(&body) });
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), EngineError> {
        let path = format!("/containers/{}", id);
        let (status, body) =
            self.request("remove-container", "DELETE", &path, None, None, self.call_timeout).await?;
        if status >= 400 && status != 404 {
            return Err(EngineError::Api { op: "remove-container", message: engine_message(&body) });
        }
        Ok(())
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let path = format!("/containers/json?all={}", all);
        let (status, body) =
            self.request("list-containers", "GET", &path, None, None, self.call_timeout).await?;
        if status >= 400 {
            return Err(EngineError::Api { op: "list-containers", message: engine_message(&body) });
        }
        let listed: Vec<ListedContainer> = serde_json::from_str(&body)
            .map_err(|e| EngineError::Parse { op: "list-containers", message: e.to_string() })?;
        Ok(listed.into_iter().map(summarize).collect())
    }

    async fn prune_images(&self) -> Result<u64, EngineError> {
        // filters={"dangling":["true"]}
        let path = "/images/prune?filters=%7B%22dangling%22%3A%5B%22true%22%5D%7D";
        let (status, body) =
            self.request("prune-images", "POST", path, None, None, self.call_timeout).await?;
        if status >= 400 {
            return Err(EngineError::Api { op: "prune-images", message: engine_message(&body) });
        }
        let reclaimed = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("SpaceReclaimed").and_then(|s| s.as_u64()))
            .unwrap_or(0);
        Ok(reclaimed)
    }
}

fn summarize(c: ListedContainer) -> ContainerSummary {
    // The engine reports names with a leading slash.
    let name = c
        .names
        .first()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| c.id.clone());
    ContainerSummary {
        id: c.id,
        name,
        image: c.image,
        running: c.state == "running",
        status: c.status,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
