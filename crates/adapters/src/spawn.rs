// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Child process seam for the cleanup script and the cloud CLI dispatcher.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct SpawnOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait Spawner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<SpawnOutput, SpawnError>;
}

/// Runs the program to completion and captures both output streams.
#[derive(Default)]
pub struct ProcessSpawner;

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn run(&self, program: &str, args: &[String]) -> Result<SpawnOutput, SpawnError> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| SpawnError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;
        Ok(SpawnOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
