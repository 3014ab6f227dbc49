// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Cloud compute adapter: instance start/stop/describe plus auto-scaling
//! group standby management.
//!
//! Every call funnels through a single [`CloudDispatch`] so tests can script
//! responses without touching the network. The production dispatcher execs
//! the `aws` CLI with `--output json` and hands back raw stdout; this module
//! owns all parsing of the CLI's response shapes.

use crate::spawn::Spawner;
use async_trait::async_trait;
use ghfleet_core::WorkerPhase;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{op}: {message}")]
    Api { op: String, message: String },
    #[error("instance not found: {0}")]
    NotFound(String),
    #[error("{op}: malformed response: {message}")]
    Parse { op: String, message: String },
}

/// Describe-by-id result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceView {
    pub state: WorkerPhase,
    pub public_ip: Option<String>,
}

/// One row of a describe-by-ip lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpLookup {
    pub instance_id: String,
    pub public_ip: String,
    pub state: WorkerPhase,
}

/// ASG membership of one instance; both fields absent when unmanaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsgMembership {
    pub asg_name: Option<String>,
    pub lifecycle_state: Option<String>,
}

impl AsgMembership {
    pub fn in_standby(&self) -> bool {
        self.lifecycle_state.as_deref() == Some("Standby")
    }
}

/// The single injectable dispatcher underneath [`AwsCloud`].
#[async_trait]
pub trait CloudDispatch: Send + Sync {
    /// Run one cloud API call and return its raw stdout.
    async fn run(&self, service: &str, args: &[String]) -> Result<String, CloudError>;
}

/// Typed cloud surface the controllers depend on.
#[async_trait]
pub trait CloudCompute: Send + Sync {
    async fn start_instance(&self, id: &str) -> Result<(), CloudError>;
    async fn stop_instance(&self, id: &str) -> Result<(), CloudError>;
    async fn describe_instance(&self, id: &str) -> Result<InstanceView, CloudError>;
    /// Unspecified order; instances without a matching IP are simply absent.
    async fn describe_by_ip(&self, ips: &[String]) -> Result<Vec<IpLookup>, CloudError>;
    async fn asg_membership(&self, id: &str) -> Result<AsgMembership, CloudError>;
    /// Decrements the group's desired capacity.
    async fn enter_standby(&self, id: &str, asg: &str) -> Result<(), CloudError>;
    async fn exit_standby(&self, id: &str, asg: &str) -> Result<(), CloudError>;
    /// Registry credential service: a short-lived pull token.
    async fn registry_token(&self) -> Result<String, CloudError>;
}

/// Production dispatcher: `aws <service> <args...> --output json`.
pub struct AwsCli {
    spawner: Arc<dyn Spawner>,
    region: Option<String>,
}

impl AwsCli {
    pub fn new(spawner: Arc<dyn Spawner>, region: Option<String>) -> Self {
        Self { spawner, region }
    }
}

#[async_trait]
impl CloudDispatch for AwsCli {
    async fn run(&self, service: &str, args: &[String]) -> Result<String, CloudError> {
        let op = args.first().cloned().unwrap_or_default();
        let mut argv = vec![service.to_string()];
        argv.extend(args.iter().cloned());
        if let Some(region) = &self.region {
            argv.push("--region".to_string());
            argv.push(region.clone());
        }
        argv.push("--output".to_string());
        argv.push("json".to_string());

        tracing::debug!(service, op = %op, "cloud dispatch");
        let out = self
            .spawner
            .run("aws", &argv)
            .await
            .map_err(|e| CloudError::Api { op: op.clone(), message: e.to_string() })?;
        if out.status != 0 {
            return Err(CloudError::Api { op, message: out.stderr.trim().to_string() });
        }
        Ok(out.stdout)
    }
}

/// Typed operations over any dispatcher.
pub struct AwsCloud {
    dispatch: Arc<dyn CloudDispatch>,
    registry_server: String,
}

impl AwsCloud {
    pub fn new(dispatch: Arc<dyn CloudDispatch>, registry_server: impl Into<String>) -> Self {
        Self { dispatch, registry_server: registry_server.into() }
    }

    async fn ec2(&self, args: &[&str]) -> Result<String, CloudError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.dispatch.run("ec2", &args).await
    }

    async fn autoscaling(&self, args: &[&str]) -> Result<String, CloudError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.dispatch.run("autoscaling", &args).await
    }
}

fn parse_json(op: &str, raw: &str) -> Result<Value, CloudError> {
    serde_json::from_str(raw)
        .map_err(|e| CloudError::Parse { op: op.to_string(), message: e.to_string() })
}

/// Flatten `Reservations[].Instances[]` out of a describe-instances payload.
fn instances(value: &Value) -> Vec<&Value> {
    value
        .get("Reservations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("Instances").and_then(Value::as_array))
        .flatten()
        .collect()
}

fn instance_state(instance: &Value) -> WorkerPhase {
    instance
        .pointer("/State/Name")
        .and_then(Value::as_str)
        .map(WorkerPhase::from_cloud)
        .unwrap_or(WorkerPhase::Unknown)
}

fn str_field(instance: &Value, key: &str) -> Option<String> {
    instance.get(key).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl CloudCompute for AwsCloud {
    async fn start_instance(&self, id: &str) -> Result<(), CloudError> {
        self.ec2(&["start-instances", "--instance-ids", id]).await?;
        Ok(())
    }

    async fn stop_instance(&self, id: &str) -> Result<(), CloudError> {
        self.ec2(&["stop-instances", "--instance-ids", id]).await?;
        Ok(())
    }

    async fn describe_instance(&self, id: &str) -> Result<InstanceView, CloudError> {
        let raw = self.ec2(&["describe-instances", "--instance-ids", id]).await?;
        let value = parse_json("describe-instances", &raw)?;
        let found = instances(&value);
        let instance = found.first().ok_or_else(|| CloudError::NotFound(id.to_string()))?;
        Ok(InstanceView {
            state: instance_state(instance),
            public_ip: str_field(instance, "PublicIpAddress"),
        })
    }

    async fn describe_by_ip(&self, ips: &[String]) -> Result<Vec<IpLookup>, CloudError> {
        if ips.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!("Name=ip-address,Values={}", ips.join(","));
        let raw = self.ec2(&["describe-instances", "--filters", &filter]).await?;
        let value = parse_json("describe-instances", &raw)?;
        Ok(instances(&value)
            .into_iter()
            .filter_map(|i| {
                let instance_id = str_field(i, "InstanceId")?;
                let public_ip = str_field(i, "PublicIpAddress")?;
                Some(IpLookup { instance_id, public_ip, state: instance_state(i) })
            })
            .collect())
    }

    async fn asg_membership(&self, id: &str) -> Result<AsgMembership, CloudError> {
        let raw = self
            .autoscaling(&["describe-auto-scaling-instances", "--instance-ids", id])
            .await?;
        let value = parse_json("describe-auto-scaling-instances", &raw)?;
        let row = value
            .get("AutoScalingInstances")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first().cloned());
        Ok(match row {
            Some(row) => AsgMembership {
                asg_name: str_field(&row, "AutoScalingGroupName"),
                lifecycle_state: str_field(&row, "LifecycleState"),
            },
            None => AsgMembership::default(),
        })
    }

    async fn enter_standby(&self, id: &str, asg: &str) -> Result<(), CloudError> {
        self.autoscaling(&[
            "enter-standby",
            "--instance-ids",
            id,
            "--auto-scaling-group-name",
            asg,
            "--should-decrement-desired-capacity",
        ])
        .await?;
        Ok(())
    }

    async fn exit_standby(&self, id: &str, asg: &str) -> Result<(), CloudError> {
        self.autoscaling(&[
            "exit-standby",
            "--instance-ids",
            id,
            "--auto-scaling-group-name",
            asg,
        ])
        .await?;
        Ok(())
    }

    async fn registry_token(&self) -> Result<String, CloudError> {
        // Plain-text stdout, not JSON.
        let raw = self.dispatch.run("ecr", &["get-login-password".to_string()]).await?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(CloudError::Api {
                op: "get-login-password".to_string(),
                message: "empty registry token".to_string(),
            });
        }
        Ok(token.to_string())
    }
}

impl AwsCloud {
    pub fn registry_server(&self) -> &str {
        &self.registry_server
    }
}

#[cfg(test)]
#[path = "cloud_tests.rs"]
mod tests;
