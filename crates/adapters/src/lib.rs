// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Injectable capabilities for everything outside the process.
//!
//! Each external collaborator (container engine, cloud API, worker HTTP
//! surface, secrets backend, child processes) is a small trait plus one
//! production implementation. Control-plane logic depends on the traits;
//! tests swap in the fakes exported behind the `test-support` feature.

pub mod cloud;
pub mod engine;
pub mod secrets;
pub mod spawn;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use cloud::{
    AsgMembership, AwsCli, AwsCloud, CloudCompute, CloudDispatch, CloudError, InstanceView,
    IpLookup,
};
pub use engine::{ContainerEngine, ContainerSummary, CreateSpec, DockerEngine, EngineError, RegistryAuth};
pub use secrets::{HttpSecretsBackend, SecretsBackend, SecretsError, SecretsStatus};
pub use spawn::{ProcessSpawner, SpawnError, SpawnOutput, Spawner};
pub use worker::{HttpWorkerClient, WorkerClient, WorkerError, WorkerHealth};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{
    FakeCloud, FakeDispatch, FakeEngine, FakeSecrets, FakeSpawner, FakeWorkerClient,
};
