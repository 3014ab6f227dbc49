// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Domain types shared across the ghfleet workspace.
//!
//! This crate is dependency-light on purpose: worker state, fleet entries,
//! service definitions, and deploy records are plain data that the adapters,
//! store, and daemon crates all agree on.

pub mod clock;
pub mod deploy;
pub mod fleet;
pub mod service;
pub mod worker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use deploy::{validate_image_tag, DeployRecord, DeployStatus, DeployTrigger};
pub use fleet::{worker_ips, FleetEntry};
pub use service::ServiceDefinition;
pub use worker::{WorkerPhase, WorkerState, WORKER_ROLE};
