// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Deploy-history persistence.

mod history;

pub use history::{DeployHistory, StoreError, HISTORY_CAP};
