// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Local machine metrics for the `/metrics` endpoint.

use serde::Serialize;
use sysinfo::{Disks, System};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub cpu_percent: f32,
    pub memory: MemoryReport,
    pub disk: DiskReport,
    /// Network counters are not sampled; kept for response-shape stability.
    pub network: NetworkReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskReport {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkReport {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Sample CPU, memory, and disk once. CPU usage needs two refreshes with a
/// short gap to produce a delta, so this is an async fn.
pub async fn sample() -> MetricsReport {
    let mut sys = System::new();
    sys.refresh_cpu();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let (total, available) = disks
        .iter()
        .fold((0u64, 0u64), |(t, a), d| (t + d.total_space(), a + d.available_space()));

    MetricsReport {
        cpu_percent: sys.global_cpu_info().cpu_usage(),
        memory: MemoryReport { total_bytes: sys.total_memory(), used_bytes: sys.used_memory() },
        disk: DiskReport { total_bytes: total, available_bytes: available },
        network: NetworkReport::default(),
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
