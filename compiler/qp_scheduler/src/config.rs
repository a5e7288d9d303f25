// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_data_structures::constants::MIN_CLOCK;
use rustc_hash::FxHashMap;

/// Per-bus scheduling parameters (spec §4.3, §6.1 `Backend config`).
#[derive(Clone, Debug, Default)]
pub struct BusScheduleConfig {
    /// Constant shift applied to every play on this bus; may be negative.
    pub delay_ns: i64,
}

/// Scheduler-wide configuration. Lives alongside (but separate from) the
/// top-level `BackendConfig`, which also carries codegen-only fields like
/// distortion chains.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub min_clock_ns: u32,
    pub autosync: bool,
    pub bus_delays: FxHashMap<String, i64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_clock_ns: MIN_CLOCK,
            autosync: true,
            bus_delays: FxHashMap::default(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn delay_for(&self, bus: &str) -> i64 {
        self.bus_delays.get(bus).copied().unwrap_or(0)
    }
}
