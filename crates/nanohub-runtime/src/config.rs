// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Static sizing of the runtime.

use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Capacities of the runtime's bounded structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of live events, from posting until release.
    pub max_event_count: usize,
    /// Capacity of the dispatch queue holding events not yet distributed.
    pub max_unscheduled_events: usize,
    /// Capacity of the wifi scan monitor transition queue.
    pub max_scan_monitor_transitions: usize,
    /// Capacity of the GNSS location session transition queue.
    pub max_gnss_session_transitions: usize,
    /// Maximum number of concurrently loaded nanoapps.
    pub max_nanoapps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_event_count: 1024,
            max_unscheduled_events: 1024,
            max_scan_monitor_transitions: 8,
            max_gnss_session_transitions: 8,
            max_nanoapps: 64,
        }
    }
}

impl RuntimeConfig {
    /// Parses a JSON document. Missing fields take their default value.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse runtime configuration")?;
        config
            .validate()
            .context("Runtime configuration is invalid")?;
        Ok(config)
    }

    /// Rejects capacities of zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_event_count", self.max_event_count),
            ("max_unscheduled_events", self.max_unscheduled_events),
            ("max_scan_monitor_transitions", self.max_scan_monitor_transitions),
            ("max_gnss_session_transitions", self.max_gnss_session_transitions),
            ("max_nanoapps", self.max_nanoapps),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::ZeroCapacity { field: *field }),
            None => Ok(()),
        }
    }
}
