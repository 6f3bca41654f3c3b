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

//! Sensor request multiplexing.

mod sensor_request_manager;

pub use self::sensor_request_manager::SensorRequestManager;

use crate::request_multiplexer::MergeableRequest;
use nanohub_core::sensor::SensorMode;
use nanohub_core::{InstanceId, Nanoseconds};

/// One nanoapp's request for a sensor, or the merged request sent to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRequest {
    nanoapp: Option<InstanceId>,
    mode: SensorMode,
    interval: Nanoseconds,
    latency: Nanoseconds,
}

impl Default for SensorRequest {
    /// The "off" request: the identity of [`MergeableRequest::merge_with`].
    fn default() -> Self {
        Self {
            nanoapp: None,
            mode: SensorMode::Off,
            interval: Nanoseconds::DEFAULT,
            latency: Nanoseconds::DEFAULT,
        }
    }
}

impl SensorRequest {
    /// A request owned by `nanoapp`.
    pub fn new(
        nanoapp: InstanceId,
        mode: SensorMode,
        interval: Nanoseconds,
        latency: Nanoseconds,
    ) -> Self {
        Self {
            nanoapp: Some(nanoapp),
            mode,
            interval,
            latency,
        }
    }

    /// The nanoapp that made this request. `None` for merged requests.
    pub fn nanoapp(&self) -> Option<InstanceId> {
        self.nanoapp
    }

    /// Requested mode.
    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    /// Requested sampling interval.
    pub fn interval(&self) -> Nanoseconds {
        self.interval
    }

    /// Requested batching latency.
    pub fn latency(&self) -> Nanoseconds {
        self.latency
    }
}

impl MergeableRequest for SensorRequest {
    /// Keeps the shortest interval and latency and the highest-priority mode.
    fn merge_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        if other.interval < self.interval {
            self.interval = other.interval;
            changed = true;
        }
        if other.latency < self.latency {
            self.latency = other.latency;
            changed = true;
        }
        if other.mode > self.mode {
            self.mode = other.mode;
            changed = true;
        }
        changed
    }

    fn is_equivalent_to(&self, other: &Self) -> bool {
        self.mode == other.mode && self.interval == other.interval && self.latency == other.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: SensorMode, interval_ms: u64, latency_ms: u64) -> SensorRequest {
        SensorRequest::new(
            InstanceId(1),
            mode,
            Nanoseconds::from_millis(interval_ms),
            Nanoseconds::from_millis(latency_ms),
        )
    }

    #[test]
    fn merge_takes_the_most_demanding_values() {
        let mut merged = SensorRequest::default();
        assert!(merged.merge_with(&request(SensorMode::PassiveContinuous, 100, 0)));
        assert!(merged.merge_with(&request(SensorMode::ActiveContinuous, 50, 200)));
        assert_eq!(merged.mode(), SensorMode::ActiveContinuous);
        assert_eq!(merged.interval(), Nanoseconds::from_millis(50));
        assert_eq!(merged.latency(), Nanoseconds::from_millis(0));
    }

    #[test]
    fn merging_a_weaker_request_changes_nothing() {
        let mut merged = request(SensorMode::ActiveContinuous, 10, 0);
        assert!(!merged.merge_with(&request(SensorMode::PassiveContinuous, 20, 5)));
    }

    #[test]
    fn equivalence_ignores_the_owner() {
        let a = request(SensorMode::ActiveContinuous, 10, 0);
        let b = SensorRequest::new(
            InstanceId(9),
            SensorMode::ActiveContinuous,
            Nanoseconds::from_millis(10),
            Nanoseconds::from_millis(0),
        );
        assert!(a.is_equivalent_to(&b));
        assert_ne!(a, b);
    }
}
