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

//! Fixtures shared by the unit tests.

use crate::config::RuntimeConfig;
use crate::handle::RuntimeHandle;
use crate::manager::{Platform, Subsystems};
use nanohub_core::pal::{SystemTimer, TimerCallback};
use nanohub_infra::sim::{SimGnssPal, SimSensorPal, SimWifiPal, SimWwanPal};
use std::time::Duration;

/// A system timer that never fires.
pub(crate) struct NullTimer;

impl SystemTimer for NullTimer {
    fn init(&mut self, _callback: TimerCallback) -> bool {
        true
    }

    fn set(&mut self, _delay: Duration) -> bool {
        true
    }

    fn cancel(&mut self) -> bool {
        true
    }
}

pub(crate) fn test_subsystems(handle: RuntimeHandle) -> Subsystems {
    Subsystems::new(
        &RuntimeConfig::default(),
        handle,
        Box::new(SimSensorPal::with_default_sensors()),
        Box::new(SimWifiPal::new()),
        Box::new(SimGnssPal::new()),
        Box::new(SimWwanPal::new()),
    )
}

pub(crate) fn sim_platform() -> Platform {
    Platform {
        system_timer: Box::new(NullTimer),
        sensor: Box::new(SimSensorPal::with_default_sensors()),
        wifi: Box::new(SimWifiPal::new()),
        gnss: Box::new(SimGnssPal::new()),
        wwan: Box::new(SimWwanPal::new()),
    }
}
