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

use super::lock;
use nanohub_core::pal::{PlatformSensor, SensorPal, SensorPalCallbacks};
use nanohub_core::sensor::{SensorMode, SensorSampleData, SensorType};
use nanohub_core::Nanoseconds;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type AppliedRequest = (SensorMode, Nanoseconds, Nanoseconds);

struct State {
    open: bool,
    accept: bool,
    applied: HashMap<SensorType, AppliedRequest>,
    request_count: usize,
    released: usize,
    callbacks: Option<Arc<dyn SensorPalCallbacks>>,
}

/// Control handle of a [`SimSensorPal`].
#[derive(Clone)]
pub struct SimSensorControl {
    state: Arc<Mutex<State>>,
}

impl SimSensorControl {
    /// Whether `set_request` calls succeed.
    pub fn set_accept(&self, accept: bool) {
        lock(&self.state).accept = accept;
    }

    /// The last configuration the platform accepted for a sensor.
    pub fn last_request(&self, sensor_type: SensorType) -> Option<AppliedRequest> {
        lock(&self.state).applied.get(&sensor_type).copied()
    }

    /// `set_request` calls so far, accepted or not.
    pub fn request_count(&self) -> usize {
        lock(&self.state).request_count
    }

    /// Sample batches handed back by the runtime, released or refused.
    pub fn released_count(&self) -> usize {
        lock(&self.state).released
    }

    /// Whether the runtime holds the backend open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Delivers samples as the platform would. Returns `false` if closed.
    pub fn emit(&self, sensor_type: SensorType, data: SensorSampleData) -> bool {
        let callbacks = lock(&self.state).callbacks.clone();
        match callbacks {
            Some(callbacks) => {
                if callbacks.sensor_data(sensor_type, data).is_err() {
                    lock(&self.state).released += 1;
                }
                true
            }
            None => false,
        }
    }
}

/// A sensor backend with a fixed sensor list.
pub struct SimSensorPal {
    sensors: Vec<PlatformSensor>,
    state: Arc<Mutex<State>>,
}

impl SimSensorPal {
    /// A backend exposing `sensors`.
    pub fn new(sensors: Vec<PlatformSensor>) -> Self {
        Self {
            sensors,
            state: Arc::new(Mutex::new(State {
                open: false,
                accept: true,
                applied: HashMap::new(),
                request_count: 0,
                released: 0,
                callbacks: None,
            })),
        }
    }

    /// Accelerometer, gyroscope, light, proximity and instant motion.
    pub fn with_default_sensors() -> Self {
        let sensor = |sensor_type: SensorType, name: &str, min_interval: Nanoseconds| PlatformSensor {
            sensor_type,
            name: name.to_string(),
            min_interval,
        };
        Self::new(vec![
            sensor(SensorType::Accelerometer, "Sim Accelerometer", Nanoseconds::from_millis(10)),
            sensor(SensorType::Gyroscope, "Sim Gyroscope", Nanoseconds::from_millis(10)),
            sensor(SensorType::Light, "Sim Light", Nanoseconds::from_millis(100)),
            sensor(SensorType::Proximity, "Sim Proximity", Nanoseconds::from_millis(100)),
            sensor(SensorType::InstantMotion, "Sim Instant Motion", Nanoseconds(0)),
        ])
    }

    /// A control handle sharing this backend's state.
    pub fn control(&self) -> SimSensorControl {
        SimSensorControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl SensorPal for SimSensorPal {
    fn open(&mut self, callbacks: Arc<dyn SensorPalCallbacks>) -> bool {
        let mut state = lock(&self.state);
        state.open = true;
        state.callbacks = Some(callbacks);
        true
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.callbacks = None;
    }

    fn sensors(&self) -> Vec<PlatformSensor> {
        self.sensors.clone()
    }

    fn set_request(
        &mut self,
        sensor_type: SensorType,
        mode: SensorMode,
        interval: Nanoseconds,
        latency: Nanoseconds,
    ) -> bool {
        let mut state = lock(&self.state);
        state.request_count += 1;
        if !state.accept {
            return false;
        }
        log::debug!("SimSensorPal: {sensor_type} -> {mode:?} every {interval:?} (latency {latency:?})");
        state.applied.insert(sensor_type, (mode, interval, latency));
        true
    }

    fn release_sensor_data(&mut self, _data: SensorSampleData) {
        lock(&self.state).released += 1;
    }
}
