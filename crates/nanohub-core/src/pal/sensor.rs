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

use crate::sensor::{SensorMode, SensorSampleData, SensorType};
use crate::time::Nanoseconds;
use std::sync::Arc;

/// A sensor exposed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSensor {
    /// The sensor type.
    pub sensor_type: SensorType,
    /// Platform name.
    pub name: String,
    /// Shortest supported sampling interval.
    pub min_interval: Nanoseconds,
}

/// Entry points the sensor backend calls, from any thread.
pub trait SensorPalCallbacks: Send + Sync {
    /// Delivers a batch of samples. Ownership passes to the runtime until
    /// [`SensorPal::release_sensor_data`].
    ///
    /// ## Errors
    /// Hands the batch back if the runtime could not take it. The platform
    /// owns it again and no release will follow.
    fn sensor_data(
        &self,
        sensor_type: SensorType,
        data: SensorSampleData,
    ) -> Result<(), SensorSampleData>;
}

/// The sensor backend.
pub trait SensorPal: Send {
    /// Connects the backend to the runtime.
    fn open(&mut self, callbacks: Arc<dyn SensorPalCallbacks>) -> bool;

    /// Disconnects. No callback may be invoked after this returns.
    fn close(&mut self);

    /// The sensors this platform exposes.
    fn sensors(&self) -> Vec<PlatformSensor>;

    /// Applies the merged request of a sensor. Returns `false` if rejected, in
    /// which case the sensor keeps its previous configuration.
    fn set_request(
        &mut self,
        sensor_type: SensorType,
        mode: SensorMode,
        interval: Nanoseconds,
        latency: Nanoseconds,
    ) -> bool;

    /// Returns a sample batch once every recipient has processed it.
    fn release_sensor_data(&mut self, data: SensorSampleData);
}
