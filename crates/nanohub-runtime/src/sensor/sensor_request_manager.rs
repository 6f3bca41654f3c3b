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

use super::SensorRequest;
use crate::error::SensorRequestError;
use crate::event::{release_callback, SystemCallbackType};
use crate::event_loop::EventLoop;
use crate::handle::RuntimeHandle;
use crate::request_multiplexer::RequestMultiplexer;
use nanohub_core::event::EventPayload;
use nanohub_core::pal::{PlatformSensor, SensorPal, SensorPalCallbacks};
use nanohub_core::sensor::{SensorHandle, SensorInfo, SensorMode, SensorSampleData, SensorType};
use nanohub_core::{InstanceId, Nanoseconds};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The requests of every nanoapp for one sensor.
struct SensorRequests {
    sensor: PlatformSensor,
    /// Last sample of an on-change sensor, replayed to new subscribers.
    last_event: Option<SensorSampleData>,
    multiplexer: RequestMultiplexer<SensorRequest>,
}

impl SensorRequests {
    fn new(sensor: PlatformSensor) -> Self {
        Self {
            sensor,
            last_event: None,
            multiplexer: RequestMultiplexer::new(),
        }
    }

    fn sensor_type(&self) -> SensorType {
        self.sensor.sensor_type
    }

    fn find(&self, nanoapp: InstanceId) -> Option<usize> {
        self.multiplexer
            .requests()
            .iter()
            .position(|request| request.nanoapp() == Some(nanoapp))
    }

    fn apply(&self, pal: &mut dyn SensorPal) -> bool {
        let merged = self.multiplexer.current_maximal_request();
        pal.set_request(
            self.sensor_type(),
            merged.mode(),
            merged.interval(),
            merged.latency(),
        )
    }

    fn add(&mut self, pal: &mut dyn SensorPal, request: SensorRequest) -> Result<(), SensorRequestError> {
        let (index, changed) = self.multiplexer.add_request(request);
        if changed && !self.apply(pal) {
            self.multiplexer.remove_request(index);
            log::warn!("SensorRequestManager: Platform rejected request for {}", self.sensor_type());
            return Err(SensorRequestError::PlatformRejected(self.sensor_type()));
        }
        Ok(())
    }

    fn update(
        &mut self,
        pal: &mut dyn SensorPal,
        index: usize,
        request: SensorRequest,
    ) -> Result<(), SensorRequestError> {
        let previous = self.multiplexer.requests()[index];
        if self.multiplexer.update_request(index, request) && !self.apply(pal) {
            self.multiplexer.update_request(index, previous);
            log::warn!("SensorRequestManager: Platform rejected update for {}", self.sensor_type());
            return Err(SensorRequestError::PlatformRejected(self.sensor_type()));
        }
        Ok(())
    }

    /// A removal is not rolled back: the nanoapp no longer wants the data.
    fn remove(&mut self, pal: &mut dyn SensorPal, index: usize) -> Result<(), SensorRequestError> {
        if self.multiplexer.remove_request(index) && !self.apply(pal) {
            log::error!("SensorRequestManager: Failed to lower the request for {}", self.sensor_type());
            return Err(SensorRequestError::PlatformRejected(self.sensor_type()));
        }
        Ok(())
    }

    fn remove_all(&mut self, pal: &mut dyn SensorPal) -> Result<(), SensorRequestError> {
        if self.multiplexer.remove_all_requests() && !self.apply(pal) {
            log::error!("SensorRequestManager: Failed to turn off {}", self.sensor_type());
            return Err(SensorRequestError::PlatformRejected(self.sensor_type()));
        }
        Ok(())
    }
}

fn validate_request(sensor: &PlatformSensor, request: &SensorRequest) -> Result<(), SensorRequestError> {
    let sensor_type = sensor.sensor_type;
    let mode = request.mode();
    let reason = if mode.is_continuous() {
        if sensor_type.is_one_shot() {
            Some("continuous mode on a one-shot sensor")
        } else if request.interval() < sensor.min_interval {
            Some("interval is shorter than the sensor minimum")
        } else {
            None
        }
    } else if mode.is_one_shot() {
        if !sensor_type.is_one_shot() {
            Some("one-shot mode on a continuous sensor")
        } else if request.interval() != Nanoseconds::DEFAULT || request.latency() != Nanoseconds::DEFAULT {
            Some("one-shot requests take the default interval and latency")
        } else {
            None
        }
    } else {
        None
    };

    match reason {
        Some(reason) => {
            log::error!("SensorRequestManager: Invalid {} request: {}", sensor_type, reason);
            Err(SensorRequestError::InvalidRequest(reason))
        }
        None => Ok(()),
    }
}

/// Merges nanoapp sensor requests into one configuration per sensor and keeps
/// the platform and the broadcast registrations in step with them.
pub struct SensorRequestManager {
    pal: Box<dyn SensorPal>,
    sensors: BTreeMap<SensorType, SensorRequests>,
}

impl SensorRequestManager {
    /// Opens the platform and discovers its sensors.
    pub fn new(mut pal: Box<dyn SensorPal>, handle: RuntimeHandle) -> Self {
        let mut sensors = BTreeMap::new();
        let callbacks: Arc<dyn SensorPalCallbacks> = Arc::new(SensorPalBridge { handle });
        if pal.open(callbacks) {
            for sensor in pal.sensors() {
                log::debug!("SensorRequestManager: Found sensor {} ({})", sensor.sensor_type, sensor.name);
                sensors.insert(sensor.sensor_type, SensorRequests::new(sensor));
            }
            if sensors.is_empty() {
                log::warn!("SensorRequestManager: Platform exposes no sensors");
            }
        } else {
            log::error!("SensorRequestManager: Failed to open the sensor platform");
        }
        Self { pal, sensors }
    }

    /// Handle of `sensor_type`, if the platform has it.
    pub fn get_sensor_handle(&self, sensor_type: SensorType) -> Option<SensorHandle> {
        self.sensors
            .contains_key(&sensor_type)
            .then(|| SensorHandle::from_sensor_type(sensor_type))
    }

    /// Static information about a sensor.
    pub fn get_sensor_info(&self, handle: SensorHandle) -> Option<SensorInfo> {
        let sensor_type = handle.sensor_type()?;
        let sensor = &self.sensors.get(&sensor_type)?.sensor;
        Some(SensorInfo {
            name: sensor.name.clone(),
            sensor_type,
            is_on_change: sensor_type.is_on_change(),
            is_one_shot: sensor_type.is_one_shot(),
            min_interval: if sensor_type.is_one_shot() {
                Nanoseconds::DEFAULT
            } else {
                sensor.min_interval
            },
        })
    }

    /// Adds, updates or (with [`SensorMode::Off`]) removes the owner's request.
    ///
    /// On success the owner is registered for the sensor's sample events exactly
    /// while it holds a request. A request the platform rejects leaves every
    /// state as it was, except a removal, which is not rolled back.
    pub fn set_sensor_request(
        &mut self,
        event_loop: &mut EventLoop,
        handle: SensorHandle,
        request: SensorRequest,
    ) -> Result<(), SensorRequestError> {
        let nanoapp = request
            .nanoapp()
            .ok_or(SensorRequestError::InvalidRequest("request has no owner"))?;
        let sensor_type = handle.sensor_type().ok_or_else(|| {
            log::warn!("SensorRequestManager: Invalid sensor handle {handle}");
            SensorRequestError::InvalidHandle(handle)
        })?;
        let Some(requests) = self.sensors.get_mut(&sensor_type) else {
            log::warn!("SensorRequestManager: Sensor {sensor_type} is not present");
            return Err(SensorRequestError::NotPresent(sensor_type));
        };
        validate_request(&requests.sensor, &request)?;

        let pal = self.pal.as_mut();
        let event_type = sensor_type.sample_event_type();
        match (requests.find(nanoapp), request.mode()) {
            (Some(index), SensorMode::Off) => {
                requests.remove(pal, index)?;
                event_loop.unregister_broadcast_event(nanoapp, event_type);
            }
            (None, SensorMode::Off) => {
                log::debug!("SensorRequestManager: Nanoapp {nanoapp} has no {sensor_type} request to remove");
            }
            (Some(index), _) => requests.update(pal, index, request)?,
            (None, _) => {
                requests.add(pal, request)?;
                event_loop.register_broadcast_event(nanoapp, event_type);
                if let Some(last_event) = requests.last_event.as_ref().filter(|_| sensor_type.is_on_change()) {
                    let data: EventPayload = Box::new(last_event.clone());
                    if let Err(err) = event_loop.post_event(
                        event_type,
                        Some(data),
                        None,
                        InstanceId::SYSTEM,
                        nanoapp,
                    ) {
                        log::warn!("SensorRequestManager: Failed to replay last {sensor_type} sample: {err}");
                    }
                }
            }
        }
        Ok(())
    }

    /// Drops every request for a sensor and unsubscribes their owners.
    pub fn remove_all_requests(
        &mut self,
        event_loop: &mut EventLoop,
        sensor_type: SensorType,
    ) -> Result<(), SensorRequestError> {
        let Some(requests) = self.sensors.get_mut(&sensor_type) else {
            return Err(SensorRequestError::NotPresent(sensor_type));
        };
        let event_type = sensor_type.sample_event_type();
        for nanoapp in requests.multiplexer.requests().iter().filter_map(SensorRequest::nanoapp) {
            event_loop.unregister_broadcast_event(nanoapp, event_type);
        }
        requests.remove_all(self.pal.as_mut())
    }

    /// Drops every request of an unloading nanoapp.
    pub(crate) fn remove_nanoapp(&mut self, nanoapp: InstanceId) {
        let pal = self.pal.as_mut();
        for requests in self.sensors.values_mut() {
            if let Some(index) = requests.find(nanoapp) {
                // Already logged; the nanoapp is going away regardless.
                let _ = requests.remove(pal, index);
            }
        }
    }

    /// The merged request currently applied to a sensor.
    pub fn maximal_request(&self, sensor_type: SensorType) -> Option<SensorRequest> {
        self.sensors
            .get(&sensor_type)
            .map(|requests| *requests.multiplexer.current_maximal_request())
    }

    /// The per-nanoapp requests of a sensor.
    pub fn requests(&self, sensor_type: SensorType) -> Option<&RequestMultiplexer<SensorRequest>> {
        self.sensors
            .get(&sensor_type)
            .map(|requests| &requests.multiplexer)
    }

    /// Last cached sample of an on-change sensor.
    pub fn last_event(&self, sensor_type: SensorType) -> Option<&SensorSampleData> {
        self.sensors
            .get(&sensor_type)
            .and_then(|requests| requests.last_event.as_ref())
    }

    pub(crate) fn update_last_event(&mut self, sensor_type: SensorType, data: SensorSampleData) {
        if let Some(requests) = self.sensors.get_mut(&sensor_type) {
            requests.last_event = Some(data);
        }
    }

    pub(crate) fn release_sensor_data(&mut self, data: Option<EventPayload>) {
        match data.map(|data| data.downcast::<SensorSampleData>()) {
            Some(Ok(data)) => self.pal.release_sensor_data(*data),
            Some(Err(_)) => log::error!("SensorRequestManager: Released payload is not sensor data"),
            None => {}
        }
    }
}

impl Drop for SensorRequestManager {
    fn drop(&mut self) {
        for (sensor_type, requests) in &self.sensors {
            if requests.multiplexer.current_maximal_request().mode() != SensorMode::Off
                && !self.pal.set_request(
                    *sensor_type,
                    SensorMode::Off,
                    Nanoseconds::DEFAULT,
                    Nanoseconds::DEFAULT,
                )
            {
                log::warn!("SensorRequestManager: Failed to turn off {sensor_type}");
            }
        }
        self.pal.close();
        log::debug!("SensorRequestManager: Closed.");
    }
}

/// Receives samples from the platform thread and forwards them to the loop.
struct SensorPalBridge {
    handle: RuntimeHandle,
}

impl SensorPalCallbacks for SensorPalBridge {
    fn sensor_data(
        &self,
        sensor_type: SensorType,
        data: SensorSampleData,
    ) -> Result<(), SensorSampleData> {
        if sensor_type.is_on_change() {
            let cached = data.clone();
            if let Err(err) = self.handle.defer_callback(
                SystemCallbackType::SensorLastEventUpdate,
                move |ctx| ctx.subsystems().sensors.update_last_event(sensor_type, cached),
            ) {
                log::warn!("SensorRequestManager: Failed to cache {sensor_type} sample: {err}");
            }
        }

        let release = release_callback(|ctx, _, data| ctx.subsystems().sensors.release_sensor_data(data));
        self.handle
            .post_owned(sensor_type.sample_event_type(), data, release, InstanceId::BROADCAST)
            .map_err(|(err, data)| {
                log::error!("SensorRequestManager: Failed to post {sensor_type} samples: {err}");
                data
            })
    }
}
