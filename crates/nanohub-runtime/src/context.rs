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

//! The view of the runtime handed to nanoapp entry points and release callbacks.

use crate::error::StartNanoappError;
use crate::event::release_callback;
use crate::event_loop::EventLoop;
use crate::handle::RuntimeHandle;
use crate::manager::Subsystems;
use crate::sensor::SensorRequest;
use nanohub_core::event::{AppReleaseCallback, EventPayload, EventType};
use nanohub_core::gnss::GnssCapabilities;
use nanohub_core::sensor::{SensorHandle, SensorInfo, SensorMode, SensorType};
use nanohub_core::wifi::{WifiCapabilities, WifiScanParams};
use nanohub_core::wwan::WwanCapabilities;
use nanohub_core::{
    ApiError, AppId, ChreApi, Cookie, InstanceId, Nanoapp, Nanoseconds, TimerHandle,
};
use std::time::Duration;

/// Mutable access to the loop and the request managers, scoped to one callback.
///
/// `current` is the nanoapp the callback runs for. It is `None` for system
/// callbacks, in which case the [`ChreApi`] methods that act on behalf of a
/// nanoapp return [`ApiError::InvalidContext`].
pub struct RuntimeContext<'a> {
    event_loop: &'a mut EventLoop,
    subsystems: &'a mut Subsystems,
    current: Option<InstanceId>,
}

impl<'a> RuntimeContext<'a> {
    pub(crate) fn new(
        event_loop: &'a mut EventLoop,
        subsystems: &'a mut Subsystems,
        current: Option<InstanceId>,
    ) -> Self {
        Self {
            event_loop,
            subsystems,
            current,
        }
    }

    /// The event loop.
    pub fn event_loop(&mut self) -> &mut EventLoop {
        self.event_loop
    }

    /// The request managers.
    pub fn subsystems(&mut self) -> &mut Subsystems {
        self.subsystems
    }

    /// Both halves at once, for calls that need the loop and a manager.
    pub fn parts(&mut self) -> (&mut EventLoop, &mut Subsystems) {
        (&mut *self.event_loop, &mut *self.subsystems)
    }

    /// The nanoapp this callback runs for.
    pub fn current_nanoapp(&self) -> Option<InstanceId> {
        self.current
    }

    /// A thread-safe handle to the loop.
    pub fn handle(&self) -> RuntimeHandle {
        self.event_loop.handle()
    }

    /// Loads and starts a nanoapp.
    pub fn start_nanoapp(
        &mut self,
        nanoapp: Box<dyn Nanoapp>,
    ) -> Result<InstanceId, StartNanoappError> {
        self.event_loop.start_nanoapp(self.subsystems, nanoapp)
    }

    /// Stops and unloads a nanoapp.
    pub fn stop_nanoapp(&mut self, instance_id: InstanceId) -> bool {
        self.event_loop.stop_nanoapp(self.subsystems, instance_id)
    }

    fn caller(&self) -> Result<InstanceId, ApiError> {
        self.current.ok_or(ApiError::InvalidContext)
    }
}

impl ChreApi for RuntimeContext<'_> {
    fn instance_id(&self) -> InstanceId {
        self.current.unwrap_or(InstanceId::SYSTEM)
    }

    fn app_id(&self) -> AppId {
        self.current
            .and_then(|id| self.event_loop.nanoapp_info(id))
            .map_or(0, |info| info.app_id)
    }

    fn time(&self) -> Nanoseconds {
        self.event_loop.handle().time()
    }

    fn send_event(
        &mut self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<AppReleaseCallback>,
        target: InstanceId,
    ) -> Result<(), ApiError> {
        let sender = self.caller()?;
        if target == InstanceId::SYSTEM {
            return Err(ApiError::InvalidArgument(
                "events cannot target the system instance".into(),
            ));
        }
        let release = release.map(|release| {
            release_callback(move |_, event_type, data| release(event_type, data))
        });
        self.event_loop
            .post_event(event_type, data, release, sender, target)
            .map_err(Into::into)
    }

    fn register_broadcast_event(&mut self, event_type: EventType) {
        match self.current {
            Some(id) => {
                self.event_loop.register_broadcast_event(id, event_type);
            }
            None => log::warn!("RuntimeContext: Broadcast registration outside a nanoapp"),
        }
    }

    fn unregister_broadcast_event(&mut self, event_type: EventType) {
        if let Some(id) = self.current {
            self.event_loop.unregister_broadcast_event(id, event_type);
        }
    }

    fn set_timer(
        &mut self,
        duration: Duration,
        cookie: Cookie,
        one_shot: bool,
    ) -> Result<TimerHandle, ApiError> {
        let owner = self.caller()?;
        self.event_loop
            .timer_pool()
            .set_timer(owner, duration, cookie, one_shot)
            .map_err(Into::into)
    }

    fn cancel_timer(&mut self, handle: TimerHandle) -> Result<(), ApiError> {
        let caller = self.caller()?;
        self.event_loop
            .timer_pool()
            .cancel_timer(caller, handle)
            .map_err(Into::into)
    }

    fn find_sensor(&self, sensor_type: SensorType) -> Option<SensorHandle> {
        self.subsystems.sensors.get_sensor_handle(sensor_type)
    }

    fn sensor_info(&self, handle: SensorHandle) -> Option<SensorInfo> {
        self.subsystems.sensors.get_sensor_info(handle)
    }

    fn configure_sensor(
        &mut self,
        handle: SensorHandle,
        mode: SensorMode,
        interval: Nanoseconds,
        latency: Nanoseconds,
    ) -> Result<(), ApiError> {
        let caller = self.caller()?;
        let request = SensorRequest::new(caller, mode, interval, latency);
        self.subsystems
            .sensors
            .set_sensor_request(self.event_loop, handle, request)
            .map_err(Into::into)
    }

    fn wifi_capabilities(&self) -> WifiCapabilities {
        self.subsystems.wifi.capabilities()
    }

    fn wifi_configure_scan_monitor(&mut self, enable: bool, cookie: Cookie) -> Result<(), ApiError> {
        let caller = self.caller()?;
        if !self
            .wifi_capabilities()
            .contains(WifiCapabilities::SCAN_MONITORING)
        {
            return Err(ApiError::NotSupported("wifi scan monitoring".into()));
        }
        self.subsystems
            .wifi
            .configure_scan_monitor(self.event_loop, caller, enable, cookie)
            .map_err(Into::into)
    }

    fn wifi_request_scan(&mut self, params: &WifiScanParams, cookie: Cookie) -> Result<(), ApiError> {
        let caller = self.caller()?;
        if !self
            .wifi_capabilities()
            .contains(WifiCapabilities::ON_DEMAND_SCAN)
        {
            return Err(ApiError::NotSupported("on-demand wifi scans".into()));
        }
        self.subsystems
            .wifi
            .request_scan(caller, params, cookie)
            .map_err(Into::into)
    }

    fn gnss_capabilities(&self) -> GnssCapabilities {
        self.subsystems.gnss.capabilities()
    }

    fn gnss_location_session_start(
        &mut self,
        min_interval: Duration,
        cookie: Cookie,
    ) -> Result<(), ApiError> {
        let caller = self.caller()?;
        if !self.gnss_capabilities().contains(GnssCapabilities::LOCATION) {
            return Err(ApiError::NotSupported("gnss location sessions".into()));
        }
        self.subsystems
            .gnss
            .start_location_session(self.event_loop, caller, min_interval, cookie)
            .map_err(Into::into)
    }

    fn gnss_location_session_stop(&mut self, cookie: Cookie) -> Result<(), ApiError> {
        let caller = self.caller()?;
        if !self.gnss_capabilities().contains(GnssCapabilities::LOCATION) {
            return Err(ApiError::NotSupported("gnss location sessions".into()));
        }
        self.subsystems
            .gnss
            .stop_location_session(self.event_loop, caller, cookie)
            .map_err(Into::into)
    }

    fn wwan_capabilities(&self) -> WwanCapabilities {
        self.subsystems.wwan.capabilities()
    }

    fn wwan_get_cell_info(&mut self, cookie: Cookie) -> Result<(), ApiError> {
        let caller = self.caller()?;
        if !self
            .wwan_capabilities()
            .contains(WwanCapabilities::GET_CELL_INFO)
        {
            return Err(ApiError::NotSupported("wwan cell info".into()));
        }
        self.subsystems
            .wwan
            .request_cell_info(caller, cookie)
            .map_err(Into::into)
    }
}
