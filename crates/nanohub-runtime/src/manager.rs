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

//! Top-level ownership of a runtime instance.

use crate::config::RuntimeConfig;
use crate::context::RuntimeContext;
use crate::error::{PostEventError, StartNanoappError};
use crate::event::{ReleaseCallback, SystemCallbackType};
use crate::event_loop::EventLoop;
use crate::gnss_request_manager::GnssRequestManager;
use crate::handle::RuntimeHandle;
use crate::sensor::SensorRequestManager;
use crate::wifi_request_manager::WifiRequestManager;
use crate::wwan_request_manager::WwanRequestManager;
use anyhow::Context;
use nanohub_core::event::{EventPayload, EventType};
use nanohub_core::pal::{GnssPal, SensorPal, SystemTimer, WifiPal, WwanPal};
use nanohub_core::{fatal_error, ChreApi, InstanceId, Nanoapp};

/// The platform backends a runtime is built on.
pub struct Platform {
    /// Drives the timer pool.
    pub system_timer: Box<dyn SystemTimer>,
    /// Sensor backend.
    pub sensor: Box<dyn SensorPal>,
    /// Wifi backend.
    pub wifi: Box<dyn WifiPal>,
    /// GNSS backend.
    pub gnss: Box<dyn GnssPal>,
    /// Cellular backend.
    pub wwan: Box<dyn WwanPal>,
}

#[derive(Debug, Default)]
struct InstanceIdAllocator {
    last: u32,
}

impl InstanceIdAllocator {
    fn next(&mut self) -> InstanceId {
        self.last = self.last.wrapping_add(1);
        let id = InstanceId(self.last);
        if id.is_reserved() {
            fatal_error!("Exhausted instance ids");
        }
        id
    }
}

/// The request managers, owned next to the [`EventLoop`] and handed to every
/// callback through [`RuntimeContext`].
pub struct Subsystems {
    /// Sensor requests.
    pub sensors: SensorRequestManager,
    /// Wifi scan monitoring and scans.
    pub wifi: WifiRequestManager,
    /// GNSS location sessions.
    pub gnss: GnssRequestManager,
    /// Cell info requests.
    pub wwan: WwanRequestManager,
    instance_ids: InstanceIdAllocator,
}

impl Subsystems {
    /// Opens every backend and wires its callbacks to `handle`.
    pub fn new(
        config: &RuntimeConfig,
        handle: RuntimeHandle,
        sensor: Box<dyn SensorPal>,
        wifi: Box<dyn WifiPal>,
        gnss: Box<dyn GnssPal>,
        wwan: Box<dyn WwanPal>,
    ) -> Self {
        Self {
            sensors: SensorRequestManager::new(sensor, handle.clone()),
            wifi: WifiRequestManager::new(wifi, handle.clone(), config.max_scan_monitor_transitions),
            gnss: GnssRequestManager::new(gnss, handle.clone(), config.max_gnss_session_transitions),
            wwan: WwanRequestManager::new(wwan, handle),
            instance_ids: InstanceIdAllocator::default(),
        }
    }

    /// A fresh instance id. Running out of ids is fatal.
    pub fn next_instance_id(&mut self) -> InstanceId {
        self.instance_ids.next()
    }

    /// Drops every resource request of an unloading nanoapp.
    pub(crate) fn release_nanoapp(&mut self, event_loop: &mut EventLoop, instance_id: InstanceId) {
        self.sensors.remove_nanoapp(instance_id);
        self.wifi.remove_nanoapp(event_loop, instance_id);
        self.gnss.remove_nanoapp(event_loop, instance_id);
    }
}

/// A complete runtime: the event loop plus the request managers.
///
/// Dropping the manager ends every nanoapp still loaded, then closes the
/// platform backends.
pub struct EventLoopManager {
    subsystems: Subsystems,
    event_loop: EventLoop,
}

impl EventLoopManager {
    /// Builds a runtime on `platform`.
    pub fn new(config: RuntimeConfig, platform: Platform) -> anyhow::Result<Self> {
        config
            .validate()
            .context("Failed to create the event loop manager")?;
        let Platform {
            system_timer,
            sensor,
            wifi,
            gnss,
            wwan,
        } = platform;

        let event_loop = EventLoop::new(&config, system_timer);
        let subsystems = Subsystems::new(&config, event_loop.handle(), sensor, wifi, gnss, wwan);
        log::info!("EventLoopManager: Initialized with {config:?}");
        Ok(Self {
            subsystems,
            event_loop,
        })
    }

    /// A thread-safe handle to the loop.
    pub fn handle(&self) -> RuntimeHandle {
        self.event_loop.handle()
    }

    /// The event loop.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// The request managers.
    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    /// Loads a nanoapp. Call from the thread that runs the loop.
    pub fn start_nanoapp(&mut self, nanoapp: Box<dyn Nanoapp>) -> Result<InstanceId, StartNanoappError> {
        self.event_loop.start_nanoapp(&mut self.subsystems, nanoapp)
    }

    /// Unloads a nanoapp. Call from the thread that runs the loop.
    pub fn stop_nanoapp(&mut self, instance_id: InstanceId) -> bool {
        self.event_loop.stop_nanoapp(&mut self.subsystems, instance_id)
    }

    /// A fresh instance id.
    pub fn next_instance_id(&mut self) -> InstanceId {
        self.subsystems.next_instance_id()
    }

    /// Runs the loop on the calling thread until [`RuntimeHandle::stop`].
    pub fn run(&mut self) {
        self.event_loop.run(&mut self.subsystems);
    }

    /// Processes everything queued without blocking.
    pub fn run_until_idle(&mut self) -> usize {
        self.event_loop.run_until_idle(&mut self.subsystems)
    }

    /// Stops the loop and ends every nanoapp.
    pub fn shutdown(&mut self) {
        self.event_loop.stop();
        self.event_loop.shutdown(&mut self.subsystems);
    }

    /// Posts an event. See [`RuntimeHandle::post_event`].
    pub fn post_event(
        &self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<ReleaseCallback>,
        sender: InstanceId,
        target: InstanceId,
    ) -> Result<(), PostEventError> {
        self.event_loop
            .post_event(event_type, data, release, sender, target)
    }

    /// Runs `callback` on the loop thread. See [`RuntimeHandle::defer_callback`].
    pub fn defer_callback<F>(&self, callback_type: SystemCallbackType, callback: F) -> Result<(), PostEventError>
    where
        F: FnOnce(&mut RuntimeContext<'_>) + Send + 'static,
    {
        self.event_loop.handle().defer_callback(callback_type, callback)
    }

    /// Calls the API as the given nanoapp, outside any of its entry points.
    /// Returns `None` if it is not loaded.
    pub fn invoke_as<R>(&mut self, instance_id: InstanceId, f: impl FnOnce(&mut dyn ChreApi) -> R) -> Option<R> {
        if !self.event_loop.has_nanoapp(instance_id) {
            return None;
        }
        let mut ctx = RuntimeContext::new(&mut self.event_loop, &mut self.subsystems, Some(instance_id));
        Some(f(&mut ctx))
    }
}

impl Drop for EventLoopManager {
    fn drop(&mut self) {
        self.shutdown();
        log::info!("EventLoopManager: Shut down.");
    }
}
