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

//! Shared fixtures: a scriptable nanoapp that journals what it sees, and a
//! runtime built on the simulated platform.

#![allow(dead_code)]

use nanohub_core::event::{payload_as, EventType, EVENT_TIMER};
use nanohub_core::gnss::GnssLocationEvent;
use nanohub_core::sensor::SensorSampleData;
use nanohub_core::wifi::WifiScanEvent;
use nanohub_core::wwan::CellInfoResult;
use nanohub_core::{AppId, AsyncResult, ChreApi, Cookie, InstanceId, Nanoapp, NanoappInfo};
use nanohub_infra::sim::{
    SimGnssControl, SimGnssPal, SimSensorControl, SimSensorPal, SimWifiControl, SimWifiPal,
    SimWwanControl, SimWwanPal,
};
use nanohub_infra::StdSystemTimer;
use nanohub_runtime::{EventLoopManager, Platform, RuntimeConfig};
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// What a payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Cookie(Cookie),
    AsyncResult(AsyncResult),
    Samples(SensorSampleData),
    Scan(WifiScanEvent),
    Location(GnssLocationEvent),
    Cells(CellInfoResult),
    Other,
}

impl Payload {
    fn capture(event_type: EventType, data: Option<&(dyn Any + Send)>) -> Self {
        if data.is_none() {
            return Payload::None;
        }
        if event_type == EVENT_TIMER {
            if let Some(cookie) = payload_as::<Cookie>(data) {
                return Payload::Cookie(*cookie);
            }
        }
        if let Some(result) = payload_as::<AsyncResult>(data) {
            return Payload::AsyncResult(result.clone());
        }
        if let Some(samples) = payload_as::<SensorSampleData>(data) {
            return Payload::Samples(samples.clone());
        }
        if let Some(scan) = payload_as::<WifiScanEvent>(data) {
            return Payload::Scan(scan.clone());
        }
        if let Some(location) = payload_as::<GnssLocationEvent>(data) {
            return Payload::Location(location.clone());
        }
        if let Some(cells) = payload_as::<CellInfoResult>(data) {
            return Payload::Cells(cells.clone());
        }
        if let Some(value) = payload_as::<u32>(data) {
            return Payload::Cookie(u64::from(*value));
        }
        Payload::Other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Started(InstanceId),
    Event {
        sender: InstanceId,
        event_type: EventType,
        payload: Payload,
    },
    Ended(InstanceId),
}

/// Everything one test nanoapp observed, shared with the test body.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<(EventType, Payload)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Event {
                    event_type,
                    payload,
                    ..
                } => Some((event_type, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn events_of(&self, event_type: EventType) -> Vec<Payload> {
        self.events()
            .into_iter()
            .filter(|(ty, _)| *ty == event_type)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn timer_cookies(&self) -> Vec<Cookie> {
        self.events_of(EVENT_TIMER)
            .into_iter()
            .filter_map(|payload| match payload {
                Payload::Cookie(cookie) => Some(cookie),
                _ => None,
            })
            .collect()
    }

    pub fn async_results(&self, event_type: EventType) -> Vec<AsyncResult> {
        self.events_of(event_type)
            .into_iter()
            .filter_map(|payload| match payload {
                Payload::AsyncResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn ended(&self) -> bool {
        self.entries()
            .iter()
            .any(|entry| matches!(entry, Entry::Ended(_)))
    }
}

type StartHook = Box<dyn FnMut(&mut dyn ChreApi) -> bool + Send>;
type EventHook =
    Box<dyn FnMut(&mut dyn ChreApi, InstanceId, EventType, Option<&(dyn Any + Send)>) + Send>;

/// A nanoapp whose behavior is supplied by the test.
pub struct TestApp {
    info: NanoappInfo,
    journal: Journal,
    on_start: Option<StartHook>,
    on_event: Option<EventHook>,
}

impl TestApp {
    pub fn new(app_id: AppId) -> (Self, Journal) {
        let journal = Journal::default();
        let app = Self {
            info: NanoappInfo::new(app_id, 1, format!("test-{app_id:x}")),
            journal: journal.clone(),
            on_start: None,
            on_event: None,
        };
        (app, journal)
    }

    pub fn on_start(mut self, hook: impl FnMut(&mut dyn ChreApi) -> bool + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_event(
        mut self,
        hook: impl FnMut(&mut dyn ChreApi, InstanceId, EventType, Option<&(dyn Any + Send)>)
            + Send
            + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(hook));
        self
    }

    /// Subscribes to `event_type` when started.
    pub fn subscribed_to(self, event_type: EventType) -> Self {
        self.on_start(move |chre| {
            chre.register_broadcast_event(event_type);
            true
        })
    }

    pub fn boxed(self) -> Box<dyn Nanoapp> {
        Box::new(self)
    }
}

impl Nanoapp for TestApp {
    fn info(&self) -> NanoappInfo {
        self.info.clone()
    }

    fn start(&mut self, chre: &mut dyn ChreApi) -> bool {
        self.journal.push(Entry::Started(chre.instance_id()));
        match self.on_start.as_mut() {
            Some(hook) => hook(chre),
            None => true,
        }
    }

    fn handle_event(
        &mut self,
        chre: &mut dyn ChreApi,
        sender: InstanceId,
        event_type: EventType,
        data: Option<&(dyn Any + Send)>,
    ) {
        self.journal.push(Entry::Event {
            sender,
            event_type,
            payload: Payload::capture(event_type, data),
        });
        if let Some(hook) = self.on_event.as_mut() {
            hook(chre, sender, event_type, data);
        }
    }

    fn end(&mut self, chre: &mut dyn ChreApi) {
        self.journal.push(Entry::Ended(chre.instance_id()));
    }
}

/// Control handles of the simulated backends behind a test runtime.
pub struct SimControls {
    pub sensor: SimSensorControl,
    pub wifi: SimWifiControl,
    pub gnss: SimGnssControl,
    pub wwan: SimWwanControl,
}

pub fn runtime_with(config: RuntimeConfig) -> (EventLoopManager, SimControls) {
    let _ = nanohub_infra::try_init_logging("debug");
    let sensor = SimSensorPal::with_default_sensors();
    let wifi = SimWifiPal::new();
    let gnss = SimGnssPal::new();
    let wwan = SimWwanPal::new();
    let controls = SimControls {
        sensor: sensor.control(),
        wifi: wifi.control(),
        gnss: gnss.control(),
        wwan: wwan.control(),
    };
    let platform = Platform {
        system_timer: Box::new(StdSystemTimer::new()),
        sensor: Box::new(sensor),
        wifi: Box::new(wifi),
        gnss: Box::new(gnss),
        wwan: Box::new(wwan),
    };
    let manager = EventLoopManager::new(config, platform).expect("runtime");
    (manager, controls)
}

pub fn runtime() -> (EventLoopManager, SimControls) {
    runtime_with(RuntimeConfig::default())
}

/// Drives the loop until `done` holds or `timeout` passes.
pub fn run_until(manager: &mut EventLoopManager, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        manager.run_until_idle();
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
