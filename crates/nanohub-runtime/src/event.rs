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

//! The event envelope, its release contract, and the bounded event pool.

use crate::context::RuntimeContext;
use nanohub_core::event::{EventPayload, EventType, EVENT_SYSTEM_CALLBACK_BASE};
use nanohub_core::InstanceId;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs exactly once, on the loop thread, after the last recipient processed
/// the event (or immediately if it had none). Receives the payload back.
pub type ReleaseCallback =
    Box<dyn FnOnce(&mut RuntimeContext<'_>, EventType, Option<EventPayload>) + Send>;

/// Boxes a closure as a [`ReleaseCallback`].
pub fn release_callback<F>(f: F) -> ReleaseCallback
where
    F: FnOnce(&mut RuntimeContext<'_>, EventType, Option<EventPayload>) + Send + 'static,
{
    Box::new(f)
}

/// One message in flight through the loop.
///
/// Recipients only ever see the payload by shared reference. The release
/// callback owns the payload's fate once delivery is complete.
pub struct Event {
    /// Type tag.
    pub event_type: EventType,
    /// Opaque payload.
    pub data: Option<EventPayload>,
    /// Runs once when the event is freed.
    pub release: Option<ReleaseCallback>,
    /// Who posted it. [`InstanceId::SYSTEM`] for the runtime.
    pub sender: InstanceId,
    /// A nanoapp, [`InstanceId::BROADCAST`], or [`InstanceId::SYSTEM`] for
    /// events consumed by their release callback alone.
    pub target: InstanceId,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &format_args!("0x{:04x}", self.event_type))
            .field("has_data", &self.data.is_some())
            .field("has_release", &self.release.is_some())
            .field("sender", &self.sender)
            .field("target", &self.target)
            .finish()
    }
}

/// What travels through the dispatch queue.
pub(crate) enum QueueItem {
    Event(Event),
    /// Wakes a blocked loop so it can observe the cleared running flag.
    Stop,
}

impl QueueItem {
    pub(crate) fn into_payload(self) -> Option<EventPayload> {
        match self {
            Self::Event(event) => event.data,
            Self::Stop => None,
        }
    }
}

/// Internal callbacks deferred onto the loop thread.
///
/// Each is posted as an event targeted at [`InstanceId::SYSTEM`], so no nanoapp
/// ever receives it and its release callback is the work itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SystemCallbackType {
    /// Finish loading a nanoapp on the loop thread.
    FinishLoadingNanoapp = 1,
    /// Unload a nanoapp on the loop thread.
    UnloadNanoapp,
    /// Cache the latest sample of an on-change sensor.
    SensorLastEventUpdate,
    /// The wifi scan monitor changed state.
    WifiScanMonitorStateChange,
    /// The wifi platform answered an active scan request.
    WifiRequestScanResponse,
    /// The wifi platform delivered scan results.
    WifiHandleScanEvent,
    /// The GNSS location session changed state.
    GnssSessionStatusChange,
    /// The GNSS platform delivered a fix.
    GnssLocationReportEvent,
    /// The WWAN platform delivered cell info.
    WwanHandleCellInfoResult,
    /// Arbitrary work posted by the host.
    HostCallback,
}

impl SystemCallbackType {
    /// The event type used for this callback.
    pub fn event_type(self) -> EventType {
        EVENT_SYSTEM_CALLBACK_BASE + self as u16
    }
}

/// Bounds the number of live events.
///
/// An event occupies a slot from the moment it is posted until its release
/// callback has run. Allocation never blocks.
#[derive(Debug)]
pub struct EventPool {
    capacity: usize,
    live: AtomicUsize,
    high_water: AtomicUsize,
}

impl EventPool {
    /// Creates a pool of `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            live: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Claims a slot. Returns `false` when every slot is live.
    pub fn try_allocate(&self) -> bool {
        let claimed = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.capacity).then_some(live + 1)
            });
        match claimed {
            Ok(previous) => {
                self.high_water.fetch_max(previous + 1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns a slot.
    pub fn deallocate(&self) {
        let released = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| live.checked_sub(1));
        if released.is_err() {
            log::error!("EventPool: deallocate called with no live events");
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live events.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// The highest number of simultaneously live events seen.
    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}
