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

//! Event vocabulary and the bounded channel primitive used for dispatch.
//!
//! Event types are plain `u16` values. The ranges follow the nanoapp API
//! numbering: system events first, then one block per resource type, and the
//! range starting at [`EVENT_FIRST_USER_VALUE`] reserved for nanoapp-defined
//! events and runtime-internal system callbacks.

mod bus;

pub use self::bus::EventBus;

use std::any::Any;

/// The type tag carried by every event.
pub type EventType = u16;

/// The opaque payload of an event.
///
/// Recipients observe it by shared reference and downcast to the concrete type
/// they expect; ownership returns to the release callback once the last
/// recipient is done with it.
pub type EventPayload = Box<dyn Any + Send>;

/// A release callback supplied by a nanoapp when sending an event.
///
/// Runs exactly once, on the event loop thread, after the last recipient has
/// processed the event. Receives the payload back.
pub type AppReleaseCallback = Box<dyn FnOnce(EventType, Option<EventPayload>) + Send>;

/// A message delivered from the host processor.
pub const EVENT_MESSAGE_FROM_HOST: EventType = 0x0001;
/// A timer set through `set_timer` expired. The payload is the timer's cookie.
pub const EVENT_TIMER: EventType = 0x0002;
/// A nanoapp was started.
pub const EVENT_NANOAPP_STARTED: EventType = 0x0003;
/// A nanoapp was stopped.
pub const EVENT_NANOAPP_STOPPED: EventType = 0x0004;

/// First sensor event. Sample events are `EVENT_SENSOR_DATA_BASE + sensor type`.
pub const EVENT_SENSOR_DATA_BASE: EventType = 0x0100;

/// Result of an asynchronous wifi request. Payload: [`crate::AsyncResult`].
pub const EVENT_WIFI_ASYNC_RESULT: EventType = 0x0300;
/// A batch of wifi scan results. Payload: [`crate::wifi::WifiScanEvent`].
pub const EVENT_WIFI_SCAN_RESULT: EventType = 0x0301;

/// Result of an asynchronous GNSS request. Payload: [`crate::AsyncResult`].
pub const EVENT_GNSS_ASYNC_RESULT: EventType = 0x0400;
/// A location fix. Payload: [`crate::gnss::GnssLocationEvent`].
pub const EVENT_GNSS_LOCATION: EventType = 0x0401;

/// Result of a cell info request. Payload: [`crate::wwan::CellInfoResult`].
pub const EVENT_WWAN_CELL_INFO_RESULT: EventType = 0x0500;

/// First of the event types reserved for the runtime's internal callbacks.
/// Never delivered to a nanoapp.
pub const EVENT_SYSTEM_CALLBACK_BASE: EventType = 0x7f00;

/// First value available to nanoapp-defined events.
pub const EVENT_FIRST_USER_VALUE: EventType = 0x8000;

/// Returns a payload reference downcast to `T`, if the types match.
pub fn payload_as<T: 'static>(data: Option<&(dyn Any + Send)>) -> Option<&T> {
    data.and_then(|d| d.downcast_ref::<T>())
}
