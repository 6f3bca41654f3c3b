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

//! The API surface the runtime exposes to nanoapps.

use crate::event::{AppReleaseCallback, EventPayload, EventType};
use crate::gnss::GnssCapabilities;
use crate::ids::{AppId, InstanceId, TimerHandle};
use crate::sensor::{SensorHandle, SensorInfo, SensorMode, SensorType};
use crate::time::Nanoseconds;
use crate::wifi::{WifiCapabilities, WifiScanParams};
use crate::wwan::WwanCapabilities;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An opaque value supplied by a nanoapp and echoed back in the matching
/// timer event or asynchronous result.
pub type Cookie = u64;

/// Error codes carried by asynchronous results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    /// No error occurred.
    None = 0,
    /// An unspecified failure.
    Error = 1,
    /// One or more supplied arguments were invalid.
    InvalidArgument = 2,
    /// The request cannot be serviced now because another one is in progress.
    Busy = 3,
    /// Not enough memory to service the request.
    NoMemory = 4,
    /// The platform does not support the request.
    NotSupported = 5,
    /// The request timed out.
    Timeout = 6,
    /// The function is disabled by the user.
    FunctionDisabled = 7,
}

impl ErrorCode {
    /// Maps a raw platform error value; unknown values become [`ErrorCode::Error`].
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            2 => Self::InvalidArgument,
            3 => Self::Busy,
            4 => Self::NoMemory,
            5 => Self::NotSupported,
            6 => Self::Timeout,
            7 => Self::FunctionDisabled,
            _ => Self::Error,
        }
    }

    /// Returns `true` for [`ErrorCode::None`].
    pub fn is_success(self) -> bool {
        self == Self::None
    }
}

/// The payload of every `*_ASYNC_RESULT` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncResult {
    /// The request type this result answers (resource-specific constant).
    pub request_type: u8,
    /// Whether the request succeeded.
    pub success: bool,
    /// Details when `success` is false.
    pub error_code: ErrorCode,
    /// The cookie passed with the request.
    pub cookie: Cookie,
}

/// Errors a nanoapp can observe synchronously from an API call.
///
/// Failures that happen later, on the platform side, are only reported through
/// an [`AsyncResult`] event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The call was made outside of a nanoapp callback.
    #[error("API called outside of a nanoapp context")]
    InvalidContext,
    /// One or more arguments were rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The runtime or platform cannot service the request right now.
    #[error("busy: {0}")]
    Busy(String),
    /// A bounded queue or pool is full.
    #[error("out of capacity: {0}")]
    OutOfCapacity(String),
    /// The resource or feature is not available on this platform.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// The platform refused the request.
    #[error("rejected by platform: {0}")]
    Rejected(String),
    /// The runtime is shutting down.
    #[error("runtime is not running")]
    NotRunning,
}

/// The services available to a nanoapp while one of its entry points runs.
///
/// Every method acts on behalf of the nanoapp whose callback is executing. The
/// runtime hands a `&mut dyn ChreApi` to `start`, `handle_event` and `end`; it is
/// never shared across threads.
pub trait ChreApi {
    /// Instance id of the calling nanoapp.
    fn instance_id(&self) -> InstanceId;

    /// App id of the calling nanoapp.
    fn app_id(&self) -> AppId;

    /// Monotonic time since the runtime was created.
    fn time(&self) -> Nanoseconds;

    /// Sends an event to one nanoapp, or to every registered nanoapp when
    /// `target` is [`InstanceId::BROADCAST`].
    fn send_event(
        &mut self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<AppReleaseCallback>,
        target: InstanceId,
    ) -> Result<(), ApiError>;

    /// Subscribes the calling nanoapp to broadcasts of `event_type`.
    fn register_broadcast_event(&mut self, event_type: EventType);

    /// Unsubscribes the calling nanoapp from broadcasts of `event_type`.
    fn unregister_broadcast_event(&mut self, event_type: EventType);

    /// Schedules an [`crate::event::EVENT_TIMER`] carrying `cookie` after `duration`.
    fn set_timer(
        &mut self,
        duration: Duration,
        cookie: Cookie,
        one_shot: bool,
    ) -> Result<TimerHandle, ApiError>;

    /// Cancels a timer previously set by the calling nanoapp.
    fn cancel_timer(&mut self, handle: TimerHandle) -> Result<(), ApiError>;

    /// Looks up the handle of a sensor type, if the platform exposes it.
    fn find_sensor(&self, sensor_type: SensorType) -> Option<SensorHandle>;

    /// Returns static information about a sensor.
    fn sensor_info(&self, handle: SensorHandle) -> Option<SensorInfo>;

    /// Creates, updates or (with [`SensorMode::Off`]) removes the calling
    /// nanoapp's request for a sensor.
    fn configure_sensor(
        &mut self,
        handle: SensorHandle,
        mode: SensorMode,
        interval: Nanoseconds,
        latency: Nanoseconds,
    ) -> Result<(), ApiError>;

    /// Capabilities of the wifi platform.
    fn wifi_capabilities(&self) -> WifiCapabilities;

    /// Enables or disables unsolicited scan results for the calling nanoapp.
    fn wifi_configure_scan_monitor(&mut self, enable: bool, cookie: Cookie)
        -> Result<(), ApiError>;

    /// Requests an active wifi scan.
    fn wifi_request_scan(&mut self, params: &WifiScanParams, cookie: Cookie)
        -> Result<(), ApiError>;

    /// Capabilities of the GNSS platform.
    fn gnss_capabilities(&self) -> GnssCapabilities;

    /// Starts (or updates the interval of) the calling nanoapp's location session.
    fn gnss_location_session_start(
        &mut self,
        min_interval: Duration,
        cookie: Cookie,
    ) -> Result<(), ApiError>;

    /// Stops the calling nanoapp's location session.
    fn gnss_location_session_stop(&mut self, cookie: Cookie) -> Result<(), ApiError>;

    /// Capabilities of the WWAN platform.
    fn wwan_capabilities(&self) -> WwanCapabilities;

    /// Requests cell information.
    fn wwan_get_cell_info(&mut self, cookie: Cookie) -> Result<(), ApiError>;
}
