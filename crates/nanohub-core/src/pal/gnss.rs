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

use crate::api::ErrorCode;
use crate::gnss::{GnssCapabilities, GnssLocationEvent};
use std::sync::Arc;
use std::time::Duration;

/// Entry points the GNSS backend calls, from any thread.
pub trait GnssPalCallbacks: Send + Sync {
    /// Result of [`GnssPal::control_location_session`].
    fn location_status_change(&self, enabled: bool, error_code: ErrorCode);

    /// Delivers a fix. Ownership passes to the runtime until
    /// [`GnssPal::release_location_event`].
    ///
    /// ## Errors
    /// Hands the fix back if the runtime could not take it.
    fn location_event(&self, event: GnssLocationEvent) -> Result<(), GnssLocationEvent>;
}

/// The GNSS backend.
pub trait GnssPal: Send {
    /// Connects the backend to the runtime.
    fn open(&mut self, callbacks: Arc<dyn GnssPalCallbacks>) -> bool;

    /// Disconnects. No callback may be invoked after this returns.
    fn close(&mut self);

    /// Supported features.
    fn capabilities(&self) -> GnssCapabilities;

    /// Starts, reconfigures or stops the location session. `true` means
    /// accepted, with the outcome reported through
    /// [`GnssPalCallbacks::location_status_change`].
    fn control_location_session(&mut self, enable: bool, min_interval: Duration) -> bool;

    /// Returns a fix once every recipient has processed it.
    fn release_location_event(&mut self, event: GnssLocationEvent);
}
