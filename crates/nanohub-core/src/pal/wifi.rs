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
use crate::wifi::{WifiCapabilities, WifiScanEvent, WifiScanParams};
use std::sync::Arc;

/// Entry points the wifi backend calls, from any thread.
///
/// Status callbacks are only sent in answer to an accepted request.
pub trait WifiPalCallbacks: Send + Sync {
    /// Result of [`WifiPal::configure_scan_monitor`].
    fn scan_monitor_status_change(&self, enabled: bool, error_code: ErrorCode);

    /// Result of [`WifiPal::request_scan`]. `pending` means scan events follow.
    fn scan_response(&self, pending: bool, error_code: ErrorCode);

    /// Delivers scan results. Ownership passes to the runtime until
    /// [`WifiPal::release_scan_event`].
    ///
    /// ## Errors
    /// Hands the event back if the runtime could not take it.
    fn scan_event(&self, event: WifiScanEvent) -> Result<(), WifiScanEvent>;
}

/// The wifi backend.
pub trait WifiPal: Send {
    /// Connects the backend to the runtime.
    fn open(&mut self, callbacks: Arc<dyn WifiPalCallbacks>) -> bool;

    /// Disconnects. No callback may be invoked after this returns.
    fn close(&mut self);

    /// Supported features.
    fn capabilities(&self) -> WifiCapabilities;

    /// Asks for unsolicited scan results to be enabled or disabled. `true`
    /// means accepted, with the outcome reported through
    /// [`WifiPalCallbacks::scan_monitor_status_change`].
    fn configure_scan_monitor(&mut self, enable: bool) -> bool;

    /// Asks for an active scan. `true` means accepted, with the outcome
    /// reported through [`WifiPalCallbacks::scan_response`].
    fn request_scan(&mut self, params: &WifiScanParams) -> bool;

    /// Returns a scan event once every recipient has processed it.
    fn release_scan_event(&mut self, event: WifiScanEvent);
}
