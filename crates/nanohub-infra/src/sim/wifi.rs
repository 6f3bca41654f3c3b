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

use super::lock;
use nanohub_core::pal::{WifiPal, WifiPalCallbacks};
use nanohub_core::wifi::{WifiCapabilities, WifiScanEvent, WifiScanParams, WifiScanResult};
use nanohub_core::ErrorCode;
use std::sync::{Arc, Mutex};

struct State {
    open: bool,
    accept: bool,
    auto_complete: bool,
    capabilities: WifiCapabilities,
    monitor_enabled: bool,
    monitor_calls: Vec<bool>,
    scan_requests: usize,
    scan_results: Vec<WifiScanResult>,
    released: usize,
    callbacks: Option<Arc<dyn WifiPalCallbacks>>,
}

/// Control handle of a [`SimWifiPal`].
#[derive(Clone)]
pub struct SimWifiControl {
    state: Arc<Mutex<State>>,
}

impl SimWifiControl {
    /// Whether requests are accepted.
    pub fn set_accept(&self, accept: bool) {
        lock(&self.state).accept = accept;
    }

    /// Whether accepted requests complete from inside the request call.
    pub fn set_auto_complete(&self, auto_complete: bool) {
        lock(&self.state).auto_complete = auto_complete;
    }

    /// Results returned by automatically completed scans.
    pub fn set_scan_results(&self, results: Vec<WifiScanResult>) {
        lock(&self.state).scan_results = results;
    }

    /// The `enable` argument of every scan monitor call, accepted or not.
    pub fn scan_monitor_calls(&self) -> Vec<bool> {
        lock(&self.state).monitor_calls.clone()
    }

    /// Active scan requests so far, accepted or not.
    pub fn scan_request_count(&self) -> usize {
        lock(&self.state).scan_requests
    }

    /// Whether the simulated scan monitor is on.
    pub fn monitor_enabled(&self) -> bool {
        lock(&self.state).monitor_enabled
    }

    /// Scan events handed back by the runtime, released or refused.
    pub fn released_count(&self) -> usize {
        lock(&self.state).released
    }

    /// Whether the runtime holds the backend open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn callbacks(&self) -> Option<Arc<dyn WifiPalCallbacks>> {
        lock(&self.state).callbacks.clone()
    }

    /// Completes a scan monitor change. Returns `false` if closed.
    pub fn complete_scan_monitor(&self, enabled: bool, error_code: ErrorCode) -> bool {
        if error_code.is_success() {
            lock(&self.state).monitor_enabled = enabled;
        }
        self.callbacks()
            .map(|callbacks| callbacks.scan_monitor_status_change(enabled, error_code))
            .is_some()
    }

    /// Answers an active scan request. Returns `false` if closed.
    pub fn complete_scan_response(&self, pending: bool, error_code: ErrorCode) -> bool {
        self.callbacks()
            .map(|callbacks| callbacks.scan_response(pending, error_code))
            .is_some()
    }

    /// Delivers scan results. Returns `false` if closed.
    pub fn emit_scan_event(&self, event: WifiScanEvent) -> bool {
        let Some(callbacks) = self.callbacks() else {
            return false;
        };
        if callbacks.scan_event(event).is_err() {
            lock(&self.state).released += 1;
        }
        true
    }
}

/// A wifi backend supporting scan monitoring and on-demand scans.
pub struct SimWifiPal {
    state: Arc<Mutex<State>>,
}

impl Default for SimWifiPal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWifiPal {
    /// A backend with every capability.
    pub fn new() -> Self {
        Self::with_capabilities(WifiCapabilities::all())
    }

    /// A backend reporting `capabilities`.
    pub fn with_capabilities(capabilities: WifiCapabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                open: false,
                accept: true,
                auto_complete: true,
                capabilities,
                monitor_enabled: false,
                monitor_calls: Vec::new(),
                scan_requests: 0,
                scan_results: Vec::new(),
                released: 0,
                callbacks: None,
            })),
        }
    }

    /// A control handle sharing this backend's state.
    pub fn control(&self) -> SimWifiControl {
        SimWifiControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl WifiPal for SimWifiPal {
    fn open(&mut self, callbacks: Arc<dyn WifiPalCallbacks>) -> bool {
        let mut state = lock(&self.state);
        state.open = true;
        state.callbacks = Some(callbacks);
        true
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.callbacks = None;
    }

    fn capabilities(&self) -> WifiCapabilities {
        lock(&self.state).capabilities
    }

    fn configure_scan_monitor(&mut self, enable: bool) -> bool {
        let auto_complete = {
            let mut state = lock(&self.state);
            state.monitor_calls.push(enable);
            if !state.accept {
                return false;
            }
            state.auto_complete
        };
        if auto_complete {
            self.control().complete_scan_monitor(enable, ErrorCode::None);
        }
        true
    }

    fn request_scan(&mut self, params: &WifiScanParams) -> bool {
        let results = {
            let mut state = lock(&self.state);
            state.scan_requests += 1;
            if !state.accept {
                return false;
            }
            state.auto_complete.then(|| state.scan_results.clone())
        };
        if let Some(results) = results {
            let control = self.control();
            control.complete_scan_response(true, ErrorCode::None);
            control.emit_scan_event(WifiScanEvent::complete(params.scan_type, results));
        }
        true
    }

    fn release_scan_event(&mut self, _event: WifiScanEvent) {
        lock(&self.state).released += 1;
    }
}
