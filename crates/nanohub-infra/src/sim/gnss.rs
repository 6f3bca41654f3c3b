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
use nanohub_core::gnss::{GnssCapabilities, GnssLocationEvent};
use nanohub_core::pal::{GnssPal, GnssPalCallbacks};
use nanohub_core::ErrorCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct State {
    open: bool,
    accept: bool,
    auto_complete: bool,
    session_enabled: bool,
    session_calls: Vec<(bool, Duration)>,
    released: usize,
    callbacks: Option<Arc<dyn GnssPalCallbacks>>,
}

/// Control handle of a [`SimGnssPal`].
#[derive(Clone)]
pub struct SimGnssControl {
    state: Arc<Mutex<State>>,
}

impl SimGnssControl {
    /// Whether session changes are accepted.
    pub fn set_accept(&self, accept: bool) {
        lock(&self.state).accept = accept;
    }

    /// Whether accepted changes complete from inside the request call.
    pub fn set_auto_complete(&self, auto_complete: bool) {
        lock(&self.state).auto_complete = auto_complete;
    }

    /// Arguments of every session call, accepted or not.
    pub fn session_calls(&self) -> Vec<(bool, Duration)> {
        lock(&self.state).session_calls.clone()
    }

    /// Whether the simulated session is running.
    pub fn session_enabled(&self) -> bool {
        lock(&self.state).session_enabled
    }

    /// Location events handed back by the runtime, released or refused.
    pub fn released_count(&self) -> usize {
        lock(&self.state).released
    }

    /// Whether the runtime holds the backend open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn callbacks(&self) -> Option<Arc<dyn GnssPalCallbacks>> {
        lock(&self.state).callbacks.clone()
    }

    /// Completes a session change. Returns `false` if closed.
    pub fn complete_session(&self, enabled: bool, error_code: ErrorCode) -> bool {
        if error_code.is_success() {
            lock(&self.state).session_enabled = enabled;
        }
        self.callbacks()
            .map(|callbacks| callbacks.location_status_change(enabled, error_code))
            .is_some()
    }

    /// Delivers a fix. Returns `false` if closed.
    pub fn emit_location(&self, event: GnssLocationEvent) -> bool {
        let Some(callbacks) = self.callbacks() else {
            return false;
        };
        if callbacks.location_event(event).is_err() {
            lock(&self.state).released += 1;
        }
        true
    }
}

/// A GNSS backend supporting location sessions.
pub struct SimGnssPal {
    state: Arc<Mutex<State>>,
}

impl Default for SimGnssPal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimGnssPal {
    /// A backend with location support.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                open: false,
                accept: true,
                auto_complete: true,
                session_enabled: false,
                session_calls: Vec::new(),
                released: 0,
                callbacks: None,
            })),
        }
    }

    /// A control handle sharing this backend's state.
    pub fn control(&self) -> SimGnssControl {
        SimGnssControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl GnssPal for SimGnssPal {
    fn open(&mut self, callbacks: Arc<dyn GnssPalCallbacks>) -> bool {
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

    fn capabilities(&self) -> GnssCapabilities {
        GnssCapabilities::LOCATION
    }

    fn control_location_session(&mut self, enable: bool, min_interval: Duration) -> bool {
        let auto_complete = {
            let mut state = lock(&self.state);
            state.session_calls.push((enable, min_interval));
            if !state.accept {
                return false;
            }
            state.auto_complete
        };
        if auto_complete {
            self.control().complete_session(enable, ErrorCode::None);
        }
        true
    }

    fn release_location_event(&mut self, _event: GnssLocationEvent) {
        lock(&self.state).released += 1;
    }
}
