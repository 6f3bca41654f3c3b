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
use nanohub_core::pal::{WwanPal, WwanPalCallbacks};
use nanohub_core::wwan::{CellInfo, CellInfoResult, WwanCapabilities};
use nanohub_core::ErrorCode;
use std::sync::{Arc, Mutex};

struct State {
    open: bool,
    accept: bool,
    auto_complete: bool,
    cells: Vec<CellInfo>,
    requests: usize,
    released: usize,
    callbacks: Option<Arc<dyn WwanPalCallbacks>>,
}

/// Control handle of a [`SimWwanPal`].
#[derive(Clone)]
pub struct SimWwanControl {
    state: Arc<Mutex<State>>,
}

impl SimWwanControl {
    /// Whether requests are accepted.
    pub fn set_accept(&self, accept: bool) {
        lock(&self.state).accept = accept;
    }

    /// Whether accepted requests complete from inside the request call.
    pub fn set_auto_complete(&self, auto_complete: bool) {
        lock(&self.state).auto_complete = auto_complete;
    }

    /// Cells reported by automatically completed requests.
    pub fn set_cells(&self, cells: Vec<CellInfo>) {
        lock(&self.state).cells = cells;
    }

    /// Cell info requests so far, accepted or not.
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests
    }

    /// Results handed back by the runtime, released or refused.
    pub fn released_count(&self) -> usize {
        lock(&self.state).released
    }

    /// Whether the runtime holds the backend open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Delivers a result. Returns `false` if closed.
    pub fn complete(&self, result: CellInfoResult) -> bool {
        let Some(callbacks) = lock(&self.state).callbacks.clone() else {
            return false;
        };
        if callbacks.cell_info_result(result).is_err() {
            lock(&self.state).released += 1;
        }
        true
    }
}

/// A cellular backend answering cell info requests.
pub struct SimWwanPal {
    state: Arc<Mutex<State>>,
}

impl Default for SimWwanPal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWwanPal {
    /// A backend reporting no cells until told otherwise.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                open: false,
                accept: true,
                auto_complete: true,
                cells: Vec::new(),
                requests: 0,
                released: 0,
                callbacks: None,
            })),
        }
    }

    /// A control handle sharing this backend's state.
    pub fn control(&self) -> SimWwanControl {
        SimWwanControl {
            state: Arc::clone(&self.state),
        }
    }
}

impl WwanPal for SimWwanPal {
    fn open(&mut self, callbacks: Arc<dyn WwanPalCallbacks>) -> bool {
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

    fn capabilities(&self) -> WwanCapabilities {
        WwanCapabilities::GET_CELL_INFO
    }

    fn request_cell_info(&mut self) -> bool {
        let cells = {
            let mut state = lock(&self.state);
            state.requests += 1;
            if !state.accept {
                return false;
            }
            state.auto_complete.then(|| state.cells.clone())
        };
        if let Some(cells) = cells {
            self.control().complete(CellInfoResult {
                error_code: ErrorCode::None,
                cookie: 0,
                cells,
            });
        }
        true
    }

    fn release_cell_info_result(&mut self, _result: CellInfoResult) {
        lock(&self.state).released += 1;
    }
}
