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

//! Simulated platform backends.
//!
//! Each backend comes with a cloneable control handle. Tests and demos use it
//! to accept or reject requests, to complete asynchronous requests by hand,
//! to inject data, and to inspect what the runtime asked for. By default
//! asynchronous requests complete immediately and successfully, from inside
//! the request call.

mod gnss;
mod sensor;
mod wifi;
mod wwan;

pub use self::gnss::{SimGnssControl, SimGnssPal};
pub use self::sensor::{SimSensorControl, SimSensorPal};
pub use self::wifi::{SimWifiControl, SimWifiPal};
pub use self::wwan::{SimWwanControl, SimWwanPal};

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
