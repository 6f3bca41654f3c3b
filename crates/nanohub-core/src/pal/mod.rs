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

//! Platform abstraction layer (PAL) contracts.
//!
//! Each resource type is reached through a narrow request trait the runtime
//! calls on its own thread, plus a callbacks trait the backend invokes from any
//! thread to report completions and deliver data. Buffers handed over through a
//! callback belong to the runtime until it passes them back to the matching
//! `release_*` method.

mod gnss;
mod sensor;
mod timer;
mod wifi;
mod wwan;

pub use self::gnss::{GnssPal, GnssPalCallbacks};
pub use self::sensor::{PlatformSensor, SensorPal, SensorPalCallbacks};
pub use self::timer::{SystemTimer, TimerCallback};
pub use self::wifi::{WifiPal, WifiPalCallbacks};
pub use self::wwan::{WwanPal, WwanPalCallbacks};
