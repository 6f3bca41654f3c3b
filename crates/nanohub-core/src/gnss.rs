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

//! GNSS location types.

use crate::time::Nanoseconds;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// `request_type` of the async result answering a session start.
pub const GNSS_REQUEST_TYPE_LOCATION_SESSION_START: u8 = 1;
/// `request_type` of the async result answering a session stop.
pub const GNSS_REQUEST_TYPE_LOCATION_SESSION_STOP: u8 = 2;

bitflags! {
    /// What the GNSS platform supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GnssCapabilities: u32 {
        /// Location sessions.
        const LOCATION = 1 << 0;
        /// Raw measurements.
        const MEASUREMENTS = 1 << 1;
    }
}

/// The payload of `EVENT_GNSS_LOCATION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssLocationEvent {
    /// Time of the fix.
    pub timestamp: Nanoseconds,
    /// Latitude in degrees.
    pub latitude_deg: f64,
    /// Longitude in degrees.
    pub longitude_deg: f64,
    /// Altitude above the WGS84 ellipsoid in meters.
    pub altitude_m: f32,
    /// Ground speed in meters per second.
    pub speed_mps: f32,
    /// Bearing in degrees.
    pub bearing_deg: f32,
    /// Estimated horizontal accuracy in meters.
    pub accuracy_m: f32,
}
