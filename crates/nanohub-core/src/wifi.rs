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

//! Wifi scan types.

use crate::time::Nanoseconds;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `request_type` of the async result answering a scan monitor change.
pub const WIFI_REQUEST_TYPE_CONFIGURE_SCAN_MONITOR: u8 = 1;
/// `request_type` of the async result answering an active scan request.
pub const WIFI_REQUEST_TYPE_REQUEST_SCAN: u8 = 2;

bitflags! {
    /// What the wifi platform supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WifiCapabilities: u32 {
        /// Unsolicited scan results can be delivered.
        const SCAN_MONITORING = 1 << 0;
        /// Active scans can be requested.
        const ON_DEMAND_SCAN = 1 << 1;
    }
}

/// The kind of scan to perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiScanType {
    /// Active scan on non-DFS channels.
    #[default]
    Active,
    /// Active scan plus passive scan on DFS channels.
    ActivePlusPassiveDfs,
    /// Passive scan only.
    Passive,
}

/// Parameters of an active scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiScanParams {
    /// Kind of scan.
    pub scan_type: WifiScanType,
    /// Cached results younger than this may be returned instead of scanning.
    pub max_scan_age: Duration,
    /// Frequencies to scan in MHz; empty means all.
    pub frequencies: Vec<u32>,
    /// SSIDs to scan for; empty means a wildcard scan.
    pub ssids: Vec<String>,
}

impl Default for WifiScanParams {
    fn default() -> Self {
        Self {
            scan_type: WifiScanType::Active,
            max_scan_age: Duration::from_secs(5),
            frequencies: Vec::new(),
            ssids: Vec::new(),
        }
    }
}

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiScanResult {
    /// Network name.
    pub ssid: String,
    /// Access point MAC address.
    pub bssid: [u8; 6],
    /// Received signal strength in dBm.
    pub rssi: i8,
    /// Primary channel frequency in MHz.
    pub primary_frequency: u32,
}

/// The payload of `EVENT_WIFI_SCAN_RESULT`.
///
/// The results of one scan may be split across several events delivered back
/// to back; `result_count` counts the results in this event and `result_total`
/// the results of the whole scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiScanEvent {
    /// Results carried by this event.
    pub result_count: u8,
    /// Results in the whole scan.
    pub result_total: u8,
    /// Kind of scan that produced the results.
    pub scan_type: WifiScanType,
    /// Time the scan completed.
    pub reference_time: Nanoseconds,
    /// The results.
    pub results: Vec<WifiScanResult>,
}

impl WifiScanEvent {
    /// A single-event scan with the given results.
    pub fn complete(scan_type: WifiScanType, results: Vec<WifiScanResult>) -> Self {
        let count = u8::try_from(results.len()).unwrap_or(u8::MAX);
        Self {
            result_count: count,
            result_total: count,
            scan_type,
            reference_time: Nanoseconds(0),
            results,
        }
    }
}
