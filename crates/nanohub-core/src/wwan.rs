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

//! Cellular (WWAN) types.

use crate::api::{Cookie, ErrorCode};
use crate::time::Nanoseconds;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What the WWAN platform supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WwanCapabilities: u32 {
        /// Cell info requests.
        const GET_CELL_INFO = 1 << 0;
    }
}

/// Radio access technology of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellInfoType {
    /// GSM.
    Gsm,
    /// CDMA.
    Cdma,
    /// LTE.
    Lte,
    /// WCDMA.
    Wcdma,
    /// TD-SCDMA.
    TdScdma,
}

/// One visible cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    /// Radio access technology.
    pub cell_type: CellInfoType,
    /// Time the cell was observed.
    pub timestamp: Nanoseconds,
    /// Whether the device is registered on this cell.
    pub registered: bool,
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u16,
    /// Cell identity.
    pub cell_id: u32,
    /// Signal strength in dBm.
    pub signal_strength_dbm: i32,
}

/// The payload of `EVENT_WWAN_CELL_INFO_RESULT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfoResult {
    /// [`ErrorCode::None`] on success.
    pub error_code: ErrorCode,
    /// The cookie of the request; filled in by the runtime.
    pub cookie: Cookie,
    /// Visible cells.
    pub cells: Vec<CellInfo>,
}
