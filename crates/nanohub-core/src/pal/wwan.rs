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

use crate::wwan::{CellInfoResult, WwanCapabilities};
use std::sync::Arc;

/// Entry points the WWAN backend calls, from any thread.
pub trait WwanPalCallbacks: Send + Sync {
    /// Result of [`WwanPal::request_cell_info`]. Ownership passes to the
    /// runtime until [`WwanPal::release_cell_info_result`].
    ///
    /// ## Errors
    /// Hands the result back if the runtime could not take it.
    fn cell_info_result(&self, result: CellInfoResult) -> Result<(), CellInfoResult>;
}

/// The WWAN backend.
pub trait WwanPal: Send {
    /// Connects the backend to the runtime.
    fn open(&mut self, callbacks: Arc<dyn WwanPalCallbacks>) -> bool;

    /// Disconnects. No callback may be invoked after this returns.
    fn close(&mut self);

    /// Supported features.
    fn capabilities(&self) -> WwanCapabilities;

    /// Asks for cell information. `true` means accepted.
    fn request_cell_info(&mut self) -> bool;

    /// Returns a result once its recipient has processed it.
    fn release_cell_info_result(&mut self, result: CellInfoResult);
}
