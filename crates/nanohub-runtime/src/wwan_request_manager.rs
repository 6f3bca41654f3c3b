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

//! Cell info requests. One request may be outstanding at a time; its result
//! goes to the requesting nanoapp only.

use crate::error::WwanRequestError;
use crate::event::{release_callback, SystemCallbackType};
use crate::event_loop::EventLoop;
use crate::handle::RuntimeHandle;
use nanohub_core::event::{EventPayload, EVENT_WWAN_CELL_INFO_RESULT};
use nanohub_core::pal::{WwanPal, WwanPalCallbacks};
use nanohub_core::wwan::{CellInfoResult, WwanCapabilities};
use nanohub_core::{Cookie, InstanceId};
use std::sync::Arc;

/// Arbitrates nanoapp access to the cellular platform.
pub struct WwanRequestManager {
    pal: Box<dyn WwanPal>,
    capabilities: WwanCapabilities,
    requester: Option<(InstanceId, Cookie)>,
}

impl WwanRequestManager {
    /// Opens the platform.
    pub fn new(mut pal: Box<dyn WwanPal>, handle: RuntimeHandle) -> Self {
        let callbacks: Arc<dyn WwanPalCallbacks> = Arc::new(WwanPalBridge { handle });
        let capabilities = if pal.open(callbacks) {
            pal.capabilities()
        } else {
            log::error!("WwanRequestManager: Failed to open the WWAN platform");
            WwanCapabilities::empty()
        };
        Self {
            pal,
            capabilities,
            requester: None,
        }
    }

    /// What the platform supports. Empty if it failed to open.
    pub fn capabilities(&self) -> WwanCapabilities {
        self.capabilities
    }

    /// The nanoapp whose request is in flight.
    pub fn requester(&self) -> Option<InstanceId> {
        self.requester.map(|(nanoapp, _)| nanoapp)
    }

    /// Asks the platform for cell info on behalf of `nanoapp`.
    pub fn request_cell_info(&mut self, nanoapp: InstanceId, cookie: Cookie) -> Result<(), WwanRequestError> {
        if let Some((requester, _)) = self.requester {
            log::warn!("WwanRequestManager: Cell info request from {nanoapp} while {requester} waits");
            return Err(WwanRequestError::RequestInFlight);
        }
        if !self.pal.request_cell_info() {
            log::warn!("WwanRequestManager: Platform rejected cell info request from {nanoapp}");
            return Err(WwanRequestError::PlatformRejected);
        }
        self.requester = Some((nanoapp, cookie));
        Ok(())
    }

    fn handle_cell_info_result_sync(&mut self, event_loop: &mut EventLoop, mut result: CellInfoResult) {
        let Some((nanoapp, cookie)) = self.requester.take() else {
            log::error!("WwanRequestManager: Cell info result with no request in flight");
            self.pal.release_cell_info_result(result);
            return;
        };
        result.cookie = cookie;
        let release = release_callback(|ctx, _, data| ctx.subsystems().wwan.release_cell_info_result(data));
        if let Some(result) =
            event_loop.post_owned_or_die(EVENT_WWAN_CELL_INFO_RESULT, result, release, nanoapp)
        {
            self.pal.release_cell_info_result(result);
        }
    }

    fn release_cell_info_result(&mut self, data: Option<EventPayload>) {
        match data.map(|data| data.downcast::<CellInfoResult>()) {
            Some(Ok(result)) => self.pal.release_cell_info_result(*result),
            Some(Err(_)) => log::error!("WwanRequestManager: Released payload is not a cell info result"),
            None => {}
        }
    }
}

impl Drop for WwanRequestManager {
    fn drop(&mut self) {
        self.pal.close();
    }
}

struct WwanPalBridge {
    handle: RuntimeHandle,
}

impl WwanPalCallbacks for WwanPalBridge {
    fn cell_info_result(&self, result: CellInfoResult) -> Result<(), CellInfoResult> {
        self.handle.defer_with_data_or_die(
            SystemCallbackType::WwanHandleCellInfoResult,
            result,
            |ctx, result| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems
                    .wwan
                    .handle_cell_info_result_sync(event_loop, result);
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::test_support::NullTimer;
    use nanohub_infra::sim::SimWwanPal;

    #[test]
    fn one_request_at_a_time() {
        let pal = SimWwanPal::new();
        let control = pal.control();
        control.set_auto_complete(false);
        let event_loop = EventLoop::new(&RuntimeConfig::default(), Box::new(NullTimer));
        let mut manager = WwanRequestManager::new(Box::new(pal), event_loop.handle());

        manager.request_cell_info(InstanceId(1), 5).unwrap();
        assert_eq!(
            manager.request_cell_info(InstanceId(2), 6),
            Err(WwanRequestError::RequestInFlight)
        );
        assert_eq!(manager.requester(), Some(InstanceId(1)));
        assert_eq!(control.request_count(), 1);
    }
}
