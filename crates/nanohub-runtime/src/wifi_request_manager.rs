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

//! Wifi scan monitoring and active scan requests.
//!
//! The scan monitor is a shared on/off resource: the platform is enabled while
//! at least one nanoapp wants unsolicited results. Configuration requests are
//! asynchronous; while one is outstanding at the platform, later requests wait
//! in a bounded transition queue and are resolved in order when it completes.
//! Only one active scan may be in flight at a time.

use crate::error::{PostEventError, WifiRequestError};
use crate::event::{release_callback, SystemCallbackType};
use crate::event_loop::EventLoop;
use crate::handle::RuntimeHandle;
use crate::transition_queue::TransitionQueue;
use nanohub_core::event::{EventPayload, EVENT_WIFI_ASYNC_RESULT, EVENT_WIFI_SCAN_RESULT};
use nanohub_core::pal::{WifiPal, WifiPalCallbacks};
use nanohub_core::wifi::{
    WifiCapabilities, WifiScanEvent, WifiScanParams, WIFI_REQUEST_TYPE_CONFIGURE_SCAN_MONITOR,
    WIFI_REQUEST_TYPE_REQUEST_SCAN,
};
use nanohub_core::{fatal_error, AsyncResult, Cookie, ErrorCode, InstanceId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanMonitorStateTransition {
    nanoapp: InstanceId,
    cookie: Cookie,
    enable: bool,
}

/// Arbitrates nanoapp access to the wifi platform.
pub struct WifiRequestManager {
    pal: Box<dyn WifiPal>,
    capabilities: WifiCapabilities,
    transitions: TransitionQueue<ScanMonitorStateTransition>,
    /// Nanoapps holding a scan monitor request, in request order.
    scan_monitor_nanoapps: Vec<InstanceId>,
    scan_monitor_enabled: bool,
    scan_requester: Option<(InstanceId, Cookie)>,
    /// Results of the accepted active scan have not all been delivered yet.
    scan_results_pending: bool,
    scan_result_count: usize,
}

impl WifiRequestManager {
    /// Opens the platform.
    pub fn new(mut pal: Box<dyn WifiPal>, handle: RuntimeHandle, max_transitions: usize) -> Self {
        let callbacks: Arc<dyn WifiPalCallbacks> = Arc::new(WifiPalBridge { handle });
        let capabilities = if pal.open(callbacks) {
            pal.capabilities()
        } else {
            log::error!("WifiRequestManager: Failed to open the wifi platform");
            WifiCapabilities::empty()
        };
        log::debug!("WifiRequestManager: Capabilities {capabilities:?}");
        Self {
            pal,
            capabilities,
            transitions: TransitionQueue::with_capacity(max_transitions),
            scan_monitor_nanoapps: Vec::new(),
            scan_monitor_enabled: false,
            scan_requester: None,
            scan_results_pending: false,
            scan_result_count: 0,
        }
    }

    /// What the platform supports. Empty if it failed to open.
    pub fn capabilities(&self) -> WifiCapabilities {
        self.capabilities
    }

    /// Whether the platform scan monitor is on.
    pub fn scan_monitor_enabled(&self) -> bool {
        self.scan_monitor_enabled
    }

    /// Nanoapps currently holding a scan monitor request.
    pub fn scan_monitor_nanoapps(&self) -> &[InstanceId] {
        &self.scan_monitor_nanoapps
    }

    /// Configuration requests not yet resolved, including the one in flight.
    pub fn pending_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// The nanoapp whose active scan is in flight.
    pub fn scan_requester(&self) -> Option<InstanceId> {
        self.scan_requester.map(|(nanoapp, _)| nanoapp)
    }

    /// Enables or disables scan monitoring for a nanoapp.
    ///
    /// The outcome is always reported to the nanoapp as an
    /// `EVENT_WIFI_ASYNC_RESULT`. An `Err` means no result will follow.
    pub fn configure_scan_monitor(
        &mut self,
        event_loop: &mut EventLoop,
        nanoapp: InstanceId,
        enable: bool,
        cookie: Cookie,
    ) -> Result<(), WifiRequestError> {
        let has_request = self.has_scan_monitor_request(nanoapp);
        if !self.transitions.is_empty() {
            self.enqueue_transition(nanoapp, enable, cookie)
        } else if self.scan_monitor_is_in_requested_state(enable, has_request) {
            self.post_scan_monitor_result(event_loop, nanoapp, true, enable, ErrorCode::None, cookie)
        } else {
            self.enqueue_transition(nanoapp, enable, cookie)?;
            if !self.pal.configure_scan_monitor(enable) {
                self.transitions.pop_back();
                log::error!("WifiRequestManager: Failed to configure the scan monitor for nanoapp {nanoapp}");
                return Err(WifiRequestError::PlatformRejected);
            }
            Ok(())
        }
    }

    /// Starts an active scan. The platform answers with a scan response, then
    /// the results.
    pub fn request_scan(
        &mut self,
        nanoapp: InstanceId,
        params: &WifiScanParams,
        cookie: Cookie,
    ) -> Result<(), WifiRequestError> {
        if let Some((requester, _)) = self.scan_requester {
            log::error!(
                "WifiRequestManager: Scan request from {nanoapp} while one from {requester} is in flight"
            );
            return Err(WifiRequestError::ScanInFlight);
        }
        if !self.pal.request_scan(params) {
            log::warn!("WifiRequestManager: Platform rejected scan request from {nanoapp}");
            return Err(WifiRequestError::PlatformRejected);
        }
        self.scan_requester = Some((nanoapp, cookie));
        Ok(())
    }

    /// Releases the scan monitor request of an unloading nanoapp and drops
    /// its queued ones.
    pub(crate) fn remove_nanoapp(&mut self, event_loop: &mut EventLoop, nanoapp: InstanceId) {
        self.transitions
            .retain_queued(|transition| transition.nanoapp != nanoapp);
        if self.has_scan_monitor_request(nanoapp) {
            if let Err(err) = self.configure_scan_monitor(event_loop, nanoapp, false, 0) {
                log::warn!("WifiRequestManager: Failed to release scan monitor of {nanoapp}: {err}");
            }
        }
    }

    pub(crate) fn handle_scan_monitor_state_change_sync(
        &mut self,
        event_loop: &mut EventLoop,
        enabled: bool,
        error_code: ErrorCode,
    ) {
        let mut resolved_for_nanoapp = false;
        match self.transitions.pop_front() {
            Some(transition) => {
                let success = error_code.is_success() && transition.enable == enabled;
                let error_code = if success || !error_code.is_success() {
                    error_code
                } else {
                    ErrorCode::Error
                };
                self.post_scan_monitor_result_or_die(event_loop, transition, success, error_code);
                resolved_for_nanoapp = transition.nanoapp != InstanceId::SYSTEM;
            }
            None => log::warn!("WifiRequestManager: Unsolicited scan monitor change (enabled: {enabled})"),
        }
        self.scan_monitor_enabled = enabled;

        // Resolve queued requests until one needs the platform again.
        while let Some(&transition) = self.transitions.front() {
            let has_request = self.has_scan_monitor_request(transition.nanoapp);
            if self.scan_monitor_is_in_requested_state(transition.enable, has_request) {
                self.post_scan_monitor_result_or_die(event_loop, transition, true, ErrorCode::None);
            } else if self.pal.configure_scan_monitor(transition.enable) {
                break;
            } else {
                log::error!("WifiRequestManager: Failed to configure the scan monitor for {}", transition.nanoapp);
                self.post_scan_monitor_result_or_die(event_loop, transition, false, ErrorCode::Error);
            }
            self.transitions.pop_front();
        }

        if resolved_for_nanoapp {
            self.disable_unheld_scan_monitor();
        }
    }

    /// Turns the platform monitor off when it is on but no nanoapp holds it.
    /// That happens when a nanoapp unloads while its enable is in flight.
    fn disable_unheld_scan_monitor(&mut self) {
        if !self.transitions.is_empty()
            || !self.scan_monitor_enabled
            || !self.scan_monitor_nanoapps.is_empty()
        {
            return;
        }
        log::debug!("WifiRequestManager: Scan monitor has no holder, disabling");
        let transition = ScanMonitorStateTransition {
            nanoapp: InstanceId::SYSTEM,
            cookie: 0,
            enable: false,
        };
        if self.transitions.push(transition).is_err() {
            return;
        }
        if !self.pal.configure_scan_monitor(false) {
            self.transitions.pop_back();
            log::error!("WifiRequestManager: Failed to disable the unheld scan monitor");
        }
    }

    pub(crate) fn handle_scan_response_sync(
        &mut self,
        event_loop: &mut EventLoop,
        pending: bool,
        error_code: ErrorCode,
    ) {
        let Some((nanoapp, cookie)) = self.scan_requester else {
            log::error!("WifiRequestManager: Scan response with no request in flight");
            return;
        };

        let error_code = if !pending && error_code.is_success() {
            log::error!("WifiRequestManager: Scan response with no results and no error");
            ErrorCode::Error
        } else {
            error_code
        };
        let success = pending && error_code.is_success();
        if !success {
            log::warn!("WifiRequestManager: Scan request of {nanoapp} failed: {error_code:?}");
        }

        let result = AsyncResult {
            request_type: WIFI_REQUEST_TYPE_REQUEST_SCAN,
            success,
            error_code,
            cookie,
        };
        event_loop.post_event_or_die(EVENT_WIFI_ASYNC_RESULT, Some(Box::new(result)), None, nanoapp);

        self.scan_results_pending = pending;
        if pending {
            event_loop.register_broadcast_event(nanoapp, EVENT_WIFI_SCAN_RESULT);
        } else {
            self.scan_requester = None;
        }
    }

    pub(crate) fn handle_scan_event_sync(&mut self, event_loop: &mut EventLoop, event: WifiScanEvent) {
        self.scan_result_count += usize::from(event.result_count);
        if self.scan_result_count >= usize::from(event.result_total) {
            self.scan_result_count = 0;
            self.scan_results_pending = false;
        }

        let release = release_callback(|ctx, _, data| {
            let (event_loop, subsystems) = ctx.parts();
            subsystems.wifi.handle_free_scan_event(event_loop, data);
        });
        if let Some(event) =
            event_loop.post_owned_or_die(EVENT_WIFI_SCAN_RESULT, event, release, InstanceId::BROADCAST)
        {
            self.pal.release_scan_event(event);
        }
    }

    fn handle_free_scan_event(&mut self, event_loop: &mut EventLoop, data: Option<EventPayload>) {
        if let Some((nanoapp, _)) = self.scan_requester {
            if !self.scan_results_pending {
                if !self.has_scan_monitor_request(nanoapp) {
                    event_loop.unregister_broadcast_event(nanoapp, EVENT_WIFI_SCAN_RESULT);
                }
                self.scan_requester = None;
            }
        }

        match data.map(|data| data.downcast::<WifiScanEvent>()) {
            Some(Ok(event)) => self.pal.release_scan_event(*event),
            Some(Err(_)) => log::error!("WifiRequestManager: Released payload is not a scan event"),
            None => {}
        }
    }

    fn has_scan_monitor_request(&self, nanoapp: InstanceId) -> bool {
        self.scan_monitor_nanoapps.contains(&nanoapp)
    }

    /// Whether a request needs no platform change: enabling while enabled, or
    /// disabling while disabled, while the nanoapp holds no request, or while
    /// other nanoapps still hold one.
    fn scan_monitor_is_in_requested_state(&self, enable: bool, has_request: bool) -> bool {
        enable == self.scan_monitor_enabled
            || (!enable && (!has_request || self.scan_monitor_nanoapps.len() > 1))
    }

    fn enqueue_transition(
        &mut self,
        nanoapp: InstanceId,
        enable: bool,
        cookie: Cookie,
    ) -> Result<(), WifiRequestError> {
        self.transitions
            .push(ScanMonitorStateTransition {
                nanoapp,
                cookie,
                enable,
            })
            .map_err(|_| {
                log::warn!("WifiRequestManager: Too many scan monitor state transitions");
                WifiRequestError::TooManyTransitions
            })
    }

    fn update_scan_monitoring_list(
        &mut self,
        event_loop: &mut EventLoop,
        enable: bool,
        nanoapp: InstanceId,
    ) -> Result<(), WifiRequestError> {
        let index = self
            .scan_monitor_nanoapps
            .iter()
            .position(|id| *id == nanoapp);
        if enable {
            if !event_loop.has_nanoapp(nanoapp) {
                log::warn!("WifiRequestManager: Cannot add unknown nanoapp {nanoapp} to the scan monitor list");
                return Err(WifiRequestError::UnknownNanoapp(nanoapp));
            }
            if index.is_none() {
                self.scan_monitor_nanoapps.push(nanoapp);
                event_loop.register_broadcast_event(nanoapp, EVENT_WIFI_SCAN_RESULT);
            }
        } else if let Some(index) = index {
            // The nanoapp may already be unloading; the entry goes regardless.
            self.scan_monitor_nanoapps.remove(index);
            if self.scan_requester() != Some(nanoapp) {
                event_loop.unregister_broadcast_event(nanoapp, EVENT_WIFI_SCAN_RESULT);
            }
        }
        Ok(())
    }

    fn post_scan_monitor_result(
        &mut self,
        event_loop: &mut EventLoop,
        nanoapp: InstanceId,
        success: bool,
        enable: bool,
        error_code: ErrorCode,
        cookie: Cookie,
    ) -> Result<(), WifiRequestError> {
        if success {
            self.update_scan_monitoring_list(event_loop, enable, nanoapp)?;
        }
        let result = AsyncResult {
            request_type: WIFI_REQUEST_TYPE_CONFIGURE_SCAN_MONITOR,
            success,
            error_code,
            cookie,
        };
        event_loop.post_event(
            EVENT_WIFI_ASYNC_RESULT,
            Some(Box::new(result)),
            None,
            InstanceId::SYSTEM,
            nanoapp,
        )?;
        Ok(())
    }

    fn post_scan_monitor_result_or_die(
        &mut self,
        event_loop: &mut EventLoop,
        transition: ScanMonitorStateTransition,
        success: bool,
        error_code: ErrorCode,
    ) {
        let ScanMonitorStateTransition {
            nanoapp,
            cookie,
            enable,
        } = transition;
        if nanoapp == InstanceId::SYSTEM {
            return;
        }
        match self.post_scan_monitor_result(event_loop, nanoapp, success, enable, error_code, cookie) {
            Ok(()) => {}
            Err(WifiRequestError::Post(PostEventError::NotRunning)) => {
                log::debug!("WifiRequestManager: Dropping scan monitor result for {nanoapp} during shutdown");
            }
            Err(WifiRequestError::Post(err)) => {
                fatal_error!("Failed to post scan monitor result to {nanoapp}: {err}")
            }
            Err(err) => log::warn!("WifiRequestManager: No scan monitor result for {nanoapp}: {err}"),
        }
    }
}

impl Drop for WifiRequestManager {
    fn drop(&mut self) {
        if self.scan_monitor_enabled && !self.pal.configure_scan_monitor(false) {
            log::warn!("WifiRequestManager: Failed to disable the scan monitor");
        }
        self.pal.close();
        log::debug!("WifiRequestManager: Closed.");
    }
}

/// Moves platform callbacks onto the loop thread.
struct WifiPalBridge {
    handle: RuntimeHandle,
}

impl WifiPalCallbacks for WifiPalBridge {
    fn scan_monitor_status_change(&self, enabled: bool, error_code: ErrorCode) {
        self.handle
            .defer_callback_or_die(SystemCallbackType::WifiScanMonitorStateChange, move |ctx| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems
                    .wifi
                    .handle_scan_monitor_state_change_sync(event_loop, enabled, error_code);
            });
    }

    fn scan_response(&self, pending: bool, error_code: ErrorCode) {
        self.handle
            .defer_callback_or_die(SystemCallbackType::WifiRequestScanResponse, move |ctx| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems
                    .wifi
                    .handle_scan_response_sync(event_loop, pending, error_code);
            });
    }

    fn scan_event(&self, event: WifiScanEvent) -> Result<(), WifiScanEvent> {
        self.handle
            .defer_with_data_or_die(SystemCallbackType::WifiHandleScanEvent, event, |ctx, event| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems.wifi.handle_scan_event_sync(event_loop, event);
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::test_support::NullTimer;
    use nanohub_infra::sim::{SimWifiControl, SimWifiPal};

    fn setup() -> (EventLoop, WifiRequestManager, SimWifiControl) {
        let event_loop = EventLoop::new(&RuntimeConfig::default(), Box::new(NullTimer));
        let pal = SimWifiPal::new();
        let control = pal.control();
        control.set_auto_complete(false);
        let manager = WifiRequestManager::new(Box::new(pal), event_loop.handle(), 2);
        (event_loop, manager, control)
    }

    #[test]
    fn second_configure_waits_behind_the_first() {
        let (mut event_loop, mut manager, control) = setup();
        manager.configure_scan_monitor(&mut event_loop, InstanceId(1), true, 1).unwrap();
        manager.configure_scan_monitor(&mut event_loop, InstanceId(2), true, 2).unwrap();

        assert_eq!(control.scan_monitor_calls(), vec![true]);
        assert_eq!(manager.pending_transitions(), 2);
    }

    #[test]
    fn transition_queue_is_bounded() {
        let (mut event_loop, mut manager, _control) = setup();
        manager.configure_scan_monitor(&mut event_loop, InstanceId(1), true, 1).unwrap();
        manager.configure_scan_monitor(&mut event_loop, InstanceId(2), true, 2).unwrap();
        assert_eq!(
            manager.configure_scan_monitor(&mut event_loop, InstanceId(3), true, 3),
            Err(WifiRequestError::TooManyTransitions)
        );
    }

    #[test]
    fn rejected_configure_is_not_queued() {
        let (mut event_loop, mut manager, control) = setup();
        control.set_accept(false);
        assert_eq!(
            manager.configure_scan_monitor(&mut event_loop, InstanceId(1), true, 1),
            Err(WifiRequestError::PlatformRejected)
        );
        assert_eq!(manager.pending_transitions(), 0);
    }

    #[test]
    fn only_one_scan_in_flight() {
        let (_event_loop, mut manager, control) = setup();
        let params = WifiScanParams::default();
        manager.request_scan(InstanceId(1), &params, 7).unwrap();
        assert_eq!(
            manager.request_scan(InstanceId(2), &params, 8),
            Err(WifiRequestError::ScanInFlight)
        );
        assert_eq!(manager.scan_requester(), Some(InstanceId(1)));
        assert_eq!(control.scan_request_count(), 1);
    }

    #[test]
    fn failed_scan_response_clears_the_requester() {
        let (mut event_loop, mut manager, _control) = setup();
        manager
            .request_scan(InstanceId(1), &WifiScanParams::default(), 7)
            .unwrap();
        manager.handle_scan_response_sync(&mut event_loop, false, ErrorCode::Busy);
        assert_eq!(manager.scan_requester(), None);
    }
}
