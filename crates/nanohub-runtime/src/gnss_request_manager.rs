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

//! GNSS location sessions.
//!
//! Nanoapp session requests are merged into one platform session: enabled
//! while any nanoapp wants fixes, at the shortest requested interval. Changes
//! are asynchronous and serialized through a bounded transition queue.

use crate::error::{GnssRequestError, PostEventError};
use crate::event::{release_callback, SystemCallbackType};
use crate::event_loop::EventLoop;
use crate::handle::RuntimeHandle;
use crate::request_multiplexer::{MergeableRequest, RequestMultiplexer};
use crate::transition_queue::TransitionQueue;
use nanohub_core::event::{EventPayload, EVENT_GNSS_ASYNC_RESULT, EVENT_GNSS_LOCATION};
use nanohub_core::gnss::{
    GnssCapabilities, GnssLocationEvent, GNSS_REQUEST_TYPE_LOCATION_SESSION_START,
    GNSS_REQUEST_TYPE_LOCATION_SESSION_STOP,
};
use nanohub_core::pal::{GnssPal, GnssPalCallbacks};
use nanohub_core::{fatal_error, AsyncResult, Cookie, ErrorCode, InstanceId};
use std::sync::Arc;
use std::time::Duration;

/// A nanoapp's location session, or the merged platform session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSessionRequest {
    nanoapp: Option<InstanceId>,
    enabled: bool,
    min_interval: Duration,
}

impl Default for LocationSessionRequest {
    fn default() -> Self {
        Self {
            nanoapp: None,
            enabled: false,
            min_interval: Duration::MAX,
        }
    }
}

impl LocationSessionRequest {
    fn new(nanoapp: InstanceId, min_interval: Duration) -> Self {
        Self {
            nanoapp: Some(nanoapp),
            enabled: true,
            min_interval,
        }
    }

    /// Whether the session is on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Shortest interval between fixes.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl MergeableRequest for LocationSessionRequest {
    fn merge_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        if other.enabled && !self.enabled {
            self.enabled = true;
            changed = true;
        }
        if other.min_interval < self.min_interval {
            self.min_interval = other.min_interval;
            changed = true;
        }
        changed
    }

    fn is_equivalent_to(&self, other: &Self) -> bool {
        self.enabled == other.enabled && self.min_interval == other.min_interval
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionTransition {
    nanoapp: InstanceId,
    cookie: Cookie,
    enable: bool,
    min_interval: Duration,
}

/// Arbitrates nanoapp access to the GNSS platform.
pub struct GnssRequestManager {
    pal: Box<dyn GnssPal>,
    capabilities: GnssCapabilities,
    requests: RequestMultiplexer<LocationSessionRequest>,
    /// The session as last confirmed by the platform.
    platform_state: LocationSessionRequest,
    transitions: TransitionQueue<SessionTransition>,
}

impl GnssRequestManager {
    /// Opens the platform.
    pub fn new(mut pal: Box<dyn GnssPal>, handle: RuntimeHandle, max_transitions: usize) -> Self {
        let callbacks: Arc<dyn GnssPalCallbacks> = Arc::new(GnssPalBridge { handle });
        let capabilities = if pal.open(callbacks) {
            pal.capabilities()
        } else {
            log::error!("GnssRequestManager: Failed to open the GNSS platform");
            GnssCapabilities::empty()
        };
        Self {
            pal,
            capabilities,
            requests: RequestMultiplexer::new(),
            platform_state: LocationSessionRequest::default(),
            transitions: TransitionQueue::with_capacity(max_transitions),
        }
    }

    /// What the platform supports. Empty if it failed to open.
    pub fn capabilities(&self) -> GnssCapabilities {
        self.capabilities
    }

    /// The session as last confirmed by the platform.
    pub fn platform_session(&self) -> LocationSessionRequest {
        self.platform_state
    }

    /// Whether the nanoapp holds a location session.
    pub fn has_session(&self, nanoapp: InstanceId) -> bool {
        self.find(nanoapp).is_some()
    }

    /// Session changes not yet resolved, including the one in flight.
    pub fn pending_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Starts or updates the nanoapp's session. The outcome arrives as an
    /// `EVENT_GNSS_ASYNC_RESULT`; an `Err` means none will.
    pub fn start_location_session(
        &mut self,
        event_loop: &mut EventLoop,
        nanoapp: InstanceId,
        min_interval: Duration,
        cookie: Cookie,
    ) -> Result<(), GnssRequestError> {
        self.configure(event_loop, SessionTransition {
            nanoapp,
            cookie,
            enable: true,
            min_interval,
        })
    }

    /// Ends the nanoapp's session.
    pub fn stop_location_session(
        &mut self,
        event_loop: &mut EventLoop,
        nanoapp: InstanceId,
        cookie: Cookie,
    ) -> Result<(), GnssRequestError> {
        self.configure(event_loop, SessionTransition {
            nanoapp,
            cookie,
            enable: false,
            min_interval: Duration::MAX,
        })
    }

    pub(crate) fn remove_nanoapp(&mut self, event_loop: &mut EventLoop, nanoapp: InstanceId) {
        self.transitions
            .retain_queued(|transition| transition.nanoapp != nanoapp);
        if self.has_session(nanoapp) {
            if let Err(err) = self.stop_location_session(event_loop, nanoapp, 0) {
                log::warn!("GnssRequestManager: Failed to stop the session of {nanoapp}: {err}");
            }
        }
    }

    fn configure(
        &mut self,
        event_loop: &mut EventLoop,
        transition: SessionTransition,
    ) -> Result<(), GnssRequestError> {
        if !self.transitions.is_empty() {
            return self.enqueue(transition);
        }
        let desired = self.desired_state(&transition);
        if desired.is_equivalent_to(&self.platform_state) {
            return self.post_session_result(event_loop, transition, true, ErrorCode::None);
        }
        self.enqueue(transition)?;
        if !self
            .pal
            .control_location_session(desired.enabled, desired.min_interval)
        {
            self.transitions.pop_back();
            log::error!("GnssRequestManager: Platform rejected session change for {}", transition.nanoapp);
            return Err(GnssRequestError::PlatformRejected);
        }
        Ok(())
    }

    pub(crate) fn handle_status_change_sync(
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
                // What the platform was asked for, whether or not the
                // nanoapp is still around to hold it.
                let requested = self.desired_state(&transition);
                self.post_session_result_or_die(event_loop, transition, success, error_code);
                resolved_for_nanoapp = transition.nanoapp != InstanceId::SYSTEM;
                self.platform_state = if success {
                    requested
                } else if enabled {
                    LocationSessionRequest {
                        enabled,
                        ..self.platform_state
                    }
                } else {
                    LocationSessionRequest::default()
                };
            }
            None => {
                log::warn!("GnssRequestManager: Unsolicited session change (enabled: {enabled})");
                if !enabled {
                    self.platform_state = LocationSessionRequest::default();
                }
            }
        }

        while let Some(&transition) = self.transitions.front() {
            let desired = self.desired_state(&transition);
            if desired.is_equivalent_to(&self.platform_state) {
                self.post_session_result_or_die(event_loop, transition, true, ErrorCode::None);
            } else if self
                .pal
                .control_location_session(desired.enabled, desired.min_interval)
            {
                break;
            } else {
                self.post_session_result_or_die(event_loop, transition, false, ErrorCode::Error);
            }
            self.transitions.pop_front();
        }

        if resolved_for_nanoapp {
            self.stop_unheld_session();
        }
    }

    /// Stops the platform session when it runs but no nanoapp holds one.
    /// That happens when a nanoapp unloads while its start is in flight.
    fn stop_unheld_session(&mut self) {
        if !self.transitions.is_empty()
            || !self.platform_state.enabled
            || self.requests.current_maximal_request().enabled
        {
            return;
        }
        log::debug!("GnssRequestManager: Location session has no holder, stopping");
        let transition = SessionTransition {
            nanoapp: InstanceId::SYSTEM,
            cookie: 0,
            enable: false,
            min_interval: Duration::MAX,
        };
        if self.transitions.push(transition).is_err() {
            return;
        }
        if !self.pal.control_location_session(false, Duration::MAX) {
            self.transitions.pop_back();
            log::error!("GnssRequestManager: Failed to stop the unheld location session");
        }
    }

    fn handle_location_event_sync(&mut self, event_loop: &mut EventLoop, event: GnssLocationEvent) {
        let release = release_callback(|ctx, _, data| ctx.subsystems().gnss.release_location_event(data));
        if let Some(event) =
            event_loop.post_owned_or_die(EVENT_GNSS_LOCATION, event, release, InstanceId::BROADCAST)
        {
            self.pal.release_location_event(event);
        }
    }

    fn release_location_event(&mut self, data: Option<EventPayload>) {
        match data.map(|data| data.downcast::<GnssLocationEvent>()) {
            Some(Ok(event)) => self.pal.release_location_event(*event),
            Some(Err(_)) => log::error!("GnssRequestManager: Released payload is not a location event"),
            None => {}
        }
    }

    fn find(&self, nanoapp: InstanceId) -> Option<usize> {
        self.requests
            .requests()
            .iter()
            .position(|request| request.nanoapp == Some(nanoapp))
    }

    /// The merged session once `transition` is applied.
    fn desired_state(&self, transition: &SessionTransition) -> LocationSessionRequest {
        let mut requests = self.requests.clone();
        let index = self.find(transition.nanoapp);
        match (transition.enable, index) {
            (true, Some(index)) => {
                requests.update_request(
                    index,
                    LocationSessionRequest::new(transition.nanoapp, transition.min_interval),
                );
            }
            (true, None) => {
                requests.add_request(LocationSessionRequest::new(
                    transition.nanoapp,
                    transition.min_interval,
                ));
            }
            (false, Some(index)) => {
                requests.remove_request(index);
            }
            (false, None) => {}
        }
        *requests.current_maximal_request()
    }

    fn enqueue(&mut self, transition: SessionTransition) -> Result<(), GnssRequestError> {
        self.transitions.push(transition).map_err(|_| {
            log::warn!("GnssRequestManager: Too many session transitions");
            GnssRequestError::TooManyTransitions
        })
    }

    fn update_requests(
        &mut self,
        event_loop: &mut EventLoop,
        transition: &SessionTransition,
    ) -> Result<(), GnssRequestError> {
        let nanoapp = transition.nanoapp;
        let index = self.find(nanoapp);
        if transition.enable {
            if !event_loop.has_nanoapp(nanoapp) {
                log::warn!("GnssRequestManager: Cannot add a session for unknown nanoapp {nanoapp}");
                return Err(GnssRequestError::UnknownNanoapp(nanoapp));
            }
            let request = LocationSessionRequest::new(nanoapp, transition.min_interval);
            match index {
                Some(index) => {
                    self.requests.update_request(index, request);
                }
                None => {
                    self.requests.add_request(request);
                    event_loop.register_broadcast_event(nanoapp, EVENT_GNSS_LOCATION);
                }
            }
        } else if let Some(index) = index {
            self.requests.remove_request(index);
            event_loop.unregister_broadcast_event(nanoapp, EVENT_GNSS_LOCATION);
        }
        Ok(())
    }

    fn post_session_result(
        &mut self,
        event_loop: &mut EventLoop,
        transition: SessionTransition,
        success: bool,
        error_code: ErrorCode,
    ) -> Result<(), GnssRequestError> {
        if success {
            self.update_requests(event_loop, &transition)?;
        }
        let result = AsyncResult {
            request_type: if transition.enable {
                GNSS_REQUEST_TYPE_LOCATION_SESSION_START
            } else {
                GNSS_REQUEST_TYPE_LOCATION_SESSION_STOP
            },
            success,
            error_code,
            cookie: transition.cookie,
        };
        event_loop.post_event(
            EVENT_GNSS_ASYNC_RESULT,
            Some(Box::new(result)),
            None,
            InstanceId::SYSTEM,
            transition.nanoapp,
        )?;
        Ok(())
    }

    fn post_session_result_or_die(
        &mut self,
        event_loop: &mut EventLoop,
        transition: SessionTransition,
        success: bool,
        error_code: ErrorCode,
    ) {
        let nanoapp = transition.nanoapp;
        if nanoapp == InstanceId::SYSTEM {
            return;
        }
        match self.post_session_result(event_loop, transition, success, error_code) {
            Ok(()) => {}
            Err(GnssRequestError::Post(PostEventError::NotRunning)) => {
                log::debug!("GnssRequestManager: Dropping session result for {nanoapp} during shutdown");
            }
            Err(GnssRequestError::Post(err)) => {
                fatal_error!("Failed to post session result to {nanoapp}: {err}")
            }
            Err(err) => log::warn!("GnssRequestManager: No session result for {nanoapp}: {err}"),
        }
    }
}

impl Drop for GnssRequestManager {
    fn drop(&mut self) {
        if self.platform_state.enabled && !self.pal.control_location_session(false, Duration::MAX) {
            log::warn!("GnssRequestManager: Failed to stop the location session");
        }
        self.pal.close();
        log::debug!("GnssRequestManager: Closed.");
    }
}

struct GnssPalBridge {
    handle: RuntimeHandle,
}

impl GnssPalCallbacks for GnssPalBridge {
    fn location_status_change(&self, enabled: bool, error_code: ErrorCode) {
        self.handle
            .defer_callback_or_die(SystemCallbackType::GnssSessionStatusChange, move |ctx| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems
                    .gnss
                    .handle_status_change_sync(event_loop, enabled, error_code);
            });
    }

    fn location_event(&self, event: GnssLocationEvent) -> Result<(), GnssLocationEvent> {
        self.handle.defer_with_data_or_die(
            SystemCallbackType::GnssLocationReportEvent,
            event,
            |ctx, event| {
                let (event_loop, subsystems) = ctx.parts();
                subsystems.gnss.handle_location_event_sync(event_loop, event);
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::test_support::NullTimer;
    use nanohub_infra::sim::{SimGnssControl, SimGnssPal};

    fn setup() -> (EventLoop, GnssRequestManager, SimGnssControl) {
        let event_loop = EventLoop::new(&RuntimeConfig::default(), Box::new(NullTimer));
        let pal = SimGnssPal::new();
        let control = pal.control();
        control.set_auto_complete(false);
        let manager = GnssRequestManager::new(Box::new(pal), event_loop.handle(), 4);
        (event_loop, manager, control)
    }

    #[test]
    fn merge_keeps_shortest_interval_of_enabled_sessions() {
        let mut merged = LocationSessionRequest::default();
        merged.merge_with(&LocationSessionRequest::new(InstanceId(1), Duration::from_secs(5)));
        merged.merge_with(&LocationSessionRequest::new(InstanceId(2), Duration::from_secs(1)));
        assert!(merged.enabled());
        assert_eq!(merged.min_interval(), Duration::from_secs(1));
    }

    #[test]
    fn start_issues_one_platform_call_and_queues_the_rest() {
        let (mut event_loop, mut manager, control) = setup();
        manager
            .start_location_session(&mut event_loop, InstanceId(1), Duration::from_secs(1), 1)
            .unwrap();
        manager
            .start_location_session(&mut event_loop, InstanceId(2), Duration::from_secs(2), 2)
            .unwrap();
        assert_eq!(control.session_calls(), vec![(true, Duration::from_secs(1))]);
        assert_eq!(manager.pending_transitions(), 2);
    }

    #[test]
    fn stop_without_session_succeeds_immediately() {
        let (mut event_loop, mut manager, control) = setup();
        manager
            .stop_location_session(&mut event_loop, InstanceId(1), 3)
            .unwrap();
        assert!(control.session_calls().is_empty());
        assert_eq!(manager.pending_transitions(), 0);
    }

    #[test]
    fn rejected_start_is_not_queued() {
        let (mut event_loop, mut manager, control) = setup();
        control.set_accept(false);
        assert_eq!(
            manager.start_location_session(&mut event_loop, InstanceId(1), Duration::from_secs(1), 1),
            Err(GnssRequestError::PlatformRejected)
        );
        assert_eq!(manager.pending_transitions(), 0);
    }
}
