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

//! The cooperative scheduler.
//!
//! One thread runs [`EventLoop::run`]. Each iteration distributes at most one
//! event from the shared dispatch queue to the queues of the nanoapps it
//! targets, then delivers one pending event to every nanoapp that has one. The
//! thread only blocks on the dispatch queue, and only when no nanoapp has
//! pending work. Nanoapp callbacks run to completion, one at a time.

use crate::config::RuntimeConfig;
use crate::context::RuntimeContext;
use crate::error::{PostEventError, StartNanoappError};
use crate::event::{Event, QueueItem, ReleaseCallback};
use crate::handle::{lock_or_recover, LoopShared, RuntimeHandle};
use crate::manager::Subsystems;
use crate::nanoapp::{NanoappDescriptor, NanoappRecord};
use crate::timer_pool::TimerPool;
use nanohub_core::event::{EventBus, EventPayload, EventType};
use nanohub_core::pal::SystemTimer;
use nanohub_core::{fatal_error, AppId, InstanceId, Nanoapp, NanoappInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// An event that reached at least one nanoapp queue and is not yet released.
struct InFlightEvent {
    event: Event,
    /// Queues still holding this event.
    pending: usize,
}

/// Owns the loaded nanoapps, the dispatch queue, and the timer pool.
///
/// Methods taking `&mut self` must be called on the loop thread. Other threads
/// use the [`RuntimeHandle`] returned by [`EventLoop::handle`].
pub struct EventLoop {
    bus: EventBus<QueueItem>,
    shared: Arc<LoopShared>,
    handle: RuntimeHandle,
    timer_pool: TimerPool,
    nanoapps: Vec<NanoappRecord>,
    in_flight: HashMap<u64, InFlightEvent>,
    /// Queue entries consumed while their event was out for delivery elsewhere.
    skipped: HashMap<u64, usize>,
    next_event_id: u64,
    current_app: Option<InstanceId>,
    max_nanoapps: usize,
}

impl EventLoop {
    /// Creates a loop. It accepts events immediately; they are processed once
    /// [`EventLoop::run`] or [`EventLoop::run_until_idle`] is called.
    pub fn new(config: &RuntimeConfig, system_timer: Box<dyn SystemTimer>) -> Self {
        let bus = EventBus::bounded(config.max_unscheduled_events);
        let shared = Arc::new(LoopShared::new(config.max_event_count));
        let handle = RuntimeHandle::new(bus.sender(), Arc::clone(&shared));
        let timer_pool = TimerPool::new(system_timer, handle.clone());
        Self {
            bus,
            shared,
            handle,
            timer_pool,
            nanoapps: Vec::new(),
            in_flight: HashMap::new(),
            skipped: HashMap::new(),
            next_event_id: 0,
            current_app: None,
            max_nanoapps: config.max_nanoapps,
        }
    }

    /// A thread-safe handle to this loop.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// The loop's timer pool.
    pub fn timer_pool(&self) -> &TimerPool {
        &self.timer_pool
    }

    /// The nanoapp whose entry point or release callback is executing.
    pub fn current_nanoapp(&self) -> Option<InstanceId> {
        self.current_app
    }

    /// Number of loaded nanoapps.
    pub fn nanoapp_count(&self) -> usize {
        self.nanoapps.len()
    }

    /// `true` if `instance_id` names a loaded nanoapp.
    pub fn has_nanoapp(&self, instance_id: InstanceId) -> bool {
        self.record_index(instance_id).is_some()
    }

    /// Looks up a loaded nanoapp by binary id.
    pub fn find_nanoapp_instance_id_by_app_id(&self, app_id: AppId) -> Option<InstanceId> {
        self.nanoapps
            .iter()
            .find(|record| record.info.app_id == app_id)
            .map(|record| record.instance_id)
    }

    /// Static description of a loaded nanoapp.
    pub fn nanoapp_info(&self, instance_id: InstanceId) -> Option<&NanoappInfo> {
        self.record_index(instance_id)
            .map(|index| &self.nanoapps[index].info)
    }

    /// Calls `f` for every loaded nanoapp, in load order.
    pub fn for_each_nanoapp<F>(&self, mut f: F)
    where
        F: FnMut(&NanoappDescriptor),
    {
        for record in &self.nanoapps {
            f(&record.descriptor());
        }
    }

    /// `false` once stop was requested.
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Requests the loop to finish. See [`RuntimeHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Posts an event. See [`RuntimeHandle::post_event`].
    pub fn post_event(
        &self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<ReleaseCallback>,
        sender: InstanceId,
        target: InstanceId,
    ) -> Result<(), PostEventError> {
        self.handle
            .post_event(event_type, data, release, sender, target)
    }

    /// Posts a system event whose delivery the runtime depends on. Failing to
    /// post it while running is fatal.
    pub(crate) fn post_event_or_die(
        &self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<ReleaseCallback>,
        target: InstanceId,
    ) {
        match self.post_event(event_type, data, release, InstanceId::SYSTEM, target) {
            Ok(()) => {}
            Err(PostEventError::NotRunning) => {
                log::debug!("EventLoop: Dropping event 0x{event_type:04x} posted during shutdown");
            }
            Err(err) => fatal_error!("Failed to post system event 0x{event_type:04x}: {err}"),
        }
    }

    /// Like [`EventLoop::post_event_or_die`] for a payload the platform
    /// owns. Returns the payload if the loop is shutting down and did not
    /// take it, so the caller can hand it back.
    #[must_use]
    pub(crate) fn post_owned_or_die<T>(
        &self,
        event_type: EventType,
        data: T,
        release: ReleaseCallback,
        target: InstanceId,
    ) -> Option<T>
    where
        T: Send + 'static,
    {
        match self.handle.post_owned(event_type, data, release, target) {
            Ok(()) => None,
            Err((PostEventError::NotRunning, data)) => {
                log::debug!("EventLoop: Returning event 0x{event_type:04x} posted during shutdown");
                Some(data)
            }
            Err((err, _)) => fatal_error!("Failed to post system event 0x{event_type:04x}: {err}"),
        }
    }

    /// Subscribes a nanoapp to broadcasts of `event_type`.
    pub fn register_broadcast_event(&mut self, instance_id: InstanceId, event_type: EventType) -> bool {
        match self.record_index(instance_id) {
            Some(index) => self.nanoapps[index].register_for_broadcast_event(event_type),
            None => {
                log::debug!("EventLoop: Cannot register unknown nanoapp {instance_id} for 0x{event_type:04x}");
                false
            }
        }
    }

    /// Unsubscribes a nanoapp from broadcasts of `event_type`.
    pub fn unregister_broadcast_event(&mut self, instance_id: InstanceId, event_type: EventType) -> bool {
        match self.record_index(instance_id) {
            Some(index) => self.nanoapps[index].unregister_for_broadcast_event(event_type),
            None => false,
        }
    }

    /// `true` if the nanoapp receives broadcasts of `event_type`.
    pub fn is_registered_for_broadcast_event(
        &self,
        instance_id: InstanceId,
        event_type: EventType,
    ) -> bool {
        self.record_index(instance_id)
            .is_some_and(|index| self.nanoapps[index].is_registered_for_broadcast_event(event_type))
    }

    /// Runs until stopped, then drains: events pending distribution are freed,
    /// and every nanoapp has its queue delivered and is ended, last loaded first.
    pub fn run(&mut self, subsystems: &mut Subsystems) {
        log::info!("EventLoop: Started.");
        let mut have_pending_events = false;
        while self.is_running() {
            let item = if have_pending_events {
                self.bus.receiver().try_recv().ok()
            } else {
                match self.bus.receiver().recv() {
                    Ok(item) => Some(item),
                    Err(_) => break,
                }
            };
            if let Some(QueueItem::Event(event)) = item {
                self.distribute_event(subsystems, event);
            }
            have_pending_events = self.deliver_round(subsystems);
        }
        self.shutdown(subsystems);
        log::info!("EventLoop: Exited.");
    }

    /// Processes queued events until neither the dispatch queue nor any
    /// nanoapp queue has work. Never blocks. Returns the number of events
    /// distributed.
    pub fn run_until_idle(&mut self, subsystems: &mut Subsystems) -> usize {
        let mut distributed = 0;
        loop {
            let item = self.bus.receiver().try_recv().ok();
            let received = item.is_some();
            if let Some(QueueItem::Event(event)) = item {
                self.distribute_event(subsystems, event);
                distributed += 1;
            }
            let have_pending_events = self.deliver_round(subsystems);
            if !received && !have_pending_events {
                return distributed;
            }
        }
    }

    /// Frees events pending distribution and stops every nanoapp.
    pub(crate) fn shutdown(&mut self, subsystems: &mut Subsystems) {
        while let Ok(item) = self.bus.receiver().try_recv() {
            if let QueueItem::Event(event) = item {
                self.free_event(subsystems, event);
            }
        }
        while let Some(instance_id) = self.nanoapps.last().map(|record| record.instance_id) {
            self.stop_nanoapp(subsystems, instance_id);
        }
    }

    /// Loads a nanoapp and calls its `start`. Must run on the loop thread.
    pub fn start_nanoapp(
        &mut self,
        subsystems: &mut Subsystems,
        nanoapp: Box<dyn Nanoapp>,
    ) -> Result<InstanceId, StartNanoappError> {
        let info = nanoapp.info();
        if let Some(existing) = self.find_nanoapp_instance_id_by_app_id(info.app_id) {
            log::error!(
                "EventLoop: App with ID 0x{:016x} already exists as instance {}",
                info.app_id,
                existing
            );
            return Err(StartNanoappError::DuplicateAppId {
                app_id: info.app_id,
                existing,
            });
        }
        if self.nanoapps.len() >= self.max_nanoapps {
            log::error!("EventLoop: Failed to make room for nanoapp 0x{:016x}", info.app_id);
            return Err(StartNanoappError::TooManyNanoapps {
                max: self.max_nanoapps,
            });
        }

        let instance_id = subsystems.next_instance_id();
        let mut record = NanoappRecord::new(instance_id, info.clone());
        record.body = Some(nanoapp);
        self.nanoapps.push(record);

        let started = self
            .with_nanoapp(subsystems, instance_id, |app, ctx| app.start(ctx))
            .unwrap_or(false);
        if !started {
            log::error!("EventLoop: Nanoapp {} ({}) failed to start", instance_id, info.name);
            self.release_nanoapp_resources(subsystems, instance_id);
            if let Some(index) = self.record_index(instance_id) {
                self.nanoapps.remove(index);
            }
            return Err(StartNanoappError::StartFailed {
                app_id: info.app_id,
            });
        }

        if let Some(index) = self.record_index(instance_id) {
            let descriptor = self.nanoapps[index].descriptor();
            lock_or_recover(&self.shared.directory).push(descriptor);
        }
        log::info!(
            "EventLoop: Started nanoapp '{}' (app 0x{:016x}, v{}) as instance {}",
            info.name,
            info.app_id,
            info.version,
            instance_id
        );
        Ok(instance_id)
    }

    /// Stops a nanoapp: delivers what is left in its queue, calls `end`,
    /// releases its timers and resource requests, and unloads it.
    pub fn stop_nanoapp(&mut self, subsystems: &mut Subsystems, instance_id: InstanceId) -> bool {
        if !self.has_nanoapp(instance_id) {
            log::warn!("EventLoop: Attempted to stop nanoapp {instance_id}, which is not running");
            return false;
        }

        // Nothing new can be queued for it while we are on the loop thread.
        while self.deliver_next_event(subsystems, instance_id) {}

        self.with_nanoapp(subsystems, instance_id, |app, ctx| app.end(ctx));
        self.release_nanoapp_resources(subsystems, instance_id);

        if let Some(index) = self.record_index(instance_id) {
            let record = self.nanoapps.remove(index);
            lock_or_recover(&self.shared.directory)
                .retain(|descriptor| descriptor.instance_id != instance_id);
            log::info!(
                "EventLoop: Stopped nanoapp '{}' (instance {})",
                record.info.name,
                instance_id
            );
        }
        true
    }

    fn release_nanoapp_resources(&mut self, subsystems: &mut Subsystems, instance_id: InstanceId) {
        let timers = self.timer_pool.cancel_all(instance_id);
        if timers > 0 {
            log::debug!("EventLoop: Cancelled {timers} timers of nanoapp {instance_id}");
        }
        subsystems.release_nanoapp(self, instance_id);
    }

    fn record_index(&self, instance_id: InstanceId) -> Option<usize> {
        if instance_id.is_reserved() {
            return None;
        }
        self.nanoapps
            .iter()
            .position(|record| record.instance_id == instance_id)
    }

    fn have_pending_events(&self) -> bool {
        self.nanoapps.iter().any(NanoappRecord::has_pending_event)
    }

    /// Runs `f` with the nanoapp's body and a context acting on its behalf.
    /// Returns `None` if the nanoapp is unknown or already executing.
    fn with_nanoapp<R>(
        &mut self,
        subsystems: &mut Subsystems,
        instance_id: InstanceId,
        f: impl FnOnce(&mut dyn Nanoapp, &mut RuntimeContext<'_>) -> R,
    ) -> Option<R> {
        let index = self.record_index(instance_id)?;
        let mut body = self.nanoapps[index].body.take()?;

        let previous = self.current_app.replace(instance_id);
        let result = {
            let mut ctx = RuntimeContext::new(self, subsystems, Some(instance_id));
            f(body.as_mut(), &mut ctx)
        };
        self.current_app = previous;

        if let Some(index) = self.record_index(instance_id) {
            self.nanoapps[index].body = Some(body);
        }
        Some(result)
    }

    fn distribute_event(&mut self, subsystems: &mut Subsystems, event: Event) {
        let event_id = self.next_event_id;
        self.next_event_id += 1;

        let mut pending = 0;
        for record in &mut self.nanoapps {
            let targeted = event.target == record.instance_id
                || (event.target == InstanceId::BROADCAST
                    && record.is_registered_for_broadcast_event(event.event_type));
            if targeted {
                record.post_event(event_id);
                pending += 1;
            }
        }

        if pending == 0 {
            // System callbacks target no nanoapp; their release callback is the work.
            if event.sender != InstanceId::SYSTEM {
                log::warn!("EventLoop: Dropping event 0x{:04x}", event.event_type);
                self.shared.stats.record_dropped();
            }
            self.free_event(subsystems, event);
        } else {
            self.in_flight
                .insert(event_id, InFlightEvent { event, pending });
        }
    }

    /// Delivers one event to every nanoapp with pending events. Returns whether
    /// any nanoapp still has pending events.
    fn deliver_round(&mut self, subsystems: &mut Subsystems) -> bool {
        let ready: Vec<InstanceId> = self
            .nanoapps
            .iter()
            .filter(|record| record.has_pending_event())
            .map(|record| record.instance_id)
            .collect();
        for instance_id in ready {
            self.deliver_next_event(subsystems, instance_id);
        }
        self.have_pending_events()
    }

    /// Delivers the next event of one nanoapp. Returns `false` if there was none.
    fn deliver_next_event(&mut self, subsystems: &mut Subsystems, instance_id: InstanceId) -> bool {
        let Some(index) = self.record_index(instance_id) else {
            return false;
        };
        let Some(event_id) = self.nanoapps[index].next_event() else {
            return false;
        };
        let Some(mut in_flight) = self.in_flight.remove(&event_id) else {
            // A nanoapp stopped another from inside the handler of this same event.
            log::debug!("EventLoop: Skipping event {event_id} for stopping nanoapp {instance_id}");
            *self.skipped.entry(event_id).or_default() += 1;
            return true;
        };

        {
            let event = &in_flight.event;
            let (sender, event_type, data) = (event.sender, event.event_type, event.data.as_deref());
            self.with_nanoapp(subsystems, instance_id, |app, ctx| {
                app.handle_event(ctx, sender, event_type, data)
            });
        }
        self.shared.stats.record_delivered();

        let consumed = 1 + self.skipped.remove(&event_id).unwrap_or(0);
        in_flight.pending = in_flight.pending.saturating_sub(consumed);
        if in_flight.pending == 0 {
            self.free_event(subsystems, in_flight.event);
        } else {
            self.in_flight.insert(event_id, in_flight);
        }
        true
    }

    /// Runs the release callback, with the sender as the current nanoapp, and
    /// returns the pool slot.
    fn free_event(&mut self, subsystems: &mut Subsystems, event: Event) {
        let Event {
            event_type,
            data,
            release,
            sender,
            ..
        } = event;

        if let Some(release) = release {
            let current = self.record_index(sender).map(|_| sender);
            let previous = std::mem::replace(&mut self.current_app, current);
            {
                let mut ctx = RuntimeContext::new(self, subsystems, current);
                release(&mut ctx, event_type, data);
            }
            self.current_app = previous;
        }
        self.shared.pool.deallocate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_subsystems, NullTimer};
    use nanohub_core::event::EVENT_FIRST_USER_VALUE;
    use nanohub_core::ChreApi;
    use std::any::Any;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<(InstanceId, EventType)>>>;

    struct Recorder {
        app_id: AppId,
        log: Log,
        subscribe: Option<EventType>,
        start_ok: bool,
    }

    impl Nanoapp for Recorder {
        fn info(&self) -> NanoappInfo {
            NanoappInfo::new(self.app_id, 1, "recorder")
        }

        fn start(&mut self, chre: &mut dyn ChreApi) -> bool {
            if let Some(event_type) = self.subscribe {
                chre.register_broadcast_event(event_type);
            }
            self.start_ok
        }

        fn handle_event(
            &mut self,
            chre: &mut dyn ChreApi,
            _sender: InstanceId,
            event_type: EventType,
            _data: Option<&(dyn Any + Send)>,
        ) {
            self.log.lock().unwrap().push((chre.instance_id(), event_type));
        }

        fn end(&mut self, _chre: &mut dyn ChreApi) {}
    }

    fn recorder(app_id: AppId, log: &Log, subscribe: Option<EventType>) -> Box<dyn Nanoapp> {
        Box::new(Recorder {
            app_id,
            log: Arc::clone(log),
            subscribe,
            start_ok: true,
        })
    }

    fn setup() -> (EventLoop, Subsystems) {
        let event_loop = EventLoop::new(&RuntimeConfig::default(), Box::new(NullTimer));
        let subsystems = test_subsystems(event_loop.handle());
        (event_loop, subsystems)
    }

    #[test]
    fn unicast_reaches_only_its_target() {
        let (mut event_loop, mut subsystems) = setup();
        let log = Log::default();
        let a = event_loop.start_nanoapp(&mut subsystems, recorder(1, &log, None)).unwrap();
        let _b = event_loop.start_nanoapp(&mut subsystems, recorder(2, &log, None)).unwrap();

        event_loop
            .post_event(EVENT_FIRST_USER_VALUE, None, None, InstanceId::SYSTEM, a)
            .unwrap();
        event_loop.run_until_idle(&mut subsystems);

        assert_eq!(*log.lock().unwrap(), vec![(a, EVENT_FIRST_USER_VALUE)]);
    }

    #[test]
    fn lookups_track_loaded_nanoapps() {
        let (mut event_loop, mut subsystems) = setup();
        let log = Log::default();
        let a = event_loop.start_nanoapp(&mut subsystems, recorder(0x10, &log, None)).unwrap();
        let b = event_loop.start_nanoapp(&mut subsystems, recorder(0x20, &log, None)).unwrap();

        assert_eq!(event_loop.find_nanoapp_instance_id_by_app_id(0x20), Some(b));
        let handle = event_loop.handle();
        assert_eq!(handle.find_nanoapp_instance_id_by_app_id(0x10), Some(a));
        let mut seen = Vec::new();
        handle.for_each_nanoapp(|descriptor| seen.push(descriptor.instance_id));
        assert_eq!(seen, vec![a, b]);

        assert!(event_loop.stop_nanoapp(&mut subsystems, a));
        assert_eq!(handle.find_nanoapp_instance_id_by_app_id(0x10), None);
        assert_eq!(event_loop.nanoapp_count(), 1);
        assert!(!event_loop.stop_nanoapp(&mut subsystems, a));
    }

    #[test]
    fn duplicate_app_id_is_rejected() {
        let (mut event_loop, mut subsystems) = setup();
        let log = Log::default();
        let first = event_loop.start_nanoapp(&mut subsystems, recorder(7, &log, None)).unwrap();
        let err = event_loop
            .start_nanoapp(&mut subsystems, recorder(7, &log, None))
            .unwrap_err();
        assert_eq!(
            err,
            StartNanoappError::DuplicateAppId {
                app_id: 7,
                existing: first
            }
        );
        assert_eq!(event_loop.nanoapp_count(), 1);
    }

    #[test]
    fn failed_start_unloads_the_nanoapp() {
        let (mut event_loop, mut subsystems) = setup();
        let app = Box::new(Recorder {
            app_id: 3,
            log: Log::default(),
            subscribe: Some(EVENT_FIRST_USER_VALUE),
            start_ok: false,
        });
        assert_eq!(
            event_loop.start_nanoapp(&mut subsystems, app),
            Err(StartNanoappError::StartFailed { app_id: 3 })
        );
        assert_eq!(event_loop.nanoapp_count(), 0);
        assert_eq!(event_loop.handle().find_nanoapp_instance_id_by_app_id(3), None);
    }

    #[test]
    fn instance_ids_are_unique_and_not_reserved() {
        let (mut event_loop, mut subsystems) = setup();
        let log = Log::default();
        let a = event_loop.start_nanoapp(&mut subsystems, recorder(1, &log, None)).unwrap();
        let b = event_loop.start_nanoapp(&mut subsystems, recorder(2, &log, None)).unwrap();
        assert_ne!(a, b);
        assert!(!a.is_reserved() && !b.is_reserved());
        assert_eq!(event_loop.find_nanoapp_instance_id_by_app_id(2), Some(b));
    }

    #[test]
    fn event_without_recipients_is_freed() {
        let (mut event_loop, mut subsystems) = setup();
        let released = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&released);
        let release = crate::event::release_callback(move |_, _, _| *counter.lock().unwrap() += 1);

        event_loop
            .post_event(
                EVENT_FIRST_USER_VALUE,
                None,
                Some(release),
                InstanceId(42),
                InstanceId::BROADCAST,
            )
            .unwrap();
        event_loop.run_until_idle(&mut subsystems);

        assert_eq!(*released.lock().unwrap(), 1);
        let stats = event_loop.handle().stats();
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.live_events, 0);
    }

    #[test]
    fn posting_after_stop_fails() {
        let (event_loop, _subsystems) = setup();
        event_loop.stop();
        assert_eq!(
            event_loop.post_event(1, None, None, InstanceId::SYSTEM, InstanceId::SYSTEM),
            Err(PostEventError::NotRunning)
        );
    }

    #[test]
    fn run_returns_after_stop_and_unloads_everything() {
        let (mut event_loop, mut subsystems) = setup();
        let log = Log::default();
        event_loop
            .start_nanoapp(&mut subsystems, recorder(1, &log, None))
            .unwrap();
        event_loop.stop();
        event_loop.run(&mut subsystems);
        assert_eq!(event_loop.nanoapp_count(), 0);
    }
}
