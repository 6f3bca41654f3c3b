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

//! The thread-safe entry point into a running loop.

use crate::context::RuntimeContext;
use crate::error::PostEventError;
use crate::event::{release_callback, Event, EventPool, QueueItem, ReleaseCallback, SystemCallbackType};
use crate::nanoapp::NanoappDescriptor;
use crate::stats::{LoopStats, LoopStatsSnapshot};
use nanohub_core::event::{EventPayload, EventType};
use nanohub_core::{fatal_error, AppId, InstanceId, Nanoapp, Nanoseconds};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// State of a loop that other threads may observe.
pub(crate) struct LoopShared {
    pub(crate) running: AtomicBool,
    pub(crate) pool: EventPool,
    pub(crate) stats: LoopStats,
    /// Mirror of the loop's nanoapp table for off-thread lookups.
    pub(crate) directory: Mutex<Vec<NanoappDescriptor>>,
    pub(crate) boot: Instant,
}

impl LoopShared {
    pub(crate) fn new(max_event_count: usize) -> Self {
        Self {
            running: AtomicBool::new(true),
            pool: EventPool::new(max_event_count),
            stats: LoopStats::default(),
            directory: Mutex::new(Vec::new()),
            boot: Instant::now(),
        }
    }
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A cheap, cloneable handle to an [`crate::EventLoop`], usable from any thread.
///
/// This is the only way for code outside the loop thread (platform callbacks,
/// host threads, the system timer) to reach runtime state: everything that is
/// not a plain lookup is marshalled onto the loop as an event.
#[derive(Clone)]
pub struct RuntimeHandle {
    sender: flume::Sender<QueueItem>,
    shared: Arc<LoopShared>,
}

impl RuntimeHandle {
    pub(crate) fn new(sender: flume::Sender<QueueItem>, shared: Arc<LoopShared>) -> Self {
        Self { sender, shared }
    }

    /// Posts an event to the loop. Never blocks.
    ///
    /// On error the event is dropped without running its release callback.
    pub fn post_event(
        &self,
        event_type: EventType,
        data: Option<EventPayload>,
        release: Option<ReleaseCallback>,
        sender: InstanceId,
        target: InstanceId,
    ) -> Result<(), PostEventError> {
        self.try_post(Event {
            event_type,
            data,
            release,
            sender,
            target,
        })
        .map_err(|(err, _)| err)
    }

    /// Posts `event`, handing its payload back when the loop did not take it.
    pub(crate) fn try_post(
        &self,
        event: Event,
    ) -> Result<(), (PostEventError, Option<EventPayload>)> {
        if !self.is_running() {
            return Err((PostEventError::NotRunning, event.data));
        }

        let (event_type, sender, target) = (event.event_type, event.sender, event.target);
        let pool = &self.shared.pool;
        if !pool.try_allocate() {
            self.shared.stats.record_pool_exhausted();
            log::error!(
                "EventLoop: Failed to allocate event 0x{:04x} ({} live)",
                event_type,
                pool.live()
            );
            let capacity = pool.capacity();
            return Err((PostEventError::PoolExhausted { capacity }, event.data));
        }

        match self.sender.try_send(QueueItem::Event(event)) {
            Ok(()) => {
                self.shared.stats.record_posted();
                log::trace!("EventLoop: Posted event 0x{event_type:04x} from {sender} to {target}");
                Ok(())
            }
            Err(flume::TrySendError::Full(item)) => {
                pool.deallocate();
                log::error!("EventLoop: Dispatch queue full, dropping event 0x{event_type:04x}");
                Err((PostEventError::QueueFull, item.into_payload()))
            }
            Err(flume::TrySendError::Disconnected(item)) => {
                pool.deallocate();
                Err((PostEventError::NotRunning, item.into_payload()))
            }
        }
    }

    /// Runs `callback` on the loop thread with full access to the runtime.
    pub fn defer_callback<F>(
        &self,
        callback_type: SystemCallbackType,
        callback: F,
    ) -> Result<(), PostEventError>
    where
        F: FnOnce(&mut RuntimeContext<'_>) + Send + 'static,
    {
        self.post_event(
            callback_type.event_type(),
            None,
            Some(release_callback(move |ctx, _, _| callback(ctx))),
            InstanceId::SYSTEM,
            InstanceId::SYSTEM,
        )
    }

    /// Defers a callback the runtime cannot do without. Failing to post it
    /// while running is fatal.
    pub(crate) fn defer_callback_or_die<F>(&self, callback_type: SystemCallbackType, callback: F)
    where
        F: FnOnce(&mut RuntimeContext<'_>) + Send + 'static,
    {
        match self.defer_callback(callback_type, callback) {
            Ok(()) => {}
            Err(PostEventError::NotRunning) => {
                log::debug!("EventLoop: Dropping {callback_type:?} callback during shutdown");
            }
            Err(err) => fatal_error!("Failed to defer {callback_type:?} callback: {err}"),
        }
    }

    /// Posts `data` from the system as a typed payload. If the loop does not
    /// take the event, `data` is handed back to its owner.
    pub(crate) fn post_owned<T>(
        &self,
        event_type: EventType,
        data: T,
        release: ReleaseCallback,
        target: InstanceId,
    ) -> Result<(), (PostEventError, T)>
    where
        T: Send + 'static,
    {
        let event = Event {
            event_type,
            data: Some(Box::new(data)),
            release: Some(release),
            sender: InstanceId::SYSTEM,
            target,
        };
        self.try_post(event).map_err(|(err, data)| {
            match data.map(|data| data.downcast::<T>()) {
                Some(Ok(data)) => (err, *data),
                _ => fatal_error!("Event 0x{event_type:04x} payload changed type in flight"),
            }
        })
    }

    /// Moves `data` onto the loop thread and runs `callback` with it there.
    /// `data` comes back if the callback could not be deferred.
    pub(crate) fn defer_with_data<T, F>(
        &self,
        callback_type: SystemCallbackType,
        data: T,
        callback: F,
    ) -> Result<(), (PostEventError, T)>
    where
        T: Send + 'static,
        F: FnOnce(&mut RuntimeContext<'_>, T) + Send + 'static,
    {
        let release = release_callback(move |ctx, _, data| {
            match data.map(|data| data.downcast::<T>()) {
                Some(Ok(data)) => callback(ctx, *data),
                _ => log::error!("EventLoop: {callback_type:?} callback lost its payload"),
            }
        });
        self.post_owned(callback_type.event_type(), data, release, InstanceId::SYSTEM)
    }

    /// [`RuntimeHandle::defer_with_data`] for callbacks the runtime cannot do
    /// without. `data` only comes back during shutdown. Any other failure is
    /// fatal.
    pub(crate) fn defer_with_data_or_die<T, F>(
        &self,
        callback_type: SystemCallbackType,
        data: T,
        callback: F,
    ) -> Result<(), T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RuntimeContext<'_>, T) + Send + 'static,
    {
        match self.defer_with_data(callback_type, data, callback) {
            Ok(()) => Ok(()),
            Err((PostEventError::NotRunning, data)) => {
                log::debug!("EventLoop: Returning {callback_type:?} payload during shutdown");
                Err(data)
            }
            Err((err, _)) => fatal_error!("Failed to defer {callback_type:?} callback: {err}"),
        }
    }

    /// Loads a nanoapp on the loop thread. Failures are logged there.
    pub fn load_nanoapp(&self, nanoapp: Box<dyn Nanoapp>) -> Result<(), PostEventError> {
        self.defer_callback(SystemCallbackType::FinishLoadingNanoapp, move |ctx| {
            if let Err(err) = ctx.start_nanoapp(nanoapp) {
                log::error!("EventLoop: Failed to load nanoapp: {err}");
            }
        })
    }

    /// Unloads the nanoapp with `app_id` on the loop thread.
    pub fn unload_nanoapp(&self, app_id: AppId) -> Result<(), PostEventError> {
        self.defer_callback(SystemCallbackType::UnloadNanoapp, move |ctx| {
            match ctx.event_loop().find_nanoapp_instance_id_by_app_id(app_id) {
                Some(instance_id) => {
                    ctx.stop_nanoapp(instance_id);
                }
                None => log::warn!("EventLoop: No nanoapp with app id 0x{app_id:016x} to unload"),
            }
        })
    }

    /// Asks the loop to finish. Queued work is drained, then every nanoapp ends.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            log::info!("EventLoop: Stop requested.");
        }
        // A full queue means the loop is not blocked and will see the flag.
        let _ = self.sender.try_send(QueueItem::Stop);
    }

    /// `false` once [`RuntimeHandle::stop`] was called.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Looks up a loaded nanoapp by binary id.
    pub fn find_nanoapp_instance_id_by_app_id(&self, app_id: AppId) -> Option<InstanceId> {
        lock_or_recover(&self.shared.directory)
            .iter()
            .find(|descriptor| descriptor.app_id == app_id)
            .map(|descriptor| descriptor.instance_id)
    }

    /// Calls `f` for every loaded nanoapp, in load order.
    pub fn for_each_nanoapp<F>(&self, mut f: F)
    where
        F: FnMut(&NanoappDescriptor),
    {
        for descriptor in lock_or_recover(&self.shared.directory).iter() {
            f(descriptor);
        }
    }

    /// Current event counters.
    pub fn stats(&self) -> LoopStatsSnapshot {
        let pool = &self.shared.pool;
        self.shared
            .stats
            .snapshot(pool.live(), pool.high_water_mark())
    }

    /// Monotonic time since the loop was created.
    pub fn time(&self) -> Nanoseconds {
        Nanoseconds::from(self.shared.boot.elapsed())
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("running", &self.is_running())
            .field("live_events", &self.shared.pool.live())
            .finish()
    }
}
