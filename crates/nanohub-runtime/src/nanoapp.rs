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

//! The loop's bookkeeping for one loaded nanoapp.

use nanohub_core::event::EventType;
use nanohub_core::{AppId, InstanceId, Nanoapp, NanoappInfo};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// A read-only description of a loaded nanoapp, visible from any thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NanoappDescriptor {
    /// Runtime id.
    pub instance_id: InstanceId,
    /// Binary id.
    pub app_id: AppId,
    /// Binary version.
    pub version: u32,
    /// Name for logs.
    pub name: String,
}

/// One loaded nanoapp.
///
/// The body is taken out of its slot while one of its entry points runs, so
/// the callback can borrow the rest of the runtime mutably.
pub(crate) struct NanoappRecord {
    pub(crate) instance_id: InstanceId,
    pub(crate) info: NanoappInfo,
    registered_events: HashSet<EventType>,
    queue: VecDeque<u64>,
    pub(crate) body: Option<Box<dyn Nanoapp>>,
}

impl NanoappRecord {
    pub(crate) fn new(instance_id: InstanceId, info: NanoappInfo) -> Self {
        Self {
            instance_id,
            info,
            registered_events: HashSet::new(),
            queue: VecDeque::new(),
            body: None,
        }
    }

    pub(crate) fn descriptor(&self) -> NanoappDescriptor {
        NanoappDescriptor {
            instance_id: self.instance_id,
            app_id: self.info.app_id,
            version: self.info.version,
            name: self.info.name.clone(),
        }
    }

    /// Returns `true` if the registration is new.
    pub(crate) fn register_for_broadcast_event(&mut self, event_type: EventType) -> bool {
        self.registered_events.insert(event_type)
    }

    /// Returns `true` if a registration was removed.
    pub(crate) fn unregister_for_broadcast_event(&mut self, event_type: EventType) -> bool {
        self.registered_events.remove(&event_type)
    }

    pub(crate) fn is_registered_for_broadcast_event(&self, event_type: EventType) -> bool {
        self.registered_events.contains(&event_type)
    }

    pub(crate) fn post_event(&mut self, event_id: u64) {
        self.queue.push_back(event_id);
    }

    pub(crate) fn next_event(&mut self) -> Option<u64> {
        self.queue.pop_front()
    }

    pub(crate) fn has_pending_event(&self) -> bool {
        !self.queue.is_empty()
    }
}
