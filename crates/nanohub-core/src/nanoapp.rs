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

//! Traits for independently-built applications hosted by the runtime (nanoapps).

use crate::api::ChreApi;
use crate::event::EventType;
use crate::ids::{AppId, InstanceId};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Static description of a nanoapp binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NanoappInfo {
    /// Globally unique id of the binary. At most one instance per id may run.
    pub app_id: AppId,
    /// Version of the binary.
    pub version: u32,
    /// Human-readable name for logs.
    pub name: String,
}

impl NanoappInfo {
    /// Creates a description.
    pub fn new(app_id: AppId, version: u32, name: impl Into<String>) -> Self {
        Self {
            app_id,
            version,
            name: name.into(),
        }
    }
}

/// The entry points of a nanoapp.
///
/// All three run on the event loop thread, to completion, one at a time. The
/// `chre` argument is only valid for the duration of the call.
pub trait Nanoapp: Send {
    /// Returns the static description of this nanoapp.
    fn info(&self) -> NanoappInfo;

    /// Called once when the nanoapp is loaded. Returning `false` aborts the load.
    fn start(&mut self, chre: &mut dyn ChreApi) -> bool;

    /// Called for every event targeted at this nanoapp or broadcast to an event
    /// type it is registered for.
    fn handle_event(
        &mut self,
        chre: &mut dyn ChreApi,
        sender_instance_id: InstanceId,
        event_type: EventType,
        data: Option<&(dyn Any + Send)>,
    );

    /// Called once before the nanoapp is unloaded, after its queue drained.
    fn end(&mut self, chre: &mut dyn ChreApi);
}
