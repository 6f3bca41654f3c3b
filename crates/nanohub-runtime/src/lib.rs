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

//! # Nanohub Runtime
//!
//! The cooperative scheduler that hosts nanoapps. One [`EventLoopManager`] owns
//! the [`EventLoop`] (nanoapps, event dispatch, timers) and the resource
//! request managers that multiplex nanoapp requests onto the platform
//! backends. Other threads reach the loop only through a [`RuntimeHandle`].

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod gnss_request_manager;
pub mod handle;
pub mod manager;
pub mod nanoapp;
pub mod request_multiplexer;
pub mod sensor;
pub mod stats;
#[cfg(test)]
mod test_support;
pub mod timer_pool;
pub mod transition_queue;
pub mod wifi_request_manager;
pub mod wwan_request_manager;

pub use config::RuntimeConfig;
pub use context::RuntimeContext;
pub use error::{
    ConfigError, GnssRequestError, PostEventError, SensorRequestError, StartNanoappError,
    TimerError, WifiRequestError, WwanRequestError,
};
pub use event::{Event, ReleaseCallback, SystemCallbackType};
pub use event_loop::EventLoop;
pub use handle::RuntimeHandle;
pub use manager::{EventLoopManager, Platform, Subsystems};
pub use nanoapp::NanoappDescriptor;
pub use stats::LoopStatsSnapshot;
