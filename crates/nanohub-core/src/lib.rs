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

//! # Nanohub Core
//!
//! Foundational crate containing the traits, core types, and interface contracts
//! shared by the nanoapp runtime, the platform backends, and the nanoapps themselves.
//!
//! Nothing in this crate schedules or owns anything: the scheduler lives in
//! `nanohub-runtime`, and concrete platform backends live in `nanohub-infra`.

#![warn(missing_docs)]

pub mod api;
pub mod event;
pub mod fatal;
pub mod gnss;
pub mod ids;
pub mod nanoapp;
pub mod pal;
pub mod sensor;
pub mod time;
pub mod wifi;
pub mod wwan;

pub use api::{ApiError, AsyncResult, ChreApi, Cookie, ErrorCode};
pub use event::{EventPayload, EventType};
pub use ids::{AppId, InstanceId, TimerHandle};
pub use nanoapp::{Nanoapp, NanoappInfo};
pub use time::Nanoseconds;

#[doc(hidden)]
pub use log as __log;
