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

//! The single abort primitive of the runtime.
//!
//! Unrecoverable conditions (instance id exhaustion, failure to deliver a
//! system-critical result, timer subsystem initialization failure) are not
//! retried. They are logged and the current task panics.

/// Logs the message at `error` level and panics with it.
///
/// # Examples
///
/// ```should_panic
/// nanohub_core::fatal_error!("instance id space exhausted at {}", 42);
/// ```
#[macro_export]
macro_rules! fatal_error {
    ($($arg:tt)+) => {{
        $crate::__log::error!("FATAL: {}", format_args!($($arg)+));
        panic!($($arg)+)
    }};
}
