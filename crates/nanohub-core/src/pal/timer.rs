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

use std::time::Duration;

/// The function a [`SystemTimer`] invokes when it fires.
///
/// Called on an arbitrary thread.
pub type TimerCallback = Box<dyn Fn() + Send + Sync>;

/// A single one-shot hardware or OS timer.
pub trait SystemTimer: Send {
    /// Installs the expiry callback. Returns `false` if the timer could not be
    /// initialized.
    fn init(&mut self, callback: TimerCallback) -> bool;

    /// Arms the timer to fire once after `delay`, replacing any pending expiry.
    fn set(&mut self, delay: Duration) -> bool;

    /// Disarms the timer. Returns `false` if nothing was pending.
    fn cancel(&mut self) -> bool;
}
