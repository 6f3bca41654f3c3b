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

//! Identifiers shared across the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A globally unique, build-time identifier of a nanoapp binary.
pub type AppId = u64;

/// The runtime identifier of one loaded nanoapp instance.
///
/// Two values are reserved: [`InstanceId::SYSTEM`] identifies the runtime itself
/// as a sender or target, and [`InstanceId::BROADCAST`] targets every nanoapp
/// registered for an event type. Neither is ever assigned to a nanoapp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// The runtime itself.
    pub const SYSTEM: Self = Self(0);
    /// Every nanoapp registered for the event type.
    pub const BROADCAST: Self = Self(u32::MAX);

    /// Returns `true` for the two reserved sentinel ids.
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::SYSTEM.0 || self.0 == Self::BROADCAST.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SYSTEM => write!(f, "system"),
            Self::BROADCAST => write!(f, "broadcast"),
            Self(id) => write!(f, "{id}"),
        }
    }
}

/// A handle to a timer owned by a nanoapp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u32);

impl TimerHandle {
    /// Never returned by a successful `set_timer`.
    pub const INVALID: Self = Self(0);
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_detected() {
        assert!(InstanceId::SYSTEM.is_reserved());
        assert!(InstanceId::BROADCAST.is_reserved());
        assert!(!InstanceId(1).is_reserved());
    }

    #[test]
    fn display_names_sentinels() {
        assert_eq!(InstanceId::SYSTEM.to_string(), "system");
        assert_eq!(InstanceId::BROADCAST.to_string(), "broadcast");
        assert_eq!(InstanceId(12).to_string(), "12");
    }
}
