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

//! Time units used by the nanoapp API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A span of time in nanoseconds, as used by sensor intervals and latencies.
///
/// Unlike [`Duration`], the full `u64` range is meaningful: [`Nanoseconds::DEFAULT`]
/// (`u64::MAX`) is the "no preference" value of the sensor API.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Nanoseconds(pub u64);

impl Nanoseconds {
    /// The "no preference" interval/latency value.
    pub const DEFAULT: Self = Self(u64::MAX);

    /// Creates a value from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Returns the raw nanosecond count.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Converts to a [`Duration`].
    pub const fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl From<Duration> for Nanoseconds {
    fn from(value: Duration) -> Self {
        Self(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Nanoseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DEFAULT {
            write!(f, "default")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}
