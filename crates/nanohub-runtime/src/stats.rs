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

//! Counters describing event traffic through the loop.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct LoopStats {
    posted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    pool_exhausted: AtomicU64,
}

impl LoopStats {
    pub(crate) fn record_posted(&self) {
        self.posted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, live_events: usize, high_water_mark: usize) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            events_posted: self.posted.load(Ordering::Relaxed),
            events_delivered: self.delivered.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            live_events,
            high_water_mark,
        }
    }
}

/// A point-in-time copy of the loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatsSnapshot {
    /// Events accepted by `post_event`.
    pub events_posted: u64,
    /// Deliveries to nanoapps. A broadcast to three nanoapps counts three.
    pub events_delivered: u64,
    /// Events freed without reaching any nanoapp, excluding system callbacks.
    pub events_dropped: u64,
    /// Posts refused because the pool was full.
    pub pool_exhausted: u64,
    /// Events currently allocated.
    pub live_events: usize,
    /// Most events ever allocated at once.
    pub high_water_mark: usize,
}
