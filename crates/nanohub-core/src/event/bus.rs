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

use log;

/// Manages a generic, thread-safe, bounded event channel.
///
/// The bus is generic over the type `T` it transports, so `nanohub-core` stays
/// decoupled from the runtime's event envelope. Producers hold clones of
/// [`EventBus::sender`] and use `try_send`, so a full bus hands the item back
/// instead of blocking.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
    capacity: usize,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new EventBus holding at most `capacity` undelivered items.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        log::debug!("EventBus initialized with capacity {capacity}.");
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Returns a clone of the sender end of the channel.
    /// Use this to allow other parts of the system to send items.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a reference to the receiver end of the channel.
    /// Intended for the owner of the bus to process items.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Maximum number of undelivered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
