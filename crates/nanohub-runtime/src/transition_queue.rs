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

//! A bounded FIFO of pending asynchronous state transitions.
//!
//! The front entry is the one whose platform call is in flight (if any). New
//! entries are only issued once the front one completed.

use std::collections::VecDeque;

/// Bounded FIFO. Pushing onto a full queue hands the item back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> TransitionQueue<T> {
    /// An empty queue holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, or returns it if the queue is full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.items.len() >= self.capacity {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// The oldest entry.
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Removes the oldest entry.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes the newest entry.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops queued entries for which `keep` is false. The front entry stays,
    /// since its platform call may already be in flight.
    pub fn retain_queued<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        let mut index = 0;
        self.items.retain(|item| {
            index += 1;
            index == 1 || keep(item)
        });
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_and_bounded() {
        let mut queue = TransitionQueue::with_capacity(2);
        assert_eq!(queue.push(1), Ok(()));
        assert_eq!(queue.push(2), Ok(()));
        assert_eq!(queue.push(3), Err(3));
        assert_eq!(queue.front(), Some(&1));
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_back_undoes_the_last_push() {
        let mut queue = TransitionQueue::with_capacity(4);
        queue.push('a').unwrap();
        queue.push('b').unwrap();
        assert_eq!(queue.pop_back(), Some('b'));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec!['a']);
    }

    #[test]
    fn retain_queued_keeps_the_front() {
        let mut queue = TransitionQueue::with_capacity(4);
        for item in [7, 7, 3, 7] {
            queue.push(item).unwrap();
        }
        queue.retain_queued(|item| *item != 7);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![7, 3]);
    }
}
