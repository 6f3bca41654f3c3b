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

//! Merges many per-nanoapp requests for one resource into a single request.

/// A request that can be combined with others of its kind.
///
/// The default value is the "no request" state and must be the identity of
/// [`MergeableRequest::merge_with`].
pub trait MergeableRequest: Clone + Default + PartialEq {
    /// Folds `other` into `self`, keeping the more demanding value of every
    /// field. Returns `true` if `self` changed.
    fn merge_with(&mut self, other: &Self) -> bool;

    /// Compares only the fields the platform sees.
    fn is_equivalent_to(&self, other: &Self) -> bool;
}

/// An ordered table of requests plus their merge (the maximal request).
///
/// Every mutation recomputes the maximal request from scratch and reports
/// whether it changed, so callers know when to reconfigure the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMultiplexer<R: MergeableRequest> {
    requests: Vec<R>,
    current_maximal_request: R,
}

impl<R: MergeableRequest> Default for RequestMultiplexer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: MergeableRequest> RequestMultiplexer<R> {
    /// An empty multiplexer.
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            current_maximal_request: R::default(),
        }
    }

    /// Appends a request. Returns its index and whether the maximal request changed.
    pub fn add_request(&mut self, request: R) -> (usize, bool) {
        self.requests.push(request);
        (self.requests.len() - 1, self.update_maximal_request())
    }

    /// Removes the request at `index`. Returns whether the maximal request changed.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn remove_request(&mut self, index: usize) -> bool {
        self.requests.remove(index);
        self.update_maximal_request()
    }

    /// Replaces the request at `index`. Returns whether the maximal request changed.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn update_request(&mut self, index: usize, request: R) -> bool {
        self.requests[index] = request;
        self.update_maximal_request()
    }

    /// Clears the table. Returns whether the maximal request changed.
    pub fn remove_all_requests(&mut self) -> bool {
        self.requests.clear();
        self.update_maximal_request()
    }

    /// The requests, in insertion order.
    pub fn requests(&self) -> &[R] {
        &self.requests
    }

    /// The merge of every request, or the default when empty.
    pub fn current_maximal_request(&self) -> &R {
        &self.current_maximal_request
    }

    fn update_maximal_request(&mut self) -> bool {
        let mut maximal = R::default();
        for request in &self.requests {
            maximal.merge_with(request);
        }
        let changed = !self.current_maximal_request.is_equivalent_to(&maximal);
        self.current_maximal_request = maximal;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Level(u32);

    impl MergeableRequest for Level {
        fn merge_with(&mut self, other: &Self) -> bool {
            if other.0 > self.0 {
                self.0 = other.0;
                true
            } else {
                false
            }
        }

        fn is_equivalent_to(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[test]
    fn add_reports_changes_only_when_the_maximum_moves() {
        let mut mux = RequestMultiplexer::new();
        assert_eq!(mux.add_request(Level(3)), (0, true));
        assert_eq!(mux.add_request(Level(1)), (1, false));
        assert_eq!(mux.add_request(Level(5)), (2, true));
        assert_eq!(mux.current_maximal_request(), &Level(5));
    }

    #[test]
    fn remove_and_update_recompute_from_scratch() {
        let mut mux = RequestMultiplexer::new();
        mux.add_request(Level(3));
        mux.add_request(Level(5));

        assert!(mux.remove_request(1));
        assert_eq!(mux.current_maximal_request(), &Level(3));

        assert!(mux.update_request(0, Level(2)));
        assert_eq!(mux.current_maximal_request(), &Level(2));

        assert!(mux.remove_all_requests());
        assert_eq!(mux.current_maximal_request(), &Level(0));
        assert!(mux.requests().is_empty());
    }

    #[test]
    fn add_then_remove_restores_previous_state() {
        let mut mux = RequestMultiplexer::new();
        mux.add_request(Level(4));
        let before = mux.clone();

        let (index, _) = mux.add_request(Level(9));
        mux.remove_request(index);
        assert_eq!(mux, before);
    }
}
