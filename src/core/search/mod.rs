// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.


mod posting_iterator;

pub use self::posting_iterator::*;

use std::i32;

use core::util::DocId;

use error::Result;

pub type Payload = Vec<u8>;

pub const NO_MORE_DOCS: DocId = i32::MAX;

/// Iterates over a sorted set of document ids.
pub trait DocIterator: Send {
    /// Returns the following:
    ///
    /// * `-1` if `next()` or `advance(DocId)` were not called yet.
    /// * `NO_MORE_DOCS` if the iterator has exhausted.
    /// * Otherwise it should return the doc ID it is currently on.
    fn doc_id(&self) -> DocId;

    /// Advances to the next document in the set and returns the doc it is
    /// currently on, or `NO_MORE_DOCS` if there are no more docs in the
    /// set.
    fn next(&mut self) -> Result<DocId>;

    /// Advances to the first beyond the current whose document number is greater
    /// than or equal to _target_, and returns the document number itself.
    /// Exhausts the iterator and returns `NO_MORE_DOCS` if _target_
    /// is greater than the highest document number in the set.
    ///
    /// The behavior of this method is *undefined* when called with
    /// `target <= current`, or after the iterator has exhausted.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Slow (linear) implementation of `advance` relying on
    /// `next()` to advance beyond the target position.
    fn slow_advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(self.doc_id() < target);
        let mut doc = self.doc_id();
        while doc < target {
            doc = self.next()?;
        }
        Ok(doc)
    }

    /// Returns the estimated cost of this `DocIterator`.
    ///
    /// This is generally an upper bound of the number of documents this iterator
    /// might match.
    fn cost(&self) -> usize;
}
