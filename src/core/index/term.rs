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


use core::search::{PostingIterator, PostingIteratorFlags};

use error::Result;

/// Access to the terms of every field of a segment, or of one document when
/// produced by a term vectors reader.
pub trait Fields {
    type Terms: Terms;

    /// Field names in field number order.
    fn fields(&self) -> Vec<String>;

    /// Returns the terms of `field`, or `None` if the field has none.
    fn terms(&self, field: &str) -> Result<Option<Self::Terms>>;

    fn size(&self) -> usize;
}

/// Access to the terms of a single field.
pub trait Terms {
    type Iterator: TermIterator;

    /// Returns an iterator positioned before the first term.
    fn iterator(&self) -> Result<Self::Iterator>;

    /// Number of terms for this field, or -1 if not known.
    fn size(&self) -> Result<i64>;

    /// Sum of `TermIterator::total_term_freq` over all terms, or -1 when
    /// frequencies are omitted.
    fn sum_total_term_freq(&self) -> Result<i64>;

    fn sum_doc_freq(&self) -> Result<i64>;

    /// Number of documents that have at least one term for this field.
    fn doc_count(&self) -> Result<i32>;

    fn has_freqs(&self) -> Result<bool>;

    fn has_offsets(&self) -> Result<bool>;

    fn has_positions(&self) -> Result<bool>;

    fn has_payloads(&self) -> Result<bool>;
}

/// Represents returned result from `TermIterator::seek_ceil`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekStatus {
    /// The term was not found, and the end of iteration was hit.
    End,
    /// The precise term was found.
    Found,
    /// A different term was found after the requested term
    NotFound,
}

/// Iterator over the sorted terms of a field.
///
/// Term byte order is plain unsigned lexicographic order. A freshly created
/// iterator is unpositioned: call `next` or one of the seek methods first.
pub trait TermIterator {
    type Postings: PostingIterator;

    /// Increments the iteration to the next term, returning `None` at the end.
    fn next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Attempts to seek to the exact term, returning true if the term is found.
    fn seek_exact(&mut self, text: &[u8]) -> Result<bool> {
        Ok(self.seek_ceil(text)? == SeekStatus::Found)
    }

    /// Seeks to the specified term, if it exists, or to the next (ceiling)
    /// term.
    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus>;

    /// Returns current term. Do not call this when the iterator is
    /// unpositioned.
    fn term(&self) -> Result<&[u8]>;

    /// Returns the number of documents containing the current term.
    fn doc_freq(&mut self) -> Result<i32>;

    /// Returns the total number of occurrences of this term across all
    /// documents, or -1 if frequencies were omitted.
    fn total_term_freq(&mut self) -> Result<i64>;

    /// Get `PostingIterator` for the current term, with frequencies.
    fn postings(&mut self) -> Result<Self::Postings> {
        self.postings_with_flags(PostingIteratorFlags::FREQS)
    }

    /// Get `PostingIterator` for the current term, with control over whether
    /// freqs, positions, offsets or payloads are required.
    fn postings_with_flags(&mut self, flags: u16) -> Result<Self::Postings>;
}
