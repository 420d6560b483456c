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


/// Controls how much information is stored in the postings lists. Variants
/// are ordered from least to most detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IndexOptions {
    /// Not indexed
    Null,
    /// Only documents are indexed: term frequencies and positions are omitted.
    Docs,
    /// Only documents and term frequencies are indexed: positions are omitted.
    DocsAndFreqs,
    /// Indexes documents, frequencies and positions.
    DocsAndFreqsAndPositions,
    /// Indexes documents, frequencies, positions and offsets.
    DocsAndFreqsAndPositionsAndOffsets,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions::Null
    }
}

impl IndexOptions {
    pub fn has_docs(self) -> bool {
        self >= IndexOptions::Docs
    }

    pub fn has_freqs(self) -> bool {
        self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(self) -> bool {
        self == IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_are_cumulative() {
        assert!(!IndexOptions::Null.has_docs());
        assert!(IndexOptions::Docs.has_docs());
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositions.has_positions());
        assert!(!IndexOptions::DocsAndFreqsAndPositions.has_offsets());
        assert!(IndexOptions::DocsAndFreqsAndPositionsAndOffsets.has_offsets());
    }
}
