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


mod skip_writer;

pub use self::skip_writer::*;

mod skip_reader;

pub use self::skip_reader::*;

mod posting_writer;

pub use self::posting_writer::*;

mod posting_reader;

pub use self::posting_reader::*;

mod block_terms_writer;

pub use self::block_terms_writer::*;

mod block_terms_reader;

pub use self::block_terms_reader::*;

mod posting_format;

pub use self::posting_format::*;

/// Extension of the frequency file
pub const FREQ_EXTENSION: &str = "frq";
/// Extension of the prox file
pub const PROX_EXTENSION: &str = "prx";

pub const TERMS_CODEC: &str = "Lucene40PostingsWriterTerms";
pub const FRQ_CODEC: &str = "Lucene40PostingsWriterFrq";
pub const PRX_CODEC: &str = "Lucene40PostingsWriterPrx";

/// Initial format
pub const VERSION_START: i32 = 0;
/// Skip data is addressed with vlongs
pub const VERSION_LONG_SKIP: i32 = 1;
/// `.frq` and `.prx` end with a checksum footer
pub const VERSION_CHECKSUM: i32 = 2;
pub const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

/// Expert: The fraction of documents in a term's postings that carry a
/// skip entry. Smaller values give faster advancing but larger indexes.
pub const DEFAULT_SKIP_INTERVAL: i32 = 16;
/// Expert: The maximum number of skip levels.
pub const DEFAULT_MAX_SKIP_LEVELS: i32 = 10;
/// Terms with fewer docs than this never get skip data.
pub const DEFAULT_SKIP_MINIMUM: i32 = 16;

/// Term metadata: statistics plus the file pointers of a term's postings.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardTermState {
    /// how many docs have this term
    pub doc_freq: i32,
    /// total number of occurrences of this term, -1 when frequencies are omitted
    pub total_term_freq: i64,
    /// start of the term's postings in the `.frq` file
    pub freq_offset: i64,
    /// start of the term's positions in the `.prx` file
    pub prox_offset: i64,
    /// skip data offset relative to `freq_offset`, -1 when there is none
    pub skip_offset: i64,
    /// the term's ord in the current block
    pub term_block_ord: i32,
}

impl StandardTermState {
    pub fn new() -> StandardTermState {
        StandardTermState {
            doc_freq: 0,
            total_term_freq: -1,
            freq_offset: 0,
            prox_offset: 0,
            skip_offset: -1,
            term_block_ord: 0,
        }
    }
}

impl Default for StandardTermState {
    fn default() -> Self {
        StandardTermState::new()
    }
}

#[cfg(test)]
mod tests;
