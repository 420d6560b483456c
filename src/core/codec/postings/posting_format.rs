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


use std::fmt;

use core::codec::postings::{
    BlockTermsReader, BlockTermsWriter, Lucene40PostingsReader, Lucene40PostingsWriter,
    DEFAULT_MAX_SKIP_LEVELS, DEFAULT_SKIP_INTERVAL, DEFAULT_SKIP_MINIMUM,
    DEFAULT_TERMS_BLOCK_SIZE,
};
use core::index::{Fields, SegmentReadState, SegmentWriteState};
use core::store::directory::Directory;

use error::ErrorKind::IllegalArgument;
use error::Result;

/// Encodes/decodes terms, postings, and proximity data.
pub trait PostingsFormat {
    type FieldsConsumer<D: Directory>;
    type FieldsProducer: Fields;

    fn name(&self) -> &'static str;

    /// Writes a new segment.
    fn fields_consumer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<Self::FieldsConsumer<D>>;

    /// Reads a segment. Every file the producer needs is open when this
    /// returns.
    fn fields_producer<D: Directory>(
        &self,
        state: &SegmentReadState<D>,
    ) -> Result<Self::FieldsProducer>;
}

/// The 4.0 postings format: `.frq`/`.prx` postings under a block terms
/// dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lucene40PostingsFormat {
    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,
    terms_block_size: usize,
}

impl Default for Lucene40PostingsFormat {
    fn default() -> Lucene40PostingsFormat {
        Lucene40PostingsFormat {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            max_skip_levels: DEFAULT_MAX_SKIP_LEVELS,
            skip_minimum: DEFAULT_SKIP_MINIMUM,
            terms_block_size: DEFAULT_TERMS_BLOCK_SIZE,
        }
    }
}

impl Lucene40PostingsFormat {
    pub fn with_skip_params(
        skip_interval: i32,
        max_skip_levels: i32,
        skip_minimum: i32,
    ) -> Result<Lucene40PostingsFormat> {
        if skip_interval < 2 {
            bail!(IllegalArgument(format!(
                "skip_interval must be >= 2; got {}",
                skip_interval
            )));
        }
        if max_skip_levels < 1 {
            bail!(IllegalArgument(format!(
                "max_skip_levels must be >= 1; got {}",
                max_skip_levels
            )));
        }
        Ok(Lucene40PostingsFormat {
            skip_interval,
            max_skip_levels,
            skip_minimum,
            ..Default::default()
        })
    }

    pub fn with_terms_block_size(mut self, terms_block_size: usize) -> Lucene40PostingsFormat {
        self.terms_block_size = terms_block_size.max(1);
        self
    }

    pub fn skip_interval(&self) -> i32 {
        self.skip_interval
    }
}

impl fmt::Display for Lucene40PostingsFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}(skipInterval={} maxSkipLevels={} skipMinimum={})",
            self.name(),
            self.skip_interval,
            self.max_skip_levels,
            self.skip_minimum
        )
    }
}

impl PostingsFormat for Lucene40PostingsFormat {
    type FieldsConsumer<D: Directory> = BlockTermsWriter<D>;
    type FieldsProducer = BlockTermsReader;

    fn name(&self) -> &'static str {
        "Lucene40"
    }

    fn fields_consumer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<BlockTermsWriter<D>> {
        let postings_writer = Lucene40PostingsWriter::new(
            state,
            self.skip_interval,
            self.max_skip_levels,
            self.skip_minimum,
        )?;
        BlockTermsWriter::new(state, postings_writer, self.terms_block_size)
    }

    fn fields_producer<D: Directory>(&self, state: &SegmentReadState<D>) -> Result<BlockTermsReader> {
        let postings_reader = Lucene40PostingsReader::open(
            state.directory.as_ref(),
            state.segment_info,
            &state.field_infos,
            state.context,
            &state.segment_suffix,
        )?;
        BlockTermsReader::open(state, postings_reader)
    }
}
