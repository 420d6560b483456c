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


use core::codec::doc_values::{
    Lucene40DocValuesReader, Lucene40DocValuesWriter, DOC_VALUES_CONTAINER, LEGACY_DV_TYPE_KEY,
};
use core::index::{SegmentReadState, SegmentWriteState};
use core::store::directory::Directory;

use error::Result;

/// Encodes/decodes per-document values of a segment.
pub trait DocValuesFormat {
    type Writer<D: Directory>;
    type Reader;

    fn name(&self) -> &'static str;

    /// Returns a writer for the doc values of `state`'s segment.
    fn fields_consumer<D: Directory>(&self, state: &SegmentWriteState<D>)
        -> Result<Self::Writer<D>>;

    /// Returns a reader over the doc values of `state`'s segment. Columns are
    /// loaded lazily.
    fn fields_producer<D: Directory>(&self, state: &SegmentReadState<D>) -> Result<Self::Reader>;
}

/// Doc values in the 4.0 layout, stored in the `dv` compound container.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lucene40DocValuesFormat;

impl DocValuesFormat for Lucene40DocValuesFormat {
    type Writer<D: Directory> = Lucene40DocValuesWriter<D>;
    type Reader = Lucene40DocValuesReader;

    fn name(&self) -> &'static str {
        "Lucene40"
    }

    fn fields_consumer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<Lucene40DocValuesWriter<D>> {
        Lucene40DocValuesWriter::new(state, DOC_VALUES_CONTAINER, LEGACY_DV_TYPE_KEY)
    }

    fn fields_producer<D: Directory>(
        &self,
        state: &SegmentReadState<D>,
    ) -> Result<Lucene40DocValuesReader> {
        Lucene40DocValuesReader::open(
            state.directory.as_ref(),
            state.segment_info,
            DOC_VALUES_CONTAINER,
            LEGACY_DV_TYPE_KEY,
            state.context,
        )
    }
}
