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


//! Term vectors: per document inverted data stored as three streams.
//!
//! `.tvx` holds two longs per document pointing into `.tvd` and `.tvf`.
//! `.tvd` holds the field count, the field numbers and the `.tvf` pointer
//! deltas of each field. `.tvf` holds, per field, the term count, a flags
//! byte and the prefix compressed terms with their positions, offsets and
//! payloads.

mod term_vectors_writer;

pub use self::term_vectors_writer::*;

mod term_vectors_reader;

pub use self::term_vectors_reader::*;

use std::sync::Arc;

use core::index::{FieldInfos, Fields, SegmentInfo};
use core::store::directory::Directory;
use core::store::IOContext;
use core::util::DocId;

use error::Result;

pub const VECTORS_FIELDS_EXTENSION: &str = "tvf";
pub const VECTORS_DOCUMENTS_EXTENSION: &str = "tvd";
pub const VECTORS_INDEX_EXTENSION: &str = "tvx";

pub const CODEC_NAME_FIELDS: &str = "Lucene40TermVectorsFields";
pub const CODEC_NAME_DOCS: &str = "Lucene40TermVectorsDocs";
pub const CODEC_NAME_INDEX: &str = "Lucene40TermVectorsIndex";

pub const VERSION_NO_PAYLOADS: i32 = 0;
pub const VERSION_PAYLOADS: i32 = 1;
/// All three files end with a checksum footer.
pub const VERSION_CHECKSUM: i32 = 2;
pub const VERSION_START: i32 = VERSION_NO_PAYLOADS;
pub const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

pub const STORE_POSITIONS_WITH_TERMVECTOR: u8 = 0x1;
pub const STORE_OFFSET_WITH_TERMVECTOR: u8 = 0x2;
pub const STORE_PAYLOAD_WITH_TERMVECTOR: u8 = 0x4;

/// Maximum number of contiguous documents to bulk-copy when merging term
/// vectors.
pub const MAX_RAW_MERGE_DOCS: usize = 4192;

/// Controls the format of term vectors
pub trait TermVectorsFormat {
    type Writer<D: Directory>;
    type Reader: TermVectorsReader;

    /// Returns a reader over the term vectors of `si`.
    fn vectors_reader<D: Directory + ?Sized>(
        &self,
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Self::Reader>;

    /// Returns a writer for the term vectors of `si`.
    fn vectors_writer<D: Directory>(
        &self,
        directory: Arc<D>,
        si: &SegmentInfo,
        context: &IOContext,
    ) -> Result<Self::Writer<D>>;
}

pub trait TermVectorsReader {
    type Fields: Fields;

    /// Returns the term vectors of `doc`, or `None` when it has none.
    fn get(&self, doc: DocId) -> Result<Option<Self::Fields>>;
}

impl<T: TermVectorsReader> TermVectorsReader for Arc<T> {
    type Fields = T::Fields;

    fn get(&self, doc: DocId) -> Result<Option<Self::Fields>> {
        (**self).get(doc)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Lucene40TermVectorsFormat;

impl TermVectorsFormat for Lucene40TermVectorsFormat {
    type Writer<D: Directory> = Lucene40TermVectorsWriter<D>;
    type Reader = Lucene40TermVectorsReader;

    fn vectors_reader<D: Directory + ?Sized>(
        &self,
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Lucene40TermVectorsReader> {
        Lucene40TermVectorsReader::open(directory, si, field_infos, context)
    }

    fn vectors_writer<D: Directory>(
        &self,
        directory: Arc<D>,
        si: &SegmentInfo,
        context: &IOContext,
    ) -> Result<Lucene40TermVectorsWriter<D>> {
        Lucene40TermVectorsWriter::new(directory, &si.name, context)
    }
}
