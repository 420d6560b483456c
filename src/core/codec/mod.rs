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


pub mod codec_util;
pub mod compound;
pub mod doc_values;
pub mod field_infos;
pub mod live_docs;
pub mod norms;
pub mod postings;
pub mod segment_infos;
pub mod stored_fields;
pub mod term_vectors;

mod lucene40;

pub use self::lucene40::*;

use core::codec::doc_values::DocValuesFormat;
use core::codec::field_infos::FieldInfosFormat;
use core::codec::live_docs::LiveDocsFormat;
use core::codec::norms::NormsFormat;
use core::codec::postings::PostingsFormat;
use core::codec::segment_infos::SegmentInfoFormat;
use core::codec::stored_fields::StoredFieldsFormat;
use core::codec::term_vectors::TermVectorsFormat;

use error::ErrorKind::IllegalArgument;
use error::Result;

/// Encodes/decodes an inverted index segment.
///
/// Each accessor hands out the format responsible for one kind of segment
/// file. Formats are small configuration values and are returned by value.
pub trait Codec: Send + Sync {
    type PostingFmt: PostingsFormat;
    type DVFmt: DocValuesFormat;
    type StoredFmt: StoredFieldsFormat;
    type TVFmt: TermVectorsFormat;
    type FieldFmt: FieldInfosFormat;
    type SegmentFmt: SegmentInfoFormat;
    type NormFmt: NormsFormat;
    type LiveDocFmt: LiveDocsFormat;

    fn name(&self) -> &str;

    fn postings_format(&self) -> Self::PostingFmt;

    fn doc_values_format(&self) -> Self::DVFmt;

    fn stored_fields_format(&self) -> Self::StoredFmt;

    fn term_vectors_format(&self) -> Self::TVFmt;

    fn field_infos_format(&self) -> Self::FieldFmt;

    fn segment_info_format(&self) -> Self::SegmentFmt;

    fn norms_format(&self) -> Self::NormFmt;

    fn live_docs_format(&self) -> Self::LiveDocFmt;
}

/// Looks up a codec by the name recorded in segment metadata.
pub fn codec_for_name(name: &str) -> Result<Lucene40Codec> {
    match name {
        LUCENE40_CODEC_NAME => Ok(Lucene40Codec::default()),
        _ => bail!(IllegalArgument(format!("Invalid codec name: {}", name))),
    }
}
