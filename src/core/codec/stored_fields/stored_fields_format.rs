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


use std::sync::Arc;

use core::codec::stored_fields::{Lucene40StoredFieldsReader, Lucene40StoredFieldsWriter};
use core::index::{FieldInfos, SegmentInfo};
use core::store::directory::Directory;
use core::store::IOContext;

use error::Result;

/// Controls the format of stored fields.
pub trait StoredFieldsFormat {
    type Writer<D: Directory>;
    type Reader;

    /// Returns a reader over the stored fields of `si`.
    fn fields_reader<D: Directory + ?Sized>(
        &self,
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Self::Reader>;

    /// Returns a writer that appends stored fields for `si`.
    fn fields_writer<D: Directory>(
        &self,
        directory: Arc<D>,
        si: &SegmentInfo,
        context: &IOContext,
    ) -> Result<Self::Writer<D>>;
}

/// Stored fields as a fixed stride `.fdx` index over `.fdt` records.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lucene40StoredFieldsFormat;

impl StoredFieldsFormat for Lucene40StoredFieldsFormat {
    type Writer<D: Directory> = Lucene40StoredFieldsWriter<D>;
    type Reader = Lucene40StoredFieldsReader;

    fn fields_reader<D: Directory + ?Sized>(
        &self,
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Lucene40StoredFieldsReader> {
        Lucene40StoredFieldsReader::open(directory, si, field_infos, context)
    }

    fn fields_writer<D: Directory>(
        &self,
        directory: Arc<D>,
        si: &SegmentInfo,
        context: &IOContext,
    ) -> Result<Lucene40StoredFieldsWriter<D>> {
        Lucene40StoredFieldsWriter::new(directory, &si.name, context)
    }
}
