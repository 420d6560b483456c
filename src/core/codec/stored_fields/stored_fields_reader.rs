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

use core::codec::codec_util::{
    check_header, checksum_entire_file, footer_length, header_length, retrieve_checksum,
};
use core::codec::stored_fields::{
    CODEC_NAME_DAT, CODEC_NAME_IDX, FIELDS_EXTENSION, FIELDS_INDEX_EXTENSION, FIELD_IS_BINARY,
    FIELD_IS_NUMERIC_DOUBLE, FIELD_IS_NUMERIC_FLOAT, FIELD_IS_NUMERIC_INT, FIELD_IS_NUMERIC_LONG,
    FIELD_IS_NUMERIC_MASK, VERSION_CHECKSUM, VERSION_CURRENT, VERSION_START,
};
use core::doc::{Document, DocumentStoredFieldVisitor};
use core::index::{segment_file_name, FieldInfo, FieldInfos, SegmentInfo, Status};
use core::index::StoredFieldVisitor;
use core::store::directory::Directory;
use core::store::io::IndexInput;
use core::store::IOContext;
use core::util::DocId;

use error::ErrorKind::{AlreadyClosed, CorruptIndex, IndexOutOfBounds};
use error::Result;

/// Reads the `.fdx`/`.fdt` stored fields of one segment.
///
/// Each reader owns its own cursors; use `duplicate` to read from several
/// threads at once.
pub struct Lucene40StoredFieldsReader {
    field_infos: Arc<FieldInfos>,
    fields_stream: Option<Box<dyn IndexInput>>,
    index_stream: Option<Box<dyn IndexInput>>,
    num_total_docs: i32,
    version: i32,
    index_header_length: i64,
    data_end: i64,
}

impl Lucene40StoredFieldsReader {
    pub fn open<D: Directory + ?Sized>(
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Lucene40StoredFieldsReader> {
        let name = segment_file_name(&si.name, "", FIELDS_INDEX_EXTENSION);
        let mut index_stream = directory.open_input(&name, context)?;
        let version =
            check_header(index_stream.as_mut(), CODEC_NAME_IDX, VERSION_START, VERSION_CURRENT)?;

        let name = segment_file_name(&si.name, "", FIELDS_EXTENSION);
        let mut fields_stream = directory.open_input(&name, context)?;
        let data_version =
            check_header(fields_stream.as_mut(), CODEC_NAME_DAT, VERSION_START, VERSION_CURRENT)?;
        if data_version != version {
            bail!(CorruptIndex(format!(
                "version mismatch: {}={} {}={}",
                index_stream.name(),
                version,
                fields_stream.name(),
                data_version
            )));
        }

        let footer = if version >= VERSION_CHECKSUM {
            retrieve_checksum(index_stream.as_mut())?;
            retrieve_checksum(fields_stream.as_mut())?;
            footer_length() as i64
        } else {
            0
        };

        let index_header_length = header_length(CODEC_NAME_IDX) as i64;
        let index_size = index_stream.len() as i64 - index_header_length - footer;
        if index_size < 0 || index_size % 8 != 0 {
            bail!(CorruptIndex(format!(
                "invalid index size: {} (resource={})",
                index_size,
                index_stream.name()
            )));
        }
        let num_total_docs = (index_size >> 3) as i32;
        if num_total_docs != si.max_doc() {
            bail!(CorruptIndex(format!(
                "doc counts differ for segment {}: fieldsReader shows {} but segmentInfo shows {}",
                si.name,
                num_total_docs,
                si.max_doc()
            )));
        }
        let data_end = fields_stream.len() as i64 - footer;

        Ok(Lucene40StoredFieldsReader {
            field_infos,
            fields_stream: Some(fields_stream),
            index_stream: Some(index_stream),
            num_total_docs,
            version,
            index_header_length,
            data_end,
        })
    }

    /// Returns a reader with independent cursors over the same files.
    pub fn duplicate(&self) -> Result<Lucene40StoredFieldsReader> {
        let (fields_stream, index_stream) = match (&self.fields_stream, &self.index_stream) {
            (Some(fields), Some(index)) => (fields.duplicate()?, index.duplicate()?),
            _ => bail!(AlreadyClosed("this FieldsReader is closed".into())),
        };
        Ok(Lucene40StoredFieldsReader {
            field_infos: Arc::clone(&self.field_infos),
            fields_stream: Some(fields_stream),
            index_stream: Some(index_stream),
            num_total_docs: self.num_total_docs,
            version: self.version,
            index_header_length: self.index_header_length,
            data_end: self.data_end,
        })
    }

    /// Releases both files. Every later call fails with `AlreadyClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.fields_stream = None;
        self.index_stream = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.num_total_docs as usize
    }

    pub fn is_empty(&self) -> bool {
        self.num_total_docs == 0
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn field_infos(&self) -> &FieldInfos {
        &self.field_infos
    }

    fn streams(&mut self) -> Result<(&mut dyn IndexInput, &mut dyn IndexInput)> {
        match (self.fields_stream.as_mut(), self.index_stream.as_mut()) {
            (Some(fields), Some(index)) => {
                let fields: &mut dyn IndexInput = fields.as_mut();
                let index: &mut dyn IndexInput = index.as_mut();
                Ok((fields, index))
            }
            _ => bail!(AlreadyClosed("this FieldsReader is closed".into())),
        }
    }

    /// Positions the fields stream at the record of `doc`.
    fn seek_document(&mut self, doc: DocId) -> Result<&mut dyn IndexInput> {
        if doc < 0 || doc >= self.num_total_docs {
            bail!(IndexOutOfBounds(format!(
                "doc {} out of range [0, {})",
                doc, self.num_total_docs
            )));
        }
        let index_pointer = self.index_header_length + i64::from(doc) * 8;
        let (fields, index) = self.streams()?;
        index.seek(index_pointer)?;
        let position = index.read_long()?;
        fields.seek(position)?;
        Ok(fields)
    }

    /// Visits the stored fields of `doc`. Fields the visitor declines are
    /// stepped over without being decoded.
    pub fn visit_document<V: StoredFieldVisitor + ?Sized>(
        &mut self,
        doc: DocId,
        visitor: &mut V,
    ) -> Result<()> {
        let field_infos = Arc::clone(&self.field_infos);
        let fields = self.seek_document(doc)?;
        let num_fields = fields.read_vint()?;
        for _ in 0..num_fields {
            let field_number = fields.read_vint()?;
            let field_info = match field_infos.field_info_by_number(field_number) {
                Some(field_info) => field_info,
                None => bail!(CorruptIndex(format!(
                    "unknown field number {} in doc {} (resource={})",
                    field_number,
                    doc,
                    fields.name()
                ))),
            };
            let bits = fields.read_byte()?;
            if bits & !(FIELD_IS_BINARY | FIELD_IS_NUMERIC_MASK) != 0 {
                bail!(CorruptIndex(format!(
                    "invalid field bits {:#x} (resource={})",
                    bits,
                    fields.name()
                )));
            }

            match visitor.needs_field(field_info) {
                Status::YES => read_field(fields, visitor, field_info, bits)?,
                Status::NO => skip_field(fields, bits)?,
                Status::STOP => return Ok(()),
            }
        }
        Ok(())
    }

    /// Loads every stored field of `doc` into a `Document`.
    pub fn document(&mut self, doc: DocId) -> Result<Document> {
        let mut visitor = DocumentStoredFieldVisitor::new(&[]);
        self.visit_document(doc, &mut visitor)?;
        Ok(visitor.document())
    }

    /// Returns the fields stream positioned at `start_doc`, after filling
    /// `lengths` with the byte length of `num_docs` consecutive records.
    /// Used for bulk merging.
    pub fn raw_docs(
        &mut self,
        lengths: &mut [i32],
        start_doc: DocId,
        num_docs: usize,
    ) -> Result<&mut dyn IndexInput> {
        if start_doc < 0 || start_doc as usize + num_docs > self.num_total_docs as usize {
            bail!(IndexOutOfBounds(format!(
                "docs [{}, {}) out of range [0, {})",
                start_doc,
                start_doc as usize + num_docs,
                self.num_total_docs
            )));
        }
        let num_total_docs = self.num_total_docs;
        let data_end = self.data_end;
        let index_pointer = self.index_header_length + i64::from(start_doc) * 8;
        let (fields, index) = self.streams()?;
        index.seek(index_pointer)?;
        let start_offset = index.read_long()?;
        let mut last_offset = start_offset;
        for (count, length) in lengths.iter_mut().take(num_docs).enumerate() {
            let doc = start_doc + count as i32 + 1;
            let offset = if doc < num_total_docs {
                index.read_long()?
            } else {
                data_end
            };
            *length = (offset - last_offset) as i32;
            last_offset = offset;
        }
        fields.seek(start_offset)?;
        Ok(fields)
    }

    /// Verifies the checksums of both files. Legacy files are not checked.
    pub fn check_integrity(&self) -> Result<()> {
        match (&self.fields_stream, &self.index_stream) {
            (Some(fields), Some(index)) => {
                if self.version >= VERSION_CHECKSUM {
                    checksum_entire_file(index.as_ref())?;
                    checksum_entire_file(fields.as_ref())?;
                }
                Ok(())
            }
            _ => bail!(AlreadyClosed("this FieldsReader is closed".into())),
        }
    }
}

fn read_field<V: StoredFieldVisitor + ?Sized>(
    input: &mut dyn IndexInput,
    visitor: &mut V,
    field_info: &FieldInfo,
    bits: u8,
) -> Result<()> {
    let numeric = bits & FIELD_IS_NUMERIC_MASK;
    if numeric != 0 {
        match numeric {
            FIELD_IS_NUMERIC_INT => visitor.int_field(field_info, input.read_int()?),
            FIELD_IS_NUMERIC_LONG => visitor.long_field(field_info, input.read_long()?),
            FIELD_IS_NUMERIC_FLOAT => {
                visitor.float_field(field_info, f32::from_bits(input.read_int()? as u32))
            }
            FIELD_IS_NUMERIC_DOUBLE => {
                visitor.double_field(field_info, f64::from_bits(input.read_long()? as u64))
            }
            _ => bail!(CorruptIndex(format!(
                "Invalid numeric type: {:#x} (resource={})",
                numeric,
                input.name()
            ))),
        }
    } else {
        let length = input.read_vint()?;
        if length < 0 {
            bail!(CorruptIndex(format!(
                "invalid field length {} (resource={})",
                length,
                input.name()
            )));
        }
        let mut bytes = vec![0u8; length as usize];
        input.read_bytes(&mut bytes, 0, length as usize)?;
        if bits & FIELD_IS_BINARY != 0 {
            visitor.binary_field(field_info, bytes)
        } else {
            visitor.string_field(field_info, bytes)
        }
    }
}

fn skip_field(input: &mut dyn IndexInput, bits: u8) -> Result<()> {
    let length = match bits & FIELD_IS_NUMERIC_MASK {
        FIELD_IS_NUMERIC_INT | FIELD_IS_NUMERIC_FLOAT => 4,
        FIELD_IS_NUMERIC_LONG | FIELD_IS_NUMERIC_DOUBLE => 8,
        0 => i64::from(input.read_vint()?),
        numeric => bail!(CorruptIndex(format!(
            "Invalid numeric type: {:#x} (resource={})",
            numeric,
            input.name()
        ))),
    };
    let target = input.file_pointer() + length;
    input.seek(target)
}
