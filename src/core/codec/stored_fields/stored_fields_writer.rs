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


use std::io::Write;
use std::sync::Arc;

use core::codec::codec_util::{header_length, write_footer, write_header};
use core::codec::stored_fields::{
    Lucene40StoredFieldsReader, CODEC_NAME_DAT, CODEC_NAME_IDX, FIELDS_EXTENSION,
    FIELDS_INDEX_EXTENSION, FIELD_IS_BINARY, FIELD_IS_NUMERIC_DOUBLE, FIELD_IS_NUMERIC_FLOAT,
    FIELD_IS_NUMERIC_INT, FIELD_IS_NUMERIC_LONG, MAX_RAW_MERGE_DOCS, VERSION_CURRENT,
};
use core::doc::StoredFieldValue;
use core::index::{segment_file_name, FieldInfo, FieldInfos};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_files_ignoring_errors;
use core::util::{BitsRef, DocId};

use error::ErrorKind::{IllegalArgument, IllegalState, RuntimeError};
use error::Result;

/// One segment feeding a stored fields merge.
pub struct StoredFieldsMergeSource<'a> {
    pub reader: &'a mut Lucene40StoredFieldsReader,
    /// field infos the source segment was written with
    pub field_infos: &'a FieldInfos,
    pub live_docs: Option<BitsRef>,
}

impl<'a> StoredFieldsMergeSource<'a> {
    fn is_live(&self, doc: DocId) -> Result<bool> {
        match self.live_docs {
            Some(ref bits) => bits.get(doc as usize),
            None => Ok(true),
        }
    }
}

/// Field numbers of `source` name the same fields in `merged`, so records
/// can be copied byte for byte.
fn is_congruent(source: &FieldInfos, merged: &FieldInfos) -> bool {
    source.iter().all(|fi| {
        merged
            .field_info_by_number(fi.number)
            .map_or(false, |other| other.name == fi.name)
    })
}

/// Writes the `.fdx`/`.fdt` pair.
///
/// The index file holds one long per document pointing at its record in
/// the data file. A record is the field count followed by, per field, the
/// field number, a bits byte and the value.
pub struct Lucene40StoredFieldsWriter<D: Directory> {
    directory: Arc<D>,
    files: Vec<String>,
    fields_stream: Option<D::IndexOutput>,
    index_stream: Option<D::IndexOutput>,
    aborted: bool,
}

impl<D: Directory> Lucene40StoredFieldsWriter<D> {
    pub fn new(
        directory: Arc<D>,
        segment: &str,
        context: &IOContext,
    ) -> Result<Lucene40StoredFieldsWriter<D>> {
        let mut writer = Lucene40StoredFieldsWriter {
            directory,
            files: Vec::with_capacity(2),
            fields_stream: None,
            index_stream: None,
            aborted: false,
        };
        let res = writer.open_outputs(segment, context);
        writer.abort_on_error(res)?;
        Ok(writer)
    }

    fn open_outputs(&mut self, segment: &str, context: &IOContext) -> Result<()> {
        let name = segment_file_name(segment, "", FIELDS_EXTENSION);
        self.files.push(name.clone());
        let mut fields_stream = self.directory.create_output(&name, context)?;
        write_header(&mut fields_stream, CODEC_NAME_DAT, VERSION_CURRENT)?;
        self.fields_stream = Some(fields_stream);

        let name = segment_file_name(segment, "", FIELDS_INDEX_EXTENSION);
        self.files.push(name.clone());
        let mut index_stream = self.directory.create_output(&name, context)?;
        write_header(&mut index_stream, CODEC_NAME_IDX, VERSION_CURRENT)?;
        self.index_stream = Some(index_stream);
        Ok(())
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Writes the index entry and field count of a new document. Must be
    /// followed by exactly `num_stored_fields` calls to `write_field`.
    pub fn start_document(&mut self, num_stored_fields: i32) -> Result<()> {
        let res = self.write_document_start(num_stored_fields);
        self.abort_on_error(res)
    }

    fn write_document_start(&mut self, num_stored_fields: i32) -> Result<()> {
        let (fields, index) = self.streams()?;
        index.write_long(fields.file_pointer())?;
        fields.write_vint(num_stored_fields)
    }

    pub fn finish_document(&mut self) -> Result<()> {
        self.check_open()
    }

    pub fn write_field(&mut self, field_info: &FieldInfo, value: &StoredFieldValue) -> Result<()> {
        let res = self.write_field_value(field_info, value);
        self.abort_on_error(res)
    }

    fn write_field_value(&mut self, field_info: &FieldInfo, value: &StoredFieldValue) -> Result<()> {
        let (fields, _) = self.streams()?;
        fields.write_vint(field_info.number)?;
        match *value {
            StoredFieldValue::String(ref s) => {
                fields.write_byte(0)?;
                fields.write_string(s)
            }
            StoredFieldValue::Binary(ref b) => {
                fields.write_byte(FIELD_IS_BINARY)?;
                fields.write_vint(b.len() as i32)?;
                fields.write_bytes(b, 0, b.len())
            }
            StoredFieldValue::Int(v) => {
                fields.write_byte(FIELD_IS_NUMERIC_INT)?;
                fields.write_int(v)
            }
            StoredFieldValue::Long(v) => {
                fields.write_byte(FIELD_IS_NUMERIC_LONG)?;
                fields.write_long(v)
            }
            StoredFieldValue::Float(v) => {
                fields.write_byte(FIELD_IS_NUMERIC_FLOAT)?;
                fields.write_int(v.to_bits() as i32)
            }
            StoredFieldValue::Double(v) => {
                fields.write_byte(FIELD_IS_NUMERIC_DOUBLE)?;
                fields.write_long(v.to_bits() as i64)
            }
        }
    }

    /// Bulk writes a contiguous series of documents. `lengths` holds the
    /// byte length of each record and `stream` is positioned at the first.
    pub fn add_raw_documents(&mut self, stream: &mut dyn IndexInput, lengths: &[i32]) -> Result<()> {
        let res = self.write_raw_documents(stream, lengths);
        self.abort_on_error(res)
    }

    fn write_raw_documents(&mut self, stream: &mut dyn IndexInput, lengths: &[i32]) -> Result<()> {
        let (fields, index) = self.streams()?;
        let start = fields.file_pointer();
        let mut position = start;
        for &length in lengths {
            index.write_long(position)?;
            position += i64::from(length);
        }
        fields.copy_bytes(stream, (position - start) as usize)?;
        debug_assert_eq!(fields.file_pointer(), position);
        Ok(())
    }

    /// Checks that exactly `num_docs` documents were written and seals both
    /// files with a footer.
    pub fn finish(&mut self, num_docs: i32) -> Result<()> {
        let res = self.write_finish(num_docs);
        self.abort_on_error(res)
    }

    fn write_finish(&mut self, num_docs: i32) -> Result<()> {
        let expected = header_length(CODEC_NAME_IDX) as i64 + i64::from(num_docs) * 8;
        {
            let (_, index) = self.streams()?;
            if index.file_pointer() != expected {
                bail!(RuntimeError(format!(
                    "fdx size mismatch: docCount is {} but fdx file size is {} file={}; \
                     now aborting this merge to prevent index corruption",
                    num_docs,
                    index.file_pointer(),
                    index.name()
                )));
            }
        }
        if let Some(mut fields) = self.fields_stream.take() {
            write_footer(&mut fields)?;
            fields.flush()?;
        }
        if let Some(mut index) = self.index_stream.take() {
            write_footer(&mut index)?;
            index.flush()?;
        }
        Ok(())
    }

    /// Merges the stored fields of `sources` into this writer and finishes
    /// it. Returns the number of documents written.
    pub fn merge(
        &mut self,
        merged_field_infos: &FieldInfos,
        sources: &mut [StoredFieldsMergeSource],
    ) -> Result<i32> {
        let res = self.merge_sources(merged_field_infos, sources);
        self.abort_on_error(res)
    }

    fn merge_sources(
        &mut self,
        merged_field_infos: &FieldInfos,
        sources: &mut [StoredFieldsMergeSource],
    ) -> Result<i32> {
        let mut doc_count = 0;
        let mut lengths = vec![0i32; MAX_RAW_MERGE_DOCS];
        for source in sources.iter_mut() {
            doc_count += if is_congruent(source.field_infos, merged_field_infos) {
                self.copy_raw(source, &mut lengths)?
            } else {
                self.copy_visited(source, merged_field_infos)?
            };
        }
        self.write_finish(doc_count)?;
        Ok(doc_count)
    }

    /// Copies runs of contiguous live docs without decoding them.
    fn copy_raw(&mut self, source: &mut StoredFieldsMergeSource, lengths: &mut [i32]) -> Result<i32> {
        let max_doc = source.reader.len() as DocId;
        let mut doc = 0;
        let mut doc_count = 0;
        while doc < max_doc {
            if !source.is_live(doc)? {
                doc += 1;
                continue;
            }
            let start = doc;
            let mut num_docs = 0;
            while doc < max_doc && num_docs < MAX_RAW_MERGE_DOCS && source.is_live(doc)? {
                doc += 1;
                num_docs += 1;
            }
            let stream = source.reader.raw_docs(lengths, start, num_docs)?;
            self.write_raw_documents(stream, &lengths[..num_docs])?;
            doc_count += num_docs as i32;
        }
        debug!("bulk copied {} stored documents", doc_count);
        Ok(doc_count)
    }

    /// Re-encodes every live doc field by field, renumbering fields by name.
    fn copy_visited(
        &mut self,
        source: &mut StoredFieldsMergeSource,
        merged_field_infos: &FieldInfos,
    ) -> Result<i32> {
        let max_doc = source.reader.len() as DocId;
        let mut doc_count = 0;
        for doc in 0..max_doc {
            if !source.is_live(doc)? {
                continue;
            }
            let document = source.reader.document(doc)?;
            self.write_document_start(document.len() as i32)?;
            for field in &document.fields {
                let field_info = match merged_field_infos.field_info_by_name(&field.name) {
                    Some(field_info) => field_info,
                    None => bail!(IllegalArgument(format!(
                        "field {} is missing from the merged field infos",
                        field.name
                    ))),
                };
                self.write_field_value(field_info, &field.value)?;
            }
            doc_count += 1;
        }
        Ok(doc_count)
    }

    /// Drops the outputs and deletes both files.
    pub fn abort(&mut self) {
        self.fields_stream = None;
        self.index_stream = None;
        self.aborted = true;
        delete_files_ignoring_errors(self.directory.as_ref(), &self.files);
    }

    fn abort_on_error<T>(&mut self, res: Result<T>) -> Result<T> {
        if res.is_err() && !self.aborted {
            self.abort();
        }
        res
    }

    fn check_open(&self) -> Result<()> {
        if self.aborted {
            bail!(IllegalState("stored fields writer was aborted".into()));
        }
        Ok(())
    }

    fn streams(&mut self) -> Result<(&mut D::IndexOutput, &mut D::IndexOutput)> {
        self.check_open()?;
        match (self.fields_stream.as_mut(), self.index_stream.as_mut()) {
            (Some(fields), Some(index)) => Ok((fields, index)),
            _ => bail!(IllegalState("stored fields writer is closed".into())),
        }
    }
}
