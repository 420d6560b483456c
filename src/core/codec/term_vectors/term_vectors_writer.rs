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
use core::codec::term_vectors::{
    Lucene40TermVectorsReader, TermVectorFields, TermVectorsReader, CODEC_NAME_DOCS,
    CODEC_NAME_FIELDS, CODEC_NAME_INDEX, MAX_RAW_MERGE_DOCS, STORE_OFFSET_WITH_TERMVECTOR,
    STORE_PAYLOAD_WITH_TERMVECTOR, STORE_POSITIONS_WITH_TERMVECTOR, VECTORS_DOCUMENTS_EXTENSION,
    VECTORS_FIELDS_EXTENSION, VECTORS_INDEX_EXTENSION, VERSION_CURRENT,
};
use core::index::{segment_file_name, FieldInfo, FieldInfos, Fields, TermIterator, Terms};
use core::search::{DocIterator, PostingIterator, PostingIteratorFlags};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_files_ignoring_errors;
use core::util::string_util::bytes_difference;
use core::util::{BitsRef, DocId};

use error::ErrorKind::{IllegalArgument, IllegalState, RuntimeError};
use error::Result;

/// One segment feeding a term vectors merge.
pub struct TermVectorsMergeSource<'a> {
    pub reader: &'a mut Lucene40TermVectorsReader,
    /// field infos the source segment was written with
    pub field_infos: &'a FieldInfos,
    pub live_docs: Option<BitsRef>,
}

impl<'a> TermVectorsMergeSource<'a> {
    fn is_live(&self, doc: DocId) -> Result<bool> {
        match self.live_docs {
            Some(ref bits) => bits.get(doc as usize),
            None => Ok(true),
        }
    }
}

fn is_congruent(source: &FieldInfos, merged: &FieldInfos) -> bool {
    source.iter().all(|fi| {
        merged
            .field_info_by_number(fi.number)
            .map_or(false, |other| other.name == fi.name)
    })
}

fn open_stream<O>(stream: &mut Option<O>) -> Result<&mut O> {
    match stream.as_mut() {
        Some(out) => Ok(out),
        None => bail!(IllegalState("term vectors writer is closed".into())),
    }
}

/// Writes the `.tvx`/`.tvd`/`.tvf` term vector files in a single pass.
///
/// Positions are written as they arrive. When a field also stores offsets
/// or payloads, the offsets and the payload bytes of the current term are
/// buffered until `finish_term`, since they follow all of its positions.
pub struct Lucene40TermVectorsWriter<D: Directory> {
    directory: Arc<D>,
    files: Vec<String>,
    tvx: Option<D::IndexOutput>,
    tvd: Option<D::IndexOutput>,
    tvf: Option<D::IndexOutput>,
    aborted: bool,

    num_vector_fields: usize,
    fps: Vec<i64>,

    positions: bool,
    offsets: bool,
    payloads: bool,
    last_term: Vec<u8>,
    num_terms: usize,
    terms_in_field: usize,

    freq: usize,
    positions_added: usize,
    last_position: i32,
    last_offset: i32,
    last_payload_length: i32,
    offset_start_buffer: Vec<i32>,
    offset_end_buffer: Vec<i32>,
    payload_data: Vec<u8>,
}

impl<D: Directory> Lucene40TermVectorsWriter<D> {
    pub fn new(
        directory: Arc<D>,
        segment: &str,
        context: &IOContext,
    ) -> Result<Lucene40TermVectorsWriter<D>> {
        let mut writer = Lucene40TermVectorsWriter {
            directory,
            files: Vec::with_capacity(3),
            tvx: None,
            tvd: None,
            tvf: None,
            aborted: false,
            num_vector_fields: 0,
            fps: Vec::new(),
            positions: false,
            offsets: false,
            payloads: false,
            last_term: Vec::new(),
            num_terms: 0,
            terms_in_field: 0,
            freq: 0,
            positions_added: 0,
            last_position: 0,
            last_offset: 0,
            last_payload_length: -1,
            offset_start_buffer: Vec::new(),
            offset_end_buffer: Vec::new(),
            payload_data: Vec::new(),
        };
        let res = writer.open_outputs(segment, context);
        writer.abort_on_error(res)?;
        Ok(writer)
    }

    fn open_outputs(&mut self, segment: &str, context: &IOContext) -> Result<()> {
        self.tvx = Some(self.create(segment, VECTORS_INDEX_EXTENSION, CODEC_NAME_INDEX, context)?);
        self.tvd = Some(self.create(segment, VECTORS_DOCUMENTS_EXTENSION, CODEC_NAME_DOCS, context)?);
        self.tvf = Some(self.create(segment, VECTORS_FIELDS_EXTENSION, CODEC_NAME_FIELDS, context)?);
        Ok(())
    }

    fn create(
        &mut self,
        segment: &str,
        extension: &str,
        codec: &str,
        context: &IOContext,
    ) -> Result<D::IndexOutput> {
        let name = segment_file_name(segment, "", extension);
        self.files.push(name.clone());
        let mut out = self.directory.create_output(&name, context)?;
        write_header(&mut out, codec, VERSION_CURRENT)?;
        Ok(out)
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Called before the fields of a document, even when it has none.
    pub fn start_document(&mut self, num_vector_fields: usize) -> Result<()> {
        let res = self.write_start_document(num_vector_fields);
        self.abort_on_error(res)
    }

    fn write_start_document(&mut self, num_vector_fields: usize) -> Result<()> {
        self.check_open()?;
        let tvd = open_stream(&mut self.tvd)?;
        let tvf = open_stream(&mut self.tvf)?;
        let tvx = open_stream(&mut self.tvx)?;
        tvx.write_long(tvd.file_pointer())?;
        tvx.write_long(tvf.file_pointer())?;
        tvd.write_vint(num_vector_fields as i32)?;
        self.num_vector_fields = num_vector_fields;
        self.fps.clear();
        Ok(())
    }

    /// Called before the `num_terms` terms of a field.
    pub fn start_field(
        &mut self,
        info: &FieldInfo,
        num_terms: usize,
        positions: bool,
        offsets: bool,
        payloads: bool,
    ) -> Result<()> {
        let res = self.write_start_field(info, num_terms, positions, offsets, payloads);
        self.abort_on_error(res)
    }

    fn write_start_field(
        &mut self,
        info: &FieldInfo,
        num_terms: usize,
        positions: bool,
        offsets: bool,
        payloads: bool,
    ) -> Result<()> {
        self.check_open()?;
        if self.fps.len() >= self.num_vector_fields {
            bail!(IllegalState(format!(
                "document declared {} vector fields but got more",
                self.num_vector_fields
            )));
        }
        if payloads && !positions {
            bail!(IllegalArgument(format!(
                "field {} stores payloads without positions",
                info.name
            )));
        }
        self.positions = positions;
        self.offsets = offsets;
        self.payloads = payloads;
        self.last_term.clear();
        self.num_terms = num_terms;
        self.terms_in_field = 0;
        // the first payload of a field always writes its length
        self.last_payload_length = -1;

        let tvf = open_stream(&mut self.tvf)?;
        let tvd = open_stream(&mut self.tvd)?;
        self.fps.push(tvf.file_pointer());
        tvd.write_vint(info.number)?;
        tvf.write_vint(num_terms as i32)?;
        let mut bits = 0u8;
        if positions {
            bits |= STORE_POSITIONS_WITH_TERMVECTOR;
        }
        if offsets {
            bits |= STORE_OFFSET_WITH_TERMVECTOR;
        }
        if payloads {
            bits |= STORE_PAYLOAD_WITH_TERMVECTOR;
        }
        tvf.write_byte(bits)
    }

    /// Adds a term of the current field. Terms must arrive in sorted order.
    pub fn start_term(&mut self, term: &[u8], freq: i32) -> Result<()> {
        let res = self.write_start_term(term, freq);
        self.abort_on_error(res)
    }

    fn write_start_term(&mut self, term: &[u8], freq: i32) -> Result<()> {
        self.check_open()?;
        if self.terms_in_field > 0 && term <= self.last_term.as_slice() {
            bail!(IllegalArgument(format!(
                "terms out of order: {:?} after {:?}",
                term, self.last_term
            )));
        }
        if self.terms_in_field >= self.num_terms {
            bail!(IllegalState(format!(
                "field declared {} terms but got more",
                self.num_terms
            )));
        }
        if freq < 1 {
            bail!(IllegalArgument(format!("invalid term freq {}", freq)));
        }
        let prefix = bytes_difference(&self.last_term, term);
        let suffix = term.len() - prefix;
        let tvf = open_stream(&mut self.tvf)?;
        tvf.write_vint(prefix as i32)?;
        tvf.write_vint(suffix as i32)?;
        tvf.write_bytes(term, prefix, suffix)?;
        tvf.write_vint(freq)?;

        self.last_term.clear();
        self.last_term.extend_from_slice(term);
        self.terms_in_field += 1;
        self.freq = freq as usize;
        self.positions_added = 0;
        self.last_position = 0;
        self.last_offset = 0;
        self.offset_start_buffer.clear();
        self.offset_end_buffer.clear();
        self.payload_data.clear();
        Ok(())
    }

    /// Adds one occurrence of the current term. Values the field does not
    /// store are ignored.
    pub fn add_position(
        &mut self,
        position: i32,
        start_offset: i32,
        end_offset: i32,
        payload: &[u8],
    ) -> Result<()> {
        let res = self.write_position(position, start_offset, end_offset, payload);
        self.abort_on_error(res)
    }

    fn write_position(
        &mut self,
        position: i32,
        start_offset: i32,
        end_offset: i32,
        payload: &[u8],
    ) -> Result<()> {
        self.check_open()?;
        if self.positions_added >= self.freq {
            bail!(IllegalState(format!(
                "term declared freq {} but got more positions",
                self.freq
            )));
        }
        self.positions_added += 1;
        let tvf = open_stream(&mut self.tvf)?;
        if self.positions {
            let delta = position - self.last_position;
            if delta < 0 {
                bail!(IllegalArgument(format!(
                    "positions must not go backwards: {} after {}",
                    position, self.last_position
                )));
            }
            self.last_position = position;
            if self.payloads {
                let payload_length = payload.len() as i32;
                if payload_length != self.last_payload_length {
                    self.last_payload_length = payload_length;
                    tvf.write_vint(delta << 1 | 1)?;
                    tvf.write_vint(payload_length)?;
                } else {
                    tvf.write_vint(delta << 1)?;
                }
                self.payload_data.extend_from_slice(payload);
            } else {
                tvf.write_vint(delta)?;
            }
            if self.offsets {
                self.offset_start_buffer.push(start_offset);
                self.offset_end_buffer.push(end_offset);
            }
        } else if self.offsets {
            tvf.write_vint(start_offset - self.last_offset)?;
            tvf.write_vint(end_offset - start_offset)?;
            self.last_offset = end_offset;
        }
        Ok(())
    }

    /// Flushes the buffered payload bytes and offsets of the current term.
    pub fn finish_term(&mut self) -> Result<()> {
        let res = self.write_finish_term();
        self.abort_on_error(res)
    }

    fn write_finish_term(&mut self) -> Result<()> {
        self.check_open()?;
        if (self.positions || self.offsets) && self.positions_added != self.freq {
            bail!(IllegalState(format!(
                "term declared freq {} but got {} positions",
                self.freq, self.positions_added
            )));
        }
        let tvf = open_stream(&mut self.tvf)?;
        if self.payloads {
            tvf.write_bytes(&self.payload_data, 0, self.payload_data.len())?;
        }
        if self.positions && self.offsets {
            for (&start, &end) in self.offset_start_buffer.iter().zip(&self.offset_end_buffer) {
                tvf.write_vint(start - self.last_offset)?;
                tvf.write_vint(end - start)?;
                self.last_offset = end;
            }
        }
        Ok(())
    }

    /// Writes the `.tvf` pointer deltas of the document's fields.
    pub fn finish_document(&mut self) -> Result<()> {
        let res = self.write_finish_document();
        self.abort_on_error(res)
    }

    fn write_finish_document(&mut self) -> Result<()> {
        self.check_open()?;
        if self.fps.len() != self.num_vector_fields {
            bail!(IllegalState(format!(
                "document declared {} vector fields but got {}",
                self.num_vector_fields,
                self.fps.len()
            )));
        }
        let tvd = open_stream(&mut self.tvd)?;
        for pair in self.fps.windows(2) {
            tvd.write_vlong(pair[1] - pair[0])?;
        }
        Ok(())
    }

    /// Bulk writes a contiguous series of documents whose `.tvd` and `.tvf`
    /// records start at the current positions of `tvd_in` and `tvf_in`.
    pub fn add_raw_documents(
        &mut self,
        tvd_in: &mut dyn IndexInput,
        tvf_in: &mut dyn IndexInput,
        tvd_lengths: &[i32],
        tvf_lengths: &[i32],
    ) -> Result<()> {
        let res = self.write_raw_documents(tvd_in, tvf_in, tvd_lengths, tvf_lengths);
        self.abort_on_error(res)
    }

    fn write_raw_documents(
        &mut self,
        tvd_in: &mut dyn IndexInput,
        tvf_in: &mut dyn IndexInput,
        tvd_lengths: &[i32],
        tvf_lengths: &[i32],
    ) -> Result<()> {
        self.check_open()?;
        let tvd = open_stream(&mut self.tvd)?;
        let tvf = open_stream(&mut self.tvf)?;
        let tvx = open_stream(&mut self.tvx)?;
        let tvd_start = tvd.file_pointer();
        let tvf_start = tvf.file_pointer();
        let mut tvd_position = tvd_start;
        let mut tvf_position = tvf_start;
        for (&tvd_length, &tvf_length) in tvd_lengths.iter().zip(tvf_lengths) {
            tvx.write_long(tvd_position)?;
            tvd_position += i64::from(tvd_length);
            tvx.write_long(tvf_position)?;
            tvf_position += i64::from(tvf_length);
        }
        tvd.copy_bytes(tvd_in, (tvd_position - tvd_start) as usize)?;
        tvf.copy_bytes(tvf_in, (tvf_position - tvf_start) as usize)?;
        Ok(())
    }

    /// Checks that exactly `num_docs` documents were written and seals the
    /// three files with a footer.
    pub fn finish(&mut self, num_docs: i32) -> Result<()> {
        let res = self.write_finish(num_docs);
        self.abort_on_error(res)
    }

    fn write_finish(&mut self, num_docs: i32) -> Result<()> {
        self.check_open()?;
        let expected = header_length(CODEC_NAME_INDEX) as i64 + i64::from(num_docs) * 16;
        {
            let tvx = open_stream(&mut self.tvx)?;
            if tvx.file_pointer() != expected {
                bail!(RuntimeError(format!(
                    "tvx size mismatch: mergedDocs is {} but tvx size is {} file={}; \
                     now aborting this merge to prevent index corruption",
                    num_docs,
                    tvx.file_pointer(),
                    tvx.name()
                )));
            }
        }
        for stream in &mut [&mut self.tvx, &mut self.tvd, &mut self.tvf] {
            if let Some(mut out) = stream.take() {
                write_footer(&mut out)?;
                out.flush()?;
            }
        }
        Ok(())
    }

    /// Merges the term vectors of `sources` into this writer and finishes
    /// it. Returns the number of documents written.
    pub fn merge(
        &mut self,
        merged_field_infos: &FieldInfos,
        sources: &mut [TermVectorsMergeSource],
    ) -> Result<i32> {
        let res = self.merge_sources(merged_field_infos, sources);
        self.abort_on_error(res)
    }

    fn merge_sources(
        &mut self,
        merged_field_infos: &FieldInfos,
        sources: &mut [TermVectorsMergeSource],
    ) -> Result<i32> {
        let mut doc_count = 0;
        let mut tvd_lengths = vec![0i32; MAX_RAW_MERGE_DOCS];
        let mut tvf_lengths = vec![0i32; MAX_RAW_MERGE_DOCS];
        for source in sources.iter_mut() {
            doc_count += if is_congruent(source.field_infos, merged_field_infos) {
                self.copy_raw(source, &mut tvd_lengths, &mut tvf_lengths)?
            } else {
                self.copy_visited(source, merged_field_infos)?
            };
        }
        self.write_finish(doc_count)?;
        Ok(doc_count)
    }

    fn copy_raw(
        &mut self,
        source: &mut TermVectorsMergeSource,
        tvd_lengths: &mut [i32],
        tvf_lengths: &mut [i32],
    ) -> Result<i32> {
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
            let (tvd_in, tvf_in) = source.reader.raw_docs(tvd_lengths, tvf_lengths, start, num_docs)?;
            self.write_raw_documents(
                tvd_in,
                tvf_in,
                &tvd_lengths[..num_docs],
                &tvf_lengths[..num_docs],
            )?;
            doc_count += num_docs as i32;
        }
        debug!("bulk copied term vectors of {} documents", doc_count);
        Ok(doc_count)
    }

    fn copy_visited(
        &mut self,
        source: &mut TermVectorsMergeSource,
        merged_field_infos: &FieldInfos,
    ) -> Result<i32> {
        let max_doc = source.reader.len() as DocId;
        let mut doc_count = 0;
        for doc in 0..max_doc {
            if !source.is_live(doc)? {
                continue;
            }
            let vectors = source.reader.get(doc)?;
            self.add_all_doc_vectors(vectors.as_ref(), merged_field_infos)?;
            doc_count += 1;
        }
        Ok(doc_count)
    }

    /// Re-encodes the vectors of one document, renumbering fields by name.
    fn add_all_doc_vectors(
        &mut self,
        vectors: Option<&TermVectorFields>,
        merged_field_infos: &FieldInfos,
    ) -> Result<()> {
        let vectors = match vectors {
            Some(vectors) => vectors,
            None => {
                self.write_start_document(0)?;
                return self.write_finish_document();
            }
        };
        self.write_start_document(vectors.size())?;
        for name in vectors.fields() {
            let field_info = match merged_field_infos.field_info_by_name(&name) {
                Some(field_info) => field_info,
                None => bail!(IllegalArgument(format!(
                    "field {} is missing from the merged field infos",
                    name
                ))),
            };
            let terms = match vectors.terms(&name)? {
                Some(terms) => terms,
                None => bail!(IllegalState(format!("field {} has no term vector", name))),
            };
            let has_positions = terms.has_positions()?;
            let has_offsets = terms.has_offsets()?;
            let has_payloads = terms.has_payloads()?;
            self.write_start_field(
                field_info,
                terms.size()? as usize,
                has_positions,
                has_offsets,
                has_payloads,
            )?;

            let mut iter = terms.iterator()?;
            while let Some(term) = iter.next()? {
                let freq = iter.total_term_freq()? as i32;
                self.write_start_term(&term, freq)?;
                if has_positions || has_offsets {
                    let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL)?;
                    postings.next()?;
                    for _ in 0..freq {
                        let position = postings.next_position()?;
                        let start_offset = postings.start_offset()?;
                        let end_offset = postings.end_offset()?;
                        let payload = postings.payload()?;
                        self.write_position(position, start_offset, end_offset, &payload)?;
                    }
                }
                self.write_finish_term()?;
            }
        }
        self.write_finish_document()
    }

    /// Drops the outputs and deletes the three files.
    pub fn abort(&mut self) {
        self.tvx = None;
        self.tvd = None;
        self.tvf = None;
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
            bail!(IllegalState("term vectors writer was aborted".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::term_vectors::{Lucene40TermVectorsFormat, TermVectorsFormat};
    use core::index::{DocValuesType, IndexOptions, SegmentInfo, SeekStatus, LUCENE40_VERSION};
    use core::search::NO_MORE_DOCS;
    use core::store::directory::RAMDirectory;
    use core::util::BitVector;
    use error::ErrorKind;

    use std::collections::HashMap;

    /// (position, start offset, end offset, payload)
    type Occurrence = (i32, i32, i32, Vec<u8>);

    struct FieldVector {
        name: &'static str,
        positions: bool,
        offsets: bool,
        payloads: bool,
        terms: Vec<(&'static str, Vec<Occurrence>)>,
    }

    fn field(name: &str, number: i32) -> FieldInfo {
        FieldInfo::new(
            name.to_string(),
            number,
            true,
            false,
            true,
            IndexOptions::DocsAndFreqsAndPositions,
            DocValuesType::Null,
            DocValuesType::Null,
            HashMap::new(),
        )
        .unwrap()
    }

    fn infos(names: &[&str]) -> FieldInfos {
        FieldInfos::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| field(name, i as i32))
                .collect(),
        )
        .unwrap()
    }

    fn segment(name: &str, max_doc: i32) -> SegmentInfo {
        SegmentInfo::new(
            LUCENE40_VERSION,
            name,
            max_doc,
            false,
            HashMap::new(),
            HashMap::new(),
        )
        .unwrap()
    }

    fn occurrences(positions: &[i32], with_payload: bool) -> Vec<Occurrence> {
        positions
            .iter()
            .map(|&p| {
                let payload = if with_payload && p % 2 == 0 {
                    vec![p as u8; (p % 3) as usize + 1]
                } else {
                    vec![]
                };
                (p, p * 5, p * 5 + 3, payload)
            })
            .collect()
    }

    fn sample_doc(seed: i32) -> Vec<FieldVector> {
        vec![
            FieldVector {
                name: "body",
                positions: true,
                offsets: true,
                payloads: true,
                terms: vec![
                    ("apple", occurrences(&[0, 4 + seed, 9 + seed], true)),
                    ("apricot", occurrences(&[2], true)),
                    ("banana", occurrences(&[1, 3], true)),
                ],
            },
            FieldVector {
                name: "title",
                positions: true,
                offsets: false,
                payloads: false,
                terms: vec![("quick", occurrences(&[0, 7], false)), ("quiet", occurrences(&[3], false))],
            },
            FieldVector {
                name: "tags",
                positions: false,
                offsets: true,
                payloads: false,
                terms: vec![("red", occurrences(&[1, 2], false))],
            },
        ]
    }

    fn write_doc<D: Directory>(
        writer: &mut Lucene40TermVectorsWriter<D>,
        infos: &FieldInfos,
        fields: &[FieldVector],
    ) {
        writer.start_document(fields.len()).unwrap();
        for fv in fields {
            writer
                .start_field(
                    infos.field_info_by_name(fv.name).unwrap(),
                    fv.terms.len(),
                    fv.positions,
                    fv.offsets,
                    fv.payloads,
                )
                .unwrap();
            for (term, occs) in &fv.terms {
                writer.start_term(term.as_bytes(), occs.len() as i32).unwrap();
                for (pos, start, end, payload) in occs {
                    writer.add_position(*pos, *start, *end, payload).unwrap();
                }
                writer.finish_term().unwrap();
            }
        }
        writer.finish_document().unwrap();
    }

    fn write_segment(dir: &Arc<RAMDirectory>, si: &SegmentInfo, infos: &FieldInfos, docs: &[Vec<FieldVector>]) {
        let mut writer = Lucene40TermVectorsFormat
            .vectors_writer(Arc::clone(dir), si, &IOContext::Flush)
            .unwrap();
        for doc in docs {
            write_doc(&mut writer, infos, doc);
        }
        writer.finish(docs.len() as i32).unwrap();
    }

    fn open(dir: &Arc<RAMDirectory>, si: &SegmentInfo, infos: FieldInfos) -> Lucene40TermVectorsReader {
        Lucene40TermVectorsFormat
            .vectors_reader(dir.as_ref(), si, Arc::new(infos), &IOContext::Read)
            .unwrap()
    }

    const NAMES: [&str; 3] = ["body", "tags", "title"];

    fn check_doc(reader: &Lucene40TermVectorsReader, doc: DocId, expected: &[FieldVector]) {
        let fields = reader.get(doc).unwrap().unwrap();
        // field number order
        assert_eq!(fields.fields(), vec!["body", "tags", "title"]);
        assert_eq!(fields.size(), expected.len());
        for fv in expected {
            let terms = fields.terms(fv.name).unwrap().unwrap();
            assert_eq!(terms.size().unwrap(), fv.terms.len() as i64);
            assert_eq!(terms.has_positions().unwrap(), fv.positions);
            assert_eq!(terms.has_offsets().unwrap(), fv.offsets);
            assert_eq!(terms.has_payloads().unwrap(), fv.payloads);
            let mut iter = terms.iterator().unwrap();
            for (term, occs) in &fv.terms {
                assert_eq!(iter.next().unwrap().unwrap(), term.as_bytes());
                assert_eq!(iter.total_term_freq().unwrap(), occs.len() as i64);
                let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
                assert_eq!(postings.next().unwrap(), 0);
                assert_eq!(postings.freq().unwrap(), occs.len() as i32);
                for (pos, start, end, payload) in occs {
                    let got = postings.next_position().unwrap();
                    assert_eq!(got, if fv.positions { *pos } else { -1 });
                    if fv.offsets {
                        assert_eq!(postings.start_offset().unwrap(), *start);
                        assert_eq!(postings.end_offset().unwrap(), *end);
                    } else {
                        assert_eq!(postings.start_offset().unwrap(), -1);
                    }
                    if fv.payloads {
                        assert_eq!(&postings.payload().unwrap(), payload);
                    }
                }
                assert!(postings.next_position().is_err());
                assert_eq!(postings.next().unwrap(), NO_MORE_DOCS);
            }
            assert!(iter.next().unwrap().is_none());
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment("_0", 4);
        let docs = vec![sample_doc(0), vec![], sample_doc(3), sample_doc(1)];
        write_segment(&dir, &si, &infos(&NAMES), &docs);

        let reader = open(&dir, &si, infos(&NAMES));
        reader.check_integrity().unwrap();
        assert_eq!(reader.len(), 4);
        check_doc(&reader, 3, &docs[3]);
        check_doc(&reader, 0, &docs[0]);
        check_doc(&reader, 2, &docs[2]);
        assert!(reader.get(1).unwrap().is_none());
        assert!(reader.get(4).is_err());

        let fields = reader.get(0).unwrap().unwrap();
        assert!(fields.terms("missing").unwrap().is_none());
    }

    #[test]
    fn test_seek_ceil_is_linear_with_reset() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment("_0", 1);
        write_segment(&dir, &si, &infos(&NAMES), &[sample_doc(0)]);
        let reader = open(&dir, &si, infos(&NAMES));
        let fields = reader.get(0).unwrap().unwrap();
        let mut iter = fields.terms("body").unwrap().unwrap().iterator().unwrap();

        assert!(iter.term().is_err());
        assert_eq!(iter.seek_ceil(b"apr").unwrap(), SeekStatus::NotFound);
        assert_eq!(iter.term().unwrap(), b"apricot");
        assert_eq!(iter.seek_ceil(b"apricot").unwrap(), SeekStatus::Found);
        // backwards target restarts the scan
        assert_eq!(iter.seek_ceil(b"a").unwrap(), SeekStatus::NotFound);
        assert_eq!(iter.term().unwrap(), b"apple");
        assert_eq!(iter.total_term_freq().unwrap(), 3);
        assert!(iter.seek_exact(b"banana").unwrap());
        assert_eq!(iter.seek_ceil(b"cherry").unwrap(), SeekStatus::End);
        assert!(!iter.seek_exact(b"aa").unwrap());
        assert_eq!(iter.term().unwrap(), b"apple");
    }

    #[test]
    fn test_unsorted_terms_abort() {
        let dir = Arc::new(RAMDirectory::new());
        let infos = infos(&NAMES);
        let mut writer =
            Lucene40TermVectorsWriter::new(Arc::clone(&dir), "_0", &IOContext::Flush).unwrap();
        writer.start_document(1).unwrap();
        writer
            .start_field(infos.field_info_by_name("title").unwrap(), 2, false, false, false)
            .unwrap();
        writer.start_term(b"zebra", 1).unwrap();
        writer.finish_term().unwrap();
        match *writer.start_term(b"ant", 1).unwrap_err().kind() {
            ErrorKind::IllegalArgument(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert!(dir.list_all().unwrap().is_empty());
        assert!(writer.finish_document().is_err());
    }

    #[test]
    fn test_wrong_doc_count_is_fatal() {
        let dir = Arc::new(RAMDirectory::new());
        let mut writer =
            Lucene40TermVectorsWriter::new(Arc::clone(&dir), "_0", &IOContext::Flush).unwrap();
        writer.start_document(0).unwrap();
        writer.finish_document().unwrap();
        match *writer.finish(3).unwrap_err().kind() {
            ErrorKind::RuntimeError(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert!(dir.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_closed_reader() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment("_0", 1);
        write_segment(&dir, &si, &infos(&NAMES), &[sample_doc(0)]);
        let mut reader = open(&dir, &si, infos(&NAMES));
        let dup = reader.duplicate().unwrap();
        reader.close().unwrap();
        match *reader.get(0).err().unwrap().kind() {
            ErrorKind::AlreadyClosed(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert!(dup.get(0).unwrap().is_some());
    }

    #[test]
    fn test_negative_payload_length_is_corrupt() {
        use core::codec::term_vectors::VERSION_PAYLOADS;

        // one doc, one field, one term with payload lengths 5 then -3
        let dir = Arc::new(RAMDirectory::new());
        {
            let mut tvx = dir.create_output("_0.tvx", &IOContext::Flush).unwrap();
            write_header(&mut tvx, CODEC_NAME_INDEX, VERSION_PAYLOADS).unwrap();
            tvx.write_long(header_length(CODEC_NAME_DOCS) as i64).unwrap();
            tvx.write_long(header_length(CODEC_NAME_FIELDS) as i64).unwrap();

            let mut tvd = dir.create_output("_0.tvd", &IOContext::Flush).unwrap();
            write_header(&mut tvd, CODEC_NAME_DOCS, VERSION_PAYLOADS).unwrap();
            tvd.write_vint(1).unwrap();
            tvd.write_vint(0).unwrap();

            let mut tvf = dir.create_output("_0.tvf", &IOContext::Flush).unwrap();
            write_header(&mut tvf, CODEC_NAME_FIELDS, VERSION_PAYLOADS).unwrap();
            tvf.write_vint(1).unwrap();
            tvf.write_byte(STORE_POSITIONS_WITH_TERMVECTOR | STORE_PAYLOAD_WITH_TERMVECTOR)
                .unwrap();
            tvf.write_vint(0).unwrap();
            tvf.write_vint(1).unwrap();
            tvf.write_byte(b'a').unwrap();
            tvf.write_vint(2).unwrap();
            tvf.write_vint(1).unwrap();
            tvf.write_vint(5).unwrap();
            tvf.write_vint(3).unwrap();
            tvf.write_vint(-3).unwrap();
            tvf.write_bytes(&[1, 2], 0, 2).unwrap();
        }

        let reader = open(&dir, &segment("_0", 1), infos(&["body"]));
        let fields = reader.get(0).unwrap().unwrap();
        let mut iter = fields.terms("body").unwrap().unwrap().iterator().unwrap();
        match *iter.next().unwrap_err().kind() {
            ErrorKind::CorruptIndex(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
    }

    fn read_file(dir: &RAMDirectory, name: &str) -> Vec<u8> {
        let mut input = dir.open_input(name, &IOContext::Read).unwrap();
        let len = input.len() as usize;
        let mut bytes = vec![0u8; len];
        input.read_bytes(&mut bytes, 0, len).unwrap();
        bytes
    }

    fn merged_files(source_dir: &Arc<RAMDirectory>, si: &SegmentInfo, live: Option<BitsRef>, raw: bool) -> Vec<Vec<u8>> {
        let source_infos = infos(&NAMES);
        let mut reader = open(source_dir, si, infos(&NAMES));
        let dir = Arc::new(RAMDirectory::new());
        let mut writer =
            Lucene40TermVectorsWriter::new(Arc::clone(&dir), "_m", &IOContext::Merge).unwrap();
        let mut source = TermVectorsMergeSource {
            reader: &mut reader,
            field_infos: &source_infos,
            live_docs: live,
        };
        let count = if raw {
            let mut tvd_lengths = vec![0; MAX_RAW_MERGE_DOCS];
            let mut tvf_lengths = vec![0; MAX_RAW_MERGE_DOCS];
            writer.copy_raw(&mut source, &mut tvd_lengths, &mut tvf_lengths).unwrap()
        } else {
            writer.copy_visited(&mut source, &source_infos).unwrap()
        };
        writer.finish(count).unwrap();
        ["_m.tvx", "_m.tvd", "_m.tvf"]
            .iter()
            .map(|name| read_file(&dir, name))
            .collect()
    }

    #[test]
    fn test_bulk_merge_matches_term_by_term() {
        let dir = Arc::new(RAMDirectory::new());
        let docs: Vec<_> = (0..10)
            .map(|i| if i % 4 == 1 { vec![] } else { sample_doc(i) })
            .collect();
        let si = segment("_0", docs.len() as i32);
        // fields in number order so both paths lay them out the same way
        let sorted: Vec<Vec<FieldVector>> = docs
            .into_iter()
            .map(|mut doc| {
                doc.sort_by_key(|fv| NAMES.iter().position(|n| *n == fv.name));
                doc
            })
            .collect();
        write_segment(&dir, &si, &infos(&NAMES), &sorted);

        assert_eq!(
            merged_files(&dir, &si, None, true),
            merged_files(&dir, &si, None, false)
        );

        let mut live = BitVector::new(10);
        live.set_all();
        for doc in &[0, 5, 6, 9] {
            live.clear(*doc).unwrap();
        }
        let live: BitsRef = Arc::new(live);
        assert_eq!(
            merged_files(&dir, &si, Some(Arc::clone(&live)), true),
            merged_files(&dir, &si, Some(live), false)
        );
    }

    #[test]
    fn test_merge_renumbers_fields() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment("_0", 2);
        let source_infos = infos(&NAMES);
        write_segment(&dir, &si, &source_infos, &[sample_doc(2), sample_doc(5)]);
        let mut reader = open(&dir, &si, infos(&NAMES));

        let merged = infos(&["title", "body", "tags"]);
        let mut live = BitVector::new(2);
        live.set_all();
        live.clear(0).unwrap();

        let out = Arc::new(RAMDirectory::new());
        let mut writer =
            Lucene40TermVectorsWriter::new(Arc::clone(&out), "_1", &IOContext::Merge).unwrap();
        let count = writer
            .merge(
                &merged,
                &mut [TermVectorsMergeSource {
                    reader: &mut reader,
                    field_infos: &source_infos,
                    live_docs: Some(Arc::new(live)),
                }],
            )
            .unwrap();
        assert_eq!(count, 1);

        let merged_reader = open(&out, &segment("_1", 1), merged);
        let fields = merged_reader.get(0).unwrap().unwrap();
        assert_eq!(fields.fields(), vec!["title", "body", "tags"]);
        let mut iter = fields.terms("body").unwrap().unwrap().iterator().unwrap();
        assert!(iter.seek_exact(b"apple").unwrap());
        let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
        postings.next().unwrap();
        let positions: Vec<i32> = (0..3).map(|_| postings.next_position().unwrap()).collect();
        assert_eq!(positions, vec![0, 9, 14]);
    }
}
