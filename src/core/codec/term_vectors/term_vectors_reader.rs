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


use std::cmp::Ordering;
use std::sync::Arc;

use core::codec::codec_util::{check_header, checksum_entire_file, footer_length, header_length, retrieve_checksum};
use core::codec::term_vectors::{
    TermVectorsReader, CODEC_NAME_DOCS, CODEC_NAME_FIELDS, CODEC_NAME_INDEX,
    STORE_OFFSET_WITH_TERMVECTOR, STORE_PAYLOAD_WITH_TERMVECTOR, STORE_POSITIONS_WITH_TERMVECTOR,
    VECTORS_DOCUMENTS_EXTENSION, VECTORS_FIELDS_EXTENSION, VECTORS_INDEX_EXTENSION,
    VERSION_CHECKSUM, VERSION_CURRENT, VERSION_START,
};
use core::index::{segment_file_name, FieldInfos, Fields, SegmentInfo, SeekStatus, TermIterator, Terms};
use core::search::{DocIterator, Payload, PostingIterator, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::IndexInput;
use core::store::IOContext;
use core::util::DocId;

use error::ErrorKind::{AlreadyClosed, CorruptIndex, IllegalState, IndexOutOfBounds};
use error::Result;

/// Reads the `.tvx`/`.tvd`/`.tvf` term vectors of one segment.
///
/// `get` works on duplicated cursors, so a shared reader can serve several
/// threads. `raw_docs` moves the reader's own cursors and needs `&mut self`.
pub struct Lucene40TermVectorsReader {
    field_infos: Arc<FieldInfos>,
    tvx: Option<Box<dyn IndexInput>>,
    tvd: Option<Box<dyn IndexInput>>,
    tvf: Option<Box<dyn IndexInput>>,
    num_total_docs: i32,
    version: i32,
    tvd_end: i64,
    tvf_end: i64,
}

impl Lucene40TermVectorsReader {
    pub fn open<D: Directory + ?Sized>(
        directory: &D,
        si: &SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<Lucene40TermVectorsReader> {
        let name = segment_file_name(&si.name, "", VECTORS_INDEX_EXTENSION);
        let mut tvx = directory.open_input(&name, context)?;
        let tvx_version = check_header(tvx.as_mut(), CODEC_NAME_INDEX, VERSION_START, VERSION_CURRENT)?;

        let name = segment_file_name(&si.name, "", VECTORS_DOCUMENTS_EXTENSION);
        let mut tvd = directory.open_input(&name, context)?;
        let tvd_version = check_header(tvd.as_mut(), CODEC_NAME_DOCS, VERSION_START, VERSION_CURRENT)?;

        let name = segment_file_name(&si.name, "", VECTORS_FIELDS_EXTENSION);
        let mut tvf = directory.open_input(&name, context)?;
        let tvf_version = check_header(tvf.as_mut(), CODEC_NAME_FIELDS, VERSION_START, VERSION_CURRENT)?;

        if tvx_version != tvd_version || tvx_version != tvf_version {
            bail!(CorruptIndex(format!(
                "version mismatch: {}={} {}={} {}={}",
                tvx.name(),
                tvx_version,
                tvd.name(),
                tvd_version,
                tvf.name(),
                tvf_version
            )));
        }

        let footer = if tvx_version >= VERSION_CHECKSUM {
            retrieve_checksum(tvx.as_mut())?;
            retrieve_checksum(tvd.as_mut())?;
            retrieve_checksum(tvf.as_mut())?;
            footer_length() as i64
        } else {
            0
        };

        let index_size = tvx.len() as i64 - header_length(CODEC_NAME_INDEX) as i64 - footer;
        if index_size < 0 || index_size % 16 != 0 {
            bail!(CorruptIndex(format!(
                "invalid index size: {} (resource={})",
                index_size,
                tvx.name()
            )));
        }
        let num_total_docs = (index_size >> 4) as i32;
        if num_total_docs != si.max_doc() {
            bail!(CorruptIndex(format!(
                "doc counts differ for segment {}: vectors reader shows {} but segmentInfo shows {}",
                si.name,
                num_total_docs,
                si.max_doc()
            )));
        }
        let tvd_end = tvd.len() as i64 - footer;
        let tvf_end = tvf.len() as i64 - footer;

        Ok(Lucene40TermVectorsReader {
            field_infos,
            tvx: Some(tvx),
            tvd: Some(tvd),
            tvf: Some(tvf),
            num_total_docs,
            version: tvx_version,
            tvd_end,
            tvf_end,
        })
    }

    /// Returns a reader with independent cursors over the same files.
    pub fn duplicate(&self) -> Result<Lucene40TermVectorsReader> {
        let (tvx, tvd, tvf) = self.inputs()?;
        Ok(Lucene40TermVectorsReader {
            field_infos: Arc::clone(&self.field_infos),
            tvx: Some(tvx.duplicate()?),
            tvd: Some(tvd.duplicate()?),
            tvf: Some(tvf.duplicate()?),
            num_total_docs: self.num_total_docs,
            version: self.version,
            tvd_end: self.tvd_end,
            tvf_end: self.tvf_end,
        })
    }

    /// Releases all three files. Every later call fails with `AlreadyClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.tvx = None;
        self.tvd = None;
        self.tvf = None;
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

    fn inputs(&self) -> Result<(&dyn IndexInput, &dyn IndexInput, &dyn IndexInput)> {
        match (&self.tvx, &self.tvd, &self.tvf) {
            (Some(tvx), Some(tvd), Some(tvf)) => Ok((&**tvx, &**tvd, &**tvf)),
            _ => bail!(AlreadyClosed("this TermVectorsReader is closed".into())),
        }
    }

    fn index_pointer(&self, doc: DocId) -> Result<i64> {
        if doc < 0 || doc >= self.num_total_docs {
            bail!(IndexOutOfBounds(format!(
                "doc {} out of range [0, {})",
                doc, self.num_total_docs
            )));
        }
        Ok(header_length(CODEC_NAME_INDEX) as i64 + i64::from(doc) * 16)
    }

    /// Positions `.tvd` and `.tvf` at `start_doc` after filling the byte
    /// lengths of `num_docs` consecutive documents in both files. Used for
    /// bulk merging.
    pub fn raw_docs(
        &mut self,
        tvd_lengths: &mut [i32],
        tvf_lengths: &mut [i32],
        start_doc: DocId,
        num_docs: usize,
    ) -> Result<(&mut dyn IndexInput, &mut dyn IndexInput)> {
        let index_pointer = self.index_pointer(start_doc)?;
        if start_doc as usize + num_docs > self.num_total_docs as usize {
            bail!(IndexOutOfBounds(format!(
                "docs [{}, {}) out of range [0, {})",
                start_doc,
                start_doc as usize + num_docs,
                self.num_total_docs
            )));
        }
        let num_total_docs = self.num_total_docs;
        let (tvd_end, tvf_end) = (self.tvd_end, self.tvf_end);
        match (self.tvx.as_mut(), self.tvd.as_mut(), self.tvf.as_mut()) {
            (Some(tvx), Some(tvd), Some(tvf)) => {
                tvx.seek(index_pointer)?;
                let mut tvd_position = tvx.read_long()?;
                let mut tvf_position = tvx.read_long()?;
                tvd.seek(tvd_position)?;
                tvf.seek(tvf_position)?;
                for i in 0..num_docs {
                    let doc = start_doc + i as i32 + 1;
                    let (next_tvd, next_tvf) = if doc < num_total_docs {
                        (tvx.read_long()?, tvx.read_long()?)
                    } else {
                        (tvd_end, tvf_end)
                    };
                    tvd_lengths[i] = (next_tvd - tvd_position) as i32;
                    tvf_lengths[i] = (next_tvf - tvf_position) as i32;
                    tvd_position = next_tvd;
                    tvf_position = next_tvf;
                }
                let tvd: &mut dyn IndexInput = tvd.as_mut();
                let tvf: &mut dyn IndexInput = tvf.as_mut();
                Ok((tvd, tvf))
            }
            _ => bail!(AlreadyClosed("this TermVectorsReader is closed".into())),
        }
    }

    /// Verifies the checksums of the three files. Legacy files are not
    /// checked.
    pub fn check_integrity(&self) -> Result<()> {
        let (tvx, tvd, tvf) = self.inputs()?;
        if self.version >= VERSION_CHECKSUM {
            checksum_entire_file(tvx)?;
            checksum_entire_file(tvd)?;
            checksum_entire_file(tvf)?;
        }
        Ok(())
    }
}

impl TermVectorsReader for Lucene40TermVectorsReader {
    type Fields = TermVectorFields;

    fn get(&self, doc: DocId) -> Result<Option<TermVectorFields>> {
        let index_pointer = self.index_pointer(doc)?;
        let (tvx, tvd, tvf) = self.inputs()?;
        let mut tvx = tvx.duplicate()?;
        let mut tvd = tvd.duplicate()?;
        tvx.seek(index_pointer)?;
        tvd.seek(tvx.read_long()?)?;

        let field_count = tvd.read_vint()?;
        if field_count < 0 {
            bail!(CorruptIndex(format!(
                "invalid field count {} for doc {} (resource={})",
                field_count,
                doc,
                tvd.name()
            )));
        }
        if field_count == 0 {
            return Ok(None);
        }
        let mut numbers = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            numbers.push(tvd.read_vint()?);
        }
        let mut position = tvx.read_long()?;
        let mut fields = Vec::with_capacity(numbers.len());
        for (i, number) in numbers.into_iter().enumerate() {
            if i > 0 {
                position += tvd.read_vlong()?;
            }
            fields.push((number, position));
        }
        fields.sort_by_key(|&(number, _)| number);

        Ok(Some(TermVectorFields {
            field_infos: Arc::clone(&self.field_infos),
            fields,
            tvf: tvf.duplicate()?,
        }))
    }
}

/// The term vectors of one document.
pub struct TermVectorFields {
    field_infos: Arc<FieldInfos>,
    /// (field number, `.tvf` pointer), sorted by field number
    fields: Vec<(i32, i64)>,
    tvf: Box<dyn IndexInput>,
}

impl Fields for TermVectorFields {
    type Terms = TermVectorTerms;

    fn fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|&(number, _)| self.field_infos.field_info_by_number(number))
            .map(|fi| fi.name.clone())
            .collect()
    }

    fn terms(&self, field: &str) -> Result<Option<TermVectorTerms>> {
        let number = match self.field_infos.field_info_by_name(field) {
            Some(fi) => fi.number,
            None => return Ok(None),
        };
        match self.fields.binary_search_by_key(&number, |&(n, _)| n) {
            Ok(idx) => {
                let terms = TermVectorTerms::open(self.tvf.duplicate()?, self.fields[idx].1)?;
                Ok(Some(terms))
            }
            Err(_) => Ok(None),
        }
    }

    fn size(&self) -> usize {
        self.fields.len()
    }
}

/// The terms of one field of one document.
pub struct TermVectorTerms {
    tvf: Box<dyn IndexInput>,
    num_terms: i32,
    tvf_fp_start: i64,
    store_positions: bool,
    store_offsets: bool,
    store_payloads: bool,
}

impl TermVectorTerms {
    fn open(mut tvf: Box<dyn IndexInput>, tvf_fp: i64) -> Result<TermVectorTerms> {
        tvf.seek(tvf_fp)?;
        let num_terms = tvf.read_vint()?;
        let bits = tvf.read_byte()?;
        if num_terms < 0 {
            bail!(CorruptIndex(format!(
                "invalid term count {} (resource={})",
                num_terms,
                tvf.name()
            )));
        }
        let tvf_fp_start = tvf.file_pointer();
        Ok(TermVectorTerms {
            tvf,
            num_terms,
            tvf_fp_start,
            store_positions: bits & STORE_POSITIONS_WITH_TERMVECTOR != 0,
            store_offsets: bits & STORE_OFFSET_WITH_TERMVECTOR != 0,
            store_payloads: bits & STORE_PAYLOAD_WITH_TERMVECTOR != 0,
        })
    }
}

impl Terms for TermVectorTerms {
    type Iterator = TermVectorTermIterator;

    fn iterator(&self) -> Result<TermVectorTermIterator> {
        let mut iter = TermVectorTermIterator {
            tvf: self.tvf.duplicate()?,
            num_terms: self.num_terms,
            next_term: 0,
            tvf_fp_start: self.tvf_fp_start,
            store_positions: self.store_positions,
            store_offsets: self.store_offsets,
            store_payloads: self.store_payloads,
            term: Vec::with_capacity(16),
            freq: 0,
            positions: Vec::new(),
            start_offsets: Vec::new(),
            end_offsets: Vec::new(),
            payload_offsets: Vec::new(),
            payload_data: Vec::new(),
            last_payload_length: -1,
        };
        iter.reset()?;
        Ok(iter)
    }

    fn size(&self) -> Result<i64> {
        Ok(i64::from(self.num_terms))
    }

    fn sum_total_term_freq(&self) -> Result<i64> {
        Ok(-1)
    }

    fn sum_doc_freq(&self) -> Result<i64> {
        Ok(i64::from(self.num_terms))
    }

    fn doc_count(&self) -> Result<i32> {
        Ok(1)
    }

    fn has_freqs(&self) -> Result<bool> {
        Ok(true)
    }

    fn has_offsets(&self) -> Result<bool> {
        Ok(self.store_offsets)
    }

    fn has_positions(&self) -> Result<bool> {
        Ok(self.store_positions)
    }

    fn has_payloads(&self) -> Result<bool> {
        Ok(self.store_payloads)
    }
}

/// Walks the terms of a field in order, decoding each term's positions,
/// offsets and payloads as it is reached.
pub struct TermVectorTermIterator {
    tvf: Box<dyn IndexInput>,
    num_terms: i32,
    next_term: i32,
    tvf_fp_start: i64,
    store_positions: bool,
    store_offsets: bool,
    store_payloads: bool,
    term: Vec<u8>,
    freq: i32,
    positions: Vec<i32>,
    start_offsets: Vec<i32>,
    end_offsets: Vec<i32>,
    payload_offsets: Vec<i32>,
    payload_data: Vec<u8>,
    last_payload_length: i32,
}

impl TermVectorTermIterator {
    fn reset(&mut self) -> Result<()> {
        self.tvf.seek(self.tvf_fp_start)?;
        self.next_term = 0;
        self.term.clear();
        self.last_payload_length = -1;
        Ok(())
    }

    fn read_term(&mut self) -> Result<bool> {
        if self.next_term >= self.num_terms {
            return Ok(false);
        }
        let prefix = self.tvf.read_vint()?;
        let suffix = self.tvf.read_vint()?;
        if prefix < 0 || prefix as usize > self.term.len() || suffix < 0 {
            bail!(CorruptIndex(format!(
                "invalid term prefix/suffix {}/{} (resource={})",
                prefix,
                suffix,
                self.tvf.name()
            )));
        }
        let (prefix, suffix) = (prefix as usize, suffix as usize);
        self.term.resize(prefix + suffix, 0);
        self.tvf.read_bytes(&mut self.term, prefix, suffix)?;
        self.freq = self.tvf.read_vint()?;
        let freq = self.freq.max(0) as usize;

        self.positions.clear();
        self.payload_offsets.clear();
        self.payload_data.clear();
        if self.store_payloads {
            let mut total_payload_length = 0;
            let mut position = 0;
            for _ in 0..freq {
                let code = self.tvf.read_vint()?;
                position += (code as u32 >> 1) as i32;
                self.positions.push(position);
                if code & 1 != 0 {
                    self.last_payload_length = self.tvf.read_vint()?;
                    if self.last_payload_length < 0 {
                        bail!(CorruptIndex(format!(
                            "invalid payload length {} (resource={})",
                            self.last_payload_length,
                            self.tvf.name()
                        )));
                    }
                }
                self.payload_offsets.push(total_payload_length);
                total_payload_length = match total_payload_length
                    .checked_add(self.last_payload_length)
                {
                    Some(total) => total,
                    None => bail!(CorruptIndex(format!(
                        "payload lengths overflow (resource={})",
                        self.tvf.name()
                    ))),
                };
            }
            let len = total_payload_length as usize;
            self.payload_data.resize(len, 0);
            self.tvf.read_bytes(&mut self.payload_data, 0, len)?;
        } else if self.store_positions {
            let mut position = 0;
            for _ in 0..freq {
                position += self.tvf.read_vint()?;
                self.positions.push(position);
            }
        }

        self.start_offsets.clear();
        self.end_offsets.clear();
        if self.store_offsets {
            let mut offset = 0;
            for _ in 0..freq {
                let start = offset + self.tvf.read_vint()?;
                offset = start + self.tvf.read_vint()?;
                self.start_offsets.push(start);
                self.end_offsets.push(offset);
            }
        }

        self.next_term += 1;
        Ok(true)
    }

    fn check_positioned(&self) -> Result<()> {
        if self.next_term == 0 {
            bail!(IllegalState("term iterator is unpositioned".into()));
        }
        Ok(())
    }
}

impl TermIterator for TermVectorTermIterator {
    type Postings = TermVectorPostings;

    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.read_term()? {
            Ok(Some(self.term.clone()))
        } else {
            Ok(None)
        }
    }

    /// Linear scan; restarts from the first term when `text` sorts before
    /// the current term.
    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus> {
        if self.next_term != 0 {
            match text.cmp(self.term.as_slice()) {
                Ordering::Less => self.reset()?,
                Ordering::Equal => return Ok(SeekStatus::Found),
                Ordering::Greater => {}
            }
        }
        while self.read_term()? {
            match text.cmp(self.term.as_slice()) {
                Ordering::Less => return Ok(SeekStatus::NotFound),
                Ordering::Equal => return Ok(SeekStatus::Found),
                Ordering::Greater => {}
            }
        }
        Ok(SeekStatus::End)
    }

    fn term(&self) -> Result<&[u8]> {
        self.check_positioned()?;
        Ok(&self.term)
    }

    fn doc_freq(&mut self) -> Result<i32> {
        self.check_positioned()?;
        Ok(1)
    }

    fn total_term_freq(&mut self) -> Result<i64> {
        self.check_positioned()?;
        Ok(i64::from(self.freq))
    }

    fn postings_with_flags(&mut self, _flags: u16) -> Result<TermVectorPostings> {
        self.check_positioned()?;
        Ok(TermVectorPostings {
            doc: -1,
            freq: self.freq,
            next_pos: 0,
            positions: self.positions.clone(),
            start_offsets: self.start_offsets.clone(),
            end_offsets: self.end_offsets.clone(),
            payload_offsets: self.payload_offsets.clone(),
            payload_data: self.payload_data.clone(),
        })
    }
}

/// Postings of a term vector term: a single document, 0.
pub struct TermVectorPostings {
    doc: DocId,
    freq: i32,
    next_pos: usize,
    positions: Vec<i32>,
    start_offsets: Vec<i32>,
    end_offsets: Vec<i32>,
    payload_offsets: Vec<i32>,
    payload_data: Vec<u8>,
}

impl TermVectorPostings {
    fn current(&self) -> Option<usize> {
        if self.next_pos == 0 {
            None
        } else {
            Some(self.next_pos - 1)
        }
    }
}

impl DocIterator for TermVectorPostings {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        self.doc = if self.doc == -1 { 0 } else { NO_MORE_DOCS };
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.slow_advance(target)
    }

    fn cost(&self) -> usize {
        1
    }
}

impl PostingIterator for TermVectorPostings {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if self.next_pos >= self.freq as usize {
            bail!(IllegalState(format!(
                "read past last position: freq is {}",
                self.freq
            )));
        }
        self.next_pos += 1;
        Ok(self.positions.get(self.next_pos - 1).cloned().unwrap_or(-1))
    }

    fn start_offset(&self) -> Result<i32> {
        Ok(self
            .current()
            .and_then(|i| self.start_offsets.get(i).cloned())
            .unwrap_or(-1))
    }

    fn end_offset(&self) -> Result<i32> {
        Ok(self
            .current()
            .and_then(|i| self.end_offsets.get(i).cloned())
            .unwrap_or(-1))
    }

    fn payload(&self) -> Result<Payload> {
        let i = match self.current() {
            Some(i) if i < self.payload_offsets.len() => i,
            _ => return Ok(Vec::new()),
        };
        let start = self.payload_offsets[i] as usize;
        let end = self
            .payload_offsets
            .get(i + 1)
            .map_or(self.payload_data.len(), |&end| end as usize);
        Ok(self.payload_data[start..end].to_vec())
    }
}
