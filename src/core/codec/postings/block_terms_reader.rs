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
use std::collections::BTreeMap;
use std::sync::Arc;

use core::codec::codec_util::{
    check_header, checksum_entire_file, footer_length, retrieve_checksum,
};
use core::codec::postings::{
    Lucene40PostingIterator, Lucene40PostingsReader, StandardTermState, TERMS_CODEC_NAME,
    TERMS_EXTENSION, TERMS_INDEX_CODEC_NAME, TERMS_INDEX_EXTENSION, TERMS_VERSION_CHECKSUM,
    TERMS_VERSION_CURRENT, TERMS_VERSION_START,
};
use core::index::{
    segment_file_name, FieldInfo, Fields, SeekStatus, SegmentReadState, TermIterator, Terms,
};
use core::store::directory::Directory;
use core::store::io::IndexInput;
use core::util::BitsRef;

use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

struct TermsDict {
    terms_in: Box<dyn IndexInput>,
    index_in: Box<dyn IndexInput>,
    postings_reader: Lucene40PostingsReader,
    version: i32,
}

struct FieldMeta {
    field_info: Arc<FieldInfo>,
    num_terms: i64,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
    /// first term of every block with the block's start pointer
    index: Vec<(Vec<u8>, i64)>,
}

/// Reads the block terms dictionary (`.tib`) and loads its terms index
/// (`.tip`) into memory.
pub struct BlockTermsReader {
    dict: Arc<TermsDict>,
    fields: BTreeMap<String, FieldReader>,
}

impl BlockTermsReader {
    pub fn open<D: Directory>(
        state: &SegmentReadState<D>,
        mut postings_reader: Lucene40PostingsReader,
    ) -> Result<BlockTermsReader> {
        let segment = &state.segment_info.name;

        let name = segment_file_name(segment, &state.segment_suffix, TERMS_EXTENSION);
        let mut terms_in = state.directory.open_input(&name, state.context)?;
        let version = check_header(
            terms_in.as_mut(),
            TERMS_CODEC_NAME,
            TERMS_VERSION_START,
            TERMS_VERSION_CURRENT,
        )?;
        postings_reader.init(terms_in.as_mut())?;

        let name = segment_file_name(segment, &state.segment_suffix, TERMS_INDEX_EXTENSION);
        let mut index_in = state.directory.open_input(&name, state.context)?;
        let index_version = check_header(
            index_in.as_mut(),
            TERMS_INDEX_CODEC_NAME,
            TERMS_VERSION_START,
            TERMS_VERSION_CURRENT,
        )?;
        if index_version != version {
            bail!(CorruptIndex(format!(
                "mixmatched version files: {}={}, {}={}",
                terms_in.name(),
                version,
                index_in.name(),
                index_version
            )));
        }
        if version >= TERMS_VERSION_CHECKSUM {
            retrieve_checksum(terms_in.as_mut())?;
            retrieve_checksum(index_in.as_mut())?;
        }

        seek_dir(terms_in.as_mut(), version)?;
        let num_fields = terms_in.read_vint()?;
        if num_fields < 0 {
            bail!(CorruptIndex(format!(
                "invalid num_fields: {} (resource={})",
                num_fields,
                terms_in.name()
            )));
        }
        seek_dir(index_in.as_mut(), version)?;
        let num_index_fields = index_in.read_vint()?;
        if num_index_fields != num_fields {
            bail!(CorruptIndex(format!(
                "terms index has {} fields but dictionary has {} (resource={})",
                num_index_fields,
                num_fields,
                index_in.name()
            )));
        }
        let mut index_starts = Vec::with_capacity(num_fields as usize);
        for _ in 0..num_fields {
            let number = index_in.read_vint()?;
            let start = index_in.read_vlong()?;
            index_starts.push((number, start));
        }

        let max_doc = state.segment_info.max_doc();
        let mut metas = Vec::with_capacity(num_fields as usize);
        for &(index_number, index_start) in &index_starts {
            let number = terms_in.read_vint()?;
            if number != index_number {
                bail!(CorruptIndex(format!(
                    "field {} in terms index does not match field {} (resource={})",
                    index_number,
                    number,
                    terms_in.name()
                )));
            }
            let field_info = match state.field_infos.by_number.get(&number) {
                Some(field_info) => Arc::clone(field_info),
                None => bail!(CorruptIndex(format!(
                    "invalid field number: {} (resource={})",
                    number,
                    terms_in.name()
                ))),
            };
            let num_terms = terms_in.read_vlong()?;
            if num_terms <= 0 {
                bail!(CorruptIndex(format!(
                    "illegal num_terms for field {}: {} (resource={})",
                    field_info.name,
                    num_terms,
                    terms_in.name()
                )));
            }
            let terms_start = terms_in.read_vlong()?;
            let sum_total_term_freq = if field_info.index_options.has_freqs() {
                terms_in.read_vlong()?
            } else {
                -1
            };
            let sum_doc_freq = terms_in.read_vlong()?;
            let doc_count = terms_in.read_vint()?;
            if doc_count < 0 || doc_count > max_doc {
                bail!(CorruptIndex(format!(
                    "invalid doc_count: {} max_doc: {} (resource={})",
                    doc_count,
                    max_doc,
                    terms_in.name()
                )));
            }
            if sum_doc_freq < i64::from(doc_count) {
                bail!(CorruptIndex(format!(
                    "invalid sum_doc_freq: {} doc_count: {} (resource={})",
                    sum_doc_freq,
                    doc_count,
                    terms_in.name()
                )));
            }
            if sum_total_term_freq != -1 && sum_total_term_freq < sum_doc_freq {
                bail!(CorruptIndex(format!(
                    "invalid sum_total_term_freq: {} sum_doc_freq: {} (resource={})",
                    sum_total_term_freq,
                    sum_doc_freq,
                    terms_in.name()
                )));
            }

            let index = read_index(index_in.as_mut(), index_start, terms_start)?;
            if index.is_empty() {
                bail!(CorruptIndex(format!(
                    "field {} has terms but no index entries (resource={})",
                    field_info.name,
                    index_in.name()
                )));
            }
            metas.push(FieldMeta {
                field_info,
                num_terms,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                index,
            });
        }

        let dict = Arc::new(TermsDict {
            terms_in,
            index_in,
            postings_reader,
            version,
        });
        let mut fields = BTreeMap::new();
        for meta in metas {
            let name = meta.field_info.name.clone();
            let reader = FieldReader {
                dict: Arc::clone(&dict),
                meta: Arc::new(meta),
            };
            if fields.insert(name.clone(), reader).is_some() {
                bail!(CorruptIndex(format!("duplicate field: {}", name)));
            }
        }
        Ok(BlockTermsReader { dict, fields })
    }

    pub fn version(&self) -> i32 {
        self.dict.version
    }

    /// Verifies the checksums of the terms files and the postings files.
    pub fn check_integrity(&self) -> Result<()> {
        if self.dict.version >= TERMS_VERSION_CHECKSUM {
            checksum_entire_file(self.dict.terms_in.as_ref())?;
            checksum_entire_file(self.dict.index_in.as_ref())?;
        }
        self.dict.postings_reader.check_integrity()
    }
}

fn seek_dir(input: &mut dyn IndexInput, version: i32) -> Result<()> {
    let trailer = if version >= TERMS_VERSION_CHECKSUM {
        footer_length() as i64 + 8
    } else {
        8
    };
    let len = input.len() as i64;
    if len < trailer {
        bail!(CorruptIndex(format!(
            "file too short: {} bytes (resource={})",
            len,
            input.name()
        )));
    }
    input.seek(len - trailer)?;
    let dir_offset = input.read_long()?;
    if dir_offset < 0 || dir_offset > len - trailer {
        bail!(CorruptIndex(format!(
            "invalid directory offset: {} (resource={})",
            dir_offset,
            input.name()
        )));
    }
    input.seek(dir_offset)
}

fn read_index(
    input: &mut dyn IndexInput,
    index_start: i64,
    terms_start: i64,
) -> Result<Vec<(Vec<u8>, i64)>> {
    input.seek(index_start)?;
    let count = input.read_vint()?;
    if count < 0 {
        bail!(CorruptIndex(format!(
            "invalid index entry count: {} (resource={})",
            count,
            input.name()
        )));
    }
    let mut index = Vec::with_capacity(count as usize);
    let mut block_pointer = terms_start;
    for _ in 0..count {
        let len = input.read_vint()? as usize;
        let mut term = vec![0u8; len];
        input.read_bytes(&mut term, 0, len)?;
        block_pointer += input.read_vlong()?;
        index.push((term, block_pointer));
    }
    Ok(index)
}

impl Fields for BlockTermsReader {
    type Terms = FieldReader;

    fn fields(&self) -> Vec<String> {
        let mut readers: Vec<&FieldReader> = self.fields.values().collect();
        readers.sort_by_key(|r| r.meta.field_info.number);
        readers
            .into_iter()
            .map(|r| r.meta.field_info.name.clone())
            .collect()
    }

    fn terms(&self, field: &str) -> Result<Option<FieldReader>> {
        Ok(self.fields.get(field).cloned())
    }

    fn size(&self) -> usize {
        self.fields.len()
    }
}

/// Terms of one field of a block terms dictionary.
#[derive(Clone)]
pub struct FieldReader {
    dict: Arc<TermsDict>,
    meta: Arc<FieldMeta>,
}

impl FieldReader {
    pub fn field_info(&self) -> &FieldInfo {
        &self.meta.field_info
    }
}

impl Terms for FieldReader {
    type Iterator = BlockTermIterator;

    fn iterator(&self) -> Result<BlockTermIterator> {
        Ok(BlockTermIterator {
            input: self.dict.terms_in.duplicate()?,
            dict: Arc::clone(&self.dict),
            meta: Arc::clone(&self.meta),
            block: Vec::new(),
            block_index: None,
            ord: None,
        })
    }

    fn size(&self) -> Result<i64> {
        Ok(self.meta.num_terms)
    }

    fn sum_total_term_freq(&self) -> Result<i64> {
        Ok(self.meta.sum_total_term_freq)
    }

    fn sum_doc_freq(&self) -> Result<i64> {
        Ok(self.meta.sum_doc_freq)
    }

    fn doc_count(&self) -> Result<i32> {
        Ok(self.meta.doc_count)
    }

    fn has_freqs(&self) -> Result<bool> {
        Ok(self.meta.field_info.index_options.has_freqs())
    }

    fn has_offsets(&self) -> Result<bool> {
        Ok(self.meta.field_info.index_options.has_offsets())
    }

    fn has_positions(&self) -> Result<bool> {
        Ok(self.meta.field_info.index_options.has_positions())
    }

    fn has_payloads(&self) -> Result<bool> {
        Ok(self.meta.field_info.has_store_payloads)
    }
}

struct BlockEntry {
    term: Vec<u8>,
    state: StandardTermState,
}

/// Iterates the terms of one field, decoding a whole block at a time.
///
/// Seeking binary searches the in-memory index for the block that may
/// hold the target and scans that block.
pub struct BlockTermIterator {
    dict: Arc<TermsDict>,
    meta: Arc<FieldMeta>,
    input: Box<dyn IndexInput>,
    block: Vec<BlockEntry>,
    block_index: Option<usize>,
    /// position inside `block`; `None` when unpositioned or exhausted
    ord: Option<usize>,
}

impl BlockTermIterator {
    fn load_block(&mut self, index: usize) -> Result<()> {
        if self.block_index == Some(index) {
            return Ok(());
        }
        let block_pointer = self.meta.index[index].1;
        let field_info = &self.meta.field_info;
        let has_freqs = field_info.index_options.has_freqs();
        let input = self.input.as_mut();
        input.seek(block_pointer)?;

        let count = input.read_vint()?;
        if count <= 0 {
            bail!(CorruptIndex(format!(
                "invalid block size: {} (resource={})",
                count,
                input.name()
            )));
        }
        self.block.clear();
        self.block_index = None;
        let mut term: Vec<u8> = Vec::new();
        let mut state = StandardTermState::new();
        for i in 0..count {
            let prefix = input.read_vint()? as usize;
            let suffix = input.read_vint()? as usize;
            if prefix > term.len() {
                bail!(CorruptIndex(format!(
                    "invalid term prefix: {} > {} (resource={})",
                    prefix,
                    term.len(),
                    input.name()
                )));
            }
            term.resize(prefix + suffix, 0);
            input.read_bytes(&mut term, prefix, suffix)?;
            state.doc_freq = input.read_vint()?;
            state.total_term_freq = if has_freqs {
                i64::from(state.doc_freq) + input.read_vlong()?
            } else {
                -1
            };
            state.term_block_ord = i;
            self.dict
                .postings_reader
                .decode_term(&mut *input, field_info, &mut state, i == 0)?;
            self.block.push(BlockEntry {
                term: term.clone(),
                state: state.clone(),
            });
        }
        self.block_index = Some(index);
        Ok(())
    }

    fn current(&self) -> Result<&BlockEntry> {
        match self.ord {
            Some(ord) if ord < self.block.len() => Ok(&self.block[ord]),
            _ => bail!(IllegalState("term iterator is not positioned".into())),
        }
    }

    /// Returns the postings of the current term, skipping docs not set in
    /// `live_docs`.
    pub fn postings_with_live_docs(
        &mut self,
        live_docs: Option<BitsRef>,
        flags: u16,
    ) -> Result<Lucene40PostingIterator> {
        let entry = self.current()?;
        self.dict
            .postings_reader
            .postings(&self.meta.field_info, &entry.state, live_docs, flags)
    }
}

impl TermIterator for BlockTermIterator {
    type Postings = Lucene40PostingIterator;

    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        let next = match (self.block_index, self.ord) {
            (None, _) => Some((0, 0)),
            (Some(_), None) => None,
            (Some(block), Some(ord)) => {
                if ord + 1 < self.block.len() {
                    Some((block, ord + 1))
                } else if block + 1 < self.meta.index.len() {
                    Some((block + 1, 0))
                } else {
                    None
                }
            }
        };
        match next {
            Some((block, ord)) => {
                self.load_block(block)?;
                self.ord = Some(ord);
                Ok(Some(self.block[ord].term.clone()))
            }
            None => {
                self.ord = None;
                Ok(None)
            }
        }
    }

    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus> {
        // last block whose first term is <= text
        let block = match self
            .meta
            .index
            .binary_search_by(|entry| entry.0.as_slice().cmp(text))
        {
            Ok(i) => i,
            Err(0) => {
                self.load_block(0)?;
                self.ord = Some(0);
                return Ok(SeekStatus::NotFound);
            }
            Err(i) => i - 1,
        };
        self.load_block(block)?;
        for (ord, entry) in self.block.iter().enumerate() {
            match entry.term.as_slice().cmp(text) {
                Ordering::Less => continue,
                Ordering::Equal => {
                    self.ord = Some(ord);
                    return Ok(SeekStatus::Found);
                }
                Ordering::Greater => {
                    self.ord = Some(ord);
                    return Ok(SeekStatus::NotFound);
                }
            }
        }
        if block + 1 < self.meta.index.len() {
            self.load_block(block + 1)?;
            self.ord = Some(0);
            Ok(SeekStatus::NotFound)
        } else {
            self.ord = None;
            Ok(SeekStatus::End)
        }
    }

    fn term(&self) -> Result<&[u8]> {
        Ok(&self.current()?.term)
    }

    fn doc_freq(&mut self) -> Result<i32> {
        Ok(self.current()?.state.doc_freq)
    }

    fn total_term_freq(&mut self) -> Result<i64> {
        Ok(self.current()?.state.total_term_freq)
    }

    fn postings_with_flags(&mut self, flags: u16) -> Result<Lucene40PostingIterator> {
        self.postings_with_live_docs(None, flags)
    }
}
