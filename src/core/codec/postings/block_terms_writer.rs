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

use core::codec::codec_util::{write_footer, write_header};
use core::codec::postings::{Lucene40PostingsWriter, StandardTermState};
use core::index::{segment_file_name, FieldInfo, SegmentWriteState};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexOutput};
use core::util::io::delete_files_ignoring_errors;
use core::util::string_util::bytes_difference;

use error::ErrorKind::{IllegalArgument, IllegalState};
use error::Result;

/// Extension of terms file
pub const TERMS_EXTENSION: &str = "tib";
/// Extension of terms index file
pub const TERMS_INDEX_EXTENSION: &str = "tip";

pub const TERMS_CODEC_NAME: &str = "BLOCK_TERMS_DICT";
pub const TERMS_INDEX_CODEC_NAME: &str = "BLOCK_TERMS_INDEX";

/// Initial terms format.
pub const TERMS_VERSION_START: i32 = 0;
/// Both files end with a checksum footer.
pub const TERMS_VERSION_CHECKSUM: i32 = 1;
pub const TERMS_VERSION_CURRENT: i32 = TERMS_VERSION_CHECKSUM;

/// Number of terms per block; the first term of every block goes to the
/// terms index.
pub const DEFAULT_TERMS_BLOCK_SIZE: usize = 32;

/// Statistics of a finished term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermStats {
    pub doc_freq: i32,
    /// -1 when the field omits frequencies
    pub total_term_freq: i64,
}

impl TermStats {
    pub fn new(doc_freq: i32, total_term_freq: i64) -> TermStats {
        TermStats {
            doc_freq,
            total_term_freq,
        }
    }
}

struct PendingTerm {
    term: Vec<u8>,
    state: StandardTermState,
}

struct FieldMetaData {
    field_number: i32,
    num_terms: i64,
    terms_start_pointer: i64,
    index_start_pointer: i64,
    sum_total_term_freq: i64,
    sum_doc_freq: i64,
    doc_count: i32,
    has_freqs: bool,
}

/// Writes the terms dictionary as fixed size blocks of prefix coded terms.
///
/// Each block starts with the term count, then for each term the shared
/// prefix length with the previous term of the block, the suffix, the doc
/// freq, the total term freq delta and the postings metadata. The first
/// term of a block has absolute metadata so any block can be decoded on
/// its own. Block start pointers go to the `.tip` file together with the
/// first term of the block.
pub struct BlockTermsWriter<D: Directory> {
    directory: Arc<D>,
    files: Vec<String>,
    out: Option<D::IndexOutput>,
    index_out: Option<D::IndexOutput>,
    postings_writer: Lucene40PostingsWriter<D>,
    block_size: usize,

    fields: Vec<FieldMetaData>,
    current_field: Option<FieldInfo>,
    pending: Vec<PendingTerm>,
    last_term: Vec<u8>,
    num_terms: i64,
    terms_start_pointer: i64,
    index_terms: Vec<(Vec<u8>, i64)>,
    aborted: bool,
}

impl<D: Directory> BlockTermsWriter<D> {
    pub fn new(
        state: &SegmentWriteState<D>,
        postings_writer: Lucene40PostingsWriter<D>,
        block_size: usize,
    ) -> Result<BlockTermsWriter<D>> {
        let mut writer = BlockTermsWriter {
            directory: Arc::clone(&state.directory),
            files: Vec::with_capacity(2),
            out: None,
            index_out: None,
            postings_writer,
            block_size: block_size.max(1),
            fields: Vec::new(),
            current_field: None,
            pending: Vec::with_capacity(block_size),
            last_term: Vec::new(),
            num_terms: 0,
            terms_start_pointer: 0,
            index_terms: Vec::new(),
            aborted: false,
        };
        let res = writer.open_outputs(state);
        writer.abort_on_error(res)?;
        Ok(writer)
    }

    fn open_outputs(&mut self, state: &SegmentWriteState<D>) -> Result<()> {
        let segment = &state.segment_info.name;
        let name = segment_file_name(segment, &state.segment_suffix, TERMS_EXTENSION);
        self.files.push(name.clone());
        let mut out = self.directory.create_output(&name, &state.context)?;
        write_header(&mut out, TERMS_CODEC_NAME, TERMS_VERSION_CURRENT)?;
        self.postings_writer.init(&mut out)?;
        self.out = Some(out);

        let name = segment_file_name(segment, &state.segment_suffix, TERMS_INDEX_EXTENSION);
        self.files.push(name.clone());
        let mut index_out = self.directory.create_output(&name, &state.context)?;
        write_header(&mut index_out, TERMS_INDEX_CODEC_NAME, TERMS_VERSION_CURRENT)?;
        self.index_out = Some(index_out);
        Ok(())
    }

    /// Names of all files written for the terms dictionary and postings.
    pub fn files(&self) -> Vec<String> {
        let mut files = self.files.clone();
        files.extend(self.postings_writer.files().iter().cloned());
        files
    }

    /// Starts a new field. Terms of the previous field must be finished.
    pub fn add_field(&mut self, field_info: &FieldInfo) -> Result<()> {
        let res = self.start_field(field_info);
        self.abort_on_error(res)
    }

    fn start_field(&mut self, field_info: &FieldInfo) -> Result<()> {
        self.check_open()?;
        if let Some(ref field) = self.current_field {
            bail!(IllegalState(format!(
                "field {} was not finished before adding field {}",
                field.name, field_info.name
            )));
        }
        if !field_info.is_indexed() {
            bail!(IllegalArgument(format!(
                "field {} is not indexed",
                field_info.name
            )));
        }
        if self
            .fields
            .iter()
            .any(|f| f.field_number == field_info.number)
        {
            bail!(IllegalArgument(format!(
                "field {} was already written",
                field_info.name
            )));
        }
        self.postings_writer.set_field(field_info)?;
        self.terms_start_pointer = self.out()?.file_pointer();
        self.current_field = Some(field_info.clone());
        self.last_term.clear();
        self.num_terms = 0;
        self.pending.clear();
        self.index_terms.clear();
        Ok(())
    }

    /// Starts a term and returns the postings writer to feed its docs and
    /// positions to. Finish with `add_term`.
    pub fn start_term(&mut self) -> Result<&mut Lucene40PostingsWriter<D>> {
        self.check_open()?;
        if self.current_field.is_none() {
            bail!(IllegalState("start_term called without a field".into()));
        }
        let res = self.postings_writer.start_term();
        self.abort_on_error(res)?;
        Ok(&mut self.postings_writer)
    }

    /// Finishes the current term. Terms must arrive in increasing byte order.
    pub fn add_term(&mut self, term: &[u8], stats: TermStats) -> Result<()> {
        let res = self.push_term(term, stats);
        self.abort_on_error(res)
    }

    fn push_term(&mut self, term: &[u8], stats: TermStats) -> Result<()> {
        self.check_open()?;
        if self.current_field.is_none() {
            bail!(IllegalState("add_term called without a field".into()));
        }
        if stats.doc_freq <= 0 {
            bail!(IllegalArgument(format!(
                "term {:?} has doc_freq {}",
                term, stats.doc_freq
            )));
        }
        if self.num_terms > 0 && term <= self.last_term.as_slice() {
            bail!(IllegalArgument(format!(
                "terms out of order: {:?} after {:?}",
                term, self.last_term
            )));
        }

        let mut state = StandardTermState::new();
        state.doc_freq = stats.doc_freq;
        state.total_term_freq = stats.total_term_freq;
        self.postings_writer.finish_term(&mut state)?;

        self.last_term.clear();
        self.last_term.extend_from_slice(term);
        self.num_terms += 1;
        self.pending.push(PendingTerm {
            term: term.to_vec(),
            state,
        });
        if self.pending.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let field_info = match self.current_field {
            Some(ref field) => field,
            None => bail!(IllegalState("no field to flush terms for".into())),
        };
        let has_freqs = field_info.index_options.has_freqs();
        let out = match self.out.as_mut() {
            Some(out) => out,
            None => bail!(IllegalState("terms writer is closed".into())),
        };

        self.index_terms
            .push((self.pending[0].term.clone(), out.file_pointer()));
        out.write_vint(self.pending.len() as i32)?;
        let mut prev: &[u8] = &[];
        for (i, pending) in self.pending.iter().enumerate() {
            let prefix = bytes_difference(prev, &pending.term);
            let suffix = pending.term.len() - prefix;
            out.write_vint(prefix as i32)?;
            out.write_vint(suffix as i32)?;
            out.write_bytes(&pending.term, prefix, suffix)?;
            out.write_vint(pending.state.doc_freq)?;
            if has_freqs {
                out.write_vlong(pending.state.total_term_freq - i64::from(pending.state.doc_freq))?;
            }
            self.postings_writer
                .encode_term(out, field_info, &pending.state, i == 0)?;
            prev = &pending.term;
        }
        self.pending.clear();
        Ok(())
    }

    /// Finishes the current field with its aggregate statistics.
    pub fn finish_field(
        &mut self,
        sum_total_term_freq: i64,
        sum_doc_freq: i64,
        doc_count: i32,
    ) -> Result<()> {
        let res = self.end_field(sum_total_term_freq, sum_doc_freq, doc_count);
        self.abort_on_error(res)
    }

    fn end_field(&mut self, sum_total_term_freq: i64, sum_doc_freq: i64, doc_count: i32) -> Result<()> {
        self.check_open()?;
        self.flush_block()?;
        let field_info = match self.current_field.take() {
            Some(field) => field,
            None => bail!(IllegalState("finish_field called without a field".into())),
        };
        if self.num_terms == 0 {
            // fields without terms are left out
            return Ok(());
        }

        let index_out = match self.index_out.as_mut() {
            Some(out) => out,
            None => bail!(IllegalState("terms writer is closed".into())),
        };
        let index_start_pointer = index_out.file_pointer();
        index_out.write_vint(self.index_terms.len() as i32)?;
        let mut last_block_pointer = self.terms_start_pointer;
        for (term, block_pointer) in &self.index_terms {
            index_out.write_vint(term.len() as i32)?;
            index_out.write_bytes(term, 0, term.len())?;
            index_out.write_vlong(block_pointer - last_block_pointer)?;
            last_block_pointer = *block_pointer;
        }

        self.fields.push(FieldMetaData {
            field_number: field_info.number,
            num_terms: self.num_terms,
            terms_start_pointer: self.terms_start_pointer,
            index_start_pointer,
            sum_total_term_freq,
            sum_doc_freq,
            doc_count,
            has_freqs: field_info.index_options.has_freqs(),
        });
        debug!(
            "wrote {} terms in {} blocks for field {}",
            self.num_terms,
            self.index_terms.len(),
            field_info.name
        );
        Ok(())
    }

    /// Writes the field directories and footers, then closes the postings.
    pub fn close(&mut self) -> Result<()> {
        if self.out.is_none() && self.index_out.is_none() {
            return Ok(());
        }
        let res = self.write_trailer();
        self.abort_on_error(res)
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(ref field) = self.current_field {
            bail!(IllegalState(format!(
                "field {} was not finished",
                field.name
            )));
        }

        if let Some(mut out) = self.out.take() {
            let dir_start = out.file_pointer();
            out.write_vint(self.fields.len() as i32)?;
            for field in &self.fields {
                out.write_vint(field.field_number)?;
                out.write_vlong(field.num_terms)?;
                out.write_vlong(field.terms_start_pointer)?;
                if field.has_freqs {
                    out.write_vlong(field.sum_total_term_freq)?;
                }
                out.write_vlong(field.sum_doc_freq)?;
                out.write_vint(field.doc_count)?;
            }
            out.write_long(dir_start)?;
            write_footer(&mut out)?;
            out.flush()?;
        }

        if let Some(mut index_out) = self.index_out.take() {
            let dir_start = index_out.file_pointer();
            index_out.write_vint(self.fields.len() as i32)?;
            for field in &self.fields {
                index_out.write_vint(field.field_number)?;
                index_out.write_vlong(field.index_start_pointer)?;
            }
            index_out.write_long(dir_start)?;
            write_footer(&mut index_out)?;
            index_out.flush()?;
        }

        self.postings_writer.close()
    }

    /// Drops all outputs and deletes every file written so far, including
    /// the postings files.
    pub fn abort(&mut self) {
        self.out = None;
        self.index_out = None;
        self.aborted = true;
        self.postings_writer.abort();
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
            bail!(IllegalState("terms writer was aborted".into()));
        }
        Ok(())
    }

    fn out(&mut self) -> Result<&mut D::IndexOutput> {
        match self.out.as_mut() {
            Some(out) => Ok(out),
            None => bail!(IllegalState("terms writer is closed".into())),
        }
    }
}
