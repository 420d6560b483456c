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
use core::codec::postings::{
    Lucene40SkipListWriter, StandardTermState, FREQ_EXTENSION, FRQ_CODEC, PROX_EXTENSION,
    PRX_CODEC, TERMS_CODEC, VERSION_CURRENT,
};
use core::index::{segment_file_name, FieldInfo, IndexOptions, SegmentWriteState};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexOutput};
use core::util::io::delete_files_ignoring_errors;
use core::util::DocId;

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;

/// Writes the `.frq` and `.prx` files.
///
/// Doc ids are written as deltas; when frequencies are kept the delta is
/// shifted left and the low bit flags a frequency of one. Positions are
/// delta coded per document, with the low bit announcing a changed payload
/// or offset length.
pub struct Lucene40PostingsWriter<D: Directory> {
    directory: Arc<D>,
    files: Vec<String>,
    freq_out: Option<D::IndexOutput>,
    prox_out: Option<D::IndexOutput>,
    skip_list_writer: Lucene40SkipListWriter,

    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,

    index_options: IndexOptions,
    store_payloads: bool,
    store_offsets: bool,

    last_doc_id: DocId,
    df: i32,
    last_payload_length: i32,
    last_offset_length: i32,
    last_position: i32,
    last_offset: i32,

    freq_start: i64,
    prox_start: i64,
    last_state: StandardTermState,
    aborted: bool,
}

impl<D: Directory> Lucene40PostingsWriter<D> {
    /// Creates the `.frq` file, and the `.prx` file when any field of the
    /// segment indexes positions.
    pub fn new(
        state: &SegmentWriteState<D>,
        skip_interval: i32,
        max_skip_levels: i32,
        skip_minimum: i32,
    ) -> Result<Lucene40PostingsWriter<D>> {
        if skip_interval < 2 {
            bail!(IllegalArgument(format!(
                "skip_interval must be >= 2, got {}",
                skip_interval
            )));
        }
        let mut writer = Lucene40PostingsWriter {
            directory: Arc::clone(&state.directory),
            files: Vec::with_capacity(2),
            freq_out: None,
            prox_out: None,
            skip_list_writer: Lucene40SkipListWriter::new(
                skip_interval,
                max_skip_levels,
                state.segment_info.max_doc(),
            ),
            skip_interval,
            max_skip_levels,
            skip_minimum,
            index_options: IndexOptions::Null,
            store_payloads: false,
            store_offsets: false,
            last_doc_id: 0,
            df: 0,
            last_payload_length: -1,
            last_offset_length: -1,
            last_position: 0,
            last_offset: 0,
            freq_start: 0,
            prox_start: 0,
            last_state: StandardTermState::new(),
            aborted: false,
        };
        let res = writer.open_outputs(state);
        writer.abort_on_error(res)?;
        Ok(writer)
    }

    fn open_outputs(&mut self, state: &SegmentWriteState<D>) -> Result<()> {
        let segment = &state.segment_info.name;
        let file_name = segment_file_name(segment, &state.segment_suffix, FREQ_EXTENSION);
        self.files.push(file_name.clone());
        let mut freq_out = self.directory.create_output(&file_name, &state.context)?;
        write_header(&mut freq_out, FRQ_CODEC, VERSION_CURRENT)?;
        self.freq_out = Some(freq_out);

        if state.field_infos.has_prox {
            let file_name = segment_file_name(segment, &state.segment_suffix, PROX_EXTENSION);
            self.files.push(file_name.clone());
            let mut prox_out = self.directory.create_output(&file_name, &state.context)?;
            write_header(&mut prox_out, PRX_CODEC, VERSION_CURRENT)?;
            self.prox_out = Some(prox_out);
        }
        Ok(())
    }

    /// Names of the files this writer created.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Writes the postings header into the terms dictionary.
    pub fn init<O: DataOutput + ?Sized>(&mut self, terms_out: &mut O) -> Result<()> {
        write_header(terms_out, TERMS_CODEC, VERSION_CURRENT)?;
        terms_out.write_int(self.skip_interval)?;
        terms_out.write_int(self.max_skip_levels)?;
        terms_out.write_int(self.skip_minimum)?;
        Ok(())
    }

    /// Sets the field the following terms belong to.
    pub fn set_field(&mut self, field_info: &FieldInfo) -> Result<()> {
        if field_info.index_options.has_positions() && self.prox_out.is_none() {
            bail!(IllegalState(format!(
                "field {} indexes positions but the segment has no prox file",
                field_info.name
            )));
        }
        self.index_options = field_info.index_options;
        self.store_offsets = field_info.index_options.has_offsets();
        self.store_payloads = field_info.has_store_payloads;
        self.last_state = StandardTermState::new();
        Ok(())
    }

    pub fn start_term(&mut self) -> Result<()> {
        self.check_open()?;
        self.freq_start = self.freq_out()?.file_pointer();
        self.prox_start = match self.prox_out {
            Some(ref out) => out.file_pointer(),
            None => 0,
        };
        // force first payload and offset length to be written
        self.last_payload_length = -1;
        self.last_offset_length = -1;
        self.skip_list_writer
            .reset_skip(self.freq_start, self.prox_start);
        Ok(())
    }

    /// Adds a new doc in this term. `term_doc_freq` is ignored when the
    /// field omits frequencies.
    pub fn start_doc(&mut self, doc_id: DocId, term_doc_freq: i32) -> Result<()> {
        let res = self.write_doc(doc_id, term_doc_freq);
        self.abort_on_error(res)
    }

    fn write_doc(&mut self, doc_id: DocId, term_doc_freq: i32) -> Result<()> {
        self.check_open()?;
        let delta = doc_id - self.last_doc_id;
        if doc_id < 0 || (self.df > 0 && delta <= 0) {
            let last_doc_id = self.last_doc_id;
            let resource = self.freq_out()?.name().to_string();
            bail!(CorruptIndex(format!(
                "docs out of order ({} <= {}) (resource={})",
                doc_id, last_doc_id, resource
            )));
        }

        self.df += 1;
        if self.df % self.skip_interval == 0 {
            let freq_pointer = self.freq_out()?.file_pointer();
            let prox_pointer = match self.prox_out {
                Some(ref out) => out.file_pointer(),
                None => 0,
            };
            self.skip_list_writer.set_skip_data(
                self.last_doc_id,
                self.store_payloads,
                self.last_payload_length,
                self.store_offsets,
                self.last_offset_length,
                freq_pointer,
                prox_pointer,
            );
            self.skip_list_writer.buffer_skip(self.df)?;
        }

        self.last_doc_id = doc_id;
        let omit_tf = self.index_options == IndexOptions::Docs;
        let out = self.freq_out()?;
        if omit_tf {
            out.write_vint(delta)?;
        } else if term_doc_freq == 1 {
            out.write_vint((delta << 1) | 1)?;
        } else {
            out.write_vint(delta << 1)?;
            out.write_vint(term_doc_freq)?;
        }

        self.last_position = 0;
        self.last_offset = 0;
        Ok(())
    }

    /// Adds a new position and payload, and start/end offset. Offsets are
    /// ignored unless the field stores them.
    pub fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        let res = self.write_position(position, payload, start_offset, end_offset);
        self.abort_on_error(res)
    }

    fn write_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        self.check_open()?;
        debug_assert!(self.index_options.has_positions());
        let delta = position - self.last_position;
        if delta < 0 {
            bail!(IllegalArgument(format!(
                "position {} is before the previous position {}",
                position, self.last_position
            )));
        }
        self.last_position = position;

        let store_payloads = self.store_payloads;
        let store_offsets = self.store_offsets;
        let mut payload_length = 0;
        let mut write_payload_length = false;
        if store_payloads {
            payload_length = payload.map_or(0, |p| p.len() as i32);
            if payload_length != self.last_payload_length {
                self.last_payload_length = payload_length;
                write_payload_length = true;
            }
        }

        let mut offset_code = None;
        if store_offsets {
            let offset_delta = start_offset - self.last_offset;
            let offset_length = end_offset - start_offset;
            if offset_delta < 0 || offset_length < 0 {
                bail!(IllegalArgument(format!(
                    "offsets must be increasing, got start={} end={} after {}",
                    start_offset, end_offset, self.last_offset
                )));
            }
            if offset_length != self.last_offset_length {
                offset_code = Some((offset_delta << 1 | 1, Some(offset_length)));
            } else {
                offset_code = Some((offset_delta << 1, None));
            }
            self.last_offset = start_offset;
            self.last_offset_length = offset_length;
        }

        let out = match self.prox_out.as_mut() {
            Some(out) => out,
            None => bail!(IllegalState("no prox file to write positions to".into())),
        };
        if store_payloads {
            if write_payload_length {
                out.write_vint((delta << 1) | 1)?;
                out.write_vint(payload_length)?;
            } else {
                out.write_vint(delta << 1)?;
            }
        } else {
            out.write_vint(delta)?;
        }

        if let Some((code, length)) = offset_code {
            out.write_vint(code)?;
            if let Some(length) = length {
                out.write_vint(length)?;
            }
        }

        if payload_length > 0 {
            if let Some(bytes) = payload {
                out.write_bytes(bytes, 0, bytes.len())?;
            }
        }
        Ok(())
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when we are done adding docs to this term. Fills in the file
    /// pointers of `state`.
    pub fn finish_term(&mut self, state: &mut StandardTermState) -> Result<()> {
        let res = self.write_term_end(state);
        self.abort_on_error(res)
    }

    fn write_term_end(&mut self, state: &mut StandardTermState) -> Result<()> {
        self.check_open()?;
        // the terms dictionary sets the doc freq, so it must match what we saw
        debug_assert!(state.doc_freq == 0 || state.doc_freq == self.df);
        state.doc_freq = self.df;
        state.freq_offset = self.freq_start;
        state.prox_offset = self.prox_start;
        state.skip_offset = if self.df >= self.skip_minimum {
            let freq_start = self.freq_start;
            let skip_pointer = match self.freq_out.as_mut() {
                Some(out) => self.skip_list_writer.write_skip(out)?,
                None => bail!(IllegalState("postings writer is closed".into())),
            };
            skip_pointer - freq_start
        } else {
            -1
        };

        self.last_doc_id = 0;
        self.df = 0;
        Ok(())
    }

    /// Writes the metadata of a finished term relative to the previous term,
    /// or absolutely when `absolute` is set.
    pub fn encode_term<O: DataOutput + ?Sized>(
        &mut self,
        out: &mut O,
        field_info: &FieldInfo,
        state: &StandardTermState,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            self.last_state = StandardTermState::new();
        }
        out.write_vlong(state.freq_offset - self.last_state.freq_offset)?;
        if state.skip_offset != -1 {
            debug_assert!(state.skip_offset > 0);
            out.write_vlong(state.skip_offset)?;
        }
        if field_info.index_options.has_positions() {
            out.write_vlong(state.prox_offset - self.last_state.prox_offset)?;
        }
        self.last_state = state.clone();
        Ok(())
    }

    /// Writes footers and releases both outputs.
    pub fn close(&mut self) -> Result<()> {
        if self.freq_out.is_none() && self.prox_out.is_none() {
            return Ok(());
        }
        let res = self.write_footers();
        self.abort_on_error(res)
    }

    fn write_footers(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(mut out) = self.freq_out.take() {
            write_footer(&mut out)?;
            out.flush()?;
        }
        if let Some(mut out) = self.prox_out.take() {
            write_footer(&mut out)?;
            out.flush()?;
        }
        Ok(())
    }

    /// Drops the outputs and deletes the files written so far.
    pub fn abort(&mut self) {
        self.freq_out = None;
        self.prox_out = None;
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
            bail!(IllegalState("postings writer was aborted".into()));
        }
        Ok(())
    }

    fn freq_out(&mut self) -> Result<&mut D::IndexOutput> {
        match self.freq_out.as_mut() {
            Some(out) => Ok(out),
            None => bail!(IllegalState("postings writer is closed".into())),
        }
    }
}
