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


use std::io::{self, Read};
use std::sync::Arc;

use core::store::io::{DataInput, IndexInput};
use core::util::math::log;
use core::util::DocId;

use error::ErrorKind::{IllegalState, UnexpectedEOF, UnsupportedOperation};
use error::Result;

/// Holds one skip level in memory. File pointers stay absolute so child
/// pointers from the level above can be used unchanged.
struct SkipBuffer {
    data: Arc<Vec<u8>>,
    pointer: i64,
    pos: usize,
}

impl SkipBuffer {
    fn new(input: &mut dyn IndexInput, length: usize) -> Result<SkipBuffer> {
        let mut data = vec![0u8; length];
        let pointer = input.file_pointer();
        input.read_bytes(&mut data, 0, length)?;
        Ok(SkipBuffer {
            data: Arc::new(data),
            pointer,
            pos: 0,
        })
    }
}

impl DataInput for SkipBuffer {}

impl Read for SkipBuffer {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let len = buffer.len().min(available);
        buffer[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

impl IndexInput for SkipBuffer {
    fn duplicate(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(SkipBuffer {
            data: Arc::clone(&self.data),
            pointer: self.pointer,
            pos: self.pos,
        }))
    }

    fn file_pointer(&self) -> i64 {
        self.pointer + self.pos as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        let rel = pos - self.pointer;
        if rel < 0 || rel as usize > self.data.len() {
            bail!(UnexpectedEOF(format!(
                "seek to {} outside of buffered skip level [{}, {})",
                pos,
                self.pointer,
                self.pointer + self.data.len() as i64
            )));
        }
        self.pos = rel as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        "SkipBuffer"
    }

    fn slice(&self, _description: &str, _offset: i64, _length: i64) -> Result<Box<dyn IndexInput>> {
        bail!(UnsupportedOperation("slice of a skip buffer".into()))
    }
}

/// Reads the multi-level skip lists written by `Lucene40SkipListWriter`.
///
/// Levels are loaded lazily on the first `skip_to` after `init`. The
/// topmost level is buffered in memory; the others are read through
/// duplicates of the `.frq` input.
pub struct Lucene40SkipListReader {
    /// the maximum number of skip levels possible for this index
    max_number_of_skip_levels: usize,
    /// number of levels in this skip list
    number_of_skip_levels: usize,
    /// number of top skip levels to buffer in memory
    number_of_levels_to_buffer: usize,

    doc_count: i32,
    have_skipped: bool,

    /// skip stream for each level, level 0 is the base stream
    skip_stream: Vec<Option<Box<dyn IndexInput>>>,
    /// the start pointer of each skip level
    skip_pointer: Vec<i64>,
    /// skip interval of each level
    skip_interval: Vec<i64>,
    /// number of docs skipped per level
    num_skipped: Vec<i64>,
    /// doc id of current skip entry per level
    skip_doc: Vec<DocId>,
    /// doc id of last read skip entry with doc id <= target
    last_doc: DocId,
    /// child pointer of current skip entry per level
    child_pointer: Vec<i64>,
    /// child pointer of last read skip entry with doc id <= target
    last_child_pointer: i64,
    skip_multiplier: i32,

    current_field_stores_payloads: bool,
    current_field_stores_offsets: bool,

    freq_pointer: Vec<i64>,
    prox_pointer: Vec<i64>,
    payload_length: Vec<i32>,
    offset_length: Vec<i32>,

    last_freq_pointer: i64,
    last_prox_pointer: i64,
    last_payload_length: i32,
    last_offset_length: i32,
}

impl Lucene40SkipListReader {
    pub fn new(
        skip_stream: Box<dyn IndexInput>,
        max_skip_levels: i32,
        skip_interval: i32,
    ) -> Lucene40SkipListReader {
        let max_levels = max_skip_levels.max(1) as usize;
        let mut skip_streams = Vec::with_capacity(max_levels);
        skip_streams.push(Some(skip_stream));
        let mut skip_intervals = Vec::with_capacity(max_levels);
        skip_intervals.push(i64::from(skip_interval));
        for i in 1..max_levels {
            // cache skip intervals
            let last_interval = skip_intervals[i - 1];
            skip_intervals.push(last_interval.saturating_mul(i64::from(skip_interval)));
            skip_streams.push(None);
        }

        Lucene40SkipListReader {
            max_number_of_skip_levels: max_levels,
            number_of_skip_levels: 0,
            number_of_levels_to_buffer: 1,
            doc_count: 0,
            have_skipped: false,
            skip_stream: skip_streams,
            skip_pointer: vec![0; max_levels],
            skip_interval: skip_intervals,
            num_skipped: vec![0; max_levels],
            skip_doc: vec![0; max_levels],
            last_doc: 0,
            child_pointer: vec![0; max_levels],
            last_child_pointer: 0,
            skip_multiplier: skip_interval,
            current_field_stores_payloads: false,
            current_field_stores_offsets: false,
            freq_pointer: vec![0; max_levels],
            prox_pointer: vec![0; max_levels],
            payload_length: vec![0; max_levels],
            offset_length: vec![0; max_levels],
            last_freq_pointer: 0,
            last_prox_pointer: 0,
            last_payload_length: 0,
            last_offset_length: 0,
        }
    }

    /// Prepares to skip the postings of one term.
    pub fn init(
        &mut self,
        skip_pointer: i64,
        freq_base_pointer: i64,
        prox_base_pointer: i64,
        df: i32,
        stores_payloads: bool,
        stores_offsets: bool,
    ) {
        self.skip_pointer[0] = skip_pointer;
        self.doc_count = df;
        for i in 0..self.max_number_of_skip_levels {
            self.skip_doc[i] = 0;
            self.num_skipped[i] = 0;
            self.child_pointer[i] = 0;
            self.freq_pointer[i] = freq_base_pointer;
            self.prox_pointer[i] = prox_base_pointer;
            self.payload_length[i] = 0;
            self.offset_length[i] = 0;
        }
        for stream in self.skip_stream.iter_mut().skip(1) {
            *stream = None;
        }
        self.have_skipped = false;
        self.current_field_stores_payloads = stores_payloads;
        self.current_field_stores_offsets = stores_offsets;
        self.last_freq_pointer = freq_base_pointer;
        self.last_prox_pointer = prox_base_pointer;
    }

    /// Returns the id of the doc to which the last call of `skip_to` has
    /// skipped.
    pub fn doc(&self) -> DocId {
        self.last_doc
    }

    /// Returns the `.frq` pointer of the doc following `doc()`.
    pub fn freq_pointer(&self) -> i64 {
        self.last_freq_pointer
    }

    /// Returns the `.prx` pointer of the doc following `doc()`.
    pub fn prox_pointer(&self) -> i64 {
        self.last_prox_pointer
    }

    /// Returns the payload length of the payload stored just before the doc
    /// following `doc()`.
    pub fn payload_length(&self) -> i32 {
        self.last_payload_length
    }

    /// Returns the offset length of the position stored just before the doc
    /// following `doc()`.
    pub fn offset_length(&self) -> i32 {
        self.last_offset_length
    }

    /// Skips entries to the first beyond the current whose document number
    /// is greater than or equal to `target`. Returns the number of docs
    /// consumed up to and including `doc()`, minus one.
    pub fn skip_to(&mut self, target: DocId) -> Result<i32> {
        if !self.have_skipped {
            // first time, load skip levels
            self.load_skip_levels()?;
            self.have_skipped = true;
        }

        // walk up the levels until highest level is found that has a skip
        // for this target
        let mut level = 0usize;
        while level + 1 < self.number_of_skip_levels && target > self.skip_doc[level + 1] {
            level += 1;
        }

        loop {
            if target > self.skip_doc[level] {
                // an exhausted level sets its skip doc to the max value
                self.load_next_skip(level)?;
            } else {
                // no more skips on this level, go down one level
                if level > 0 && self.last_child_pointer > self.stream(level - 1)?.file_pointer() {
                    self.seek_child(level - 1)?;
                }
                if level == 0 {
                    break;
                }
                level -= 1;
            }
        }

        Ok((self.num_skipped[0] - self.skip_interval[0] - 1) as i32)
    }

    fn load_next_skip(&mut self, level: usize) -> Result<()> {
        // we have to skip, the target document is greater than the current
        // skip list entry
        self.set_last_skip_data(level);

        self.num_skipped[level] += self.skip_interval[level];

        if self.num_skipped[level] > i64::from(self.doc_count) {
            // this skip list is exhausted
            self.skip_doc[level] = DocId::max_value();
            if self.number_of_skip_levels > level {
                self.number_of_skip_levels = level;
            }
            return Ok(());
        }

        // read next skip entry
        let delta = self.read_skip_data(level)?;
        self.skip_doc[level] += delta;

        if level != 0 {
            // read the child pointer if we are not on the leaf level
            let pointer = self.stream(level)?.read_vlong()?;
            self.child_pointer[level] = pointer + self.skip_pointer[level - 1];
        }

        Ok(())
    }

    /// Seeks the skip entry on the given level
    fn seek_child(&mut self, level: usize) -> Result<()> {
        let child_pointer = self.last_child_pointer;
        self.stream(level)?.seek(child_pointer)?;
        self.num_skipped[level] = self.num_skipped[level + 1] - self.skip_interval[level + 1];
        self.skip_doc[level] = self.last_doc;
        if level > 0 {
            let pointer = self.stream(level)?.read_vlong()?;
            self.child_pointer[level] = pointer + self.skip_pointer[level - 1];
        }

        self.freq_pointer[level] = self.last_freq_pointer;
        self.prox_pointer[level] = self.last_prox_pointer;
        self.payload_length[level] = self.last_payload_length;
        self.offset_length[level] = self.last_offset_length;
        Ok(())
    }

    fn set_last_skip_data(&mut self, level: usize) {
        self.last_doc = self.skip_doc[level];
        self.last_child_pointer = self.child_pointer[level];
        self.last_freq_pointer = self.freq_pointer[level];
        self.last_prox_pointer = self.prox_pointer[level];
        self.last_payload_length = self.payload_length[level];
        self.last_offset_length = self.offset_length[level];
    }

    fn read_skip_data(&mut self, level: usize) -> Result<i32> {
        let stores_payloads = self.current_field_stores_payloads;
        let stores_offsets = self.current_field_stores_offsets;

        let delta = if stores_payloads || stores_offsets {
            // the current field stores payloads and/or offsets. if the doc
            // delta is odd then the lengths changed and are stored as well
            let code = self.stream(level)?.read_vint()?;
            if (code & 1) != 0 {
                if stores_payloads {
                    self.payload_length[level] = self.stream(level)?.read_vint()?;
                }
                if stores_offsets {
                    self.offset_length[level] = self.stream(level)?.read_vint()?;
                }
            }
            ((code as u32) >> 1) as i32
        } else {
            self.stream(level)?.read_vint()?
        };

        let freq_delta = self.stream(level)?.read_vint()?;
        let prox_delta = self.stream(level)?.read_vint()?;
        self.freq_pointer[level] += i64::from(freq_delta);
        self.prox_pointer[level] += i64::from(prox_delta);

        Ok(delta)
    }

    /// Loads the skip levels
    fn load_skip_levels(&mut self) -> Result<()> {
        self.number_of_skip_levels = if i64::from(self.doc_count) <= self.skip_interval[0] {
            1
        } else {
            1 + log(
                i64::from(self.doc_count) / self.skip_interval[0],
                self.skip_multiplier,
            ) as usize
        };
        if self.number_of_skip_levels > self.max_number_of_skip_levels {
            self.number_of_skip_levels = self.max_number_of_skip_levels;
        }

        let skip_pointer = self.skip_pointer[0];
        self.stream(0)?.seek(skip_pointer)?;

        let mut to_buffer = self.number_of_levels_to_buffer;
        for level in (1..self.number_of_skip_levels).rev() {
            // the length of the current level
            let length = self.stream(0)?.read_vlong()?;
            if length < 0 {
                bail!(IllegalState(format!(
                    "negative skip level length {} at level {}",
                    length, level
                )));
            }

            // the start pointer of the current level
            self.skip_pointer[level] = self.stream(0)?.file_pointer();
            if to_buffer > 0 {
                // buffer this level
                let buffer = SkipBuffer::new(self.stream(0)?, length as usize)?;
                self.skip_stream[level] = Some(Box::new(buffer));
                to_buffer -= 1;
            } else {
                // duplicate this stream, it is already at the start of the
                // current level
                let stream = self.stream(0)?.duplicate()?;
                self.skip_stream[level] = Some(stream);

                // move base stream beyond the current level
                let base = self.stream(0)?;
                let fp = base.file_pointer();
                base.seek(fp + length)?;
            }
        }

        // use base stream for the lowest level
        self.skip_pointer[0] = self.stream(0)?.file_pointer();
        debug!(
            "loaded {} skip levels for {} docs",
            self.number_of_skip_levels, self.doc_count
        );
        Ok(())
    }

    fn stream(&mut self, level: usize) -> Result<&mut dyn IndexInput> {
        match self.skip_stream[level] {
            Some(ref mut stream) => Ok(stream.as_mut()),
            None => bail!(IllegalState(format!("skip level {} is not loaded", level))),
        }
    }
}
