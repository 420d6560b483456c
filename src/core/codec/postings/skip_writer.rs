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


use std::cmp::min;

use core::store::io::{DataOutput, IndexOutput, RAMOutputStream};
use core::util::math::log;
use core::util::DocId;

use error::Result;

/// Writes skip lists with multiple levels for the `.frq` file.
///
/// Level 0 holds one entry every `skip_interval` docs, level `n` one entry
/// every `skip_interval^(n+1)` docs. Every entry stores the doc delta, the
/// `.frq` and `.prx` pointer deltas and, for fields with payloads or offsets,
/// the last payload and offset lengths whenever they change. Entries on
/// levels above 0 also carry a pointer into the next lower level.
pub struct Lucene40SkipListWriter {
    /// number of levels in this skip list
    number_of_skip_levels: usize,
    /// the skip interval in the list with level = 0
    skip_interval: i32,
    /// skip interval used for levels > 0
    skip_multiplier: i32,
    /// for every skip level a different buffer is used
    skip_buffer: Vec<RAMOutputStream>,

    last_skip_doc: Vec<DocId>,
    last_skip_payload_length: Vec<i32>,
    last_skip_offset_length: Vec<i32>,
    last_skip_freq_pointer: Vec<i64>,
    last_skip_prox_pointer: Vec<i64>,

    cur_doc: DocId,
    cur_store_payloads: bool,
    cur_store_offsets: bool,
    cur_payload_length: i32,
    cur_offset_length: i32,
    cur_freq_pointer: i64,
    cur_prox_pointer: i64,
}

impl Lucene40SkipListWriter {
    /// `doc_count` bounds the number of levels ever needed, normally the
    /// segment's doc count.
    pub fn new(skip_interval: i32, max_skip_levels: i32, doc_count: i32) -> Lucene40SkipListWriter {
        debug_assert!(skip_interval > 1);
        let number_of_skip_levels = if doc_count <= skip_interval {
            1
        } else {
            1 + log(i64::from(doc_count / skip_interval), skip_interval)
        };
        let number_of_skip_levels = min(number_of_skip_levels, max_skip_levels.max(1)) as usize;

        let mut skip_buffer = Vec::with_capacity(number_of_skip_levels);
        for i in 0..number_of_skip_levels {
            skip_buffer.push(RAMOutputStream::new(&format!("skip_level_{}", i), false));
        }

        Lucene40SkipListWriter {
            number_of_skip_levels,
            skip_interval,
            skip_multiplier: skip_interval,
            skip_buffer,
            last_skip_doc: vec![0; number_of_skip_levels],
            last_skip_payload_length: vec![-1; number_of_skip_levels],
            last_skip_offset_length: vec![-1; number_of_skip_levels],
            last_skip_freq_pointer: vec![0; number_of_skip_levels],
            last_skip_prox_pointer: vec![0; number_of_skip_levels],
            cur_doc: 0,
            cur_store_payloads: false,
            cur_store_offsets: false,
            cur_payload_length: -1,
            cur_offset_length: -1,
            cur_freq_pointer: 0,
            cur_prox_pointer: 0,
        }
    }

    pub fn number_of_skip_levels(&self) -> usize {
        self.number_of_skip_levels
    }

    /// Sets the values for the current skip data.
    pub fn set_skip_data(
        &mut self,
        doc: DocId,
        store_payloads: bool,
        payload_length: i32,
        store_offsets: bool,
        offset_length: i32,
        freq_pointer: i64,
        prox_pointer: i64,
    ) {
        self.cur_doc = doc;
        self.cur_store_payloads = store_payloads;
        self.cur_payload_length = payload_length;
        self.cur_store_offsets = store_offsets;
        self.cur_offset_length = offset_length;
        self.cur_freq_pointer = freq_pointer;
        self.cur_prox_pointer = prox_pointer;
    }

    /// Empties the buffers at the start of a term whose postings begin at
    /// the given file pointers.
    pub fn reset_skip(&mut self, freq_pointer: i64, prox_pointer: i64) {
        for buffer in &mut self.skip_buffer {
            buffer.reset();
        }
        for i in 0..self.number_of_skip_levels {
            self.last_skip_doc[i] = 0;
            self.last_skip_payload_length[i] = -1;
            self.last_skip_offset_length[i] = -1;
            self.last_skip_freq_pointer[i] = freq_pointer;
            self.last_skip_prox_pointer[i] = prox_pointer;
        }
    }

    /// Writes the current skip data to the buffers. `df`, the number of docs
    /// added so far, determines the highest level the entry goes to.
    pub fn buffer_skip(&mut self, df: i32) -> Result<()> {
        debug_assert_eq!(df % self.skip_interval, 0);
        let mut num_levels = 1;
        let mut df = df / self.skip_interval;

        // determine max level
        while df % self.skip_multiplier == 0 && num_levels < self.number_of_skip_levels {
            num_levels += 1;
            df /= self.skip_multiplier;
        }

        let mut child_pointer = 0;
        for level in 0..num_levels {
            self.write_skip_data(level)?;

            let new_child_pointer = self.skip_buffer[level].file_pointer();
            if level != 0 {
                // store child pointers for all levels except the lowest
                self.skip_buffer[level].write_vlong(child_pointer)?;
            }

            // remember the child pointer for the next level
            child_pointer = new_child_pointer;
        }

        Ok(())
    }

    /// Writes the buffered skip lists to `output`, highest level first, and
    /// returns the pointer the skip data starts at.
    pub fn write_skip<O: IndexOutput + ?Sized>(&self, output: &mut O) -> Result<i64> {
        let skip_pointer = output.file_pointer();

        for level in (1..self.number_of_skip_levels).rev() {
            let length = self.skip_buffer[level].file_pointer();
            if length > 0 {
                output.write_vlong(length)?;
                self.skip_buffer[level].write_to(output)?;
            }
        }
        self.skip_buffer[0].write_to(output)?;

        Ok(skip_pointer)
    }

    fn write_skip_data(&mut self, level: usize) -> Result<()> {
        let buffer = &mut self.skip_buffer[level];
        let delta = self.cur_doc - self.last_skip_doc[level];
        if self.cur_store_payloads || self.cur_store_offsets {
            if self.cur_payload_length == self.last_skip_payload_length[level]
                && self.cur_offset_length == self.last_skip_offset_length[level]
            {
                // the lengths are unchanged, the low bit stays clear
                buffer.write_vint(delta << 1)?;
            } else {
                buffer.write_vint(delta << 1 | 1)?;
                if self.cur_store_payloads {
                    buffer.write_vint(self.cur_payload_length)?;
                    self.last_skip_payload_length[level] = self.cur_payload_length;
                }
                if self.cur_store_offsets {
                    buffer.write_vint(self.cur_offset_length)?;
                    self.last_skip_offset_length[level] = self.cur_offset_length;
                }
            }
        } else {
            buffer.write_vint(delta)?;
        }

        buffer.write_vint((self.cur_freq_pointer - self.last_skip_freq_pointer[level]) as i32)?;
        buffer.write_vint((self.cur_prox_pointer - self.last_skip_prox_pointer[level]) as i32)?;

        self.last_skip_doc[level] = self.cur_doc;
        self.last_skip_freq_pointer[level] = self.cur_freq_pointer;
        self.last_skip_prox_pointer[level] = self.cur_prox_pointer;
        Ok(())
    }
}
