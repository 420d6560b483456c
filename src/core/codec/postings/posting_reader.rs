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

use core::codec::codec_util::{check_header, checksum_entire_file, retrieve_checksum};
use core::codec::postings::{
    Lucene40SkipListReader, StandardTermState, FREQ_EXTENSION, FRQ_CODEC, PROX_EXTENSION,
    PRX_CODEC, TERMS_CODEC, VERSION_CHECKSUM, VERSION_CURRENT, VERSION_START,
};
use core::index::{segment_file_name, FieldInfo, FieldInfos, IndexOptions, SegmentInfo};
use core::search::{DocIterator, Payload, PostingIterator, PostingIteratorFlags, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::{DataInput, IndexInput};
use core::store::IOContext;
use core::util::{BitsRef, DocId};

use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

/// Number of docs decoded ahead by `SegmentDocsIterator`.
const BUFFER_SIZE: usize = 64;

/// Pending buffered docs beyond which `advance` binary searches the buffer.
const BINARY_SEARCH_THRESHOLD: i32 = 32;

#[derive(Clone, Copy, Debug)]
struct SkipParams {
    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,
}

/// Concrete class that reads the 4.0 frq/prox postings format.
pub struct Lucene40PostingsReader {
    freq_in: Box<dyn IndexInput>,
    prox_in: Option<Box<dyn IndexInput>>,
    version: i32,
    skip: SkipParams,
}

impl Lucene40PostingsReader {
    /// Opens the `.frq` file, and the `.prx` file when any field of the
    /// segment indexes positions.
    pub fn open<D: Directory + ?Sized>(
        dir: &D,
        segment_info: &SegmentInfo,
        field_infos: &FieldInfos,
        context: &IOContext,
        segment_suffix: &str,
    ) -> Result<Lucene40PostingsReader> {
        let name = segment_file_name(&segment_info.name, segment_suffix, FREQ_EXTENSION);
        let mut freq_in = dir.open_input(&name, context)?;
        let version = check_header(freq_in.as_mut(), FRQ_CODEC, VERSION_START, VERSION_CURRENT)?;
        if version >= VERSION_CHECKSUM {
            retrieve_checksum(freq_in.as_mut())?;
        }

        let prox_in = if field_infos.has_prox {
            let name = segment_file_name(&segment_info.name, segment_suffix, PROX_EXTENSION);
            let mut prox_in = dir.open_input(&name, context)?;
            let prox_version =
                check_header(prox_in.as_mut(), PRX_CODEC, VERSION_START, VERSION_CURRENT)?;
            if prox_version != version {
                bail!(CorruptIndex(format!(
                    "version mismatch: frq={} prx={} (resource={})",
                    version,
                    prox_version,
                    prox_in.name()
                )));
            }
            if version >= VERSION_CHECKSUM {
                retrieve_checksum(prox_in.as_mut())?;
            }
            Some(prox_in)
        } else {
            None
        };

        Ok(Lucene40PostingsReader {
            freq_in,
            prox_in,
            version,
            skip: SkipParams {
                skip_interval: 0,
                max_skip_levels: 0,
                skip_minimum: 0,
            },
        })
    }

    /// Reads the postings header the writer put into the terms dictionary.
    pub fn init<I: IndexInput + ?Sized>(&mut self, terms_in: &mut I) -> Result<()> {
        check_header(terms_in, TERMS_CODEC, VERSION_START, VERSION_CURRENT)?;
        let skip_interval = terms_in.read_int()?;
        let max_skip_levels = terms_in.read_int()?;
        let skip_minimum = terms_in.read_int()?;
        if skip_interval < 2 || max_skip_levels < 1 {
            bail!(CorruptIndex(format!(
                "invalid skip parameters interval={} levels={} (resource={})",
                skip_interval,
                max_skip_levels,
                terms_in.name()
            )));
        }
        self.skip = SkipParams {
            skip_interval,
            max_skip_levels,
            skip_minimum,
        };
        Ok(())
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Decodes the metadata of the next term of a block into `state`. The
    /// file pointers are deltas against the previous term unless `absolute`.
    pub fn decode_term<I: DataInput + ?Sized>(
        &self,
        input: &mut I,
        field_info: &FieldInfo,
        state: &mut StandardTermState,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            state.freq_offset = 0;
            state.prox_offset = 0;
        }

        state.freq_offset += input.read_vlong()?;
        state.skip_offset = if state.doc_freq >= self.skip.skip_minimum {
            input.read_vlong()?
        } else {
            -1
        };

        if field_info.index_options.has_positions() {
            state.prox_offset += input.read_vlong()?;
        }
        Ok(())
    }

    /// Returns an iterator over the postings of a term. Positions are decoded
    /// only if `flags` asks for them and the field indexed them.
    pub fn postings(
        &self,
        field_info: &FieldInfo,
        state: &StandardTermState,
        live_docs: Option<BitsRef>,
        flags: u16,
    ) -> Result<Lucene40PostingIterator> {
        let wants_positions =
            PostingIteratorFlags::feature_requested(flags, PostingIteratorFlags::POSITIONS);
        if !wants_positions || !field_info.index_options.has_positions() {
            let freq_in = self.freq_in.duplicate()?;
            return Ok(Lucene40PostingIterator::Docs(SegmentDocsIterator::new(
                freq_in, field_info, state, live_docs, self.skip,
            )?));
        }

        let prox_in = match self.prox_in {
            Some(ref prox_in) => prox_in.duplicate()?,
            None => bail!(IllegalState(format!(
                "field {} has positions but the segment has no prox file",
                field_info.name
            ))),
        };
        let freq_in = self.freq_in.duplicate()?;
        if field_info.has_store_payloads || field_info.index_options.has_offsets() {
            Ok(Lucene40PostingIterator::FullPositions(
                SegmentFullPositionsIterator::new(
                    freq_in, prox_in, field_info, state, live_docs, self.skip,
                )?,
            ))
        } else {
            Ok(Lucene40PostingIterator::Positions(
                SegmentDocsAndPositionsIterator::new(
                    freq_in, prox_in, state, live_docs, self.skip,
                )?,
            ))
        }
    }

    /// Verifies the checksums of `.frq` and `.prx`. Files written before
    /// checksums were added are not checked.
    pub fn check_integrity(&self) -> Result<()> {
        if self.version >= VERSION_CHECKSUM {
            checksum_entire_file(self.freq_in.as_ref())?;
            if let Some(ref prox_in) = self.prox_in {
                checksum_entire_file(prox_in.as_ref())?;
            }
        }
        Ok(())
    }
}

/// Postings of one term, decoded by the variant matching the field's
/// features and the requested flags.
pub enum Lucene40PostingIterator {
    Docs(SegmentDocsIterator),
    Positions(SegmentDocsAndPositionsIterator),
    FullPositions(SegmentFullPositionsIterator),
}

impl DocIterator for Lucene40PostingIterator {
    fn doc_id(&self) -> DocId {
        match self {
            Lucene40PostingIterator::Docs(i) => i.doc_id(),
            Lucene40PostingIterator::Positions(i) => i.doc_id(),
            Lucene40PostingIterator::FullPositions(i) => i.doc_id(),
        }
    }

    fn next(&mut self) -> Result<DocId> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.next(),
            Lucene40PostingIterator::Positions(i) => i.next(),
            Lucene40PostingIterator::FullPositions(i) => i.next(),
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.advance(target),
            Lucene40PostingIterator::Positions(i) => i.advance(target),
            Lucene40PostingIterator::FullPositions(i) => i.advance(target),
        }
    }

    fn cost(&self) -> usize {
        match self {
            Lucene40PostingIterator::Docs(i) => i.cost(),
            Lucene40PostingIterator::Positions(i) => i.cost(),
            Lucene40PostingIterator::FullPositions(i) => i.cost(),
        }
    }
}

impl PostingIterator for Lucene40PostingIterator {
    fn freq(&self) -> Result<i32> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.freq(),
            Lucene40PostingIterator::Positions(i) => i.freq(),
            Lucene40PostingIterator::FullPositions(i) => i.freq(),
        }
    }

    fn next_position(&mut self) -> Result<i32> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.next_position(),
            Lucene40PostingIterator::Positions(i) => i.next_position(),
            Lucene40PostingIterator::FullPositions(i) => i.next_position(),
        }
    }

    fn start_offset(&self) -> Result<i32> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.start_offset(),
            Lucene40PostingIterator::Positions(i) => i.start_offset(),
            Lucene40PostingIterator::FullPositions(i) => i.start_offset(),
        }
    }

    fn end_offset(&self) -> Result<i32> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.end_offset(),
            Lucene40PostingIterator::Positions(i) => i.end_offset(),
            Lucene40PostingIterator::FullPositions(i) => i.end_offset(),
        }
    }

    fn payload(&self) -> Result<Payload> {
        match self {
            Lucene40PostingIterator::Docs(i) => i.payload(),
            Lucene40PostingIterator::Positions(i) => i.payload(),
            Lucene40PostingIterator::FullPositions(i) => i.payload(),
        }
    }
}

fn is_live(live_docs: &Option<BitsRef>, doc: DocId) -> Result<bool> {
    match live_docs {
        Some(bits) => bits.get(doc as usize),
        None => Ok(true),
    }
}

#[inline]
fn read_freq(freq_in: &mut dyn IndexInput, code: i32) -> Result<i32> {
    if (code & 1) != 0 {
        // low bit is set, freq is one
        Ok(1)
    } else {
        freq_in.read_vint()
    }
}

/// Returns the skipper, creating it over a duplicate of `freq_in` the first
/// time a term needs one.
fn load_skipper<'a>(
    skipper: &'a mut Option<Lucene40SkipListReader>,
    freq_in: &dyn IndexInput,
    skip: &SkipParams,
) -> Result<&'a mut Lucene40SkipListReader> {
    let reader = match skipper.take() {
        Some(reader) => reader,
        None => Lucene40SkipListReader::new(
            freq_in.duplicate()?,
            skip.max_skip_levels,
            skip.skip_interval,
        ),
    };
    Ok(skipper.get_or_insert(reader))
}

/// Returns the index of the last doc smaller than `target` in
/// `docs[low..=hi]`, or of the doc before an exact match.
fn binary_search(mut hi: i32, mut low: i32, target: DocId, docs: &[DocId]) -> i32 {
    while low <= hi {
        let mid = (((hi + low) as u32) >> 1) as i32;
        let doc = docs[mid as usize];
        if doc < target {
            low = mid + 1;
        } else if doc > target {
            hi = mid - 1;
        } else {
            low = mid;
            break;
        }
    }
    low - 1
}

/// Docs and freqs of one term. Decodes up to `BUFFER_SIZE` docs at a time.
///
/// With `live_docs` set, deleted docs are decoded but never returned.
pub struct SegmentDocsIterator {
    freq_in: Box<dyn IndexInput>,
    live_docs: Option<BitsRef>,
    skip: SkipParams,
    index_omits_tf: bool,
    store_payloads: bool,
    store_offsets: bool,

    docs: [DocId; BUFFER_SIZE],
    freqs: [i32; BUFFER_SIZE],

    // number of docs in this posting
    limit: i32,
    // how many docs we've read
    ord: i32,
    // doc we last read
    doc: DocId,
    // accumulator for doc deltas
    accum: DocId,
    freq: i32,
    max_buffered_doc_id: DocId,
    start: i32,
    count: i32,

    freq_offset: i64,
    skip_offset: i64,
    skipped: bool,
    skipper: Option<Lucene40SkipListReader>,
}

impl SegmentDocsIterator {
    fn new(
        mut freq_in: Box<dyn IndexInput>,
        field_info: &FieldInfo,
        state: &StandardTermState,
        live_docs: Option<BitsRef>,
        skip: SkipParams,
    ) -> Result<SegmentDocsIterator> {
        freq_in.seek(state.freq_offset)?;
        Ok(SegmentDocsIterator {
            freq_in,
            live_docs,
            skip,
            index_omits_tf: field_info.index_options == IndexOptions::Docs,
            store_payloads: field_info.has_store_payloads,
            store_offsets: field_info.index_options.has_offsets(),
            docs: [0; BUFFER_SIZE],
            freqs: [1; BUFFER_SIZE],
            limit: state.doc_freq,
            ord: 0,
            doc: -1,
            accum: 0,
            freq: 1,
            max_buffered_doc_id: -1,
            start: -1,
            count: 0,
            freq_offset: state.freq_offset,
            skip_offset: state.skip_offset,
            skipped: false,
            skipper: None,
        })
    }

    fn linear_scan(&mut self, target: DocId) -> Result<DocId> {
        for i in self.start..self.count {
            let d = self.docs[i as usize];
            if target <= d && is_live(&self.live_docs, d)? {
                self.start = i;
                self.freq = self.freqs[i as usize];
                self.doc = d;
                return Ok(d);
            }
        }
        self.doc = self.refill()?;
        Ok(self.doc)
    }

    /// Decodes forward from the unbuffered position to the first live doc
    /// `>= target`.
    fn scan_to(&mut self, target: DocId) -> Result<DocId> {
        let mut doc_acc = self.accum;
        let mut frq = 1;
        for i in self.ord..self.limit {
            let code = self.freq_in.read_vint()?;
            if self.index_omits_tf {
                doc_acc += code;
            } else {
                doc_acc += ((code as u32) >> 1) as i32;
                frq = read_freq(self.freq_in.as_mut(), code)?;
            }
            if doc_acc >= target && is_live(&self.live_docs, doc_acc)? {
                self.freq = frq;
                self.ord = i + 1;
                self.accum = doc_acc;
                return Ok(doc_acc);
            }
        }
        self.ord = self.limit;
        Ok(NO_MORE_DOCS)
    }

    fn next_unread_doc(&mut self) -> Result<DocId> {
        // doc ids are never negative, so this stops at the first live doc
        self.scan_to(0)
    }

    fn refill(&mut self) -> Result<DocId> {
        let doc = self.next_unread_doc()?;
        self.count = 0;
        self.start = -1;
        if doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let num_docs = min(BUFFER_SIZE as i32, self.limit - self.ord);
        self.ord += num_docs;
        self.count = if self.index_omits_tf {
            self.fill_docs(num_docs as usize)?
        } else {
            self.fill_docs_and_freqs(num_docs as usize)?
        };
        self.max_buffered_doc_id = if self.count > 0 {
            self.docs[self.count as usize - 1]
        } else {
            NO_MORE_DOCS
        };
        Ok(doc)
    }

    fn fill_docs(&mut self, size: usize) -> Result<i32> {
        let mut doc_acc = self.accum;
        for i in 0..size {
            doc_acc += self.freq_in.read_vint()?;
            self.docs[i] = doc_acc;
        }
        self.accum = doc_acc;
        Ok(size as i32)
    }

    fn fill_docs_and_freqs(&mut self, size: usize) -> Result<i32> {
        let mut doc_acc = self.accum;
        for i in 0..size {
            let code = self.freq_in.read_vint()?;
            doc_acc += ((code as u32) >> 1) as i32;
            self.freqs[i] = read_freq(self.freq_in.as_mut(), code)?;
            self.docs[i] = doc_acc;
        }
        self.accum = doc_acc;
        Ok(size as i32)
    }

    fn skip_to(&mut self, target: DocId) -> Result<DocId> {
        if target - self.skip.skip_interval >= self.accum && self.limit >= self.skip.skip_minimum
        {
            let skipper = load_skipper(&mut self.skipper, self.freq_in.as_ref(), &self.skip)?;
            if !self.skipped {
                // this is the first time this posting has skipped since
                // reset() was called, so now we load the skip data
                skipper.init(
                    self.freq_offset + self.skip_offset,
                    self.freq_offset,
                    0,
                    self.limit,
                    self.store_payloads,
                    self.store_offsets,
                );
                self.skipped = true;
            }

            let new_ord = skipper.skip_to(target)?;
            if new_ord > self.ord {
                // skipper moved
                self.ord = new_ord;
                self.accum = skipper.doc();
                self.freq_in.seek(skipper.freq_pointer())?;
            }
        }
        self.scan_to(target)
    }
}

impl DocIterator for SegmentDocsIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        for i in self.start + 1..self.count {
            let d = self.docs[i as usize];
            if is_live(&self.live_docs, d)? {
                self.start = i;
                self.freq = self.freqs[i as usize];
                self.doc = d;
                return Ok(d);
            }
        }
        self.start = self.count;
        self.doc = self.refill()?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        // last doc in our buffer is >= target, binary search + next()
        self.start += 1;
        if self.start < self.count && self.max_buffered_doc_id >= target {
            return if self.count - self.start > BINARY_SEARCH_THRESHOLD {
                self.start = binary_search(self.count - 1, self.start, target, &self.docs);
                self.next()
            } else {
                self.linear_scan(target)
            };
        }

        // buffer is consumed
        self.start = self.count;
        self.doc = self.skip_to(target)?;
        Ok(self.doc)
    }

    fn cost(&self) -> usize {
        self.limit as usize
    }
}

impl PostingIterator for SegmentDocsIterator {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        Ok(-1)
    }

    fn start_offset(&self) -> Result<i32> {
        Ok(-1)
    }

    fn end_offset(&self) -> Result<i32> {
        Ok(-1)
    }

    fn payload(&self) -> Result<Payload> {
        Ok(Payload::new())
    }
}

/// Docs, freqs and positions of one term for fields without payloads or
/// offsets.
///
/// Positions are read lazily: `.prx` is only positioned on the first
/// `next_position`, and positions of docs that were passed over are
/// skipped then.
pub struct SegmentDocsAndPositionsIterator {
    freq_in: Box<dyn IndexInput>,
    prox_in: Box<dyn IndexInput>,
    live_docs: Option<BitsRef>,
    skip: SkipParams,

    limit: i32,
    ord: i32,
    doc: DocId,
    accum: DocId,
    freq: i32,
    position: i32,

    freq_offset: i64,
    prox_offset: i64,
    skip_offset: i64,

    pos_pending_count: i32,
    // -1 once .prx is positioned
    lazy_prox_pointer: i64,
    skipped: bool,
    skipper: Option<Lucene40SkipListReader>,
}

impl SegmentDocsAndPositionsIterator {
    fn new(
        mut freq_in: Box<dyn IndexInput>,
        prox_in: Box<dyn IndexInput>,
        state: &StandardTermState,
        live_docs: Option<BitsRef>,
        skip: SkipParams,
    ) -> Result<SegmentDocsAndPositionsIterator> {
        freq_in.seek(state.freq_offset)?;
        Ok(SegmentDocsAndPositionsIterator {
            freq_in,
            prox_in,
            live_docs,
            skip,
            limit: state.doc_freq,
            ord: 0,
            doc: -1,
            accum: 0,
            freq: 0,
            position: 0,
            freq_offset: state.freq_offset,
            prox_offset: state.prox_offset,
            skip_offset: state.skip_offset,
            pos_pending_count: 0,
            lazy_prox_pointer: state.prox_offset,
            skipped: false,
            skipper: None,
        })
    }
}

impl DocIterator for SegmentDocsAndPositionsIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        loop {
            if self.ord == self.limit {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }

            self.ord += 1;

            // decode next doc/freq pair
            let code = self.freq_in.read_vint()?;
            self.accum += ((code as u32) >> 1) as i32;
            self.freq = read_freq(self.freq_in.as_mut(), code)?;
            self.pos_pending_count += self.freq;

            if is_live(&self.live_docs, self.accum)? {
                break;
            }
        }

        self.position = 0;
        self.doc = self.accum;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target - self.skip.skip_interval >= self.doc && self.limit >= self.skip.skip_minimum {
            // there are enough docs in the posting to have skip data, and it
            // isn't too close
            let skipper = load_skipper(&mut self.skipper, self.freq_in.as_ref(), &self.skip)?;
            if !self.skipped {
                // this is the first time this posting has skipped, since
                // reset() was called, so now we load the skip data
                skipper.init(
                    self.freq_offset + self.skip_offset,
                    self.freq_offset,
                    self.prox_offset,
                    self.limit,
                    false,
                    false,
                );
                self.skipped = true;
            }

            let new_ord = skipper.skip_to(target)?;
            if new_ord > self.ord {
                // skipper moved
                self.ord = new_ord;
                self.accum = skipper.doc();
                self.doc = self.accum;
                self.freq_in.seek(skipper.freq_pointer())?;
                self.lazy_prox_pointer = skipper.prox_pointer();
                self.pos_pending_count = 0;
                self.position = 0;
            }
        }

        // now, linear scan for the rest
        loop {
            self.next()?;
            if target <= self.doc {
                break;
            }
        }
        Ok(self.doc)
    }

    fn cost(&self) -> usize {
        self.limit as usize
    }
}

impl PostingIterator for SegmentDocsAndPositionsIterator {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if self.lazy_prox_pointer != -1 {
            self.prox_in.seek(self.lazy_prox_pointer)?;
            self.lazy_prox_pointer = -1;
        }

        // scan over any docs that were iterated without their positions
        if self.pos_pending_count > self.freq {
            self.position = 0;
            while self.pos_pending_count != self.freq {
                if (self.prox_in.read_byte()? & 0x80) == 0 {
                    self.pos_pending_count -= 1;
                }
            }
        }

        self.position += self.prox_in.read_vint()?;
        self.pos_pending_count -= 1;
        debug_assert!(
            self.pos_pending_count >= 0,
            "next_position() was called too many times (more than freq() times) \
             pos_pending_count={}",
            self.pos_pending_count
        );
        Ok(self.position)
    }

    fn start_offset(&self) -> Result<i32> {
        Ok(-1)
    }

    fn end_offset(&self) -> Result<i32> {
        Ok(-1)
    }

    fn payload(&self) -> Result<Payload> {
        Ok(Payload::new())
    }
}

/// Docs, freqs and positions of one term for fields with payloads and/or
/// offsets. The payload of a position is read together with the position.
pub struct SegmentFullPositionsIterator {
    freq_in: Box<dyn IndexInput>,
    prox_in: Box<dyn IndexInput>,
    live_docs: Option<BitsRef>,
    skip: SkipParams,
    store_payloads: bool,
    store_offsets: bool,

    limit: i32,
    ord: i32,
    doc: DocId,
    accum: DocId,
    freq: i32,
    position: i32,

    freq_offset: i64,
    prox_offset: i64,
    skip_offset: i64,

    pos_pending_count: i32,
    payload_length: i32,
    offset_length: i32,
    start_offset: i32,
    payload: Vec<u8>,
    lazy_prox_pointer: i64,
    skipped: bool,
    skipper: Option<Lucene40SkipListReader>,
}

impl SegmentFullPositionsIterator {
    fn new(
        mut freq_in: Box<dyn IndexInput>,
        prox_in: Box<dyn IndexInput>,
        field_info: &FieldInfo,
        state: &StandardTermState,
        live_docs: Option<BitsRef>,
        skip: SkipParams,
    ) -> Result<SegmentFullPositionsIterator> {
        let store_offsets = field_info.index_options.has_offsets();
        let store_payloads = field_info.has_store_payloads;
        debug_assert!(field_info.index_options.has_positions());
        debug_assert!(store_payloads || store_offsets);

        freq_in.seek(state.freq_offset)?;
        Ok(SegmentFullPositionsIterator {
            freq_in,
            prox_in,
            live_docs,
            skip,
            store_payloads,
            store_offsets,
            limit: state.doc_freq,
            ord: 0,
            doc: -1,
            accum: 0,
            freq: 0,
            position: 0,
            freq_offset: state.freq_offset,
            prox_offset: state.prox_offset,
            skip_offset: state.skip_offset,
            pos_pending_count: 0,
            payload_length: 0,
            offset_length: 0,
            start_offset: 0,
            payload: Vec::new(),
            lazy_prox_pointer: state.prox_offset,
            skipped: false,
            skipper: None,
        })
    }

    fn skip_payload(&mut self) -> Result<()> {
        if self.payload_length > 0 {
            let fp = self.prox_in.file_pointer();
            self.prox_in.seek(fp + i64::from(self.payload_length))?;
        }
        Ok(())
    }
}

impl DocIterator for SegmentFullPositionsIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        loop {
            if self.ord == self.limit {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }

            self.ord += 1;

            // decode next doc/freq pair
            let code = self.freq_in.read_vint()?;
            self.accum += ((code as u32) >> 1) as i32;
            self.freq = read_freq(self.freq_in.as_mut(), code)?;
            self.pos_pending_count += self.freq;

            if is_live(&self.live_docs, self.accum)? {
                break;
            }
        }

        self.position = 0;
        self.start_offset = 0;
        self.doc = self.accum;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target - self.skip.skip_interval >= self.doc && self.limit >= self.skip.skip_minimum {
            let skipper = load_skipper(&mut self.skipper, self.freq_in.as_ref(), &self.skip)?;
            if !self.skipped {
                skipper.init(
                    self.freq_offset + self.skip_offset,
                    self.freq_offset,
                    self.prox_offset,
                    self.limit,
                    self.store_payloads,
                    self.store_offsets,
                );
                self.skipped = true;
            }

            let new_ord = skipper.skip_to(target)?;
            if new_ord > self.ord {
                // skipper moved
                self.ord = new_ord;
                self.accum = skipper.doc();
                self.doc = self.accum;
                self.freq_in.seek(skipper.freq_pointer())?;
                self.lazy_prox_pointer = skipper.prox_pointer();
                self.pos_pending_count = 0;
                self.position = 0;
                self.start_offset = 0;
                self.payload_length = skipper.payload_length();
                self.offset_length = skipper.offset_length();
            }
        }

        // now, linear scan for the rest
        loop {
            self.next()?;
            if target <= self.doc {
                break;
            }
        }
        Ok(self.doc)
    }

    fn cost(&self) -> usize {
        self.limit as usize
    }
}

impl PostingIterator for SegmentFullPositionsIterator {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if self.lazy_prox_pointer != -1 {
            self.prox_in.seek(self.lazy_prox_pointer)?;
            self.lazy_prox_pointer = -1;
        }

        // scan over any docs that were iterated without their positions
        while self.pos_pending_count > self.freq {
            let code = self.prox_in.read_vint()?;
            if self.store_payloads && (code & 1) != 0 {
                // new payload length
                self.payload_length = self.prox_in.read_vint()?;
                debug_assert!(self.payload_length >= 0);
            }
            if self.store_offsets && (self.prox_in.read_vint()? & 1) != 0 {
                // new offset length
                self.offset_length = self.prox_in.read_vint()?;
            }
            if self.store_payloads {
                self.skip_payload()?;
            }

            self.pos_pending_count -= 1;
            self.position = 0;
            self.start_offset = 0;
        }

        let mut code = self.prox_in.read_vint()?;
        if self.store_payloads {
            if (code & 1) != 0 {
                // new payload length
                self.payload_length = self.prox_in.read_vint()?;
                if self.payload_length < 0 {
                    bail!(CorruptIndex(format!(
                        "negative payload length {} (resource={})",
                        self.payload_length,
                        self.prox_in.name()
                    )));
                }
            }
            code = ((code as u32) >> 1) as i32;
        }
        self.position += code;

        if self.store_offsets {
            let offset_code = self.prox_in.read_vint()?;
            if (offset_code & 1) != 0 {
                // new offset length
                self.offset_length = self.prox_in.read_vint()?;
            }
            self.start_offset += ((offset_code as u32) >> 1) as i32;
        }

        if self.store_payloads {
            let length = self.payload_length.max(0) as usize;
            self.payload.resize(length, 0);
            if length > 0 {
                self.prox_in.read_bytes(&mut self.payload, 0, length)?;
            }
        }

        self.pos_pending_count -= 1;
        debug_assert!(
            self.pos_pending_count >= 0,
            "next_position() was called too many times (more than freq() times) \
             pos_pending_count={}",
            self.pos_pending_count
        );
        Ok(self.position)
    }

    fn start_offset(&self) -> Result<i32> {
        Ok(if self.store_offsets {
            self.start_offset
        } else {
            -1
        })
    }

    fn end_offset(&self) -> Result<i32> {
        Ok(if self.store_offsets {
            self.start_offset + self.offset_length
        } else {
            -1
        })
    }

    fn payload(&self) -> Result<Payload> {
        if self.store_payloads && self.payload_length > 0 {
            Ok(self.payload.clone())
        } else {
            Ok(Payload::new())
        }
    }
}
