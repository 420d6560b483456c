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


use std::collections::HashSet;
use std::io::Write;

use core::codec::codec_util::{check_eof, check_footer, check_header, write_footer, write_header};
use core::index::{file_name_from_generation, SegmentCommitInfo};
use core::store::directory::Directory;
use core::store::io::{ChecksumIndexInput, DataOutput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_file_ignoring_error;
use core::util::{BitVector, Bits};
use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

pub trait LiveDocsFormat {
    /// Creates a new bit vector, with all bits set, for the specified size.
    fn new_live_docs(&self, size: usize) -> BitVector;

    /// Creates a new mutable bit vector with the same bits set as `existing`.
    fn new_live_docs_from_existing(&self, existing: &BitVector) -> BitVector {
        existing.clone()
    }

    /// Read live docs bits.
    fn read_live_docs<D: Directory>(
        &self,
        dir: &D,
        info: &SegmentCommitInfo,
        context: &IOContext,
    ) -> Result<BitVector>;

    /// Persist live docs bits. `SegmentCommitInfo::next_write_del_gen`
    /// determines the generation of the deletes file written to.
    fn write_live_docs<D: Directory>(
        &self,
        bits: &BitVector,
        dir: &D,
        info: &SegmentCommitInfo,
        new_del_count: i32,
        context: &IOContext,
    ) -> Result<()>;

    /// Records all files in use by this `SegmentCommitInfo` into `files`.
    fn files(&self, info: &SegmentCommitInfo, files: &mut HashSet<String>);
}

/// Extension of deletes
pub const DELETES_EXTENSION: &str = "del";

const CODEC: &str = "BitVector";

/// Pre-header format: the first int is the size.
pub const VERSION_PRE: i32 = -1;
/// First version with a codec header.
pub const VERSION_START: i32 = 0;
/// Sparse vectors record the gaps between cleared bytes rather than set ones.
pub const VERSION_DGAPS_CLEARED: i32 = 1;
/// Appends a checksum footer.
pub const VERSION_CHECKSUM: i32 = 2;
pub const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

// marks a file written with a codec header
const HEADER_MARKER: i32 = -2;
// marks a d-gaps encoded vector
const DGAPS_MARKER: i32 = -1;

/// Returns true when the cleared bytes are rare enough that writing them as
/// `(gap, byte)` pairs beats writing the dense byte array.
pub fn is_sparse(bits: &BitVector) -> bool {
    let cleared_count = bits.len() - bits.count();
    if cleared_count == 0 {
        return true;
    }

    let avg_gap_length = bits.bytes().len() / cleared_count;

    // expected number of bytes for vInt encoding of each gap
    let expected_dgap_bytes: usize = if avg_gap_length <= (1 << 7) {
        1
    } else if avg_gap_length <= (1 << 14) {
        2
    } else if avg_gap_length <= (1 << 21) {
        3
    } else if avg_gap_length <= (1 << 28) {
        4
    } else {
        5
    };

    // +1 because we write the byte itself that contains the set bit
    let bytes_per_set_bit = expected_dgap_bytes + 1;

    // note: adding 32 because we start with ((int) -1) to indicate d-gaps format.
    let expected_bits = 32 + 8 * bytes_per_set_bit as u64 * cleared_count as u64;

    // note: factor is for read/write of byte-arrays being faster than vints.
    const FACTOR: u64 = 10;
    FACTOR * expected_bits < bits.len() as u64
}

/// Writes `bits` in the current format, choosing between the dense and the
/// d-gaps encoding.
pub fn write_bit_vector<O: IndexOutput + ?Sized>(bits: &BitVector, output: &mut O) -> Result<()> {
    output.write_int(HEADER_MARKER)?;
    write_header(output, CODEC, VERSION_CURRENT)?;
    if is_sparse(bits) {
        debug!(
            "writing {} as d-gaps: {} of {} bits set",
            output.name(),
            bits.count(),
            bits.len()
        );
        write_cleared_dgaps(bits, output)?;
    } else {
        debug!(
            "writing {} as dense bytes: {} of {} bits set",
            output.name(),
            bits.count(),
            bits.len()
        );
        write_bits(bits, output)?;
    }
    write_footer(output)
}

fn write_bits<O: IndexOutput + ?Sized>(bits: &BitVector, output: &mut O) -> Result<()> {
    output.write_int(bits.len() as i32)?;
    output.write_int(bits.count() as i32)?;
    let bytes = bits.bytes();
    output.write_bytes(bytes, 0, bytes.len())
}

fn write_cleared_dgaps<O: IndexOutput + ?Sized>(bits: &BitVector, output: &mut O) -> Result<()> {
    output.write_int(DGAPS_MARKER)?;
    output.write_int(bits.len() as i32)?;
    output.write_int(bits.count() as i32)?;
    let mut last = 0usize;
    let mut num_cleared = bits.len() as i64 - bits.count() as i64;
    for (i, &b) in bits.bytes().iter().enumerate() {
        if num_cleared <= 0 {
            break;
        }
        if b != 0xff {
            output.write_vint((i - last) as i32)?;
            output.write_byte(b)?;
            last = i;
            num_cleared -= 8 - i64::from(b.count_ones());
        }
    }
    Ok(())
}

/// Reads a bit vector written by any known version of this format. Vectors
/// from versions before `VERSION_DGAPS_CLEARED` stored deleted docs and are
/// inverted so the result always has live docs set.
pub fn read_bit_vector<I: ChecksumIndexInput + ?Sized>(input: &mut I) -> Result<BitVector> {
    let first_int = input.read_int()?;
    let (version, size) = if first_int == HEADER_MARKER {
        let version = check_header(input, CODEC, VERSION_START, VERSION_CURRENT)?;
        (version, input.read_int()?)
    } else {
        (VERSION_PRE, first_int)
    };

    let (mut bits, stored_count) = if size == DGAPS_MARKER {
        if version >= VERSION_DGAPS_CLEARED {
            read_cleared_dgaps(input)?
        } else {
            read_set_dgaps(input)?
        }
    } else {
        read_bits(input, size)?
    };

    let mut expected_count = stored_count;
    if version < VERSION_DGAPS_CLEARED {
        bits.invert_all();
        expected_count = bits.len() as i64 - stored_count;
    }

    if version >= VERSION_CHECKSUM {
        check_footer(input)?;
    } else {
        check_eof(input)?;
    }

    let actual = bits.recount() as i64;
    if actual != expected_count {
        bail!(CorruptIndex(format!(
            "bit vector count mismatch: stored={} actual={} (resource={})",
            expected_count,
            actual,
            input.name()
        )));
    }
    debug!(
        "read bit vector {} version={} size={} count={}",
        input.name(),
        version,
        bits.len(),
        actual
    );
    Ok(bits)
}

fn read_size<I: ChecksumIndexInput + ?Sized>(input: &I, size: i32) -> Result<usize> {
    if size < 0 {
        bail!(CorruptIndex(format!(
            "invalid bit vector size: {} (resource={})",
            size,
            input.name()
        )));
    }
    Ok(size as usize)
}

fn read_count<I: ChecksumIndexInput + ?Sized>(input: &mut I, size: usize) -> Result<i64> {
    let count = input.read_int()?;
    if count < 0 || count as usize > size {
        bail!(CorruptIndex(format!(
            "invalid bit vector count: {} for size {} (resource={})",
            count,
            size,
            input.name()
        )));
    }
    Ok(i64::from(count))
}

// dense: count, then the raw bytes
fn read_bits<I: ChecksumIndexInput + ?Sized>(input: &mut I, size: i32) -> Result<(BitVector, i64)> {
    let size = read_size(input, size)?;
    let count = read_count(input, size)?;
    let mut bytes = vec![0u8; BitVector::num_bytes(size)];
    let len = bytes.len();
    input.read_bytes(&mut bytes, 0, len)?;
    Ok((BitVector::from_bytes(bytes, size)?, count))
}

// legacy sparse format: gaps between bytes holding set (deleted) bits
fn read_set_dgaps<I: ChecksumIndexInput + ?Sized>(input: &mut I) -> Result<(BitVector, i64)> {
    let size = input.read_int()?;
    let size = read_size(input, size)?;
    let count = read_count(input, size)?;
    let mut bits = BitVector::new(size);
    let mut last = 0usize;
    let mut n = count;
    while n > 0 {
        last += read_gap(input)?;
        let b = input.read_byte()?;
        set_byte(&mut bits, last, b, input.name())?;
        n -= i64::from(b.count_ones());
    }
    Ok((bits, count))
}

// current sparse format: gaps between bytes holding cleared bits
fn read_cleared_dgaps<I: ChecksumIndexInput + ?Sized>(
    input: &mut I,
) -> Result<(BitVector, i64)> {
    let size = input.read_int()?;
    let size = read_size(input, size)?;
    let count = read_count(input, size)?;
    let mut bits = BitVector::new(size);
    bits.set_all();
    let mut last = 0usize;
    let mut num_cleared = size as i64 - count;
    while num_cleared > 0 {
        last += read_gap(input)?;
        let b = input.read_byte()?;
        set_byte(&mut bits, last, b, input.name())?;
        num_cleared -= 8 - i64::from(b.count_ones());
    }
    bits.clear_unused_bits();
    Ok((bits, count))
}

fn read_gap<I: ChecksumIndexInput + ?Sized>(input: &mut I) -> Result<usize> {
    let gap = input.read_vint()?;
    if gap < 0 {
        bail!(CorruptIndex(format!(
            "negative d-gap: {} (resource={})",
            gap,
            input.name()
        )));
    }
    Ok(gap as usize)
}

fn set_byte(bits: &mut BitVector, pos: usize, b: u8, resource: &str) -> Result<()> {
    let bytes = bits.bytes_mut();
    if pos >= bytes.len() {
        bail!(CorruptIndex(format!(
            "d-gap points past the end of the bit vector: {} >= {} (resource={})",
            pos,
            bytes.len(),
            resource
        )));
    }
    bytes[pos] = b;
    Ok(())
}

/// Live docs format storing a `BitVector` per deletion generation in a
/// `.del` file.
#[derive(Copy, Clone, Default)]
pub struct Lucene40LiveDocsFormat;

impl Lucene40LiveDocsFormat {
    fn write_file<D: Directory>(
        bits: &BitVector,
        dir: &D,
        filename: &str,
        context: &IOContext,
    ) -> Result<()> {
        let mut output = dir.create_output(filename, context)?;
        write_bit_vector(bits, &mut output)?;
        output.flush()?;
        Ok(())
    }
}

impl LiveDocsFormat for Lucene40LiveDocsFormat {
    fn new_live_docs(&self, size: usize) -> BitVector {
        let mut bits = BitVector::new(size);
        bits.set_all();
        bits
    }

    fn read_live_docs<D: Directory>(
        &self,
        dir: &D,
        info: &SegmentCommitInfo,
        context: &IOContext,
    ) -> Result<BitVector> {
        let filename =
            file_name_from_generation(&info.info.name, DELETES_EXTENSION, info.del_gen as u64);
        let mut input = dir.open_checksum_input(&filename, context)?;
        let live_docs = read_bit_vector(&mut input)?;

        let max_doc = info.info.max_doc() as usize;
        if live_docs.len() != max_doc {
            bail!(CorruptIndex(format!(
                "live docs length {} != max_doc {} (resource={})",
                live_docs.len(),
                max_doc,
                filename
            )));
        }
        let expected = max_doc as i64 - i64::from(info.del_count);
        if live_docs.count() as i64 != expected {
            bail!(CorruptIndex(format!(
                "live docs count {} != max_doc - del_count {} (resource={})",
                live_docs.count(),
                expected,
                filename
            )));
        }
        Ok(live_docs)
    }

    fn write_live_docs<D: Directory>(
        &self,
        bits: &BitVector,
        dir: &D,
        info: &SegmentCommitInfo,
        new_del_count: i32,
        context: &IOContext,
    ) -> Result<()> {
        let filename = file_name_from_generation(
            &info.info.name,
            DELETES_EXTENSION,
            info.next_write_del_gen as u64,
        );
        let max_doc = info.info.max_doc() as usize;
        let expected = max_doc as i64 - i64::from(info.del_count) - i64::from(new_del_count);
        if bits.len() != max_doc || bits.count() as i64 != expected {
            bail!(IllegalState(format!(
                "live docs do not match segment {}: len={} count={} expected len={} count={}",
                info.info.name,
                bits.len(),
                bits.count(),
                max_doc,
                expected
            )));
        }
        if dir.file_exists(&filename) {
            bail!(IllegalState(format!(
                "live docs generation file {} already exists",
                filename
            )));
        }

        if let Err(e) = Self::write_file(bits, dir, &filename, context) {
            delete_file_ignoring_error(dir, &filename);
            return Err(e);
        }
        Ok(())
    }

    fn files(&self, info: &SegmentCommitInfo, files: &mut HashSet<String>) {
        if info.has_deletions() {
            files.insert(file_name_from_generation(
                &info.info.name,
                DELETES_EXTENSION,
                info.del_gen as u64,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::index::{SegmentInfo, LUCENE40_VERSION};
    use core::store::directory::RAMDirectory;
    use core::store::io::{ByteBufferIndexInput, RAMOutputStream};
    use core::store::io::BufferedChecksumIndexInput;
    use core::codec::codec_util::header_length;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use std::collections::HashMap;

    fn encode(bits: &BitVector) -> Vec<u8> {
        let mut out = RAMOutputStream::new("bits.del", true);
        write_bit_vector(bits, &mut out).unwrap();
        out.into_bytes()
    }

    fn decode(bytes: Vec<u8>) -> Result<BitVector> {
        let input = ByteBufferIndexInput::from_vec("bits.del", bytes);
        let mut input = BufferedChecksumIndexInput::new(Box::new(input));
        read_bit_vector(&mut input)
    }

    fn all_set(size: usize) -> BitVector {
        let mut bits = BitVector::new(size);
        bits.set_all();
        bits
    }

    #[test]
    fn test_round_trip_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for &size in &[0usize, 1, 7, 8, 9, 63, 64, 65, 1000, 10_000] {
            for &density in &[0.0f64, 0.001, 0.5, 0.999, 1.0] {
                let mut bits = BitVector::new(size);
                for i in 0..size {
                    if rng.gen_range(0.0..1.0) >= density {
                        bits.set(i).unwrap();
                    }
                }
                let decoded = decode(encode(&bits)).unwrap();
                assert_eq!(decoded, bits, "size={} density={}", size, density);
                assert_eq!(decoded.count(), bits.count());
            }
        }
    }

    #[test]
    fn test_sparse_dense_boundary() {
        let mut few_cleared = all_set(10_000);
        few_cleared.clear(17).unwrap();
        few_cleared.clear(9_001).unwrap();
        assert!(is_sparse(&few_cleared));

        let mut half_cleared = all_set(10_000);
        for i in (0..10_000).step_by(2) {
            half_cleared.clear(i).unwrap();
        }
        assert!(!is_sparse(&half_cleared));

        let sparse_len = encode(&few_cleared).len();
        let dense_len = encode(&half_cleared).len();
        assert!(sparse_len < dense_len);
        // header marker + header + size + count + bytes + footer
        let header = 4 + header_length(CODEC);
        assert_eq!(dense_len, header + 4 + 4 + 1250 + 16);

        // no cleared bits at all is written as d-gaps with no pairs
        assert!(is_sparse(&all_set(10_000)));
        assert_eq!(encode(&all_set(10_000)).len(), header + 12 + 16);
    }

    #[test]
    fn test_legacy_set_dgaps_are_inverted() {
        // pre-header layout: size -1 marks d-gaps, then size, count of
        // deleted docs, then gaps between bytes holding deleted docs.
        let mut bytes = Vec::new();
        bytes.write_int(-1).unwrap();
        bytes.write_int(20).unwrap();
        bytes.write_int(2).unwrap();
        bytes.write_vint(0).unwrap();
        bytes.write_byte(0b0000_0010).unwrap();
        bytes.write_vint(2).unwrap();
        bytes.write_byte(0b0000_1000).unwrap();

        let bits = decode(bytes).unwrap();
        assert_eq!(bits.len(), 20);
        assert_eq!(bits.count(), 18);
        assert!(!bits.get(1).unwrap());
        assert!(!bits.get(19).unwrap());
        assert!(bits.get(0).unwrap());
    }

    #[test]
    fn test_legacy_dense_without_footer() {
        let mut bytes = Vec::new();
        bytes.write_int(HEADER_MARKER).unwrap();
        write_header(&mut bytes, CODEC, VERSION_DGAPS_CLEARED).unwrap();
        bytes.write_int(10).unwrap();
        bytes.write_int(9).unwrap();
        bytes.write_byte(0xfe).unwrap();
        bytes.write_byte(0x03).unwrap();
        let bits = decode(bytes.clone()).unwrap();
        assert_eq!(bits.count(), 9);
        assert!(!bits.get(0).unwrap());

        bytes.push(0);
        assert!(decode(bytes).is_err());
    }

    #[test]
    fn test_count_mismatch_is_corrupt() {
        let mut bits = all_set(64);
        bits.clear(3).unwrap();
        let mut bytes = encode(&bits);
        // count lives right after marker, header and size
        let pos = 4 + header_length(CODEC) + 4;
        bytes[pos + 3] ^= 1;
        let err = decode(bytes).unwrap_err();
        assert!(::error::is_corrupt_index(&err));
    }

    #[test]
    fn test_generations() {
        let dir = RAMDirectory::new();
        let si = SegmentInfo::new(LUCENE40_VERSION, "_0", 3, false, HashMap::new(), HashMap::new())
            .unwrap();
        let mut info = SegmentCommitInfo::new(si, 0, -1);
        let format = Lucene40LiveDocsFormat;
        let ctx = IOContext::Default;

        let mut live = format.new_live_docs(3);
        live.clear(1).unwrap();
        format
            .write_live_docs(&live, &dir, &info, 1, &ctx)
            .unwrap();
        info.advance_del_gen();
        info.set_del_count(1).unwrap();
        assert!(dir.file_exists("_0_1.del"));

        let read = format.read_live_docs(&dir, &info, &ctx).unwrap();
        assert_eq!(read.count(), 2);

        let mut next = format.new_live_docs_from_existing(&read);
        next.clear(0).unwrap();
        format.write_live_docs(&next, &dir, &info, 1, &ctx).unwrap();
        info.advance_del_gen();
        info.set_del_count(2).unwrap();
        assert!(dir.file_exists("_0_1.del"));
        assert!(dir.file_exists("_0_2.del"));

        let mut files = HashSet::new();
        format.files(&info, &mut files);
        assert_eq!(files.len(), 1);
        assert!(files.contains("_0_2.del"));

        // the wrong delete count is rejected before anything is written
        assert!(format.write_live_docs(&next, &dir, &info, 1, &ctx).is_err());
        assert!(!dir.file_exists("_0_3.del"));
    }
}
