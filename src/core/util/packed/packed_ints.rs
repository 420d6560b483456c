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


//! Simplistic compression for arrays of non-negative integers.
//!
//! Values are bit-packed big endian, most significant bit first, which is the
//! layout the Lucene 4.x doc values formats store on disk.

use core::codec::codec_util;
use core::store::io::{DataInput, DataOutput, IndexInput};

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;

pub const CODEC_NAME: &str = "PackedInts";
/// Blocks of packed values are padded to a multiple of 8 bytes.
pub const VERSION_START: i32 = 0;
/// Packed values only take the bytes they need.
pub const VERSION_BYTE_ALIGNED: i32 = 1;
pub const VERSION_CURRENT: i32 = VERSION_BYTE_ALIGNED;

/// A format to write packed ints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// Compact format, all bits are written contiguously.
    Packed,
    /// Values never span two 64-bit blocks, the upper bits of each block may
    /// be padding.
    PackedSingleBlock,
}

impl Format {
    pub fn id(self) -> i32 {
        match self {
            Format::Packed => 0,
            Format::PackedSingleBlock => 1,
        }
    }

    pub fn with_id(id: i32) -> Result<Format> {
        match id {
            0 => Ok(Format::Packed),
            1 => Ok(Format::PackedSingleBlock),
            _ => bail!(CorruptIndex(format!("Unknown packed ints format id: {}", id))),
        }
    }

    /// Computes how many bytes are needed to store `value_count` values of
    /// size `bits_per_value`.
    pub fn byte_count(self, version: i32, value_count: usize, bits_per_value: i32) -> usize {
        match self {
            Format::Packed if version >= VERSION_BYTE_ALIGNED => {
                (value_count * bits_per_value as usize + 7) / 8
            }
            _ => 8 * self.long_count(value_count, bits_per_value),
        }
    }

    /// Computes how many 64-bit blocks are needed to store `value_count` values
    /// of size `bits_per_value`.
    pub fn long_count(self, value_count: usize, bits_per_value: i32) -> usize {
        match self {
            Format::Packed => (value_count * bits_per_value as usize + 63) / 64,
            Format::PackedSingleBlock => {
                let values_per_block = 64 / bits_per_value as usize;
                (value_count + values_per_block - 1) / values_per_block
            }
        }
    }
}

/// Returns how many bits are required to hold values up to and including
/// `max_value`, interpreted as an unsigned value.
pub fn unsigned_bits_required(max_value: i64) -> i32 {
    1i32.max(64 - max_value.leading_zeros() as i32)
}

/// Returns how many bits are required to hold values up to and including
/// `max_value`, which must be non-negative.
pub fn bits_required(max_value: i64) -> i32 {
    debug_assert!(max_value >= 0);
    unsigned_bits_required(max_value)
}

/// Calculates the maximum unsigned long that can be expressed with the given
/// number of bits.
pub fn max_value(bits_per_value: i32) -> i64 {
    debug_assert!(bits_per_value > 0 && bits_per_value <= 64);
    if bits_per_value == 64 {
        i64::max_value()
    } else {
        (!0u64 >> (64 - bits_per_value)) as i64
    }
}

/// Writes a header followed by `value_count` packed values.
///
/// Values are streamed out one byte at a time, so the writer never buffers
/// more than a single partial byte.
pub struct PackedIntsWriter<'a, O: DataOutput + ?Sized + 'a> {
    out: &'a mut O,
    bits_per_value: i32,
    value_count: usize,
    written: usize,
    current: u8,
    current_bits: u32,
    finished: bool,
}

impl<'a, O: DataOutput + ?Sized + 'a> PackedIntsWriter<'a, O> {
    pub fn new(out: &'a mut O, value_count: usize, bits_per_value: i32) -> Result<Self> {
        if bits_per_value < 1 || bits_per_value > 64 {
            bail!(IllegalArgument(format!(
                "bits_per_value must be in 1..64, got {}",
                bits_per_value
            )));
        }
        codec_util::write_header(out, CODEC_NAME, VERSION_CURRENT)?;
        out.write_vint(bits_per_value)?;
        out.write_vint(value_count as i32)?;
        out.write_vint(Format::Packed.id())?;
        Ok(PackedIntsWriter {
            out,
            bits_per_value,
            value_count,
            written: 0,
            current: 0,
            current_bits: 0,
            finished: false,
        })
    }

    pub fn add(&mut self, value: i64) -> Result<()> {
        debug_assert!(
            self.bits_per_value == 64 || (value >= 0 && value <= max_value(self.bits_per_value))
        );
        if self.written == self.value_count {
            bail!(IllegalState(format!(
                "writing more than the {} expected values",
                self.value_count
            )));
        }
        let value = value as u64;
        let mut remaining = self.bits_per_value as u32;
        while remaining > 0 {
            let free = 8 - self.current_bits;
            let take = free.min(remaining);
            let chunk = ((value >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
            self.current |= chunk << (free - take);
            self.current_bits += take;
            remaining -= take;
            if self.current_bits == 8 {
                self.out.write_byte(self.current)?;
                self.current = 0;
                self.current_bits = 0;
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Pads missing values with zeros and flushes the trailing partial byte.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        while self.written < self.value_count {
            self.add(0)?;
        }
        if self.current_bits > 0 {
            self.out.write_byte(self.current)?;
            self.current = 0;
            self.current_bits = 0;
        }
        self.finished = true;
        Ok(())
    }
}

/// Fully loaded packed values.
#[derive(Clone, Debug)]
pub struct PackedIntsReader {
    blocks: Vec<u64>,
    format: Format,
    bits_per_value: i32,
    value_count: usize,
    mask: u64,
}

impl PackedIntsReader {
    /// Reads a header written by `PackedIntsWriter` and the values following it.
    pub fn read<I: IndexInput + ?Sized>(input: &mut I) -> Result<PackedIntsReader> {
        let version = codec_util::check_header(input, CODEC_NAME, VERSION_START, VERSION_CURRENT)?;
        let bits_per_value = input.read_vint()?;
        if bits_per_value < 1 || bits_per_value > 64 {
            bail!(CorruptIndex(format!(
                "invalid packed ints bits_per_value: {}",
                bits_per_value
            )));
        }
        let value_count = input.read_vint()?;
        if value_count < 0 {
            bail!(CorruptIndex(format!(
                "invalid packed ints value count: {}",
                value_count
            )));
        }
        let format = Format::with_id(input.read_vint()?)?;
        Self::read_no_header(input, format, version, value_count as usize, bits_per_value)
    }

    pub fn read_no_header<I: DataInput + ?Sized>(
        input: &mut I,
        format: Format,
        version: i32,
        value_count: usize,
        bits_per_value: i32,
    ) -> Result<PackedIntsReader> {
        let byte_count = format.byte_count(version, value_count, bits_per_value);
        let mut bytes = vec![0u8; format.long_count(value_count, bits_per_value) * 8];
        input.read_bytes(&mut bytes, 0, byte_count)?;
        let blocks = bytes
            .chunks(8)
            .map(|c| c.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            .collect();
        let mask = if bits_per_value == 64 {
            !0u64
        } else {
            (1u64 << bits_per_value) - 1
        };
        Ok(PackedIntsReader {
            blocks,
            format,
            bits_per_value,
            value_count,
            mask,
        })
    }

    pub fn get(&self, index: usize) -> i64 {
        debug_assert!(index < self.value_count);
        let bpv = self.bits_per_value as usize;
        match self.format {
            Format::Packed => {
                let bit_pos = index * bpv;
                let element = bit_pos >> 6;
                let end_bits = (bit_pos & 63) + bpv;
                if end_bits <= 64 {
                    ((self.blocks[element] >> (64 - end_bits)) & self.mask) as i64
                } else {
                    let high = self.blocks[element] << (end_bits - 64);
                    let low = self.blocks[element + 1] >> (128 - end_bits);
                    ((high | low) & self.mask) as i64
                }
            }
            Format::PackedSingleBlock => {
                let values_per_block = 64 / bpv;
                let block = self.blocks[index / values_per_block];
                let shift = (index % values_per_block) * bpv;
                ((block >> shift) & self.mask) as i64
            }
        }
    }

    pub fn size(&self) -> usize {
        self.value_count
    }

    pub fn bits_per_value(&self) -> i32 {
        self.bits_per_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::ByteBufferIndexInput;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(2), 2);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(unsigned_bits_required(-1), 64);
    }

    #[test]
    fn test_max_value() {
        assert_eq!(max_value(1), 1);
        assert_eq!(max_value(8), 255);
        assert_eq!(max_value(62), (1i64 << 62) - 1);
        assert_eq!(max_value(63), i64::max_value());
        assert_eq!(max_value(64), i64::max_value());
    }

    #[test]
    fn test_random_values() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for bpv in 1..=64 {
            let count = rng.gen_range(0..300);
            let max = max_value(bpv);
            let values: Vec<i64> = (0..count)
                .map(|_| {
                    if bpv == 64 {
                        rng.gen::<i64>()
                    } else {
                        rng.gen_range(0..=max)
                    }
                })
                .collect();
            let mut out: Vec<u8> = Vec::new();
            {
                let mut writer = PackedIntsWriter::new(&mut out, count, bpv).unwrap();
                for v in &values {
                    writer.add(*v).unwrap();
                }
                writer.finish().unwrap();
            }
            let expected_len = codec_util::header_length(CODEC_NAME)
                + if count < 128 { 3 } else { 4 }
                + Format::Packed.byte_count(VERSION_CURRENT, count, bpv);
            assert_eq!(out.len(), expected_len, "bpv {}", bpv);
            let mut input = ByteBufferIndexInput::from_vec("packed", out);
            let reader = PackedIntsReader::read(&mut input).unwrap();
            assert_eq!(input.file_pointer() as usize, expected_len);
            for (i, v) in values.iter().enumerate() {
                assert_eq!(reader.get(i), *v, "bpv {} index {}", bpv, i);
            }
        }
    }

    #[test]
    fn test_single_block_layout() {
        // two 30 bit values per block, least significant first
        let block: u64 = (7u64 << 30) | 5;
        let mut bytes = Vec::new();
        for i in (0..8).rev() {
            bytes.push((block >> (i * 8)) as u8);
        }
        let mut input = bytes.as_slice();
        let reader =
            PackedIntsReader::read_no_header(&mut input, Format::PackedSingleBlock, 0, 2, 30)
                .unwrap();
        assert_eq!(reader.get(0), 5);
        assert_eq!(reader.get(1), 7);
    }
}
