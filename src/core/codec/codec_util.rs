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


//! Utility functions for reading and writing versioned headers.
//!
//! Writing codec headers is useful to ensure that a file is in
//! the format you think it is.

use core::store::io::{
    BufferedChecksumIndexInput, ChecksumIndexInput, DataInput, DataOutput, IndexInput,
    IndexOutput,
};

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;
use std::io::Read;

/// Constant to identify the start of a codec header.
pub const CODEC_MAGIC: i32 = 0x3FD7_6C17;
/// Constant to identify the start of a codec footer.
pub const FOOTER_MAGIC: i32 = !CODEC_MAGIC;

/// Writes a codec header, which records both a string to identify the file and a version number.
///
/// CodecHeader --> Magic,CodecName,Version
/// * Magic --> `DataOutput::write_int`. This identifies the start of the header. It is always
///   `CODEC_MAGIC`.
/// * CodecName --> `DataOutput::write_string`. This is a string to identify this file.
/// * Version --> `DataOutput::write_int`. Records the version of the file.
///
/// Note that the length of a codec header depends only upon the name of the codec,
/// so this length can be computed at any time with `header_length`.
pub fn write_header<T: DataOutput + ?Sized>(out: &mut T, codec: &str, version: i32) -> Result<()> {
    let clen = codec.len();
    if clen >= 128 || !codec.is_ascii() {
        bail!(IllegalArgument(format!(
            "codec must be simple ASCII less than 128 characters, got {}[length={}]",
            codec, clen,
        )));
    }
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)
}

/// Writes a codec footer, which records both a checksum
/// algorithm ID and a checksum.
///
/// CodecFooter --> Magic,AlgorithmID,Checksum
/// * Magic --> `FOOTER_MAGIC`.
/// * AlgorithmID --> always 0, for zlib-crc32.
/// * Checksum --> the CRC32 of all previous bytes in the stream, including
///   the bytes from Magic and AlgorithmID.
pub fn write_footer<T: IndexOutput + ?Sized>(output: &mut T) -> Result<()> {
    output.write_int(FOOTER_MAGIC)?;
    output.write_int(0)?;
    write_crc(output)
}

/// Computes the length of a codec header.
pub fn header_length(codec: &str) -> usize {
    9 + codec.len()
}

/// Computes the length of a codec footer.
#[inline(always)]
pub fn footer_length() -> usize {
    16
}

/// Reads and validates a header previously written with `write_header`.
///
/// When reading a file, supply the expected `codec` and an expected version range
/// (min_version to max_version). Returns the actual version.
pub fn check_header<T: IndexInput + ?Sized>(
    input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_header = input.read_int()?;
    if actual_header != CODEC_MAGIC {
        bail!(CorruptIndex(format!(
            "codec header mismatch: actual header=0x{:X} vs expected header=0x{:X} (resource={})",
            actual_header,
            CODEC_MAGIC,
            input.name()
        )));
    }
    check_header_no_magic(input, codec, min_ver, max_ver)
}

/// Like `check_header` except this version assumes the first i32 has already
/// been read and validated from the input.
pub fn check_header_no_magic<T: IndexInput + ?Sized>(
    input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        bail!(CorruptIndex(format!(
            "codec mismatch: actual codec={} vs expected codec={} (resource={})",
            actual_codec,
            codec,
            input.name()
        )));
    }
    let actual_ver = input.read_int()?;
    if actual_ver < min_ver || actual_ver > max_ver {
        bail!(CorruptIndex(format!(
            "index format either too new or too old: {} <= {} <= {} doesn't hold (resource={})",
            min_ver,
            actual_ver,
            max_ver,
            input.name()
        )));
    }
    Ok(actual_ver)
}

/// Checks that the footer magic and algorithm id are where they should be,
/// leaving the input positioned at the checksum.
pub fn validate_footer<T: IndexInput + ?Sized>(input: &mut T) -> Result<()> {
    let remaining = input.len() as i64 - input.file_pointer();
    let expected = footer_length() as i64;

    if remaining < expected {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): remaining={}, expected={} (resource={})",
            remaining,
            expected,
            input.name()
        )))
    } else if remaining > expected {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file extended?): remaining={}, expected={} (resource={})",
            remaining,
            expected,
            input.name()
        )))
    }

    let magic = input.read_int()?;
    if magic != FOOTER_MAGIC {
        bail!(CorruptIndex(format!(
            "codec footer mismatch: actual footer=0x{:X} vs expected footer=0x{:X} (resource={})",
            magic,
            FOOTER_MAGIC,
            input.name()
        )));
    }
    let algorithm_id = input.read_int()?;
    if algorithm_id != 0 {
        bail!(CorruptIndex(format!(
            "codec footer mismatch: unknown algorithm_id: {} (resource={})",
            algorithm_id,
            input.name()
        )));
    }
    Ok(())
}

/// Validates the codec footer previously written by `write_footer`.
pub fn check_footer<T: ChecksumIndexInput + ?Sized>(input: &mut T) -> Result<i64> {
    validate_footer(input)?;
    let actual_checksum = input.checksum();
    let expected_checksum = read_crc(input)?;
    if actual_checksum != expected_checksum {
        bail!(CorruptIndex(format!(
            "checksum failed (hardware problems?): expected=0x{:X}, actual=0x{:X} (resource={})",
            expected_checksum,
            actual_checksum,
            input.name()
        )));
    }
    Ok(actual_checksum)
}

/// Checks that the stream is positioned at EOF. Used for legacy versions
/// which carry no footer.
pub fn check_eof<T: IndexInput + ?Sized>(input: &T) -> Result<()> {
    if input.file_pointer() != input.len() as i64 {
        bail!(CorruptIndex(format!(
            "did not read all bytes from file: read {} vs size {} (resource={})",
            input.file_pointer(),
            input.len(),
            input.name()
        )));
    }
    Ok(())
}

fn read_crc<T: IndexInput + ?Sized>(input: &mut T) -> Result<i64> {
    let val = input.read_long()?;
    if (val as u64 & 0xFFFF_FFFF_0000_0000) != 0 {
        bail!(CorruptIndex(format!(
            "Illegal CRC-32 checksum: {} (resource={})",
            val,
            input.name()
        )));
    }
    Ok(val)
}

fn write_crc<T: IndexOutput + ?Sized>(output: &mut T) -> Result<()> {
    let value = output.checksum()?;
    if value as u64 & 0xFFFF_FFFF_0000_0000 != 0 {
        bail!(IllegalState(format!(
            "Illegal CRC-32 checksum: {} (resource={})",
            value,
            output.name()
        )));
    }
    output.write_long(value)
}

/// Returns (but does not validate) the checksum previously written by `write_footer`.
///
/// This only checks the structure of the footer, which is cheap enough to do
/// when opening a file that is otherwise read lazily.
pub fn retrieve_checksum<T: IndexInput + ?Sized>(input: &mut T) -> Result<i64> {
    let length = input.len();
    let footer_length = footer_length() as u64;
    if length < footer_length {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): length={}, but footer_length={} \
             (resource={})",
            length,
            footer_length,
            input.name()
        )));
    }
    input.seek((length - footer_length) as i64)?;
    validate_footer(input)?;

    read_crc(input)
}

/// Reads all bytes of a duplicate of `input` and verifies the footer checksum.
///
/// Note that this method may be slow, as it must process the entire file.
/// If you just need to extract the checksum value, call `retrieve_checksum`.
pub fn checksum_entire_file<T: IndexInput + ?Sized>(input: &T) -> Result<i64> {
    let mut index = input.duplicate()?;
    index.seek(0)?;
    let mut checksum = BufferedChecksumIndexInput::new(index);
    let len = checksum.len();
    if len < footer_length() as u64 {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): length={} but footer_length=={} \
             (resource={})",
            len,
            footer_length(),
            input.name()
        )));
    }
    const BUFSIZ: u64 = 1024 * 64;
    let mut buffer = [0u8; BUFSIZ as usize];
    let end = len - footer_length() as u64;
    let mut pos = 0u64;

    while pos < end {
        let size = (end - pos).min(BUFSIZ);
        let read = checksum.read(&mut buffer[0..size as usize])?;
        if read == 0 {
            break;
        }
        pos += read as u64;
    }

    check_footer(&mut checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{ByteBufferIndexInput, RAMOutputStream};
    use error::is_corrupt_index;

    fn written(codec: &str, version: i32) -> Vec<u8> {
        let mut out = RAMOutputStream::new("test", true);
        write_header(&mut out, codec, version).unwrap();
        out.write_vint(12).unwrap();
        write_footer(&mut out).unwrap();
        out.into_bytes()
    }

    #[test]
    fn test_header_footer() {
        let bytes = written("FooCodec", 3);
        assert_eq!(bytes.len(), header_length("FooCodec") + 1 + footer_length());

        let input = ByteBufferIndexInput::from_vec("foo", bytes.clone());
        let mut input = BufferedChecksumIndexInput::new(Box::new(input));
        assert_eq!(check_header(&mut input, "FooCodec", 0, 3).unwrap(), 3);
        assert_eq!(input.read_vint().unwrap(), 12);
        check_footer(&mut input).unwrap();

        let input = ByteBufferIndexInput::from_vec("foo", bytes);
        checksum_entire_file(&input).unwrap();
    }

    #[test]
    fn test_header_mismatch_names_resource() {
        let bytes = written("FooCodec", 3);
        let mut input = ByteBufferIndexInput::from_vec("_0.foo", bytes.clone());
        let err = check_header(&mut input, "BarCodec", 0, 3).unwrap_err();
        assert!(is_corrupt_index(&err));
        assert!(format!("{}", err).contains("_0.foo"));

        let mut input = ByteBufferIndexInput::from_vec("_0.foo", bytes);
        let err = check_header(&mut input, "FooCodec", 4, 5).unwrap_err();
        assert!(is_corrupt_index(&err));
    }

    #[test]
    fn test_corrupted_checksum() {
        let mut bytes = written("FooCodec", 0);
        let pos = header_length("FooCodec");
        bytes[pos] ^= 0x01;
        let input = ByteBufferIndexInput::from_vec("foo", bytes);
        let err = checksum_entire_file(&input).unwrap_err();
        assert!(is_corrupt_index(&err));
    }
}
