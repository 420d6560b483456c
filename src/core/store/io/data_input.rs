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


use error::ErrorKind::*;
use error::Result;

use byteorder::{BigEndian, ByteOrder};

use std::collections::{HashMap, HashSet};
use std::io::{self, Read};

/// Abstract base trait for performing read operations of Lucene's low-level
/// data types. All multi-byte values are big-endian.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        if self.read(&mut buffer)? != 1 {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ))
        } else {
            Ok(buffer[0])
        }
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        let end = offset + length;
        if b.len() < end {
            let msg = format!(
                "Buffer too small: writing [{}, {}) to [0, {})",
                offset,
                end,
                b.len(),
            );
            bail!(IllegalArgument(msg));
        }

        let mut read = 0;
        while read < length {
            let n = self.read(&mut b[offset + read..end])?;
            if n == 0 {
                bail!(UnexpectedEOF(format!(
                    "Reached EOF when {} bytes are expected",
                    length
                )))
            }
            read += n;
        }
        Ok(())
    }

    fn read_short(&mut self) -> Result<i16> {
        let mut bytes = [0u8; 2];
        self.read_bytes(&mut bytes, 0, 2)?;
        Ok(BigEndian::read_i16(&bytes))
    }

    fn read_int(&mut self) -> Result<i32> {
        let mut bytes = [0u8; 4];
        self.read_bytes(&mut bytes, 0, 4)?;
        Ok(BigEndian::read_i32(&bytes))
    }

    fn read_vint(&mut self) -> Result<i32> {
        let mut b = (self.read_byte()?) as i8;
        if b >= 0 {
            return Ok(i32::from(b));
        }

        let mut i = i32::from(b) & 0x7f;
        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 7;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 14;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 21;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x0f) << 28;

        if (b as u8 & 0xf0) != 0 {
            bail!(CorruptIndex("Invalid vInt detected (too many bits)".to_owned()));
        }

        Ok(i)
    }

    fn read_long(&mut self) -> Result<i64> {
        let mut bytes = [0u8; 8];
        self.read_bytes(&mut bytes, 0, 8)?;
        Ok(BigEndian::read_i64(&bytes))
    }

    fn read_vlong(&mut self) -> Result<i64> {
        let mut i = 0i64;
        let mut shift = 0;
        while shift <= 56 {
            let b = self.read_byte()?;
            i |= i64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(i);
            }
            shift += 7;
        }
        bail!(CorruptIndex("Invalid vLong detected (negative values disallowed)".to_owned()))
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read_vint()?;
        if length < 0 {
            bail!(CorruptIndex(format!("Invalid String length: {}", length)));
        }

        let length = length as usize;
        let mut buffer = vec![0u8; length];
        self.read_bytes(&mut buffer, 0, length)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn read_map_of_strings(&mut self) -> Result<HashMap<String, String>> {
        let count = self.read_int()?;
        if count < 0 {
            bail!(CorruptIndex(format!("Invalid StringMap size: {}", count)));
        }

        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let k = self.read_string()?;
            let v = self.read_string()?;
            map.insert(k, v);
        }

        Ok(map)
    }

    fn read_set_of_strings(&mut self) -> Result<HashSet<String>> {
        let count = self.read_int()?;
        if count < 0 {
            bail!(CorruptIndex(format!("Invalid StringSet size: {}", count)));
        }

        let mut hash_set = HashSet::with_capacity(count as usize);
        for _ in 0..count {
            hash_set.insert(self.read_string()?);
        }

        Ok(hash_set)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        const SKIP_BUFFER_SIZE: usize = 1024;
        let mut skip_buffer = [0u8; SKIP_BUFFER_SIZE];
        let mut skipped = 0;

        while skipped < count {
            let step = ::std::cmp::min(SKIP_BUFFER_SIZE, count - skipped);
            self.read_bytes(&mut skip_buffer, 0, step)?;
            skipped += step;
        }
        Ok(())
    }
}

impl<'a> DataInput for &'a [u8] {
    fn read_byte(&mut self) -> Result<u8> {
        if self.is_empty() {
            bail!(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer"
            ));
        }
        let b = self[0];
        *self = &self[1..];
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.len() < count {
            bail!(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer"
            ));
        }

        *self = &self[count..];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::DataOutput;

    #[test]
    fn test_vint_boundaries() {
        let values = [0, 1, 127, 128, 16_383, 16_384, 1 << 28, i32::max_value(), -1];
        let mut out: Vec<u8> = Vec::new();
        for v in &values {
            out.write_vint(*v).unwrap();
        }
        let mut input = out.as_slice();
        for v in &values {
            assert_eq!(input.read_vint().unwrap(), *v);
        }
        assert!(input.is_empty());
    }

    #[test]
    fn test_vint_fifth_byte_overflow() {
        let bytes = [0xffu8, 0xff, 0xff, 0xff, 0x1f];
        let mut input = &bytes[..];
        assert!(input.read_vint().is_err());
    }

    #[test]
    fn test_vlong_and_strings() {
        let mut out: Vec<u8> = Vec::new();
        out.write_vlong(i64::max_value()).unwrap();
        out.write_string("héllo").unwrap();
        assert!(out.write_vlong(-1).is_err());

        let mut input = out.as_slice();
        assert_eq!(input.read_vlong().unwrap(), i64::max_value());
        assert_eq!(input.read_string().unwrap(), "héllo");
        assert!(input.read_byte().is_err());
    }
}
