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


use core::store::io::DataInput;

use error::ErrorKind::UnexpectedEOF;
use error::Result;

use std::io::Read;

/// DataInput backed by a byte array.
pub struct ByteArrayDataInput<T: AsRef<[u8]>> {
    bytes: T,
    pos: usize,
}

impl<T: AsRef<[u8]>> ByteArrayDataInput<T> {
    pub fn new(bytes: T) -> ByteArrayDataInput<T> {
        ByteArrayDataInput { bytes, pos: 0usize }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn length(&self) -> usize {
        self.bytes.as_ref().len()
    }

    pub fn eof(&self) -> bool {
        self.pos == self.length()
    }

    pub fn reset(&mut self, bytes: T) {
        self.bytes = bytes;
        self.pos = 0;
    }

    fn check_remaining(&self, len: usize) -> Result<()> {
        if self.pos + len > self.length() {
            bail!(UnexpectedEOF(format!(
                "read past EOF: pos={} len={} limit={}",
                self.pos,
                len,
                self.length()
            )));
        }
        Ok(())
    }
}

impl<T: AsRef<[u8]>> DataInput for ByteArrayDataInput<T> {
    fn read_byte(&mut self) -> Result<u8> {
        self.check_remaining(1)?;
        let b = self.bytes.as_ref()[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, len: usize) -> Result<()> {
        self.check_remaining(len)?;
        b[offset..offset + len].copy_from_slice(&self.bytes.as_ref()[self.pos..self.pos + len]);
        self.pos += len;
        Ok(())
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.check_remaining(count)?;
        self.pos += count;
        Ok(())
    }
}

impl<T: AsRef<[u8]>> Read for ByteArrayDataInput<T> {
    fn read(&mut self, buf: &mut [u8]) -> ::std::io::Result<usize> {
        let size = ::std::cmp::min(buf.len(), self.length() - self.pos);
        buf[0..size].copy_from_slice(&self.bytes.as_ref()[self.pos..self.pos + size]);
        self.pos += size;
        Ok(size)
    }
}
