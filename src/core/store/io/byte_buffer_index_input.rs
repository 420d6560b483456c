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


use core::store::io::{DataInput, IndexInput};

use error::ErrorKind::{IllegalArgument, UnexpectedEOF};
use error::Result;

use memmap::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
enum Backing {
    Mmap(Arc<Mmap>),
    Heap(Arc<Vec<u8>>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match *self {
            Backing::Mmap(ref m) => &m[..],
            Backing::Heap(ref v) => &v[..],
        }
    }
}

/// Shared, immutable bytes of one file. Cloning only bumps a reference count.
#[derive(Clone)]
pub struct ReadOnlySource {
    backing: Backing,
    offset: usize,
    len: usize,
}

impl ReadOnlySource {
    /// Memory maps the file at `path`. Empty files are backed by an empty buffer
    /// since they cannot be mapped.
    pub fn mmap<P: AsRef<Path>>(path: P) -> Result<ReadOnlySource> {
        let file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 {
            return Ok(ReadOnlySource::from(Arc::new(Vec::<u8>::new())));
        }
        let mmap = unsafe { MmapOptions::new().len(file_len).map(&file)? };
        Ok(ReadOnlySource {
            backing: Backing::Mmap(Arc::new(mmap)),
            offset: 0,
            len: file_len,
        })
    }

    pub fn range(&self, offset: usize, len: usize) -> Result<ReadOnlySource> {
        if self.len < offset + len {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) for source of length: {}",
                offset, len, self.len
            )));
        }

        Ok(ReadOnlySource {
            backing: self.backing.clone(),
            offset: self.offset + offset,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the data underlying the ReadOnlySource object.
    pub fn as_slice(&self) -> &[u8] {
        &self.backing.bytes()[self.offset..self.offset + self.len]
    }
}

impl From<Arc<Vec<u8>>> for ReadOnlySource {
    fn from(bytes: Arc<Vec<u8>>) -> ReadOnlySource {
        let len = bytes.len();
        ReadOnlySource {
            backing: Backing::Heap(bytes),
            offset: 0,
            len,
        }
    }
}

/// `IndexInput` over a `ReadOnlySource`, used for both memory mapped files
/// and in-memory files.
#[derive(Clone)]
pub struct ByteBufferIndexInput {
    source: ReadOnlySource,
    position: usize,
    name: String,
}

impl ByteBufferIndexInput {
    pub fn new(name: &str, source: ReadOnlySource) -> ByteBufferIndexInput {
        ByteBufferIndexInput {
            source,
            position: 0,
            name: name.to_string(),
        }
    }

    pub fn from_vec(name: &str, bytes: Vec<u8>) -> ByteBufferIndexInput {
        Self::new(name, ReadOnlySource::from(Arc::new(bytes)))
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.source.len() - self.position
    }

    fn eof_error(&self, wanted: usize) -> ::error::Error {
        UnexpectedEOF(format!(
            "read past EOF: {} (pos={}, wanted={}, len={})",
            self.name,
            self.position,
            wanted,
            self.source.len()
        ))
        .into()
    }
}

impl IndexInput for ByteBufferIndexInput {
    fn duplicate(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Clone::clone(self)))
    }

    fn file_pointer(&self) -> i64 {
        self.position as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos as usize > self.source.len() {
            bail!(UnexpectedEOF(format!(
                "seek past EOF: {} (pos={}, len={})",
                self.name,
                pos,
                self.source.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    #[inline]
    fn len(&self) -> u64 {
        self.source.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        if offset < 0 || length < 0 {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) of {}",
                offset, length, self.name
            )));
        }
        let source = self.source.range(offset as usize, length as usize)?;
        Ok(Box::new(ByteBufferIndexInput {
            source,
            position: 0,
            name: format!("{} [slice={}]", self.name, description),
        }))
    }
}

impl DataInput for ByteBufferIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.remaining() == 0 {
            return Err(self.eof_error(1));
        }
        let b = self.source.as_slice()[self.position];
        self.position += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        if self.remaining() < length {
            return Err(self.eof_error(length));
        }
        let pos = self.position;
        b[offset..offset + length].copy_from_slice(&self.source.as_slice()[pos..pos + length]);
        self.position += length;
        Ok(())
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(self.eof_error(count));
        }
        self.position += count;
        Ok(())
    }
}

impl Read for ByteBufferIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.remaining());
        let pos = self.position;
        buf[..count].copy_from_slice(&self.source.as_slice()[pos..pos + count]);
        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{DataOutput, FSIndexOutput};
    use std::io::Write;
    use tempfile;

    #[test]
    fn test_mmap_index_input() {
        let name = "test.txt";
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(name);

        {
            let mut fsout = FSIndexOutput::new(name.to_string(), &path).unwrap();
            fsout.write_byte(b'a').unwrap();
            fsout.write_short(0x7F_i16).unwrap();
            fsout.write_long(567_890).unwrap();
            fsout.write_int(1_234_567).unwrap();
            fsout.write_byte(b'b').unwrap();
            fsout.flush().unwrap();
        }

        let input = ByteBufferIndexInput::new(name, ReadOnlySource::mmap(&path).unwrap());
        assert_eq!(input.len(), 16);
        let mut slice = input.slice("from3", 3, 12).unwrap();
        assert_eq!(slice.read_long().unwrap(), 567_890_i64);
        assert_eq!(slice.read_int().unwrap(), 1_234_567_i32);
        assert!(slice.read_int().is_err());
    }

    #[test]
    fn test_duplicate_has_independent_position() {
        let mut input = ByteBufferIndexInput::from_vec("dup", vec![1, 2, 3, 4]);
        assert_eq!(input.read_byte().unwrap(), 1);
        let mut dup = input.duplicate().unwrap();
        assert_eq!(dup.read_byte().unwrap(), 2);
        assert_eq!(dup.read_byte().unwrap(), 3);
        assert_eq!(input.read_byte().unwrap(), 2);
        assert_eq!(input.file_pointer(), 2);
        assert_eq!(dup.file_pointer(), 3);
        assert!(input.seek(5).is_err());
    }
}
