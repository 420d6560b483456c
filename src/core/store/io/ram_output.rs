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


use core::store::io::{DataOutput, IndexOutput};

use error::{ErrorKind, Result};

use std::io::{self, Write};

use flate2::Crc;

/// A memory-resident `IndexOutput` implementation.
pub struct RAMOutputStream {
    name: String,
    store: Vec<u8>,
    crc: Option<Crc>,
}

impl RAMOutputStream {
    pub fn new(name: &str, checksum: bool) -> Self {
        let crc = if checksum { Some(Crc::new()) } else { None };
        RAMOutputStream {
            name: name.to_string(),
            store: Vec::new(),
            crc,
        }
    }

    /// Copies the bytes written so far to `out`.
    pub fn write_to<O: DataOutput + ?Sized>(&self, out: &mut O) -> Result<()> {
        out.write_bytes(&self.store, 0, self.store.len())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.store
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.store
    }

    pub fn reset(&mut self) {
        self.store.clear();
        if let Some(ref mut crc) = self.crc {
            crc.reset();
        }
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.store.extend_from_slice(buf);
        if let Some(ref mut crc) = self.crc {
            crc.update(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.store.len() as i64
    }

    fn checksum(&self) -> Result<i64> {
        if let Some(ref crc) = self.crc {
            Ok((crc.sum() as i64) & 0xffff_ffffi64)
        } else {
            bail!(ErrorKind::IllegalState(format!(
                "RAMOutputStream {} created with checksum disabled",
                self.name
            )))
        }
    }
}
