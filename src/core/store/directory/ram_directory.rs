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


use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use core::store::directory::Directory;
use core::store::io::{ByteBufferIndexInput, DataOutput, IndexInput, IndexOutput, ReadOnlySource};
use core::store::IOContext;
use error::ErrorKind::IllegalArgument;
use error::Result;

use flate2::Crc;

struct RAMStore {
    files: RwLock<HashMap<String, Arc<Vec<u8>>>>,
    used_bytes: AtomicUsize,
    max_size: Mutex<Option<usize>>,
}

impl RAMStore {
    /// Reserves `len` bytes, failing like a full disk once the budget is exceeded.
    fn reserve(&self, name: &str, len: usize) -> io::Result<()> {
        let max = self
            .max_size
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned lock"))?;
        let used = self.used_bytes.load(Ordering::Acquire);
        if let Some(max) = *max {
            if used + len > max {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!(
                        "fake disk full at {} bytes when writing {} ({} bytes requested)",
                        used, name, len
                    ),
                ));
            }
        }
        self.used_bytes.fetch_add(len, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self, len: usize) {
        self.used_bytes.fetch_sub(len, Ordering::AcqRel);
    }
}

/// A memory-resident `Directory` implementation.
///
/// Files become visible to readers once their output is flushed or dropped.
/// An output whose file was deleted in the meantime is silently discarded.
pub struct RAMDirectory {
    store: Arc<RAMStore>,
}

impl Default for RAMDirectory {
    fn default() -> Self {
        RAMDirectory {
            store: Arc::new(RAMStore {
                files: RwLock::new(HashMap::new()),
                used_bytes: AtomicUsize::new(0),
                max_size: Mutex::new(None),
            }),
        }
    }
}

impl RAMDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total number of bytes this directory will accept. Writes
    /// beyond the cap fail with an I/O error, which simulates a full disk.
    pub fn set_max_size_in_bytes(&self, max: Option<usize>) -> Result<()> {
        *self.store.max_size.lock()? = max;
        Ok(())
    }

    pub fn size_in_bytes(&self) -> usize {
        self.store.used_bytes.load(Ordering::Acquire)
    }
}

impl Directory for RAMDirectory {
    type IndexOutput = RAMIndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.store.files.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        match self.store.files.read()?.get(name) {
            Some(bytes) => Ok(bytes.len() as i64),
            None => bail!(IllegalArgument(format!("file {} does not exist", name))),
        }
    }

    fn file_exists(&self, name: &str) -> bool {
        self.store
            .files
            .read()
            .map(|files| files.contains_key(name))
            .unwrap_or(false)
    }

    fn create_output(&self, name: &str, _context: &IOContext) -> Result<Self::IndexOutput> {
        let previous = self
            .store
            .files
            .write()?
            .insert(name.to_string(), Arc::new(Vec::new()));
        if let Some(previous) = previous {
            self.store.release(previous.len());
        }
        Ok(RAMIndexOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            crc: Crc::new(),
            store: Arc::clone(&self.store),
            published: 0,
        })
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        match self.store.files.read()?.get(name) {
            Some(bytes) => Ok(Box::new(ByteBufferIndexInput::new(
                name,
                ReadOnlySource::from(Arc::clone(bytes)),
            ))),
            None => bail!(IllegalArgument(format!("file {} does not exist", name))),
        }
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match self.store.files.write()?.remove(name) {
            Some(bytes) => {
                self.store.release(bytes.len());
                Ok(())
            }
            None => bail!(IllegalArgument(format!("file {} does not exist", name))),
        }
    }

    fn sync(&self, _names: &HashSet<String>) -> Result<()> {
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let mut files = self.store.files.write()?;
        if files.contains_key(dest) {
            bail!(IllegalArgument(format!(
                "cannot rename {} to {}: destination exists",
                source, dest
            )));
        }
        match files.remove(source) {
            Some(bytes) => {
                files.insert(dest.to_string(), bytes);
                Ok(())
            }
            None => bail!(IllegalArgument(format!("file {} does not exist", source))),
        }
    }
}

impl fmt::Display for RAMDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RAMDirectory@{:p}", Arc::as_ptr(&self.store))
    }
}

/// Output of a `RAMDirectory`.
pub struct RAMIndexOutput {
    name: String,
    buffer: Vec<u8>,
    crc: Crc,
    store: Arc<RAMStore>,
    published: usize,
}

impl RAMIndexOutput {
    fn publish(&mut self) -> io::Result<()> {
        if self.published == self.buffer.len() {
            return Ok(());
        }
        let mut files = self
            .store
            .files
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned lock"))?;
        if let Some(entry) = files.get_mut(&self.name) {
            *entry = Arc::new(self.buffer.clone());
            self.published = self.buffer.len();
        }
        Ok(())
    }
}

impl Write for RAMIndexOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.store.reserve(&self.name, buf.len())?;
        self.buffer.extend_from_slice(buf);
        self.crc.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish()
    }
}

impl Drop for RAMIndexOutput {
    fn drop(&mut self) {
        if let Err(e) = self.publish() {
            error!("Oops, failed to flush {}, errmsg: {}", self.name, e);
        }
        let visible = self
            .store
            .files
            .read()
            .map(|files| files.contains_key(&self.name))
            .unwrap_or(false);
        if !visible {
            // the file was deleted while still open, its bytes no longer count
            self.store.release(self.buffer.len());
        }
    }
}

impl DataOutput for RAMIndexOutput {}

impl IndexOutput for RAMIndexOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.buffer.len() as i64
    }

    fn checksum(&self) -> Result<i64> {
        Ok((self.crc.sum() as i64) & 0xffff_ffffi64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_on_drop() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("_0.fdt", &IOContext::Flush).unwrap();
            out.write_vint(1234).unwrap();
            assert_eq!(dir.file_length("_0.fdt").unwrap(), 0);
        }
        assert_eq!(dir.file_length("_0.fdt").unwrap(), 2);
        let mut input = dir.open_input("_0.fdt", &IOContext::Read).unwrap();
        assert_eq!(input.read_vint().unwrap(), 1234);
    }

    #[test]
    fn test_copy_from() {
        let source = Arc::new(RAMDirectory::new());
        {
            let mut out = source.create_output("_0.cfs", &IOContext::Flush).unwrap();
            out.write_long(42).unwrap();
            out.write_string("copied").unwrap();
        }
        let dir = RAMDirectory::new();
        dir.copy_from(&source, "_0.cfs", "_1.cfs", &IOContext::Default)
            .unwrap();
        assert_eq!(dir.file_length("_1.cfs").unwrap(), 15);
        let mut input = dir.open_input("_1.cfs", &IOContext::Read).unwrap();
        assert_eq!(input.read_long().unwrap(), 42);
        assert_eq!(input.read_string().unwrap(), "copied");
    }

    #[test]
    fn test_deleted_output_is_not_resurrected() {
        let dir = RAMDirectory::new();
        let mut out = dir.create_output("_0.tvx", &IOContext::Flush).unwrap();
        out.write_long(1).unwrap();
        dir.delete_file("_0.tvx").unwrap();
        drop(out);
        assert!(!dir.file_exists("_0.tvx"));
        assert_eq!(dir.size_in_bytes(), 0);
    }

    #[test]
    fn test_disk_full() {
        let dir = RAMDirectory::new();
        dir.set_max_size_in_bytes(Some(10)).unwrap();
        let mut out = dir.create_output("_0.si", &IOContext::Flush).unwrap();
        out.write_long(1).unwrap();
        assert!(out.write_long(2).is_err());
    }
}
