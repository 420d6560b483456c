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
use std::io::Write;
use std::sync::Arc;

use core::codec::codec_util;
use core::index::{segment_file_name, strip_segment_name};
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_files_ignoring_errors;
use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;

pub const DATA_EXTENSION: &str = "cfs";
pub const ENTRIES_EXTENSION: &str = "cfe";
pub const DATA_CODEC: &str = "CompoundFileWriterData";
pub const ENTRY_CODEC: &str = "CompoundFileWriterEntries";
pub const VERSION_START: i32 = 0;
pub const VERSION_CHECKSUM: i32 = 1;
pub const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

#[derive(Debug, Clone, Copy)]
pub struct FileEntry {
    offset: i64,
    length: i64,
}

/// Writes a compound container: one `.cfs` data file holding the bytes of
/// every sub-file back to back and one `.cfe` file mapping stripped file
/// names to `(offset, length)`.
///
/// Sub-files are handed over complete, so the data file is append-only.
pub struct CompoundFileWriter<D: Directory> {
    directory: Arc<D>,
    data_file_name: String,
    entries_file_name: String,
    context: IOContext,
    data_out: Option<D::IndexOutput>,
    entries: Vec<(String, FileEntry)>,
    ids: HashSet<String>,
    closed: bool,
}

impl<D: Directory> CompoundFileWriter<D> {
    /// `base` is the segment name and `suffix` the container suffix, e.g.
    /// `_0` and `dv` for `_0_dv.cfs`.
    pub fn new(
        directory: Arc<D>,
        base: &str,
        suffix: &str,
        context: &IOContext,
    ) -> Result<CompoundFileWriter<D>> {
        let mut writer = CompoundFileWriter {
            directory,
            data_file_name: segment_file_name(base, suffix, DATA_EXTENSION),
            entries_file_name: segment_file_name(base, suffix, ENTRIES_EXTENSION),
            context: *context,
            data_out: None,
            entries: Vec::new(),
            ids: HashSet::new(),
            closed: false,
        };
        let res = writer.open_data();
        writer.abort_on_error(res)?;
        Ok(writer)
    }

    fn open_data(&mut self) -> Result<()> {
        let mut out = self
            .directory
            .create_output(&self.data_file_name, &self.context)?;
        codec_util::write_header(&mut out, DATA_CODEC, VERSION_CURRENT)?;
        self.data_out = Some(out);
        Ok(())
    }

    pub fn data_file_name(&self) -> &str {
        &self.data_file_name
    }

    pub fn entries_file_name(&self) -> &str {
        &self.entries_file_name
    }

    /// Appends the complete contents of sub-file `name`.
    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let res = self.append(name, bytes);
        self.abort_on_error(res)
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.closed {
            bail!(IllegalState(format!(
                "compound file {} is closed",
                self.data_file_name
            )));
        }
        let id = strip_segment_name(name).to_string();
        if !self.ids.insert(id.clone()) {
            bail!(IllegalArgument(format!(
                "file {} already exists in compound file {}",
                name, self.data_file_name
            )));
        }
        let out = match self.data_out.as_mut() {
            Some(out) => out,
            None => bail!(IllegalState(format!(
                "compound file {} was aborted",
                self.data_file_name
            ))),
        };
        let offset = out.file_pointer();
        out.write_bytes(bytes, 0, bytes.len())?;
        self.entries.push((
            id,
            FileEntry {
                offset,
                length: bytes.len() as i64,
            },
        ));
        Ok(())
    }

    /// Finishes the data file and writes the entry table.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let res = self.write_entries();
        self.abort_on_error(res)?;
        self.closed = true;
        debug!(
            "wrote compound file {} with {} entries",
            self.data_file_name,
            self.entries.len()
        );
        Ok(())
    }

    fn write_entries(&mut self) -> Result<()> {
        if let Some(mut out) = self.data_out.take() {
            codec_util::write_footer(&mut out)?;
            out.flush()?;
        }
        let mut out = self
            .directory
            .create_output(&self.entries_file_name, &self.context)?;
        codec_util::write_header(&mut out, ENTRY_CODEC, VERSION_CURRENT)?;
        out.write_vint(self.entries.len() as i32)?;
        for (id, entry) in &self.entries {
            out.write_string(id)?;
            out.write_long(entry.offset)?;
            out.write_long(entry.length)?;
        }
        codec_util::write_footer(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Drops any open output and deletes both container files.
    pub fn abort(&mut self) {
        self.data_out = None;
        self.closed = true;
        delete_files_ignoring_errors(
            self.directory.as_ref(),
            &[
                self.data_file_name.clone(),
                self.entries_file_name.clone(),
            ],
        );
    }

    fn abort_on_error<T>(&mut self, res: Result<T>) -> Result<T> {
        if res.is_err() {
            self.abort();
        }
        res
    }
}

/// Read-only view of a compound container written by `CompoundFileWriter`.
pub struct CompoundFileReader {
    name: String,
    segment: String,
    entries: HashMap<String, FileEntry>,
    input: Box<dyn IndexInput>,
    pub version: i32,
}

impl CompoundFileReader {
    pub fn open<D: Directory + ?Sized>(
        directory: &D,
        base: &str,
        suffix: &str,
        context: &IOContext,
    ) -> Result<CompoundFileReader> {
        let data_file_name = segment_file_name(base, suffix, DATA_EXTENSION);
        let entries_file_name = segment_file_name(base, suffix, ENTRIES_EXTENSION);
        let (version, entries) = Self::read_entries(directory, &entries_file_name)?;

        let mut input = directory.open_input(&data_file_name, context)?;
        codec_util::check_header(input.as_mut(), DATA_CODEC, version, version)?;
        let header_length = codec_util::header_length(DATA_CODEC) as i64;
        let mut expected_length = header_length;
        for entry in entries.values() {
            let end = entry.offset.checked_add(entry.length);
            if entry.offset < header_length
                || entry.length < 0
                || end.map_or(true, |end| end > input.len() as i64)
            {
                bail!(CorruptIndex(format!(
                    "invalid compound entry offset={} length={} (resource={})",
                    entry.offset,
                    entry.length,
                    data_file_name
                )));
            }
            expected_length += entry.length;
        }
        if version >= VERSION_CHECKSUM {
            codec_util::retrieve_checksum(input.as_mut())?;
            expected_length += codec_util::footer_length() as i64;
        }
        if input.len() as i64 != expected_length {
            bail!(CorruptIndex(format!(
                "length should be {} bytes, but is {} instead (resource={})",
                expected_length,
                input.len(),
                data_file_name
            )));
        }
        Ok(CompoundFileReader {
            name: data_file_name,
            segment: base.to_string(),
            entries,
            input,
            version,
        })
    }

    fn read_entries<D: Directory + ?Sized>(
        directory: &D,
        entries_file_name: &str,
    ) -> Result<(i32, HashMap<String, FileEntry>)> {
        let mut input = directory.open_checksum_input(entries_file_name, &IOContext::ReadOnce)?;
        let version =
            codec_util::check_header(&mut input, ENTRY_CODEC, VERSION_START, VERSION_CURRENT)?;
        let num_entries = input.read_vint()?;
        if num_entries < 0 {
            bail!(CorruptIndex(format!(
                "invalid entry count: {} (resource={})",
                num_entries, entries_file_name
            )));
        }
        let mut mappings = HashMap::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let id = input.read_string()?;
            let offset = input.read_long()?;
            let length = input.read_long()?;
            if mappings
                .insert(id.clone(), FileEntry { offset, length })
                .is_some()
            {
                bail!(CorruptIndex(format!(
                    "duplicate cfs entry id={} (resource={})",
                    id, entries_file_name
                )));
            }
        }
        if version >= VERSION_CHECKSUM {
            codec_util::check_footer(&mut input)?;
        } else {
            codec_util::check_eof(&input)?;
        }
        Ok((version, mappings))
    }

    /// Opens sub-file `name` as an independent slice of the container.
    pub fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let id = strip_segment_name(name);
        match self.entries.get(id) {
            Some(entry) => self.input.slice(name, entry.offset, entry.length),
            None => bail!(IllegalArgument(format!(
                "no sub-file with id {} found in compound file \"{}\" (file name={})",
                id, self.name, name
            ))),
        }
    }

    pub fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .map(|id| format!("{}{}", self.segment, id))
            .collect();
        names.sort();
        names
    }

    pub fn file_length(&self, name: &str) -> Result<i64> {
        match self.entries.get(strip_segment_name(name)) {
            Some(entry) => Ok(entry.length),
            None => bail!(IllegalArgument(format!(
                "file {} does not exist in {}",
                name, self.name
            ))),
        }
    }

    pub fn check_integrity(&self) -> Result<()> {
        if self.version >= VERSION_CHECKSUM {
            codec_util::checksum_entire_file(self.input.as_ref())?;
        }
        Ok(())
    }
}

impl fmt::Display for CompoundFileReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CompoundFileReader({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::directory::RAMDirectory;

    #[test]
    fn test_write_and_slice() {
        let dir = Arc::new(RAMDirectory::new());
        let ctx = IOContext::Default;
        let mut cfw = CompoundFileWriter::new(Arc::clone(&dir), "_0", "dv", &ctx).unwrap();
        cfw.add_file("_0_1_dv.dat", b"hello").unwrap();
        cfw.add_file("_0_1_dv.idx", b"").unwrap();
        cfw.add_file("_0_2_dv.dat", b"world!").unwrap();
        assert!(cfw.add_file("_0_2_dv.dat", b"again").is_err());
        // a failed write aborts the whole container
        assert!(!dir.file_exists("_0_dv.cfs"));

        let mut cfw = CompoundFileWriter::new(Arc::clone(&dir), "_0", "dv", &ctx).unwrap();
        cfw.add_file("_0_1_dv.dat", b"hello").unwrap();
        cfw.add_file("_0_2_dv.dat", b"world!").unwrap();
        cfw.close().unwrap();

        let reader = CompoundFileReader::open(dir.as_ref(), "_0", "dv", &ctx).unwrap();
        assert_eq!(reader.list_all(), vec!["_0_1_dv.dat", "_0_2_dv.dat"]);
        assert_eq!(reader.file_length("_0_2_dv.dat").unwrap(), 6);

        let mut input = reader.open_input("_0_2_dv.dat").unwrap();
        let mut buf = vec![0u8; 6];
        input.read_bytes(&mut buf, 0, 6).unwrap();
        assert_eq!(&buf, b"world!");
        assert!(input.read_byte().is_err());
        assert!(reader.open_input("_0_3_dv.dat").is_err());
        reader.check_integrity().unwrap();
    }

    #[test]
    fn test_entry_past_end_is_corrupt() {
        let dir = Arc::new(RAMDirectory::new());
        {
            let mut data = dir.create_output("_0.cfs", &IOContext::Flush).unwrap();
            codec_util::write_header(&mut data, DATA_CODEC, VERSION_START).unwrap();
            data.write_bytes(b"abc", 0, 3).unwrap();

            let mut entries = dir.create_output("_0.cfe", &IOContext::Flush).unwrap();
            codec_util::write_header(&mut entries, ENTRY_CODEC, VERSION_START).unwrap();
            entries.write_vint(1).unwrap();
            entries.write_string(".fdt").unwrap();
            entries.write_long(i64::max_value() - 1).unwrap();
            entries.write_long(3).unwrap();
        }
        let err = CompoundFileReader::open(dir.as_ref(), "_0", "", &IOContext::Read)
            .err()
            .unwrap();
        match *err.kind() {
            CorruptIndex(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
    }
}
