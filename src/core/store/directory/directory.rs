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
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use core::store::io::{BufferedChecksumIndexInput, DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use error::Result;

/// A Directory is a flat list of files.
///
/// Files may be written once, when they are created.  Once a file is created it may only
/// be opened for read, or deleted.  Random access is permitted both when reading and writing.
pub trait Directory: fmt::Display + Send + Sync {
    type IndexOutput: IndexOutput;

    /// Returns the names of all entries in the directory, sorted.
    fn list_all(&self) -> Result<Vec<String>>;

    /// Returns the length of a file in the directory.
    fn file_length(&self, name: &str) -> Result<i64>;

    fn file_exists(&self, name: &str) -> bool {
        self.list_all()
            .map(|files| files.iter().any(|f| f == name))
            .unwrap_or(false)
    }

    /// Creates a new, empty file in the directory with the given name.
    /// Returns a stream writing this file.
    fn create_output(&self, name: &str, context: &IOContext) -> Result<Self::IndexOutput>;

    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>>;

    fn open_checksum_input(
        &self,
        name: &str,
        ctx: &IOContext,
    ) -> Result<BufferedChecksumIndexInput> {
        let input = self.open_input(name, ctx)?;
        Ok(BufferedChecksumIndexInput::new(input))
    }

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Ensure that any writes to these files are moved to
    /// stable storage.
    fn sync(&self, names: &HashSet<String>) -> Result<()>;

    /// Ensure that directory metadata, such as recent file renames, are made durable.
    fn sync_meta_data(&self) -> Result<()>;

    /// Renames `source` to `dest`. `dest` must not already exist, the rename
    /// is atomic with respect to readers listing the directory.
    fn rename(&self, source: &str, dest: &str) -> Result<()>;

    fn copy_from<D: Directory>(
        &self,
        from: &Arc<D>,
        src: &str,
        dest: &str,
        ctx: &IOContext,
    ) -> Result<()> {
        let mut is = from.open_input(src, ctx)?;
        let mut os = self.create_output(dest, ctx)?;

        let length = is.len();
        os.copy_bytes(is.as_mut(), length as usize)?;
        os.flush()?;
        Ok(())
    }
}
