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
use std::fs;
use std::path::{Path, PathBuf};

use core::store::directory::Directory;
use core::store::io::{ByteBufferIndexInput, FSIndexOutput, IndexInput, ReadOnlySource};
use core::store::IOContext;
use error::ErrorKind::{IllegalArgument, IllegalState};
use error::Result;

/// A straightforward `Directory` implementation on top of `std::fs`.
///
/// Reads are served from memory mapped files, so `open_input` is cheap and
/// every duplicated cursor shares the same mapping.
pub struct FSDirectory {
    pub directory: PathBuf,
}

impl FSDirectory {
    pub fn with_path<T: AsRef<Path> + ?Sized>(directory: &T) -> Result<Self> {
        Self::new(directory)
    }

    pub fn new<T: AsRef<Path> + ?Sized>(directory: &T) -> Result<FSDirectory> {
        let directory = directory.as_ref();
        if !Path::exists(directory) {
            fs::create_dir_all(directory)?;
            info!("created index directory {:?}", directory);
        } else if !Path::is_dir(directory) {
            bail!(IllegalState(format!(
                "Path {:?} exists but is not directory",
                directory
            )))
        }

        Ok(FSDirectory {
            directory: From::from(directory),
        })
    }

    fn fsync(&self, path: &Path, is_dir: bool) -> Result<()> {
        // directories must be opened read-only, regular files need write access
        // for the fsync to have an effect.
        let file = if is_dir {
            fs::File::open(path)?
        } else {
            fs::OpenOptions::new().append(true).open(path)?
        };
        file.sync_all()?;
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl Directory for FSDirectory {
    type IndexOutput = FSIndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if let Ok(filename) = entry.file_name().into_string() {
                result.push(filename);
            }
        }
        result.sort();
        Ok(result)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        let path = self.resolve(name);
        let meta = fs::metadata(&path)?;
        if meta.is_dir() {
            bail!(IllegalState(format!(
                "file_length called for directory: {}",
                path.display()
            )))
        } else {
            Ok(meta.len() as i64)
        }
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn create_output(&self, name: &str, _context: &IOContext) -> Result<Self::IndexOutput> {
        let path = self.resolve(name);
        FSIndexOutput::new(name.to_string(), &path)
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        let source = ReadOnlySource::mmap(self.resolve(name))?;
        Ok(Box::new(ByteBufferIndexInput::new(name, source)))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.resolve(name);
        fs::remove_file(&path)?;
        debug!("deleted {:?}", path);
        Ok(())
    }

    fn sync(&self, names: &HashSet<String>) -> Result<()> {
        for name in names {
            let path = self.resolve(name);
            self.fsync(&path, false)?;
        }
        Ok(())
    }

    fn sync_meta_data(&self) -> Result<()> {
        self.fsync(&self.directory, true)
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let dest_path = self.resolve(dest);
        if dest_path.exists() {
            bail!(IllegalArgument(format!(
                "cannot rename {} to {}: destination exists",
                source, dest
            )));
        }
        fs::rename(self.resolve(source), &dest_path)?;
        info!("renamed {} to {} in {:?}", source, dest, self.directory);
        Ok(())
    }
}

impl fmt::Display for FSDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FSDirectory({})", self.directory.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::DataOutput;
    use std::io::Write;
    use tempfile;

    #[test]
    fn test_write_read_rename_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FSDirectory::new(tmp.path()).unwrap();
        {
            let mut out = dir.create_output("_0.tmp", &IOContext::Flush).unwrap();
            out.write_int(7).unwrap();
            out.write_string("seven").unwrap();
            out.flush().unwrap();
        }
        dir.rename("_0.tmp", "_0.dat").unwrap();
        assert_eq!(dir.list_all().unwrap(), vec!["_0.dat".to_string()]);
        assert_eq!(dir.file_length("_0.dat").unwrap(), 10);

        let mut input = dir.open_input("_0.dat", &IOContext::Read).unwrap();
        assert_eq!(input.read_int().unwrap(), 7);
        assert_eq!(input.read_string().unwrap(), "seven");

        dir.delete_file("_0.dat").unwrap();
        assert!(!dir.file_exists("_0.dat"));
    }
}
