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


use core::store::directory::Directory;

/// Deletes all given files, suppressing all Errors.
pub fn delete_files_ignoring_errors<D: Directory + ?Sized>(dir: &D, files: &[String]) {
    for name in files {
        delete_file_ignoring_error(dir, name);
    }
}

pub fn delete_file_ignoring_error<D: Directory + ?Sized>(dir: &D, file: &str) {
    if let Err(e) = dir.delete_file(file) {
        warn!("delete file '{}' failed by '{:?}'", file, e);
    }
}
