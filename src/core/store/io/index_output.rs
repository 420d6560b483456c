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


use core::store::io::DataOutput;

use error::Result;

/// Trait for output to a file in a Directory.
///
/// A random-access output stream.  Used for all Lucene index output operations.
pub trait IndexOutput: DataOutput {
    fn name(&self) -> &str;
    fn file_pointer(&self) -> i64;
    fn checksum(&self) -> Result<i64>;
}

impl<'a, T: IndexOutput + ?Sized> IndexOutput for &'a mut T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn file_pointer(&self) -> i64 {
        (**self).file_pointer()
    }

    fn checksum(&self) -> Result<i64> {
        (**self).checksum()
    }
}

impl<'a, T: IndexOutput + ?Sized> DataOutput for &'a mut T {}
