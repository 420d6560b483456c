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

use error::Result;

/// Abstract base trait for input from a file in a `Directory`.
///
/// A random-access input stream. Every decoding cursor owns its own input:
/// `duplicate` hands out an independent cursor over the same bytes, so
/// concurrent readers never share a seek position.
pub trait IndexInput: DataInput + Send + Sync {
    /// Returns a new cursor over the same underlying bytes, positioned where
    /// this one currently is.
    fn duplicate(&self) -> Result<Box<dyn IndexInput>>;

    fn file_pointer(&self) -> i64;
    fn seek(&mut self, pos: i64) -> Result<()>;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn name(&self) -> &str;

    /// Creates a slice of this index input, with the given description, offset,
    /// and length. The slice is seeked to the beginning.
    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>>;
}
