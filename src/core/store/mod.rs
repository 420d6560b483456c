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


pub mod directory;
pub mod io;

/// IOContext holds additional details on the merge/search context. A IOContext
/// object can never be initialized as null as passed as a parameter to either
/// `Directory::open_input()` or `Directory::create_output()`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IOContext {
    Default,
    /// The file will be read once, sequentially, e.g. for a checksum pass.
    ReadOnce,
    Read,
    Flush,
    Merge,
}

impl Default for IOContext {
    fn default() -> Self {
        IOContext::Default
    }
}

impl IOContext {
    pub fn is_merge(self) -> bool {
        self == IOContext::Merge
    }
}
