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


use error::ErrorKind::IndexOutOfBounds;
use error::Result;

use std::sync::Arc;

/// Interface for Bitset-like structures.
pub trait Bits: Send + Sync {
    fn get(&self, index: usize) -> Result<bool>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BitsRef = Arc<dyn Bits>;

/// Bits impl of the specified length with all bits set.
#[derive(Clone)]
pub struct MatchAllBits {
    len: usize,
}

impl MatchAllBits {
    pub fn new(len: usize) -> Self {
        MatchAllBits { len }
    }
}

impl Bits for MatchAllBits {
    fn get(&self, index: usize) -> Result<bool> {
        if index >= self.len {
            bail!(IndexOutOfBounds(format!(
                "bit index {} out of bounds for length {}",
                index, self.len
            )));
        }
        Ok(true)
    }

    fn len(&self) -> usize {
        self.len
    }
}
