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


//! Norms in the 4.0 layout: a numeric doc values column per field, stored in
//! the `nrm` compound container.

mod norms_format;

pub use self::norms_format::*;

use std::sync::Arc;

use core::codec::doc_values::NumericDocValues;
use core::index::FieldInfo;

use error::Result;

/// Container suffix of the norms compound file, `_0_nrm.cfs`.
pub const NORMS_CONTAINER: &str = "nrm";

/// Reads the norms of one segment.
pub trait NormsProducer: Send + Sync {
    /// Returns the norms of `field`, one value per document.
    fn norms(&self, field: &FieldInfo) -> Result<Arc<dyn NumericDocValues>>;

    fn check_integrity(&self) -> Result<()>;
}

/// Writes the norms of one segment.
pub trait NormsConsumer {
    /// `values` holds one entry per document; `None` is written as 0.
    fn add_norms_field(&mut self, field: &FieldInfo, values: &[Option<i64>]) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn abort(&mut self);
}
