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


use core::index::FieldInfo;

use error::Result;

/// Enumeration of possible return values for `StoredFieldVisitor::needs_field`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The field should be visited.
    YES,
    /// The field should be skipped.
    NO,
    /// Stop visiting fields of this document.
    STOP,
}

/// Expert: provides a low-level means of accessing the stored field
/// values in an index.
///
/// The reader asks `needs_field` first, and only decodes values the visitor
/// accepts. Skipped values are stepped over without being materialized.
pub trait StoredFieldVisitor {
    fn binary_field(&mut self, field_info: &FieldInfo, value: Vec<u8>) -> Result<()>;
    fn string_field(&mut self, field_info: &FieldInfo, value: Vec<u8>) -> Result<()>;
    fn int_field(&mut self, field_info: &FieldInfo, value: i32) -> Result<()>;
    fn long_field(&mut self, field_info: &FieldInfo, value: i64) -> Result<()>;
    fn float_field(&mut self, field_info: &FieldInfo, value: f32) -> Result<()>;
    fn double_field(&mut self, field_info: &FieldInfo, value: f64) -> Result<()>;

    fn needs_field(&self, field_info: &FieldInfo) -> Status;
}
