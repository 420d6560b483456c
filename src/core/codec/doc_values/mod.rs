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


mod legacy_doc_values_type;

pub use self::legacy_doc_values_type::*;

mod doc_values_format;

pub use self::doc_values_format::*;

mod doc_values_writer;

pub use self::doc_values_writer::*;

mod doc_values_reader;

pub use self::doc_values_reader::*;

use core::index::FieldInfo;
use core::util::{BitsRef, DocId};

use error::Result;

use std::cmp::Ordering;
use std::sync::Arc;

/// Suffix of every entry file inside a doc values or norms container.
pub const SEGMENT_SUFFIX: &str = "dv";
/// Container suffix of the doc values compound file, `_0_dv.cfs`.
pub const DOC_VALUES_CONTAINER: &str = "dv";

pub const DATA_EXTENSION: &str = "dat";
pub const INDEX_EXTENSION: &str = "idx";

pub const VAR_INTS_CODEC_NAME: &str = "PackedInts";
pub const VAR_INTS_VERSION_START: i32 = 0;
pub const VAR_INTS_VERSION_CURRENT: i32 = VAR_INTS_VERSION_START;
pub const VAR_INTS_FIXED_64: u8 = 0x00;
pub const VAR_INTS_PACKED: u8 = 0x01;

pub const INTS_CODEC_NAME: &str = "Ints";
pub const INTS_VERSION_START: i32 = 0;
pub const INTS_VERSION_CURRENT: i32 = INTS_VERSION_START;

pub const FLOATS_CODEC_NAME: &str = "Floats";
pub const FLOATS_VERSION_START: i32 = 0;
pub const FLOATS_VERSION_CURRENT: i32 = FLOATS_VERSION_START;

pub const BYTES_FIXED_STRAIGHT_CODEC_NAME: &str = "FixedStraightBytes";
pub const BYTES_VAR_STRAIGHT_CODEC_NAME_IDX: &str = "VarStraightBytesIdx";
pub const BYTES_VAR_STRAIGHT_CODEC_NAME_DAT: &str = "VarStraightBytesDat";
pub const BYTES_FIXED_DEREF_CODEC_NAME_IDX: &str = "FixedDerefBytesIdx";
pub const BYTES_FIXED_DEREF_CODEC_NAME_DAT: &str = "FixedDerefBytesDat";
pub const BYTES_VAR_DEREF_CODEC_NAME_IDX: &str = "VarDerefBytesIdx";
pub const BYTES_VAR_DEREF_CODEC_NAME_DAT: &str = "VarDerefBytesDat";
pub const BYTES_FIXED_SORTED_CODEC_NAME_IDX: &str = "FixedSortedBytesIdx";
pub const BYTES_FIXED_SORTED_CODEC_NAME_DAT: &str = "FixedSortedBytesDat";
pub const BYTES_VAR_SORTED_CODEC_NAME_IDX: &str = "VarSortedBytesIdx";
pub const BYTES_VAR_SORTED_CODEC_NAME_DAT: &str = "VarSortedBytesDat";
pub const BYTES_VERSION_START: i32 = 0;
pub const BYTES_VERSION_CURRENT: i32 = BYTES_VERSION_START;

/// Longest binary value the var-deref length prefix can describe.
pub const MAX_BINARY_FIELD_LENGTH: usize = (1 << 15) - 2;

/// When returned by next_ord() it means there are no more ordinals for the document.
pub const NO_MORE_ORDS: i64 = -1;

/// A per-document numeric value.
pub trait NumericDocValues: Send + Sync {
    fn get(&self, doc_id: DocId) -> Result<i64>;
}

impl<T: NumericDocValues + ?Sized> NumericDocValues for Box<T> {
    fn get(&self, doc_id: DocId) -> Result<i64> {
        (**self).get(doc_id)
    }
}

/// A per-document byte[] value. Documents without a value return an empty
/// array.
pub trait BinaryDocValues: Send + Sync {
    fn get(&self, doc_id: DocId) -> Result<Vec<u8>>;
}

impl<T: BinaryDocValues + ?Sized> BinaryDocValues for Box<T> {
    fn get(&self, doc_id: DocId) -> Result<Vec<u8>> {
        (**self).get(doc_id)
    }
}

/// A per-document byte[] value deduplicated into a sorted dictionary.
pub trait SortedDocValues: BinaryDocValues {
    /// Returns the ordinal of `doc_id`'s value, or -1 when it has none.
    fn get_ord(&self, doc_id: DocId) -> Result<i32>;

    fn lookup_ord(&self, ord: i32) -> Result<Vec<u8>>;

    fn value_count(&self) -> usize;

    /// if key exists, return its ordinal, else return
    /// - insertion_point - 1.
    fn lookup_term(&self, key: &[u8]) -> Result<i32> {
        let mut low = 0;
        let mut high = self.value_count() as i32 - 1;
        while low <= high {
            let mid = low + (high - low) / 2;
            let term = self.lookup_ord(mid)?;
            match term.as_slice().cmp(key) {
                Ordering::Less => {
                    low = mid + 1;
                }
                Ordering::Greater => {
                    high = mid - 1;
                }
                Ordering::Equal => {
                    return Ok(mid);
                }
            }
        }
        Ok(-(low + 1)) // key not found
    }
}

pub trait SortedSetDocValues: Send + Sync {
    /// positions to the specified document
    fn set_document(&mut self, doc: DocId) -> Result<()>;

    /// Returns the next ordinal for the current document (previously
    /// set by `Self::set_document()`)
    fn next_ord(&mut self) -> Result<i64>;

    /// Retrieves the value for the specified ordinal.
    fn lookup_ord(&self, ord: i64) -> Result<Vec<u8>>;

    /// Returns the number of unique values.
    fn get_value_count(&self) -> usize;
}

/// Reads the doc values of one segment. Columns are loaded on first use and
/// shared afterwards.
pub trait DocValuesProducer: Send + Sync {
    /// Returns `NumericDocValues` for this field.
    fn get_numeric(&self, field_info: &FieldInfo) -> Result<Arc<dyn NumericDocValues>>;

    ///  Returns `BinaryDocValues` for this field.
    fn get_binary(&self, field_info: &FieldInfo) -> Result<Arc<dyn BinaryDocValues>>;

    ///  Returns `SortedDocValues` for this field.
    fn get_sorted(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedDocValues>>;

    ///  Returns `SortedSetDocValues` for this field.
    fn get_sorted_set(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedSetDocValues>>;

    /// Returns a `Bits` at the size of `max_doc`, with turned on bits for each
    /// doc that does have a value for this field.
    fn get_docs_with_field(&self, field_info: &FieldInfo) -> Result<BitsRef>;

    /// Checks consistency of this producer.
    fn check_integrity(&self) -> Result<()>;
}

impl<T: DocValuesProducer + ?Sized> DocValuesProducer for Arc<T> {
    fn get_numeric(&self, field_info: &FieldInfo) -> Result<Arc<dyn NumericDocValues>> {
        (**self).get_numeric(field_info)
    }

    fn get_binary(&self, field_info: &FieldInfo) -> Result<Arc<dyn BinaryDocValues>> {
        (**self).get_binary(field_info)
    }

    fn get_sorted(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedDocValues>> {
        (**self).get_sorted(field_info)
    }

    fn get_sorted_set(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedSetDocValues>> {
        (**self).get_sorted_set(field_info)
    }

    fn get_docs_with_field(&self, field_info: &FieldInfo) -> Result<BitsRef> {
        (**self).get_docs_with_field(field_info)
    }

    fn check_integrity(&self) -> Result<()> {
        (**self).check_integrity()
    }
}

/// Writes the doc values of one segment, one whole column at a time.
///
/// Every slice holds one entry per document of the segment.
pub trait DocValuesConsumer {
    /// `None` is written as 0.
    fn add_numeric_field(&mut self, field_info: &FieldInfo, values: &[Option<i64>]) -> Result<()>;

    /// `None` is written as an empty value.
    fn add_binary_field(&mut self, field_info: &FieldInfo, values: &[Option<&[u8]>])
        -> Result<()>;

    /// `values` is the sorted, deduplicated dictionary; `doc_to_ord` maps
    /// every document to an ordinal into it, or -1 when it has no value.
    fn add_sorted_field(
        &mut self,
        field_info: &FieldInfo,
        values: &[&[u8]],
        doc_to_ord: &[i32],
    ) -> Result<()>;

    /// `doc_to_ord_count[doc]` ordinals of `ords` belong to each document.
    fn add_sorted_set_field(
        &mut self,
        field_info: &FieldInfo,
        values: &[&[u8]],
        doc_to_ord_count: &[usize],
        ords: &[i64],
    ) -> Result<()>;

    /// Writes out everything that was added.
    fn close(&mut self) -> Result<()>;

    /// Drops everything written so far and deletes the files.
    fn abort(&mut self);
}
