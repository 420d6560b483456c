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


mod stored_fields_format;

pub use self::stored_fields_format::*;

mod stored_fields_writer;

pub use self::stored_fields_writer::*;

mod stored_fields_reader;

pub use self::stored_fields_reader::*;

/// Extension of stored fields file
pub const FIELDS_EXTENSION: &str = "fdt";
/// Extension of stored fields index file
pub const FIELDS_INDEX_EXTENSION: &str = "fdx";

pub const CODEC_NAME_IDX: &str = "Lucene40StoredFieldsIndex";
pub const CODEC_NAME_DAT: &str = "Lucene40StoredFieldsData";

pub const VERSION_START: i32 = 0;
/// Both files end with a checksum footer.
pub const VERSION_CHECKSUM: i32 = 1;
pub const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

pub const FIELD_IS_BINARY: u8 = 1 << 1;

// the old bit 1 << 2 was compressed, is now left out

const NUMERIC_BIT_SHIFT: u8 = 3;
pub const FIELD_IS_NUMERIC_MASK: u8 = 0x07 << NUMERIC_BIT_SHIFT;

pub const FIELD_IS_NUMERIC_INT: u8 = 1 << NUMERIC_BIT_SHIFT;
pub const FIELD_IS_NUMERIC_LONG: u8 = 2 << NUMERIC_BIT_SHIFT;
pub const FIELD_IS_NUMERIC_FLOAT: u8 = 3 << NUMERIC_BIT_SHIFT;
pub const FIELD_IS_NUMERIC_DOUBLE: u8 = 4 << NUMERIC_BIT_SHIFT;

/// Maximum number of contiguous documents to bulk-copy when merging
/// stored fields.
pub const MAX_RAW_MERGE_DOCS: usize = 4192;
