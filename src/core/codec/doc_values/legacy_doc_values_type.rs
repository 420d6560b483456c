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


use core::index::DocValuesType;

use error::ErrorKind::CorruptIndex;
use error::Result;

use std::collections::HashMap;
use std::fmt;

/// Field attribute recording the on-disk doc values type of a field.
pub const LEGACY_DV_TYPE_KEY: &str = "Lucene40FieldInfosReader.dvtype";
/// Field attribute recording the on-disk norms type of a field.
pub const LEGACY_NORM_TYPE_KEY: &str = "Lucene40FieldInfosReader.normtype";

/// The doc values types of the 4.0 index format.
///
/// The discriminant is the nibble stored in the field infos file, so the
/// order of the variants must never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LegacyDocValuesType {
    None = 0,
    VarInts = 1,
    Float32 = 2,
    Float64 = 3,
    BytesFixedStraight = 4,
    BytesFixedDeref = 5,
    BytesVarStraight = 6,
    BytesVarDeref = 7,
    FixedInts16 = 8,
    FixedInts32 = 9,
    FixedInts64 = 10,
    FixedInts8 = 11,
    BytesFixedSorted = 12,
    BytesVarSorted = 13,
}

const ALL_TYPES: [LegacyDocValuesType; 14] = [
    LegacyDocValuesType::None,
    LegacyDocValuesType::VarInts,
    LegacyDocValuesType::Float32,
    LegacyDocValuesType::Float64,
    LegacyDocValuesType::BytesFixedStraight,
    LegacyDocValuesType::BytesFixedDeref,
    LegacyDocValuesType::BytesVarStraight,
    LegacyDocValuesType::BytesVarDeref,
    LegacyDocValuesType::FixedInts16,
    LegacyDocValuesType::FixedInts32,
    LegacyDocValuesType::FixedInts64,
    LegacyDocValuesType::FixedInts8,
    LegacyDocValuesType::BytesFixedSorted,
    LegacyDocValuesType::BytesVarSorted,
];

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, LegacyDocValuesType> = {
        let mut m = HashMap::with_capacity(ALL_TYPES.len());
        for t in ALL_TYPES.iter() {
            m.insert(t.name(), *t);
        }
        m
    };
}

impl LegacyDocValuesType {
    /// Decodes the nibble stored in the field infos file.
    pub fn from_ordinal(ordinal: u8) -> Result<LegacyDocValuesType> {
        match ALL_TYPES.get(ordinal as usize) {
            Some(t) => Ok(*t),
            None => bail!(CorruptIndex(format!(
                "invalid legacy doc values type: {}",
                ordinal
            ))),
        }
    }

    /// Looks a type up by the name stored in a field attribute.
    pub fn from_name(name: &str) -> Result<LegacyDocValuesType> {
        match BY_NAME.get(name) {
            Some(t) => Ok(*t),
            None => bail!(CorruptIndex(format!(
                "invalid legacy doc values type name: {}",
                name
            ))),
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            LegacyDocValuesType::None => "NONE",
            LegacyDocValuesType::VarInts => "VAR_INTS",
            LegacyDocValuesType::Float32 => "FLOAT_32",
            LegacyDocValuesType::Float64 => "FLOAT_64",
            LegacyDocValuesType::BytesFixedStraight => "BYTES_FIXED_STRAIGHT",
            LegacyDocValuesType::BytesFixedDeref => "BYTES_FIXED_DEREF",
            LegacyDocValuesType::BytesVarStraight => "BYTES_VAR_STRAIGHT",
            LegacyDocValuesType::BytesVarDeref => "BYTES_VAR_DEREF",
            LegacyDocValuesType::FixedInts16 => "FIXED_INTS_16",
            LegacyDocValuesType::FixedInts32 => "FIXED_INTS_32",
            LegacyDocValuesType::FixedInts64 => "FIXED_INTS_64",
            LegacyDocValuesType::FixedInts8 => "FIXED_INTS_8",
            LegacyDocValuesType::BytesFixedSorted => "BYTES_FIXED_SORTED",
            LegacyDocValuesType::BytesVarSorted => "BYTES_VAR_SORTED",
        }
    }

    /// The doc values type this legacy type is exposed as.
    pub fn mapping(self) -> DocValuesType {
        match self {
            LegacyDocValuesType::None => DocValuesType::Null,
            LegacyDocValuesType::VarInts
            | LegacyDocValuesType::Float32
            | LegacyDocValuesType::Float64 => DocValuesType::Numeric,
            LegacyDocValuesType::BytesFixedStraight
            | LegacyDocValuesType::BytesFixedDeref
            | LegacyDocValuesType::BytesVarStraight
            | LegacyDocValuesType::BytesVarDeref => DocValuesType::Binary,
            LegacyDocValuesType::FixedInts16
            | LegacyDocValuesType::FixedInts32
            | LegacyDocValuesType::FixedInts64
            | LegacyDocValuesType::FixedInts8 => DocValuesType::Numeric,
            LegacyDocValuesType::BytesFixedSorted | LegacyDocValuesType::BytesVarSorted => {
                DocValuesType::Sorted
            }
        }
    }
}

impl fmt::Display for LegacyDocValuesType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let expected = [
            DocValuesType::Null,
            DocValuesType::Numeric,
            DocValuesType::Numeric,
            DocValuesType::Numeric,
            DocValuesType::Binary,
            DocValuesType::Binary,
            DocValuesType::Binary,
            DocValuesType::Binary,
            DocValuesType::Numeric,
            DocValuesType::Numeric,
            DocValuesType::Numeric,
            DocValuesType::Numeric,
            DocValuesType::Sorted,
            DocValuesType::Sorted,
        ];
        for (i, dv) in expected.iter().enumerate() {
            let t = LegacyDocValuesType::from_ordinal(i as u8).unwrap();
            assert_eq!(t.ordinal() as usize, i);
            assert_eq!(t.mapping(), *dv);
            assert_eq!(LegacyDocValuesType::from_name(t.name()).unwrap(), t);
        }
        assert!(LegacyDocValuesType::from_ordinal(14).is_err());
        assert!(LegacyDocValuesType::from_name("SORTED_SET").is_err());
    }
}
