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


use std::fmt;

/// The value of a stored field, as written to the stored fields data file.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredFieldValue {
    String(String),
    Binary(Vec<u8>),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl StoredFieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredFieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StoredFieldValue::Binary(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            StoredFieldValue::Int(v) => Some(i64::from(v)),
            StoredFieldValue::Long(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for StoredFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoredFieldValue::String(s) => write!(f, "{}", s),
            StoredFieldValue::Binary(b) => write!(f, "{:?}", b),
            StoredFieldValue::Int(v) => write!(f, "{}", v),
            StoredFieldValue::Long(v) => write!(f, "{}", v),
            StoredFieldValue::Float(v) => write!(f, "{}", v),
            StoredFieldValue::Double(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredField {
    pub name: String,
    pub value: StoredFieldValue,
}

impl StoredField {
    pub fn new(name: &str, value: StoredFieldValue) -> StoredField {
        StoredField {
            name: name.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
