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


use core::index::{DocValuesType, IndexOptions};

use error::ErrorKind::IllegalArgument;
use error::Result;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::result;
use std::sync::Arc;

/// Access to the Field Info file that describes document fields and whether or
/// not they are indexed. Each segment has a separate Field Info file.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub number: i32,
    pub doc_values_type: DocValuesType,
    pub norms_type: DocValuesType,
    pub has_store_term_vector: bool,
    pub omit_norms: bool,
    pub index_options: IndexOptions,
    pub has_store_payloads: bool,
    pub attributes: HashMap<String, String>,
}

impl FieldInfo {
    /// Builds a field info, normalizing flags that make no sense for the
    /// given index options: non-indexed fields never keep term vectors,
    /// payloads or norms, and fields without positions never keep payloads.
    pub fn new(
        name: String,
        number: i32,
        store_term_vector: bool,
        omit_norms: bool,
        store_payloads: bool,
        index_options: IndexOptions,
        doc_values_type: DocValuesType,
        norms_type: DocValuesType,
        attributes: HashMap<String, String>,
    ) -> Result<FieldInfo> {
        if number < 0 {
            bail!(IllegalArgument(format!(
                "illegal field number: {} for field {}",
                number, name
            )));
        }
        if doc_values_type == DocValuesType::SortedSet {
            debug!("field {} uses sorted set doc values", name);
        }
        let info = if index_options.has_docs() {
            FieldInfo {
                name,
                number,
                doc_values_type,
                norms_type: if omit_norms {
                    DocValuesType::Null
                } else {
                    norms_type
                },
                has_store_term_vector: store_term_vector,
                omit_norms,
                index_options,
                has_store_payloads: store_payloads && index_options.has_positions(),
                attributes,
            }
        } else {
            FieldInfo {
                name,
                number,
                doc_values_type,
                norms_type: DocValuesType::Null,
                has_store_term_vector: false,
                omit_norms: false,
                index_options,
                has_store_payloads: false,
                attributes,
            }
        };
        Ok(info)
    }

    pub fn is_indexed(&self) -> bool {
        self.index_options.has_docs()
    }

    pub fn has_norms(&self) -> bool {
        !self.norms_type.null()
    }

    pub fn has_doc_values(&self) -> bool {
        !self.doc_values_type.null()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn put_attribute(&mut self, key: String, value: String) -> Option<String> {
        self.attributes.insert(key, value)
    }
}

impl fmt::Display for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

pub type FieldInfoRef = Arc<FieldInfo>;

/// Collection of `FieldInfo`s (accessible by number or by name).
#[derive(Clone, Debug)]
pub struct FieldInfos {
    pub has_freq: bool,
    pub has_prox: bool,
    pub has_payloads: bool,
    pub has_offsets: bool,
    pub has_vectors: bool,
    pub has_norms: bool,
    pub has_doc_values: bool,

    pub by_number: BTreeMap<i32, FieldInfoRef>,
    pub by_name: HashMap<String, FieldInfoRef>,
}

impl Serialize for FieldInfos {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("FieldInfos", 8)?;
        s.serialize_field("has_freq", &self.has_freq)?;
        s.serialize_field("has_prox", &self.has_prox)?;
        s.serialize_field("has_payloads", &self.has_payloads)?;
        s.serialize_field("has_offsets", &self.has_offsets)?;
        s.serialize_field("has_vectors", &self.has_vectors)?;
        s.serialize_field("has_norms", &self.has_norms)?;
        s.serialize_field("has_doc_values", &self.has_doc_values)?;

        let fields: Vec<&FieldInfo> = self.by_number.values().map(Arc::as_ref).collect();
        s.serialize_field("fields", &fields)?;
        s.end()
    }
}

impl fmt::Display for FieldInfos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

impl FieldInfos {
    pub fn new(infos: Vec<FieldInfo>) -> Result<FieldInfos> {
        let mut has_vectors = false;
        let mut has_prox = false;
        let mut has_payloads = false;
        let mut has_offsets = false;
        let mut has_freq = false;
        let mut has_norms = false;
        let mut has_doc_values = false;

        let mut by_number: BTreeMap<i32, FieldInfoRef> = BTreeMap::new();
        let mut by_name: HashMap<String, FieldInfoRef> = HashMap::new();
        for info in infos {
            let info = Arc::new(info);
            let number = info.number;

            let index_options = info.index_options;
            has_vectors |= info.has_store_term_vector;
            has_prox |= index_options.has_positions();
            has_freq |= index_options.has_freqs();
            has_offsets |= index_options.has_offsets();
            has_norms |= info.has_norms();
            has_doc_values |= info.has_doc_values();
            has_payloads |= info.has_store_payloads;

            if let Some(previous) = by_number.insert(number, Arc::clone(&info)) {
                bail!(IllegalArgument(format!(
                    "duplicate field numbers: {} and {} have: {}",
                    previous.name, info.name, number
                )));
            }

            if let Some(previous) = by_name.insert(info.name.clone(), Arc::clone(&info)) {
                bail!(IllegalArgument(format!(
                    "duplicate field names: {} and {} have: {}",
                    previous.number, number, info.name
                )));
            }
        }
        Ok(FieldInfos {
            has_freq,
            has_prox,
            has_payloads,
            has_offsets,
            has_vectors,
            has_norms,
            has_doc_values,
            by_number,
            by_name,
        })
    }

    pub fn field_info_by_number(&self, field_number: i32) -> Option<&FieldInfo> {
        self.by_number.get(&field_number).map(Arc::as_ref)
    }

    pub fn field_info_by_name(&self, field_name: &str) -> Option<&FieldInfo> {
        self.by_name.get(field_name).map(Arc::as_ref)
    }

    /// Iterates the fields in field number order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

/// Assigns stable field numbers by name while a segment is being built.
///
/// Adding a field twice merges its flags the way a writer widens a field
/// that shows up with richer options in a later document.
#[derive(Default)]
pub struct FieldInfosBuilder {
    by_name: HashMap<String, FieldInfo>,
    next_number: i32,
}

impl FieldInfosBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or widens the field `name`, returning its number.
    pub fn add(
        &mut self,
        name: &str,
        index_options: IndexOptions,
        store_term_vector: bool,
        store_payloads: bool,
        omit_norms: bool,
        doc_values_type: DocValuesType,
    ) -> Result<i32> {
        let norms_type = if index_options.has_docs() && !omit_norms {
            DocValuesType::Numeric
        } else {
            DocValuesType::Null
        };
        if let Some(existing) = self.by_name.get_mut(name) {
            if !existing.doc_values_type.null()
                && !doc_values_type.null()
                && existing.doc_values_type != doc_values_type
            {
                bail!(IllegalArgument(format!(
                    "cannot change DocValues type from {:?} to {:?} for field \"{}\"",
                    existing.doc_values_type, doc_values_type, name
                )));
            }
            let merged = FieldInfo::new(
                existing.name.clone(),
                existing.number,
                existing.has_store_term_vector || store_term_vector,
                existing.omit_norms || omit_norms,
                existing.has_store_payloads || store_payloads,
                existing.index_options.max(index_options),
                if doc_values_type.null() {
                    existing.doc_values_type
                } else {
                    doc_values_type
                },
                if existing.has_norms() {
                    existing.norms_type
                } else {
                    norms_type
                },
                existing.attributes.clone(),
            )?;
            *existing = merged;
            return Ok(existing.number);
        }

        let number = self.next_number;
        self.next_number += 1;
        let info = FieldInfo::new(
            name.to_string(),
            number,
            store_term_vector,
            omit_norms,
            store_payloads,
            index_options,
            doc_values_type,
            norms_type,
            HashMap::new(),
        )?;
        self.by_name.insert(name.to_string(), info);
        Ok(number)
    }

    pub fn finish(self) -> Result<FieldInfos> {
        FieldInfos::new(self.by_name.into_iter().map(|(_, v)| v).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_stable_numbers() {
        let mut builder = FieldInfosBuilder::new();
        let id = builder
            .add("id", IndexOptions::Null, false, false, false, DocValuesType::Null)
            .unwrap();
        let text = builder
            .add("text", IndexOptions::Docs, false, false, false, DocValuesType::Null)
            .unwrap();
        let again = builder
            .add(
                "text",
                IndexOptions::DocsAndFreqsAndPositions,
                true,
                true,
                false,
                DocValuesType::Null,
            )
            .unwrap();
        assert_eq!((id, text, again), (0, 1, 1));

        let infos = builder.finish().unwrap();
        let text = infos.field_info_by_name("text").unwrap();
        assert_eq!(text.index_options, IndexOptions::DocsAndFreqsAndPositions);
        assert!(text.has_store_payloads);
        assert!(text.has_norms());
        assert!(!infos.field_info_by_number(0).unwrap().has_norms());
        assert!(infos.has_prox && infos.has_payloads && infos.has_vectors);
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let a = FieldInfo::new(
            "a".into(),
            1,
            false,
            false,
            false,
            IndexOptions::Docs,
            DocValuesType::Null,
            DocValuesType::Null,
            HashMap::new(),
        )
        .unwrap();
        let mut b = a.clone();
        b.name = "b".into();
        assert!(FieldInfos::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_payloads_need_positions() {
        let info = FieldInfo::new(
            "f".into(),
            0,
            false,
            false,
            true,
            IndexOptions::DocsAndFreqs,
            DocValuesType::Null,
            DocValuesType::Numeric,
            HashMap::new(),
        )
        .unwrap();
        assert!(!info.has_store_payloads);
        assert!(info.has_norms());
    }
}
