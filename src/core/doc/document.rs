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


use core::doc::{StoredField, StoredFieldValue};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Document {
    pub fields: Vec<StoredField>,
}

impl Document {
    pub fn new(fields: Vec<StoredField>) -> Document {
        Document { fields }
    }

    pub fn add(&mut self, field: StoredField) {
        self.fields.push(field);
    }

    /// Returns the value of the first field with the given name.
    pub fn get(&self, name: &str) -> Option<&StoredFieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn get_all(&self, name: &str) -> Vec<&StoredFieldValue> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| &f.value)
            .collect()
    }

    pub fn remove_fields(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
