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


use std::collections::HashMap;
use std::sync::Arc;

use core::codec::doc_values::{
    DocValuesConsumer, DocValuesProducer, LegacyDocValuesType, Lucene40DocValuesReader,
    Lucene40DocValuesWriter, NumericDocValues, LEGACY_NORM_TYPE_KEY,
};
use core::codec::norms::{NormsConsumer, NormsProducer, NORMS_CONTAINER};
use core::index::{FieldInfo, SegmentReadState, SegmentWriteState};
use core::store::directory::Directory;

use error::Result;

/// Encodes/decodes per-document score normalization values.
pub trait NormsFormat {
    type Writer<D: Directory>: NormsConsumer;
    type Reader: NormsProducer;

    fn norms_consumer<D: Directory>(&self, state: &SegmentWriteState<D>) -> Result<Self::Writer<D>>;

    fn norms_producer<D: Directory>(&self, state: &SegmentReadState<D>) -> Result<Self::Reader>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Lucene40NormsFormat;

impl NormsFormat for Lucene40NormsFormat {
    type Writer<D: Directory> = Lucene40NormsWriter<D>;
    type Reader = Lucene40NormsReader;

    fn norms_consumer<D: Directory>(
        &self,
        state: &SegmentWriteState<D>,
    ) -> Result<Lucene40NormsWriter<D>> {
        let writer = Lucene40DocValuesWriter::new(state, NORMS_CONTAINER, LEGACY_NORM_TYPE_KEY)?;
        Ok(Lucene40NormsWriter { writer })
    }

    fn norms_producer<D: Directory>(&self, state: &SegmentReadState<D>) -> Result<Lucene40NormsReader> {
        let reader = Lucene40DocValuesReader::open(
            state.directory.as_ref(),
            state.segment_info,
            NORMS_CONTAINER,
            LEGACY_NORM_TYPE_KEY,
            state.context,
        )?;
        Ok(Lucene40NormsReader { reader })
    }
}

pub struct Lucene40NormsWriter<D: Directory> {
    writer: Lucene40DocValuesWriter<D>,
}

impl<D: Directory> Lucene40NormsWriter<D> {
    /// The legacy norm type chosen for every field written so far.
    pub fn legacy_types(&self) -> &HashMap<i32, LegacyDocValuesType> {
        self.writer.legacy_types()
    }

    pub fn files(&self) -> Vec<String> {
        self.writer.files()
    }
}

impl<D: Directory> NormsConsumer for Lucene40NormsWriter<D> {
    fn add_norms_field(&mut self, field: &FieldInfo, values: &[Option<i64>]) -> Result<()> {
        self.writer.add_numeric_field(field, values)
    }

    fn close(&mut self) -> Result<()> {
        self.writer.close()
    }

    fn abort(&mut self) {
        self.writer.abort()
    }
}

pub struct Lucene40NormsReader {
    reader: Lucene40DocValuesReader,
}

impl NormsProducer for Lucene40NormsReader {
    fn norms(&self, field: &FieldInfo) -> Result<Arc<dyn NumericDocValues>> {
        self.reader.get_numeric(field)
    }

    fn check_integrity(&self) -> Result<()> {
        self.reader.check_integrity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::compound::CompoundFileReader;
    use core::codec::field_infos::with_legacy_types;
    use core::index::{DocValuesType, FieldInfos, IndexOptions, SegmentInfo, LUCENE40_VERSION};
    use core::store::directory::RAMDirectory;
    use core::store::IOContext;

    fn text_field(name: &str, number: i32) -> FieldInfo {
        FieldInfo::new(
            name.to_string(),
            number,
            false,
            false,
            false,
            IndexOptions::DocsAndFreqsAndPositions,
            DocValuesType::Null,
            DocValuesType::Numeric,
            HashMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_norms_round_trip() {
        let dir = Arc::new(RAMDirectory::new());
        let si = SegmentInfo::new(
            LUCENE40_VERSION,
            "_0",
            3,
            false,
            HashMap::new(),
            HashMap::new(),
        )
        .unwrap();
        let infos = Arc::new(
            FieldInfos::new(vec![text_field("title", 0), text_field("body", 1)]).unwrap(),
        );
        let state = SegmentWriteState::new(
            Arc::clone(&dir),
            si.clone(),
            Arc::clone(&infos),
            IOContext::Flush,
            String::new(),
        );
        let format = Lucene40NormsFormat;
        let mut writer = format.norms_consumer(&state).unwrap();
        writer
            .add_norms_field(infos.field_info_by_number(0).unwrap(), &[Some(124), None, Some(-3)])
            .unwrap();
        writer
            .add_norms_field(infos.field_info_by_number(1).unwrap(), &[Some(1), Some(2), Some(3)])
            .unwrap();
        writer.close().unwrap();
        assert_eq!(
            writer.files(),
            vec!["_0_nrm.cfs".to_string(), "_0_nrm.cfe".to_string()]
        );
        assert_eq!(
            writer.legacy_types().get(&0),
            Some(&LegacyDocValuesType::FixedInts8)
        );

        // entries are named like doc values entries
        let compound =
            CompoundFileReader::open(dir.as_ref(), "_0", NORMS_CONTAINER, &IOContext::Read).unwrap();
        assert_eq!(
            compound.list_all(),
            vec!["_0_0_dv.dat".to_string(), "_0_1_dv.dat".to_string()]
        );

        let infos = with_legacy_types(&infos, &HashMap::new(), writer.legacy_types()).unwrap();
        let read_state = SegmentReadState::new(
            Arc::clone(&dir),
            &si,
            Arc::new(infos.clone()),
            &IOContext::Read,
            String::new(),
        );
        let reader = format.norms_producer(&read_state).unwrap();
        let title = reader.norms(infos.field_info_by_name("title").unwrap()).unwrap();
        assert_eq!(title.get(0).unwrap(), 124);
        assert_eq!(title.get(1).unwrap(), 0);
        assert_eq!(title.get(2).unwrap(), -3);
        let body = reader.norms(infos.field_info_by_name("body").unwrap()).unwrap();
        assert_eq!(body.get(2).unwrap(), 3);
        reader.check_integrity().unwrap();
    }
}
