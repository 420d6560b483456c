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


use std::convert::TryFrom;

use core::codec::doc_values::Lucene40DocValuesFormat;
use core::codec::field_infos::Lucene40FieldInfosFormat;
use core::codec::live_docs::Lucene40LiveDocsFormat;
use core::codec::norms::Lucene40NormsFormat;
use core::codec::postings::Lucene40PostingsFormat;
use core::codec::segment_infos::Lucene40SegmentInfoFormat;
use core::codec::stored_fields::Lucene40StoredFieldsFormat;
use core::codec::term_vectors::Lucene40TermVectorsFormat;
use core::codec::Codec;

use error::{Error, ErrorKind};

pub const LUCENE40_CODEC_NAME: &str = "Lucene40";

/// Reads and writes segments in the 4.0 index format.
#[derive(Clone, Copy, Default)]
pub struct Lucene40Codec {
    postings_format: Lucene40PostingsFormat,
    doc_values_format: Lucene40DocValuesFormat,
    stored_fields_format: Lucene40StoredFieldsFormat,
    term_vectors_format: Lucene40TermVectorsFormat,
    field_infos_format: Lucene40FieldInfosFormat,
    segment_info_format: Lucene40SegmentInfoFormat,
    norms_format: Lucene40NormsFormat,
    live_docs_format: Lucene40LiveDocsFormat,
}

impl Lucene40Codec {
    /// Returns a codec that writes postings with the given format
    /// parameters. Everything else keeps its default.
    pub fn with_postings_format(postings_format: Lucene40PostingsFormat) -> Lucene40Codec {
        Lucene40Codec {
            postings_format,
            ..Default::default()
        }
    }
}

impl Codec for Lucene40Codec {
    type PostingFmt = Lucene40PostingsFormat;
    type DVFmt = Lucene40DocValuesFormat;
    type StoredFmt = Lucene40StoredFieldsFormat;
    type TVFmt = Lucene40TermVectorsFormat;
    type FieldFmt = Lucene40FieldInfosFormat;
    type SegmentFmt = Lucene40SegmentInfoFormat;
    type NormFmt = Lucene40NormsFormat;
    type LiveDocFmt = Lucene40LiveDocsFormat;

    fn name(&self) -> &str {
        LUCENE40_CODEC_NAME
    }

    fn postings_format(&self) -> Self::PostingFmt {
        self.postings_format
    }

    fn doc_values_format(&self) -> Self::DVFmt {
        self.doc_values_format
    }

    fn stored_fields_format(&self) -> Self::StoredFmt {
        self.stored_fields_format
    }

    fn term_vectors_format(&self) -> Self::TVFmt {
        self.term_vectors_format
    }

    fn field_infos_format(&self) -> Self::FieldFmt {
        self.field_infos_format
    }

    fn segment_info_format(&self) -> Self::SegmentFmt {
        self.segment_info_format
    }

    fn norms_format(&self) -> Self::NormFmt {
        self.norms_format
    }

    fn live_docs_format(&self) -> Self::LiveDocFmt {
        self.live_docs_format
    }
}

impl TryFrom<String> for Lucene40Codec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.as_str() == LUCENE40_CODEC_NAME {
            Ok(Self::default())
        } else {
            bail!(ErrorKind::CorruptIndex(format!(
                "unknown codec name, expected '{}' got {:?}",
                LUCENE40_CODEC_NAME, value
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;

    use core::codec::codec_for_name;
    use core::codec::doc_values::{DocValuesConsumer, DocValuesFormat, DocValuesProducer};
    use core::codec::field_infos::{with_legacy_types, FieldInfosFormat};
    use core::codec::live_docs::LiveDocsFormat;
    use core::codec::norms::{NormsConsumer, NormsFormat, NormsProducer};
    use core::codec::postings::{PostingsFormat, TermStats};
    use core::codec::segment_infos::SegmentInfoFormat;
    use core::codec::stored_fields::StoredFieldsFormat;
    use core::doc::StoredFieldValue;
    use core::index::{
        DocValuesType, FieldInfo, FieldInfos, Fields, IndexOptions, SegmentCommitInfo,
        SegmentInfo, SegmentReadState, SegmentWriteState, TermIterator, Terms, LUCENE40_VERSION,
    };
    use core::search::{DocIterator, PostingIterator, PostingIteratorFlags, NO_MORE_DOCS};
    use core::store::directory::{Directory, RAMDirectory};
    use core::store::IOContext;
    use core::util::{BitsRef, DocId};

    const IDS: [&str; 3] = ["21", "22", "23"];
    const TEXTS: [&str; 3] = ["aaa", "bbb", "aaa"];

    fn field_infos() -> FieldInfos {
        let id = FieldInfo::new(
            "id".to_string(),
            0,
            false,
            false,
            false,
            IndexOptions::Null,
            DocValuesType::Numeric,
            DocValuesType::Null,
            HashMap::new(),
        )
        .unwrap();
        let text = FieldInfo::new(
            "text".to_string(),
            1,
            false,
            false,
            false,
            IndexOptions::DocsAndFreqs,
            DocValuesType::Null,
            DocValuesType::Numeric,
            HashMap::new(),
        )
        .unwrap();
        FieldInfos::new(vec![id, text]).unwrap()
    }

    fn write_postings(
        codec: &Lucene40Codec,
        state: &SegmentWriteState<RAMDirectory>,
        text: &FieldInfo,
    ) {
        let mut terms: Vec<(&str, Vec<DocId>)> = vec![];
        for &term in &["aaa", "bbb"] {
            let docs = TEXTS
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == term)
                .map(|(doc, _)| doc as DocId)
                .collect();
            terms.push((term, docs));
        }

        let mut writer = codec.postings_format().fields_consumer(state).unwrap();
        writer.add_field(text).unwrap();
        let mut sum_doc_freq = 0i64;
        for (term, docs) in &terms {
            {
                let postings = writer.start_term().unwrap();
                for &doc in docs {
                    postings.start_doc(doc, 1).unwrap();
                    postings.finish_doc().unwrap();
                }
            }
            let doc_freq = docs.len() as i32;
            writer
                .add_term(term.as_bytes(), TermStats::new(doc_freq, i64::from(doc_freq)))
                .unwrap();
            sum_doc_freq += i64::from(doc_freq);
        }
        writer
            .finish_field(sum_doc_freq, sum_doc_freq, TEXTS.len() as i32)
            .unwrap();
        writer.close().unwrap();
    }

    /// Flushes a three document segment with every format of the codec and
    /// returns its commit info.
    fn write_segment(codec: &Lucene40Codec, dir: &Arc<RAMDirectory>) -> SegmentCommitInfo {
        let ctx = IOContext::Flush;
        let mut si = SegmentInfo::new(
            LUCENE40_VERSION,
            "_0",
            IDS.len() as i32,
            false,
            HashMap::new(),
            HashMap::new(),
        )
        .unwrap();
        let infos = Arc::new(field_infos());
        let id = infos.field_info_by_name("id").unwrap();
        let text = infos.field_info_by_name("text").unwrap();
        let state = SegmentWriteState::new(
            Arc::clone(dir),
            si.clone(),
            Arc::clone(&infos),
            ctx,
            String::new(),
        );

        write_postings(codec, &state, text);

        let mut stored = codec
            .stored_fields_format()
            .fields_writer(Arc::clone(dir), &si, &ctx)
            .unwrap();
        for value in &IDS {
            stored.start_document(1).unwrap();
            stored
                .write_field(id, &StoredFieldValue::String(value.to_string()))
                .unwrap();
            stored.finish_document().unwrap();
        }
        stored.finish(IDS.len() as i32).unwrap();

        let mut doc_values = codec.doc_values_format().fields_consumer(&state).unwrap();
        doc_values
            .add_numeric_field(id, &[Some(21), Some(22), Some(23)])
            .unwrap();
        doc_values.close().unwrap();

        let mut norms = codec.norms_format().norms_consumer(&state).unwrap();
        norms
            .add_norms_field(text, &[Some(120), Some(120), Some(120)])
            .unwrap();
        norms.close().unwrap();

        let infos = with_legacy_types(&infos, doc_values.legacy_types(), norms.legacy_types())
            .unwrap();
        codec
            .field_infos_format()
            .write(dir.as_ref(), &si, "", &infos, &ctx)
            .unwrap();

        let files = dir.list_all().unwrap();
        si.add_files(&files).unwrap();
        codec
            .segment_info_format()
            .write(dir.as_ref(), &mut si, &ctx)
            .unwrap();
        SegmentCommitInfo::new(si, 0, -1)
    }

    #[test]
    fn test_codec_for_name() {
        let codec = codec_for_name("Lucene40").unwrap();
        assert_eq!(codec.name(), "Lucene40");
        assert_eq!(codec.postings_format().name(), "Lucene40");
        assert_eq!(codec.doc_values_format().name(), "Lucene40");

        let err = codec_for_name("Lucene62").err().unwrap();
        match *err.kind() {
            ErrorKind::IllegalArgument(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert!(Lucene40Codec::try_from("Lucene40".to_string()).is_ok());
        assert!(Lucene40Codec::try_from("Lucene41".to_string()).is_err());
    }

    #[test]
    fn test_segment_round_trip_with_deletes() {
        let codec = Lucene40Codec::default();
        let dir = Arc::new(RAMDirectory::new());
        let mut info = write_segment(&codec, &dir);
        let ctx = IOContext::Read;

        let si = codec
            .segment_info_format()
            .read(dir.as_ref(), "_0", &ctx)
            .unwrap();
        assert_eq!(si.max_doc(), 3);
        assert!(si.files().contains("_0.si"));
        assert!(si.files().contains("_0.fdt"));
        let infos = Arc::new(
            codec
                .field_infos_format()
                .read(dir.as_ref(), &si, "", &ctx)
                .unwrap(),
        );
        assert_eq!(infos.len(), 2);

        // delete the document whose stored id is "22"
        let mut stored = codec
            .stored_fields_format()
            .fields_reader(dir.as_ref(), &si, Arc::clone(&infos), &ctx)
            .unwrap();
        let live_docs_format = codec.live_docs_format();
        let mut live = live_docs_format.new_live_docs(3);
        for doc in 0..3 {
            let document = stored.document(doc).unwrap();
            let id = document.get("id").and_then(StoredFieldValue::as_str);
            assert_eq!(id, Some(IDS[doc as usize]));
            if id == Some("22") {
                live.clear(doc as usize).unwrap();
            }
        }
        live_docs_format
            .write_live_docs(&live, dir.as_ref(), &info, 1, &ctx)
            .unwrap();
        info.advance_del_gen();
        info.set_del_count(1).unwrap();
        assert!(dir.file_exists("_0_1.del"));

        let live = live_docs_format
            .read_live_docs(dir.as_ref(), &info, &ctx)
            .unwrap();
        assert_eq!(live.count(), 2);
        let live: BitsRef = Arc::new(live);

        let state = SegmentReadState::new(
            Arc::clone(&dir),
            &si,
            Arc::clone(&infos),
            &ctx,
            String::new(),
        );
        let fields = codec.postings_format().fields_producer(&state).unwrap();
        fields.check_integrity().unwrap();
        let terms = fields.terms("text").unwrap().unwrap();
        let mut iter = terms.iterator().unwrap();

        assert!(iter.seek_exact(b"aaa").unwrap());
        let mut postings = iter
            .postings_with_live_docs(Some(Arc::clone(&live)), PostingIteratorFlags::FREQS)
            .unwrap();
        assert_eq!(postings.next().unwrap(), 0);
        assert_eq!(postings.freq().unwrap(), 1);
        assert_eq!(postings.next().unwrap(), 2);
        assert_eq!(postings.next().unwrap(), NO_MORE_DOCS);

        // the only document containing "bbb" is deleted
        assert!(iter.seek_exact(b"bbb").unwrap());
        let mut postings = iter
            .postings_with_live_docs(Some(Arc::clone(&live)), PostingIteratorFlags::NONE)
            .unwrap();
        assert_eq!(postings.next().unwrap(), NO_MORE_DOCS);
        assert!(!iter.seek_exact(b"ccc").unwrap());

        let doc_values = codec.doc_values_format().fields_producer(&state).unwrap();
        let id = infos.field_info_by_name("id").unwrap();
        let ids = doc_values.get_numeric(id).unwrap();
        assert_eq!(ids.get(2).unwrap(), 23);

        let norms = codec.norms_format().norms_producer(&state).unwrap();
        let text = infos.field_info_by_name("text").unwrap();
        assert_eq!(norms.norms(text).unwrap().get(0).unwrap(), 120);
    }
}
