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


use super::*;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use core::index::{
    DocValuesType, FieldInfo, FieldInfos, Fields, IndexOptions, SeekStatus, SegmentInfo,
    SegmentReadState, SegmentWriteState, TermIterator, Terms, LUCENE40_VERSION,
};
use core::search::{DocIterator, PostingIterator, PostingIteratorFlags, NO_MORE_DOCS};
use core::store::directory::{Directory, RAMDirectory};
use core::store::IOContext;
use core::util::{BitVector, BitsRef, DocId};
use error::ErrorKind;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FIELD: &str = "body";

#[derive(Clone, Debug)]
struct TestPosition {
    position: i32,
    payload: Option<Vec<u8>>,
    start_offset: i32,
    end_offset: i32,
}

#[derive(Clone, Debug)]
struct TestDoc {
    doc: DocId,
    freq: i32,
    positions: Vec<TestPosition>,
}

type TestTerms = BTreeMap<Vec<u8>, Vec<TestDoc>>;

fn field_infos(index_options: IndexOptions, payloads: bool) -> Arc<FieldInfos> {
    let info = FieldInfo::new(
        FIELD.to_string(),
        0,
        false,
        false,
        payloads,
        index_options,
        DocValuesType::Null,
        DocValuesType::Null,
        HashMap::new(),
    )
    .unwrap();
    Arc::new(FieldInfos::new(vec![info]).unwrap())
}

fn segment(max_doc: i32) -> SegmentInfo {
    SegmentInfo::new(
        LUCENE40_VERSION,
        "_0",
        max_doc,
        false,
        HashMap::new(),
        HashMap::new(),
    )
    .unwrap()
}

fn docs_only(docs: &[DocId]) -> Vec<TestDoc> {
    docs.iter()
        .map(|&doc| TestDoc {
            doc,
            freq: 1,
            positions: vec![],
        })
        .collect()
}

fn write_terms(
    dir: &Arc<RAMDirectory>,
    si: &SegmentInfo,
    infos: &Arc<FieldInfos>,
    format: &Lucene40PostingsFormat,
    terms: &TestTerms,
) {
    let state = SegmentWriteState::new(
        Arc::clone(dir),
        si.clone(),
        Arc::clone(infos),
        IOContext::Flush,
        String::new(),
    );
    let field_info = infos.field_info_by_name(FIELD).unwrap();
    let has_freqs = field_info.index_options.has_freqs();
    let has_positions = field_info.index_options.has_positions();

    let mut writer = format.fields_consumer(&state).unwrap();
    writer.add_field(field_info).unwrap();
    let mut sum_total_term_freq = 0i64;
    let mut sum_doc_freq = 0i64;
    let mut docs_seen = vec![false; si.max_doc() as usize];
    for (term, docs) in terms {
        let mut total_term_freq = 0i64;
        {
            let postings = writer.start_term().unwrap();
            for doc in docs {
                postings.start_doc(doc.doc, doc.freq).unwrap();
                if has_positions {
                    for p in &doc.positions {
                        postings
                            .add_position(
                                p.position,
                                p.payload.as_ref().map(Vec::as_slice),
                                p.start_offset,
                                p.end_offset,
                            )
                            .unwrap();
                    }
                }
                postings.finish_doc().unwrap();
                total_term_freq += i64::from(doc.freq);
                docs_seen[doc.doc as usize] = true;
            }
        }
        let stats = TermStats::new(
            docs.len() as i32,
            if has_freqs { total_term_freq } else { -1 },
        );
        writer.add_term(term, stats).unwrap();
        sum_total_term_freq += total_term_freq;
        sum_doc_freq += docs.len() as i64;
    }
    let doc_count = docs_seen.iter().filter(|&&seen| seen).count() as i32;
    writer
        .finish_field(
            if has_freqs { sum_total_term_freq } else { -1 },
            sum_doc_freq,
            doc_count,
        )
        .unwrap();
    writer.close().unwrap();
}

fn open_terms(
    dir: &Arc<RAMDirectory>,
    si: &SegmentInfo,
    infos: &Arc<FieldInfos>,
    format: &Lucene40PostingsFormat,
) -> FieldReader {
    let ctx = IOContext::Read;
    let state = SegmentReadState::new(
        Arc::clone(dir),
        si,
        Arc::clone(infos),
        &ctx,
        String::new(),
    );
    let reader = format.fields_producer(&state).unwrap();
    reader.check_integrity().unwrap();
    assert_eq!(reader.fields(), vec![FIELD.to_string()]);
    reader.terms(FIELD).unwrap().unwrap()
}

fn random_docs(rng: &mut StdRng, max_doc: i32, count: usize, max_freq: i32) -> Vec<TestDoc> {
    let mut docs: Vec<DocId> = Vec::with_capacity(count);
    let mut doc = -1;
    while docs.len() < count {
        let room = max_doc - doc - 1 - (count - docs.len() - 1) as i32;
        let gap = rng.gen_range(1..=room.min(8).max(1));
        doc += gap;
        docs.push(doc);
    }
    docs.into_iter()
        .map(|doc| TestDoc {
            doc,
            freq: rng.gen_range(1..=max_freq),
            positions: vec![],
        })
        .collect()
}

fn collect_docs<P: PostingIterator>(postings: &mut P) -> Vec<(DocId, i32)> {
    let mut result = Vec::new();
    loop {
        let doc = postings.next().unwrap();
        if doc == NO_MORE_DOCS {
            break;
        }
        result.push((doc, postings.freq().unwrap()));
    }
    result
}

fn is_corrupt(kind: &ErrorKind) -> bool {
    match *kind {
        ErrorKind::CorruptIndex(_) => true,
        _ => false,
    }
}

#[test]
fn test_skip_advance_matches_linear_scan() {
    let mut rng = StdRng::seed_from_u64(0x40_5c1b);
    let max_doc = 40_000;
    let formats = [
        Lucene40PostingsFormat::default(),
        Lucene40PostingsFormat::with_skip_params(4, 3, 4).unwrap(),
    ];
    for format in &formats {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment(max_doc);
        let infos = field_infos(IndexOptions::DocsAndFreqs, false);
        let mut terms = TestTerms::new();
        terms.insert(b"big".to_vec(), random_docs(&mut rng, max_doc, 5_000, 5));
        terms.insert(b"small".to_vec(), random_docs(&mut rng, max_doc, 7, 3));
        write_terms(&dir, &si, &infos, format, &terms);
        let field = open_terms(&dir, &si, &infos, format);

        for (term, expected) in &terms {
            let mut iter = field.iterator().unwrap();
            assert!(iter.seek_exact(term).unwrap());

            for _ in 0..200 {
                let target = rng.gen_range(0..max_doc + 10);
                let mut postings = iter.postings().unwrap();
                let doc = postings.advance(target).unwrap();
                match expected.iter().find(|d| d.doc >= target) {
                    Some(d) => {
                        assert_eq!(doc, d.doc, "{} target={}", format, target);
                        assert_eq!(postings.freq().unwrap(), d.freq);
                    }
                    None => assert_eq!(doc, NO_MORE_DOCS),
                }
            }

            // chained advances mixed with next on a single iterator
            let mut postings = iter.postings().unwrap();
            let mut current = -1;
            loop {
                let doc = if rng.gen_bool(0.5) {
                    let target = current + rng.gen_range(1..400);
                    let doc = postings.advance(target).unwrap();
                    let want = expected
                        .iter()
                        .find(|d| d.doc >= target)
                        .map_or(NO_MORE_DOCS, |d| d.doc);
                    assert_eq!(doc, want);
                    doc
                } else {
                    let doc = postings.next().unwrap();
                    let want = expected
                        .iter()
                        .find(|d| d.doc > current)
                        .map_or(NO_MORE_DOCS, |d| d.doc);
                    assert_eq!(doc, want);
                    doc
                };
                if doc == NO_MORE_DOCS {
                    break;
                }
                current = doc;
            }
        }
    }
}

#[test]
fn test_postings_iteration_is_strictly_increasing() {
    let mut rng = StdRng::seed_from_u64(7);
    let max_doc = 3_000;
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(max_doc);
    let infos = field_infos(IndexOptions::DocsAndFreqs, false);
    let format = Lucene40PostingsFormat::default().with_terms_block_size(4);

    let mut terms = TestTerms::new();
    for i in 0..37 {
        let count = rng.gen_range(1..200);
        let term = format!("term{:03}", i * 7).into_bytes();
        terms.insert(term, random_docs(&mut rng, max_doc, count, 9));
    }
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);
    assert_eq!(field.size().unwrap(), 37);
    assert!(field.has_freqs().unwrap());
    assert!(!field.has_positions().unwrap());

    let mut iter = field.iterator().unwrap();
    for (term, expected) in &terms {
        assert_eq!(iter.next().unwrap().as_ref(), Some(term));
        assert_eq!(iter.term().unwrap(), term.as_slice());
        assert_eq!(iter.doc_freq().unwrap(), expected.len() as i32);
        let ttf: i64 = expected.iter().map(|d| i64::from(d.freq)).sum();
        assert_eq!(iter.total_term_freq().unwrap(), ttf);

        let docs = collect_docs(&mut iter.postings().unwrap());
        let mut last = -1;
        for &(doc, freq) in &docs {
            assert!(doc > last);
            assert!(freq >= 1);
            last = doc;
        }
        let want: Vec<(DocId, i32)> = expected.iter().map(|d| (d.doc, d.freq)).collect();
        assert_eq!(docs, want);
    }
    assert_eq!(iter.next().unwrap(), None);
    assert!(iter.term().is_err());
}

#[test]
fn test_positions_payloads_and_offsets() {
    let mut rng = StdRng::seed_from_u64(99);
    let max_doc = 500;
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(max_doc);
    let infos = field_infos(IndexOptions::DocsAndFreqsAndPositionsAndOffsets, true);
    let format = Lucene40PostingsFormat::with_skip_params(4, 4, 4).unwrap();

    let mut docs = Vec::new();
    for doc in (0..max_doc).step_by(2) {
        let freq = rng.gen_range(1..6);
        let mut position = 0;
        let mut offset = 0;
        let mut positions = Vec::new();
        for _ in 0..freq {
            position += rng.gen_range(0..5);
            offset += rng.gen_range(0..10);
            let length = rng.gen_range(0..6);
            let payload = match rng.gen_range(0..3) {
                0 => None,
                1 => Some(vec![]),
                _ => Some((0..rng.gen_range(1..5u8)).collect::<Vec<u8>>()),
            };
            positions.push(TestPosition {
                position,
                payload,
                start_offset: offset,
                end_offset: offset + length,
            });
        }
        docs.push(TestDoc {
            doc,
            freq,
            positions,
        });
    }
    let mut terms = TestTerms::new();
    terms.insert(b"pos".to_vec(), docs.clone());
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);
    assert!(field.has_offsets().unwrap());
    assert!(field.has_payloads().unwrap());

    let mut iter = field.iterator().unwrap();
    assert_eq!(iter.seek_ceil(b"p").unwrap(), SeekStatus::NotFound);
    assert_eq!(iter.term().unwrap(), b"pos");

    let check_doc = |postings: &mut Lucene40PostingIterator, expected: &TestDoc| {
        assert_eq!(postings.doc_id(), expected.doc);
        assert_eq!(postings.freq().unwrap(), expected.freq);
        for p in &expected.positions {
            assert_eq!(postings.next_position().unwrap(), p.position);
            assert_eq!(postings.start_offset().unwrap(), p.start_offset);
            assert_eq!(postings.end_offset().unwrap(), p.end_offset);
            let payload = p.payload.clone().unwrap_or_default();
            assert_eq!(postings.payload().unwrap(), payload);
        }
    };

    // full iteration consuming every position
    let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
    for expected in &docs {
        assert_eq!(postings.next().unwrap(), expected.doc);
        check_doc(&mut postings, expected);
    }
    assert_eq!(postings.next().unwrap(), NO_MORE_DOCS);

    // positions left unread must not disturb later documents
    let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
    let mut i = 0;
    while i < docs.len() {
        let expected = &docs[i];
        if i % 3 == 0 {
            assert_eq!(postings.advance(expected.doc).unwrap(), expected.doc);
            check_doc(&mut postings, expected);
            i += rng.gen_range(1..20);
        } else {
            // next() moves a single document
            assert_eq!(postings.next().unwrap(), expected.doc);
            if i % 3 == 1 && expected.freq > 1 {
                postings.next_position().unwrap();
            }
            i += 1;
        }
    }

    // positions requested without payloads or offsets still decode positions
    let mut postings = iter.postings_with_flags(PostingIteratorFlags::POSITIONS).unwrap();
    assert_eq!(postings.advance(301).unwrap(), 302);
    let expected = docs.iter().find(|d| d.doc == 302).unwrap();
    assert_eq!(postings.next_position().unwrap(), expected.positions[0].position);
}

#[test]
fn test_plain_positions_round_trip() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(100);
    let infos = field_infos(IndexOptions::DocsAndFreqsAndPositions, false);
    let format = Lucene40PostingsFormat::default();

    let docs: Vec<TestDoc> = (0..40)
        .map(|i| TestDoc {
            doc: i * 2 + 1,
            freq: 3,
            positions: (0..3)
                .map(|j| TestPosition {
                    position: i + j * 10,
                    payload: None,
                    start_offset: -1,
                    end_offset: -1,
                })
                .collect(),
        })
        .collect();
    let mut terms = TestTerms::new();
    terms.insert(b"x".to_vec(), docs.clone());
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);

    let mut iter = field.iterator().unwrap();
    assert!(iter.seek_exact(b"x").unwrap());
    let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
    assert_eq!(postings.advance(50).unwrap(), 51);
    assert_eq!(postings.next_position().unwrap(), 25);
    assert_eq!(postings.start_offset().unwrap(), -1);
    assert_eq!(postings.payload().unwrap(), Vec::<u8>::new());
    assert_eq!(postings.next().unwrap(), 53);
    assert_eq!(postings.next_position().unwrap(), 26);
    assert_eq!(postings.next_position().unwrap(), 36);
    assert_eq!(postings.next_position().unwrap(), 46);
}

#[test]
fn test_docs_only_field() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(10);
    let infos = field_infos(IndexOptions::Docs, false);
    let format = Lucene40PostingsFormat::default();
    let mut terms = TestTerms::new();
    terms.insert(b"only".to_vec(), docs_only(&[1, 4, 9]));
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);
    assert_eq!(field.sum_total_term_freq().unwrap(), -1);
    assert_eq!(field.sum_doc_freq().unwrap(), 3);
    assert_eq!(field.doc_count().unwrap(), 3);

    let mut iter = field.iterator().unwrap();
    assert_eq!(iter.next().unwrap(), Some(b"only".to_vec()));
    assert_eq!(iter.total_term_freq().unwrap(), -1);
    let mut postings = iter.postings_with_flags(PostingIteratorFlags::ALL).unwrap();
    assert_eq!(postings.next().unwrap(), 1);
    assert_eq!(postings.freq().unwrap(), 1);
    assert_eq!(postings.next_position().unwrap(), -1);
    assert_eq!(collect_docs(&mut postings), vec![(4, 1), (9, 1)]);
}

#[test]
fn test_live_docs_filtering() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(3);
    let infos = field_infos(IndexOptions::DocsAndFreqsAndPositions, false);
    let format = Lucene40PostingsFormat::default();
    let pos = |position| TestPosition {
        position,
        payload: None,
        start_offset: -1,
        end_offset: -1,
    };
    let mut terms = TestTerms::new();
    terms.insert(
        b"aaa".to_vec(),
        vec![
            TestDoc {
                doc: 0,
                freq: 1,
                positions: vec![pos(0)],
            },
            TestDoc {
                doc: 2,
                freq: 2,
                positions: vec![pos(0), pos(3)],
            },
        ],
    );
    terms.insert(
        b"bbb".to_vec(),
        vec![TestDoc {
            doc: 1,
            freq: 1,
            positions: vec![pos(0)],
        }],
    );
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);

    let mut live = BitVector::new(3);
    live.set_all();
    live.clear(2).unwrap();
    let live: BitsRef = Arc::new(live);

    let mut iter = field.iterator().unwrap();
    assert!(iter.seek_exact(b"aaa").unwrap());
    for &flags in &[PostingIteratorFlags::FREQS, PostingIteratorFlags::POSITIONS] {
        let mut postings = iter
            .postings_with_live_docs(Some(Arc::clone(&live)), flags)
            .unwrap();
        assert_eq!(collect_docs(&mut postings), vec![(0, 1)]);
        let mut postings = iter
            .postings_with_live_docs(Some(Arc::clone(&live)), flags)
            .unwrap();
        assert_eq!(postings.advance(1).unwrap(), NO_MORE_DOCS);
    }
    let mut postings = iter.postings_with_live_docs(None, PostingIteratorFlags::FREQS).unwrap();
    assert_eq!(collect_docs(&mut postings), vec![(0, 1), (2, 2)]);
}

#[test]
fn test_seek_ceil_across_blocks() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(4);
    let infos = field_infos(IndexOptions::DocsAndFreqs, false);
    let format = Lucene40PostingsFormat::default().with_terms_block_size(2);
    let mut terms = TestTerms::new();
    for (i, term) in ["aa", "ab", "b", "ba", "c", "cab", "d"].iter().enumerate() {
        terms.insert(term.as_bytes().to_vec(), docs_only(&[i as i32 % 4]));
    }
    write_terms(&dir, &si, &infos, &format, &terms);
    let field = open_terms(&dir, &si, &infos, &format);

    let mut iter = field.iterator().unwrap();
    assert_eq!(iter.seek_ceil(b"a").unwrap(), SeekStatus::NotFound);
    assert_eq!(iter.term().unwrap(), b"aa");
    assert_eq!(iter.seek_ceil(b"b").unwrap(), SeekStatus::Found);
    assert_eq!(iter.next().unwrap(), Some(b"ba".to_vec()));
    assert_eq!(iter.next().unwrap(), Some(b"c".to_vec()));
    assert_eq!(iter.seek_ceil(b"bb").unwrap(), SeekStatus::NotFound);
    assert_eq!(iter.term().unwrap(), b"c");
    assert_eq!(iter.seek_ceil(b"ca").unwrap(), SeekStatus::NotFound);
    assert_eq!(iter.term().unwrap(), b"cab");
    assert_eq!(iter.seek_ceil(b"ab").unwrap(), SeekStatus::Found);
    assert_eq!(iter.doc_freq().unwrap(), 1);
    assert_eq!(iter.seek_ceil(b"zz").unwrap(), SeekStatus::End);
    assert!(iter.term().is_err());
    assert!(!iter.seek_exact(b"cc").unwrap());
    assert!(iter.seek_exact(b"d").unwrap());
    assert_eq!(iter.next().unwrap(), None);
}

#[test]
fn test_terms_must_be_sorted() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(4);
    let infos = field_infos(IndexOptions::DocsAndFreqs, false);
    let state = SegmentWriteState::new(
        Arc::clone(&dir),
        si,
        Arc::clone(&infos),
        IOContext::Flush,
        String::new(),
    );
    let format = Lucene40PostingsFormat::default();
    let mut writer = format.fields_consumer(&state).unwrap();
    writer.add_field(infos.field_info_by_number(0).unwrap()).unwrap();
    for term in &[&b"b"[..], &b"a"[..]] {
        {
            let postings = writer.start_term().unwrap();
            postings.start_doc(0, 1).unwrap();
            postings.finish_doc().unwrap();
        }
        let res = writer.add_term(term, TermStats::new(1, 1));
        if *term == b"a" {
            assert!(res.is_err());
        } else {
            res.unwrap();
        }
    }
    // the failed term aborted the writer and removed its files
    assert!(dir.list_all().unwrap().is_empty());
    assert!(writer.start_term().is_err());
}

#[test]
fn test_out_of_order_docs_are_corrupt() {
    let dir = Arc::new(RAMDirectory::new());
    let si = segment(10);
    let infos = field_infos(IndexOptions::DocsAndFreqs, false);
    let state = SegmentWriteState::new(
        Arc::clone(&dir),
        si,
        Arc::clone(&infos),
        IOContext::Flush,
        String::new(),
    );
    let mut writer =
        Lucene40PostingsWriter::new(&state, DEFAULT_SKIP_INTERVAL, DEFAULT_MAX_SKIP_LEVELS, 16)
            .unwrap();
    writer.set_field(infos.field_info_by_number(0).unwrap()).unwrap();
    writer.start_term().unwrap();
    writer.start_doc(5, 1).unwrap();
    writer.finish_doc().unwrap();
    let err = writer.start_doc(3, 1).unwrap_err();
    assert!(is_corrupt(err.kind()));
    assert!(!dir.file_exists("_0.frq"));
    assert!(writer.start_doc(6, 1).is_err());
}

#[test]
fn test_disk_full_leaves_no_files() {
    let dir = Arc::new(RAMDirectory::new());
    dir.set_max_size_in_bytes(Some(2_000)).unwrap();
    let si = segment(10_000);
    let infos = field_infos(IndexOptions::DocsAndFreqsAndPositions, false);
    let state = SegmentWriteState::new(
        Arc::clone(&dir),
        si,
        Arc::clone(&infos),
        IOContext::Flush,
        String::new(),
    );
    let format = Lucene40PostingsFormat::default();
    let mut writer = format.fields_consumer(&state).unwrap();
    writer.add_field(infos.field_info_by_number(0).unwrap()).unwrap();

    let mut failed = false;
    'terms: for t in 0..1_000 {
        {
            let postings = match writer.start_term() {
                Ok(postings) => postings,
                Err(_) => {
                    failed = true;
                    break 'terms;
                }
            };
            for doc in 0..100 {
                if postings.start_doc(doc * 7, 1).is_err()
                    || postings.add_position(doc % 13, None, -1, -1).is_err()
                {
                    failed = true;
                    break 'terms;
                }
            }
        }
        let term = format!("t{:05}", t).into_bytes();
        if writer.add_term(&term, TermStats::new(100, 100)).is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed);
    writer.abort();
    assert!(dir.list_all().unwrap().is_empty());
    assert_eq!(dir.size_in_bytes(), 0);
}
