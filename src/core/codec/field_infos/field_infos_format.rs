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
use std::io::Write;

use core::codec::codec_util;
use core::codec::doc_values::{LegacyDocValuesType, LEGACY_DV_TYPE_KEY, LEGACY_NORM_TYPE_KEY};
use core::index::{segment_file_name, DocValuesType, FieldInfo, FieldInfos, IndexOptions};
use core::index::SegmentInfo;
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_file_ignoring_error;
use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

pub trait FieldInfosFormat {
    /// Read the `FieldInfos` previously written with `write`.
    fn read<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_info: &SegmentInfo,
        segment_suffix: &str,
        io_context: &IOContext,
    ) -> Result<FieldInfos>;

    /// Writes the provided `FieldInfos` to the directory.
    fn write<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_info: &SegmentInfo,
        segment_suffix: &str,
        infos: &FieldInfos,
        context: &IOContext,
    ) -> Result<()>;
}

/// Extension of field infos
pub const FIELD_INFOS_EXTENSION: &str = "fnm";

const CODEC_NAME: &str = "Lucene40FieldInfos";
const FORMAT_START: i32 = 0;
const FORMAT_CHECKSUM: i32 = 1;
const FORMAT_CURRENT: i32 = FORMAT_CHECKSUM;

const IS_INDEXED: u8 = 0x1;
const STORE_TERMVECTOR: u8 = 0x2;
const STORE_OFFSETS_IN_POSTINGS: u8 = 0x4;
const OMIT_NORMS: u8 = 0x10;
const STORE_PAYLOADS: u8 = 0x20;
const OMIT_TERM_FREQ_AND_POSITIONS: u8 = 0x40;
const OMIT_POSITIONS: u8 = 0x80;

fn read_field_infos_from_index<T: IndexInput + ?Sized>(input: &mut T) -> Result<Vec<FieldInfo>> {
    let size = input.read_vint()?;
    if size < 0 {
        bail!(CorruptIndex(format!(
            "invalid field count: {} (resource={})",
            size,
            input.name()
        )));
    }
    let mut infos: Vec<FieldInfo> = Vec::with_capacity(size as usize);
    for _ in 0..size {
        let name = input.read_string()?;
        let field_number = input.read_vint()?;
        if field_number < 0 {
            bail!(CorruptIndex(format!(
                "invalid field number for field: {}, field_number={} (resource={})",
                name,
                field_number,
                input.name()
            )));
        }
        let bits = input.read_byte()?;
        let is_indexed = (bits & IS_INDEXED) != 0;
        let store_term_vector = (bits & STORE_TERMVECTOR) != 0;
        let omit_norms = (bits & OMIT_NORMS) != 0;
        let store_payloads = (bits & STORE_PAYLOADS) != 0;
        let index_options = if !is_indexed {
            IndexOptions::Null
        } else if (bits & OMIT_TERM_FREQ_AND_POSITIONS) != 0 {
            IndexOptions::Docs
        } else if (bits & OMIT_POSITIONS) != 0 {
            IndexOptions::DocsAndFreqs
        } else if (bits & STORE_OFFSETS_IN_POSTINGS) != 0 {
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets
        } else {
            IndexOptions::DocsAndFreqsAndPositions
        };

        // doc values and norms types are packed in one byte
        let val = input.read_byte()?;
        let old_values_type = LegacyDocValuesType::from_ordinal(val & 0x0F)?;
        let old_norms_type = LegacyDocValuesType::from_ordinal((val >> 4) & 0x0F)?;
        let mut attributes = input.read_map_of_strings()?;
        if old_values_type.mapping() != DocValuesType::Null {
            attributes.insert(
                LEGACY_DV_TYPE_KEY.to_string(),
                old_values_type.name().to_string(),
            );
        }
        if old_norms_type.mapping() != DocValuesType::Null {
            if old_norms_type.mapping() != DocValuesType::Numeric {
                bail!(CorruptIndex(format!(
                    "invalid norm type: {} (resource={})",
                    old_norms_type,
                    input.name()
                )));
            }
            attributes.insert(
                LEGACY_NORM_TYPE_KEY.to_string(),
                old_norms_type.name().to_string(),
            );
        }

        // payloads without positions were once writable, drop them here
        let info = FieldInfo::new(
            name,
            field_number,
            store_term_vector,
            omit_norms,
            store_payloads,
            index_options,
            old_values_type.mapping(),
            old_norms_type.mapping(),
            attributes,
        )?;
        infos.push(info);
    }
    Ok(infos)
}

fn legacy_type_byte(
    fi: &FieldInfo,
    dv_type: DocValuesType,
    key: &str,
) -> Result<u8> {
    if dv_type.null() {
        return Ok(0);
    }
    match fi.attribute(key) {
        Some(name) => {
            let legacy = LegacyDocValuesType::from_name(name)?;
            if legacy.mapping() != dv_type {
                bail!(IllegalState(format!(
                    "field {} has type {:?} but legacy type {}",
                    fi.name, dv_type, legacy
                )));
            }
            Ok(legacy.ordinal())
        }
        None => bail!(IllegalState(format!(
            "field {} has type {:?} but no {} attribute",
            fi.name, dv_type, key
        ))),
    }
}

fn write_field_infos<O: IndexOutput + ?Sized>(output: &mut O, infos: &FieldInfos) -> Result<()> {
    codec_util::write_header(output, CODEC_NAME, FORMAT_CURRENT)?;
    output.write_vint(infos.len() as i32)?;
    for fi in infos.iter() {
        let index_options = fi.index_options;
        let mut bits = 0u8;
        if fi.has_store_term_vector {
            bits |= STORE_TERMVECTOR;
        }
        if fi.omit_norms {
            bits |= OMIT_NORMS;
        }
        if fi.has_store_payloads {
            bits |= STORE_PAYLOADS;
        }
        if fi.is_indexed() {
            bits |= IS_INDEXED;
            match index_options {
                IndexOptions::Docs => bits |= OMIT_TERM_FREQ_AND_POSITIONS,
                IndexOptions::DocsAndFreqsAndPositionsAndOffsets => {
                    bits |= STORE_OFFSETS_IN_POSTINGS
                }
                IndexOptions::DocsAndFreqs => bits |= OMIT_POSITIONS,
                _ => {}
            }
        }
        output.write_string(&fi.name)?;
        output.write_vint(fi.number)?;
        output.write_byte(bits)?;

        let dv = legacy_type_byte(fi, fi.doc_values_type, LEGACY_DV_TYPE_KEY)?;
        let nrm = legacy_type_byte(fi, fi.norms_type, LEGACY_NORM_TYPE_KEY)?;
        output.write_byte((nrm << 4) | dv)?;
        output.write_map_of_strings(&fi.attributes)?;
    }
    codec_util::write_footer(output)
}

/// Returns a copy of `infos` where every field listed in `dv_types` or
/// `norm_types` carries the matching legacy type attribute.
pub fn with_legacy_types(
    infos: &FieldInfos,
    dv_types: &HashMap<i32, LegacyDocValuesType>,
    norm_types: &HashMap<i32, LegacyDocValuesType>,
) -> Result<FieldInfos> {
    let mut fields = Vec::with_capacity(infos.len());
    for fi in infos.iter() {
        let mut fi = fi.clone();
        if let Some(t) = dv_types.get(&fi.number) {
            fi.put_attribute(LEGACY_DV_TYPE_KEY.to_string(), t.name().to_string());
        }
        if let Some(t) = norm_types.get(&fi.number) {
            fi.put_attribute(LEGACY_NORM_TYPE_KEY.to_string(), t.name().to_string());
        }
        fields.push(fi);
    }
    FieldInfos::new(fields)
}

#[derive(Copy, Clone, Default)]
pub struct Lucene40FieldInfosFormat;

impl FieldInfosFormat for Lucene40FieldInfosFormat {
    fn read<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_info: &SegmentInfo,
        segment_suffix: &str,
        ctx: &IOContext,
    ) -> Result<FieldInfos> {
        let file_name = segment_file_name(&segment_info.name, segment_suffix, FIELD_INFOS_EXTENSION);
        let mut input = directory.open_checksum_input(&file_name, ctx)?;
        let version = codec_util::check_header(&mut input, CODEC_NAME, FORMAT_START, FORMAT_CURRENT)?;

        let infos = read_field_infos_from_index(&mut input)?;

        if version >= FORMAT_CHECKSUM {
            codec_util::check_footer(&mut input)?;
        } else {
            codec_util::check_eof(&input)?;
        }
        FieldInfos::new(infos)
    }

    fn write<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_info: &SegmentInfo,
        segment_suffix: &str,
        infos: &FieldInfos,
        context: &IOContext,
    ) -> Result<()> {
        let file_name = segment_file_name(&segment_info.name, segment_suffix, FIELD_INFOS_EXTENSION);
        let res = directory
            .create_output(&file_name, context)
            .and_then(|mut output| {
                write_field_infos(&mut output, infos)?;
                output.flush()?;
                Ok(())
            });
        if res.is_err() {
            delete_file_ignoring_error(directory, &file_name);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::index::{FieldInfosBuilder, LUCENE40_VERSION};
    use core::store::directory::RAMDirectory;

    fn segment() -> SegmentInfo {
        SegmentInfo::new(LUCENE40_VERSION, "_0", 3, false, HashMap::new(), HashMap::new()).unwrap()
    }

    #[test]
    fn test_write_read() {
        let mut builder = FieldInfosBuilder::new();
        builder
            .add("id", IndexOptions::Null, false, false, false, DocValuesType::Null)
            .unwrap();
        builder
            .add(
                "text",
                IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
                true,
                true,
                false,
                DocValuesType::Null,
            )
            .unwrap();
        builder
            .add("price", IndexOptions::Docs, false, false, true, DocValuesType::Numeric)
            .unwrap();
        let infos = builder.finish().unwrap();

        let dir = RAMDirectory::new();
        let si = segment();
        let format = Lucene40FieldInfosFormat;
        let ctx = IOContext::Default;

        // doc values fields need their on-disk type first
        assert!(format.write(&dir, &si, "", &infos, &ctx).is_err());
        assert!(!dir.file_exists("_0.fnm"));

        let mut dv_types = HashMap::new();
        dv_types.insert(2, LegacyDocValuesType::FixedInts32);
        let mut norm_types = HashMap::new();
        norm_types.insert(1, LegacyDocValuesType::FixedInts8);
        let infos = with_legacy_types(&infos, &dv_types, &norm_types).unwrap();
        format.write(&dir, &si, "", &infos, &ctx).unwrap();

        let read = format.read(&dir, &si, "", &ctx).unwrap();
        assert_eq!(read.len(), 3);
        for fi in infos.iter() {
            assert_eq!(read.field_info_by_number(fi.number).unwrap(), fi);
        }
        let price = read.field_info_by_name("price").unwrap();
        assert_eq!(price.doc_values_type, DocValuesType::Numeric);
        assert_eq!(price.attribute(LEGACY_DV_TYPE_KEY), Some("FIXED_INTS_32"));
        assert!(!price.has_norms());
        assert!(read.has_offsets && read.has_vectors && read.has_doc_values);
    }

    #[test]
    fn test_legacy_nibbles() {
        let mut bytes = Vec::new();
        codec_util::write_header(&mut bytes, CODEC_NAME, FORMAT_START).unwrap();
        bytes.write_vint(1).unwrap();
        bytes.write_string("body").unwrap();
        bytes.write_vint(0).unwrap();
        // indexed, docs only, with a payload flag that must be dropped
        bytes
            .write_byte(IS_INDEXED | OMIT_TERM_FREQ_AND_POSITIONS | STORE_PAYLOADS)
            .unwrap();
        // norms FIXED_INTS_8, values BYTES_VAR_SORTED
        let nibbles = bytes.len();
        bytes.write_byte((11 << 4) | 13).unwrap();
        bytes.write_map_of_strings(&HashMap::new()).unwrap();

        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("_0.fnm", &IOContext::Default).unwrap();
            out.write_bytes(&bytes, 0, bytes.len()).unwrap();
        }
        let infos = Lucene40FieldInfosFormat
            .read(&dir, &segment(), "", &IOContext::Default)
            .unwrap();
        let body = infos.field_info_by_name("body").unwrap();
        assert_eq!(body.index_options, IndexOptions::Docs);
        assert!(!body.has_store_payloads);
        assert_eq!(body.doc_values_type, DocValuesType::Sorted);
        assert_eq!(body.norms_type, DocValuesType::Numeric);
        assert_eq!(body.attribute(LEGACY_NORM_TYPE_KEY), Some("FIXED_INTS_8"));

        // a binary norms type is rejected
        bytes[nibbles] = (4 << 4) | 13;
        dir.delete_file("_0.fnm").unwrap();
        {
            let mut out = dir.create_output("_0.fnm", &IOContext::Default).unwrap();
            out.write_bytes(&bytes, 0, bytes.len()).unwrap();
        }
        let err = Lucene40FieldInfosFormat
            .read(&dir, &segment(), "", &IOContext::Default)
            .unwrap_err();
        assert!(::error::is_corrupt_index(&err));
    }
}
