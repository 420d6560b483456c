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
use std::fmt;
use std::sync::{Arc, Mutex};

use core::codec::codec_util::{check_eof, check_header};
use core::codec::compound::CompoundFileReader;
use core::codec::doc_values::*;
use core::index::{segment_file_name, FieldInfo, SegmentInfo};
use core::store::directory::Directory;
use core::store::io::{DataInput, IndexInput};
use core::store::IOContext;
use core::util::packed::PackedIntsReader;
use core::util::{BitsRef, DocId, MatchAllBits};

use error::ErrorKind::{CorruptIndex, IllegalState, IndexOutOfBounds, UnsupportedOperation};
use error::Result;

fn doc_index(doc_id: DocId, max_doc: usize) -> Result<usize> {
    if doc_id < 0 || doc_id as usize >= max_doc {
        bail!(IndexOutOfBounds(format!(
            "doc {} out of range [0, {})",
            doc_id, max_doc
        )));
    }
    Ok(doc_id as usize)
}

fn read_vec<I: DataInput + ?Sized>(input: &mut I, len: i64) -> Result<Vec<u8>> {
    if len < 0 {
        bail!(CorruptIndex(format!("invalid byte count: {}", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    input.read_bytes(&mut bytes, 0, len as usize)?;
    Ok(bytes)
}

fn copy_slice(bytes: &[u8], start: i64, len: i64) -> Result<Vec<u8>> {
    if start < 0 || len < 0 || (start + len) as usize > bytes.len() {
        bail!(CorruptIndex(format!(
            "slice [{}, {}) out of {} bytes",
            start,
            start + len,
            bytes.len()
        )));
    }
    Ok(bytes[start as usize..(start + len) as usize].to_vec())
}

/// A fully loaded numeric column.
///
/// Fixed-width variants keep the stored width. `Packed` keeps deltas from
/// `min_value`, where `default_value` marks a document without a value.
/// Float columns expose the raw IEEE bits.
pub enum NumericColumn {
    Bytes(Vec<i8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Packed {
        min_value: i64,
        default_value: i64,
        values: PackedIntsReader,
    },
}

impl NumericColumn {
    pub fn len(&self) -> usize {
        match self {
            NumericColumn::Bytes(v) => v.len(),
            NumericColumn::Shorts(v) => v.len(),
            NumericColumn::Ints(v) => v.len(),
            NumericColumn::Longs(v) => v.len(),
            NumericColumn::Packed { values, .. } => values.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `max_doc` big-endian values of `width` bytes each.
    fn read_fixed<I: DataInput + ?Sized>(
        input: &mut I,
        width: i32,
        max_doc: usize,
    ) -> Result<NumericColumn> {
        let column = match width {
            1 => {
                let bytes = read_vec(input, max_doc as i64)?;
                NumericColumn::Bytes(bytes.into_iter().map(|b| b as i8).collect())
            }
            2 => {
                let mut values = Vec::with_capacity(max_doc);
                for _ in 0..max_doc {
                    values.push(input.read_short()?);
                }
                NumericColumn::Shorts(values)
            }
            4 => {
                let mut values = Vec::with_capacity(max_doc);
                for _ in 0..max_doc {
                    values.push(input.read_int()?);
                }
                NumericColumn::Ints(values)
            }
            8 => {
                let mut values = Vec::with_capacity(max_doc);
                for _ in 0..max_doc {
                    values.push(input.read_long()?);
                }
                NumericColumn::Longs(values)
            }
            _ => bail!(CorruptIndex(format!("invalid valueSize: {}", width))),
        };
        Ok(column)
    }
}

impl NumericDocValues for NumericColumn {
    fn get(&self, doc_id: DocId) -> Result<i64> {
        let doc = doc_index(doc_id, self.len())?;
        let value = match self {
            NumericColumn::Bytes(v) => i64::from(v[doc]),
            NumericColumn::Shorts(v) => i64::from(v[doc]),
            NumericColumn::Ints(v) => i64::from(v[doc]),
            NumericColumn::Longs(v) => v[doc],
            NumericColumn::Packed {
                min_value,
                default_value,
                values,
            } => {
                let value = values.get(doc);
                if value == *default_value {
                    0
                } else {
                    min_value.wrapping_add(value)
                }
            }
        };
        Ok(value)
    }
}

/// A fully loaded binary column.
pub enum BinaryColumn {
    FixedStraight {
        length: i64,
        bytes: Vec<u8>,
        max_doc: usize,
    },
    VarStraight {
        bytes: Vec<u8>,
        addresses: PackedIntsReader,
    },
    FixedDeref {
        length: i64,
        bytes: Vec<u8>,
        ords: PackedIntsReader,
    },
    VarDeref {
        bytes: Vec<u8>,
        addresses: PackedIntsReader,
    },
}

impl BinaryDocValues for BinaryColumn {
    fn get(&self, doc_id: DocId) -> Result<Vec<u8>> {
        match self {
            BinaryColumn::FixedStraight {
                length,
                bytes,
                max_doc,
            } => {
                let doc = doc_index(doc_id, *max_doc)?;
                copy_slice(bytes, length * doc as i64, *length)
            }
            BinaryColumn::VarStraight { bytes, addresses } => {
                let doc = doc_index(doc_id, addresses.size().saturating_sub(1))?;
                let start = addresses.get(doc);
                let end = addresses.get(doc + 1);
                copy_slice(bytes, start, end - start)
            }
            BinaryColumn::FixedDeref {
                length,
                bytes,
                ords,
            } => {
                let doc = doc_index(doc_id, ords.size())?;
                copy_slice(bytes, length * ords.get(doc), *length)
            }
            BinaryColumn::VarDeref { bytes, addresses } => {
                let doc = doc_index(doc_id, addresses.size())?;
                let start = addresses.get(doc);
                let code = copy_slice(bytes, start, 1)?[0];
                if code & 0x80 == 0 {
                    copy_slice(bytes, start + 1, i64::from(code))
                } else {
                    let low = copy_slice(bytes, start + 1, 1)?[0];
                    let length = (i64::from(code & 0x7f) << 8) | i64::from(low);
                    copy_slice(bytes, start + 2, length)
                }
            }
        }
    }
}

/// A fully loaded sorted column: a value dictionary plus one ordinal per
/// document.
pub enum SortedColumn {
    Fixed {
        length: i64,
        value_count: usize,
        bytes: Vec<u8>,
        ords: PackedIntsReader,
    },
    Var {
        bytes: Vec<u8>,
        addresses: PackedIntsReader,
        ords: PackedIntsReader,
    },
}

impl SortedColumn {
    fn ords(&self) -> &PackedIntsReader {
        match self {
            SortedColumn::Fixed { ords, .. } | SortedColumn::Var { ords, .. } => ords,
        }
    }
}

impl SortedDocValues for SortedColumn {
    fn get_ord(&self, doc_id: DocId) -> Result<i32> {
        let ords = self.ords();
        let doc = doc_index(doc_id, ords.size())?;
        Ok(ords.get(doc) as i32)
    }

    fn lookup_ord(&self, ord: i32) -> Result<Vec<u8>> {
        if ord < 0 || ord as usize >= self.value_count() {
            bail!(IndexOutOfBounds(format!(
                "ord {} out of range [0, {})",
                ord,
                self.value_count()
            )));
        }
        match self {
            SortedColumn::Fixed { length, bytes, .. } => {
                copy_slice(bytes, length * i64::from(ord), *length)
            }
            SortedColumn::Var {
                bytes, addresses, ..
            } => {
                let start = addresses.get(ord as usize);
                let end = addresses.get(ord as usize + 1);
                copy_slice(bytes, start, end - start)
            }
        }
    }

    fn value_count(&self) -> usize {
        match self {
            SortedColumn::Fixed { value_count, .. } => *value_count,
            SortedColumn::Var { addresses, .. } => addresses.size() - 1,
        }
    }
}

impl BinaryDocValues for SortedColumn {
    fn get(&self, doc_id: DocId) -> Result<Vec<u8>> {
        let ord = self.get_ord(doc_id)?;
        if ord < 0 {
            Ok(Vec::new())
        } else {
            self.lookup_ord(ord)
        }
    }
}

/// Hides an ordinal 0 that no document uses.
///
/// Some 4.0 writers reserved ordinal 0 for missing documents without
/// assigning it to any of them (LUCENE-4717). Every ordinal is shifted down
/// by one and the dictionary loses its unused first entry.
pub struct CorrectedOrds<T: SortedDocValues> {
    inner: T,
}

impl<T: SortedDocValues> CorrectedOrds<T> {
    pub fn new(inner: T) -> Self {
        CorrectedOrds { inner }
    }
}

impl<T: SortedDocValues> SortedDocValues for CorrectedOrds<T> {
    fn get_ord(&self, doc_id: DocId) -> Result<i32> {
        Ok(self.inner.get_ord(doc_id)? - 1)
    }

    fn lookup_ord(&self, ord: i32) -> Result<Vec<u8>> {
        self.inner.lookup_ord(ord + 1)
    }

    fn value_count(&self) -> usize {
        self.inner.value_count().saturating_sub(1)
    }
}

impl<T: SortedDocValues> BinaryDocValues for CorrectedOrds<T> {
    fn get(&self, doc_id: DocId) -> Result<Vec<u8>> {
        let ord = self.get_ord(doc_id)?;
        if ord < 0 {
            Ok(Vec::new())
        } else {
            self.lookup_ord(ord)
        }
    }
}

/// Returns `column` unchanged when some document uses ordinal 0, wrapped
/// in `CorrectedOrds` otherwise.
pub fn correct_buggy_ords(
    column: SortedColumn,
    max_doc: i32,
) -> Result<Arc<dyn SortedDocValues>> {
    if max_doc == 0 {
        return Ok(Arc::new(column));
    }
    for doc in 0..max_doc {
        if column.get_ord(doc)? == 0 {
            return Ok(Arc::new(column));
        }
    }
    debug!(
        "no document uses ord 0 of {} values, shifting ords down",
        column.value_count()
    );
    Ok(Arc::new(CorrectedOrds::new(column)))
}

/// The columns of one reader that were loaded so far, by field number.
#[derive(Default)]
pub struct DocValuesCache {
    numeric: HashMap<i32, Arc<dyn NumericDocValues>>,
    binary: HashMap<i32, Arc<dyn BinaryDocValues>>,
    sorted: HashMap<i32, Arc<dyn SortedDocValues>>,
}

impl DocValuesCache {
    pub fn len(&self) -> usize {
        self.numeric.len() + self.binary.len() + self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads doc values or norms written by `Lucene40DocValuesWriter`.
///
/// A column is read completely the first time it is asked for and shared
/// with every later caller.
pub struct Lucene40DocValuesReader {
    compound: CompoundFileReader,
    segment_name: String,
    max_doc: i32,
    legacy_key: &'static str,
    cache: Mutex<DocValuesCache>,
}

impl Lucene40DocValuesReader {
    pub fn open<D: Directory + ?Sized>(
        directory: &D,
        si: &SegmentInfo,
        container: &str,
        legacy_key: &'static str,
        context: &IOContext,
    ) -> Result<Lucene40DocValuesReader> {
        let compound = CompoundFileReader::open(directory, &si.name, container, context)?;
        Ok(Lucene40DocValuesReader {
            compound,
            segment_name: si.name.clone(),
            max_doc: si.max_doc(),
            legacy_key,
            cache: Mutex::new(DocValuesCache::default()),
        })
    }

    pub fn max_doc(&self) -> i32 {
        self.max_doc
    }

    /// Number of columns loaded so far.
    pub fn loaded_columns(&self) -> Result<usize> {
        Ok(self.cache.lock()?.len())
    }

    fn legacy_type(&self, field_info: &FieldInfo) -> Result<LegacyDocValuesType> {
        match field_info.attribute(self.legacy_key) {
            Some(name) => LegacyDocValuesType::from_name(name),
            None => bail!(CorruptIndex(format!(
                "field {} has no {} attribute",
                field_info.name, self.legacy_key
            ))),
        }
    }

    fn open_entry(&self, field_info: &FieldInfo, extension: &str) -> Result<Box<dyn IndexInput>> {
        let name = segment_file_name(
            &format!("{}_{}", self.segment_name, field_info.number),
            SEGMENT_SUFFIX,
            extension,
        );
        self.compound.open_input(&name)
    }

    fn wrong_type(field_info: &FieldInfo, legacy_type: LegacyDocValuesType, kind: &str) -> String {
        format!(
            "field {} has doc values type {}, not {}",
            field_info.name, legacy_type, kind
        )
    }

    fn load_numeric(&self, field_info: &FieldInfo) -> Result<NumericColumn> {
        let legacy_type = self.legacy_type(field_info)?;
        let max_doc = self.max_doc as usize;
        let mut input = self.open_entry(field_info, DATA_EXTENSION)?;
        let (codec, width) = match legacy_type {
            LegacyDocValuesType::VarInts => {
                check_header(
                    input.as_mut(),
                    VAR_INTS_CODEC_NAME,
                    VAR_INTS_VERSION_START,
                    VAR_INTS_VERSION_CURRENT,
                )?;
                let column = load_var_ints(input.as_mut(), max_doc)?;
                check_eof(&*input)?;
                return Ok(column);
            }
            LegacyDocValuesType::FixedInts8 => (INTS_CODEC_NAME, 1),
            LegacyDocValuesType::FixedInts16 => (INTS_CODEC_NAME, 2),
            LegacyDocValuesType::FixedInts32 => (INTS_CODEC_NAME, 4),
            LegacyDocValuesType::FixedInts64 => (INTS_CODEC_NAME, 8),
            LegacyDocValuesType::Float32 => (FLOATS_CODEC_NAME, 4),
            LegacyDocValuesType::Float64 => (FLOATS_CODEC_NAME, 8),
            _ => bail!(IllegalState(Self::wrong_type(
                field_info,
                legacy_type,
                "numeric"
            ))),
        };
        // Ints and Floats share their version numbers
        check_header(input.as_mut(), codec, INTS_VERSION_START, INTS_VERSION_CURRENT)?;
        let value_size = input.read_int()?;
        if value_size != width {
            bail!(CorruptIndex(format!(
                "invalid valueSize: {} (resource={})",
                value_size,
                input.name()
            )));
        }
        let column = NumericColumn::read_fixed(input.as_mut(), width, max_doc)?;
        check_eof(&*input)?;
        Ok(column)
    }

    fn load_binary(&self, field_info: &FieldInfo) -> Result<BinaryColumn> {
        let legacy_type = self.legacy_type(field_info)?;
        let max_doc = self.max_doc as usize;
        let column = match legacy_type {
            LegacyDocValuesType::BytesFixedStraight => {
                let mut data = self.open_entry(field_info, DATA_EXTENSION)?;
                check_header(
                    data.as_mut(),
                    BYTES_FIXED_STRAIGHT_CODEC_NAME,
                    BYTES_VERSION_START,
                    BYTES_VERSION_CURRENT,
                )?;
                let length = i64::from(data.read_int()?);
                let bytes = read_vec(data.as_mut(), length * max_doc as i64)?;
                check_eof(&*data)?;
                BinaryColumn::FixedStraight {
                    length,
                    bytes,
                    max_doc,
                }
            }
            LegacyDocValuesType::BytesVarStraight => {
                let (mut data, mut index) = self.open_pair(
                    field_info,
                    BYTES_VAR_STRAIGHT_CODEC_NAME_DAT,
                    BYTES_VAR_STRAIGHT_CODEC_NAME_IDX,
                )?;
                let total_bytes = index.read_vlong()?;
                let bytes = read_vec(data.as_mut(), total_bytes)?;
                let addresses = PackedIntsReader::read(index.as_mut())?;
                check_eof(&*data)?;
                check_eof(&*index)?;
                BinaryColumn::VarStraight { bytes, addresses }
            }
            LegacyDocValuesType::BytesFixedDeref => {
                let (mut data, mut index) = self.open_pair(
                    field_info,
                    BYTES_FIXED_DEREF_CODEC_NAME_DAT,
                    BYTES_FIXED_DEREF_CODEC_NAME_IDX,
                )?;
                let length = i64::from(data.read_int()?);
                let value_count = i64::from(index.read_int()?);
                let bytes = read_vec(data.as_mut(), length * value_count)?;
                let ords = PackedIntsReader::read(index.as_mut())?;
                check_eof(&*data)?;
                check_eof(&*index)?;
                BinaryColumn::FixedDeref {
                    length,
                    bytes,
                    ords,
                }
            }
            LegacyDocValuesType::BytesVarDeref => {
                let (mut data, mut index) = self.open_pair(
                    field_info,
                    BYTES_VAR_DEREF_CODEC_NAME_DAT,
                    BYTES_VAR_DEREF_CODEC_NAME_IDX,
                )?;
                let total_bytes = index.read_long()?;
                let bytes = read_vec(data.as_mut(), total_bytes)?;
                let addresses = PackedIntsReader::read(index.as_mut())?;
                check_eof(&*data)?;
                check_eof(&*index)?;
                BinaryColumn::VarDeref { bytes, addresses }
            }
            _ => bail!(IllegalState(Self::wrong_type(
                field_info,
                legacy_type,
                "binary"
            ))),
        };
        Ok(column)
    }

    fn load_sorted(&self, field_info: &FieldInfo) -> Result<SortedColumn> {
        let legacy_type = self.legacy_type(field_info)?;
        let column = match legacy_type {
            LegacyDocValuesType::BytesFixedSorted => {
                let (mut data, mut index) = self.open_pair(
                    field_info,
                    BYTES_FIXED_SORTED_CODEC_NAME_DAT,
                    BYTES_FIXED_SORTED_CODEC_NAME_IDX,
                )?;
                let length = i64::from(data.read_int()?);
                let value_count = index.read_int()?;
                if value_count < 0 {
                    bail!(CorruptIndex(format!(
                        "invalid value count: {} (resource={})",
                        value_count,
                        index.name()
                    )));
                }
                let bytes = read_vec(data.as_mut(), length * i64::from(value_count))?;
                let ords = PackedIntsReader::read(index.as_mut())?;
                check_eof(&*data)?;
                check_eof(&*index)?;
                SortedColumn::Fixed {
                    length,
                    value_count: value_count as usize,
                    bytes,
                    ords,
                }
            }
            LegacyDocValuesType::BytesVarSorted => {
                let (mut data, mut index) = self.open_pair(
                    field_info,
                    BYTES_VAR_SORTED_CODEC_NAME_DAT,
                    BYTES_VAR_SORTED_CODEC_NAME_IDX,
                )?;
                let max_address = index.read_long()?;
                let bytes = read_vec(data.as_mut(), max_address)?;
                let addresses = PackedIntsReader::read(index.as_mut())?;
                let ords = PackedIntsReader::read(index.as_mut())?;
                if addresses.size() == 0 {
                    bail!(CorruptIndex(format!(
                        "sorted addresses miss their sentinel (resource={})",
                        index.name()
                    )));
                }
                check_eof(&*data)?;
                check_eof(&*index)?;
                SortedColumn::Var {
                    bytes,
                    addresses,
                    ords,
                }
            }
            _ => bail!(IllegalState(Self::wrong_type(
                field_info,
                legacy_type,
                "sorted"
            ))),
        };
        Ok(column)
    }

    /// Opens the `.dat` and `.idx` entries of a field and checks both headers.
    fn open_pair(
        &self,
        field_info: &FieldInfo,
        data_codec: &str,
        index_codec: &str,
    ) -> Result<(Box<dyn IndexInput>, Box<dyn IndexInput>)> {
        let mut data = self.open_entry(field_info, DATA_EXTENSION)?;
        check_header(
            data.as_mut(),
            data_codec,
            BYTES_VERSION_START,
            BYTES_VERSION_CURRENT,
        )?;
        let mut index = self.open_entry(field_info, INDEX_EXTENSION)?;
        check_header(
            index.as_mut(),
            index_codec,
            BYTES_VERSION_START,
            BYTES_VERSION_CURRENT,
        )?;
        Ok((data, index))
    }
}

fn load_var_ints(input: &mut dyn IndexInput, max_doc: usize) -> Result<NumericColumn> {
    let header = input.read_byte()?;
    match header {
        VAR_INTS_FIXED_64 => NumericColumn::read_fixed(input, 8, max_doc),
        VAR_INTS_PACKED => {
            let min_value = input.read_long()?;
            let default_value = input.read_long()?;
            let values = PackedIntsReader::read(input)?;
            Ok(NumericColumn::Packed {
                min_value,
                default_value,
                values,
            })
        }
        _ => bail!(CorruptIndex(format!(
            "invalid VAR_INTS header byte: {} (resource={})",
            header,
            input.name()
        ))),
    }
}

impl DocValuesProducer for Lucene40DocValuesReader {
    fn get_numeric(&self, field_info: &FieldInfo) -> Result<Arc<dyn NumericDocValues>> {
        let mut cache = self.cache.lock()?;
        if let Some(column) = cache.numeric.get(&field_info.number) {
            return Ok(Arc::clone(column));
        }
        let column: Arc<dyn NumericDocValues> = Arc::new(self.load_numeric(field_info)?);
        cache
            .numeric
            .insert(field_info.number, Arc::clone(&column));
        Ok(column)
    }

    fn get_binary(&self, field_info: &FieldInfo) -> Result<Arc<dyn BinaryDocValues>> {
        let mut cache = self.cache.lock()?;
        if let Some(column) = cache.binary.get(&field_info.number) {
            return Ok(Arc::clone(column));
        }
        let column: Arc<dyn BinaryDocValues> = Arc::new(self.load_binary(field_info)?);
        cache.binary.insert(field_info.number, Arc::clone(&column));
        Ok(column)
    }

    fn get_sorted(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedDocValues>> {
        let mut cache = self.cache.lock()?;
        if let Some(column) = cache.sorted.get(&field_info.number) {
            return Ok(Arc::clone(column));
        }
        let column = correct_buggy_ords(self.load_sorted(field_info)?, self.max_doc)?;
        cache.sorted.insert(field_info.number, Arc::clone(&column));
        Ok(column)
    }

    fn get_sorted_set(&self, field_info: &FieldInfo) -> Result<Arc<dyn SortedSetDocValues>> {
        bail!(UnsupportedOperation(
            format!(
                "field {}: Lucene 4.0 does not support SortedSet",
                field_info.name
            )
            .into()
        ))
    }

    fn get_docs_with_field(&self, _field_info: &FieldInfo) -> Result<BitsRef> {
        Ok(Arc::new(MatchAllBits::new(self.max_doc as usize)))
    }

    fn check_integrity(&self) -> Result<()> {
        self.compound.check_integrity()
    }
}

impl fmt::Display for Lucene40DocValuesReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Lucene40DocValuesReader(segment={}, {})",
            self.segment_name, self.compound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::codec_util::write_header;
    use core::codec::compound::CompoundFileWriter;
    use core::codec::field_infos::with_legacy_types;
    use core::index::{
        DocValuesType, FieldInfos, IndexOptions, SegmentReadState, SegmentWriteState,
        LUCENE40_VERSION,
    };
    use core::store::directory::RAMDirectory;
    use core::store::io::DataOutput;
    use core::util::packed::PackedIntsWriter;
    use error::ErrorKind;

    fn dv_field(name: &str, number: i32, dv_type: DocValuesType) -> FieldInfo {
        FieldInfo::new(
            name.to_string(),
            number,
            false,
            false,
            false,
            IndexOptions::Null,
            dv_type,
            DocValuesType::Null,
            HashMap::new(),
        )
        .unwrap()
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

    /// Writes the columns added by `add`, then reopens them with the legacy
    /// types recorded in the returned field infos.
    fn write_and_open<F>(
        dir: &Arc<RAMDirectory>,
        max_doc: i32,
        fields: Vec<FieldInfo>,
        add: F,
    ) -> (Lucene40DocValuesReader, FieldInfos)
    where
        F: FnOnce(&mut Lucene40DocValuesWriter<RAMDirectory>, &FieldInfos) -> Result<()>,
    {
        let si = segment(max_doc);
        let infos = Arc::new(FieldInfos::new(fields).unwrap());
        let state = SegmentWriteState::new(
            Arc::clone(dir),
            si.clone(),
            Arc::clone(&infos),
            IOContext::Flush,
            String::new(),
        );
        let format = Lucene40DocValuesFormat;
        let mut writer = format.fields_consumer(&state).unwrap();
        add(&mut writer, &infos).unwrap();
        writer.close().unwrap();

        let infos = with_legacy_types(&infos, writer.legacy_types(), &HashMap::new()).unwrap();
        let read_state = SegmentReadState::new(
            Arc::clone(dir),
            &si,
            Arc::new(infos.clone()),
            &IOContext::Read,
            String::new(),
        );
        (format.fields_producer(&read_state).unwrap(), infos)
    }

    fn legacy(infos: &FieldInfos, name: &str) -> LegacyDocValuesType {
        let fi = infos.field_info_by_name(name).unwrap();
        LegacyDocValuesType::from_name(fi.attribute(LEGACY_DV_TYPE_KEY).unwrap()).unwrap()
    }

    #[test]
    fn test_numeric_picks_narrowest_type() {
        let columns: Vec<(&str, Vec<Option<i64>>, LegacyDocValuesType)> = vec![
            (
                "bytes",
                vec![Some(-100), Some(5), Some(27), None],
                LegacyDocValuesType::FixedInts8,
            ),
            (
                "shorts",
                vec![Some(1000), Some(-2000), Some(3), None],
                LegacyDocValuesType::FixedInts16,
            ),
            (
                "ints",
                vec![Some(100_000), Some(-5), Some(7), Some(-70_000)],
                LegacyDocValuesType::FixedInts32,
            ),
            (
                "small",
                vec![Some(0), Some(1), Some(2), Some(3)],
                LegacyDocValuesType::VarInts,
            ),
            (
                "wide",
                vec![Some(1 << 40), Some(5), None, Some(-(1 << 35))],
                LegacyDocValuesType::VarInts,
            ),
            (
                "high",
                vec![Some(0), Some(1 << 62), None, Some((1 << 62) + 17)],
                LegacyDocValuesType::VarInts,
            ),
            (
                "full",
                vec![
                    Some(i64::min_value()),
                    Some(i64::max_value()),
                    None,
                    Some(42),
                ],
                LegacyDocValuesType::VarInts,
            ),
        ];
        let fields = columns
            .iter()
            .enumerate()
            .map(|(i, c)| dv_field(c.0, i as i32, DocValuesType::Numeric))
            .collect();
        let dir = Arc::new(RAMDirectory::new());
        let (reader, infos) = write_and_open(&dir, 4, fields, |writer, infos| {
            for c in &columns {
                let fi = infos.field_info_by_name(c.0).unwrap();
                writer.add_numeric_field(fi, &c.1)?;
            }
            Ok(())
        });

        for c in &columns {
            assert_eq!(legacy(&infos, c.0), c.2, "field {}", c.0);
            let values = reader
                .get_numeric(infos.field_info_by_name(c.0).unwrap())
                .unwrap();
            for (doc, expected) in c.1.iter().enumerate() {
                assert_eq!(values.get(doc as i32).unwrap(), expected.unwrap_or(0));
            }
            let err = values.get(4).unwrap_err();
            match *err.kind() {
                ErrorKind::IndexOutOfBounds(_) => {}
                ref e => panic!("unexpected error {:?}", e),
            }
        }
    }

    #[test]
    fn test_binary_variants() {
        let long_value = vec![b'x'; 200];
        let columns: Vec<(&str, Vec<Option<&[u8]>>, LegacyDocValuesType)> = vec![
            (
                "fixed_straight",
                vec![
                    Some(&b"abc"[..]),
                    Some(&b"def"[..]),
                    Some(&b"ghi"[..]),
                    Some(&b"jkl"[..]),
                    Some(&b"mno"[..]),
                    Some(&b"pqr"[..]),
                    Some(&b"stu"[..]),
                    Some(&b"vwx"[..]),
                ],
                LegacyDocValuesType::BytesFixedStraight,
            ),
            (
                "var_straight",
                vec![
                    Some(&b"a"[..]),
                    Some(&b"bcd"[..]),
                    None,
                    Some(&b"ef"[..]),
                    Some(&b"ghij"[..]),
                    Some(&b"k"[..]),
                    Some(&b"lm"[..]),
                    Some(&b"nop"[..]),
                ],
                LegacyDocValuesType::BytesVarStraight,
            ),
            (
                "fixed_deref",
                vec![
                    Some(&b"xx"[..]),
                    Some(&b"yy"[..]),
                    Some(&b"xx"[..]),
                    Some(&b"xx"[..]),
                    Some(&b"yy"[..]),
                    Some(&b"yy"[..]),
                    Some(&b"xx"[..]),
                    Some(&b"yy"[..]),
                ],
                LegacyDocValuesType::BytesFixedDeref,
            ),
            (
                "var_deref",
                vec![
                    Some(&b"a"[..]),
                    Some(&b"bbb"[..]),
                    Some(&long_value[..]),
                    Some(&b"a"[..]),
                    Some(&b"a"[..]),
                    Some(&b"bbb"[..]),
                    Some(&b"a"[..]),
                    Some(&long_value[..]),
                ],
                LegacyDocValuesType::BytesVarDeref,
            ),
        ];
        let fields = columns
            .iter()
            .enumerate()
            .map(|(i, c)| dv_field(c.0, i as i32, DocValuesType::Binary))
            .collect();
        let dir = Arc::new(RAMDirectory::new());
        let (reader, infos) = write_and_open(&dir, 8, fields, |writer, infos| {
            for c in &columns {
                let fi = infos.field_info_by_name(c.0).unwrap();
                writer.add_binary_field(fi, &c.1)?;
            }
            Ok(())
        });

        for c in &columns {
            assert_eq!(legacy(&infos, c.0), c.2, "field {}", c.0);
            let values = reader
                .get_binary(infos.field_info_by_name(c.0).unwrap())
                .unwrap();
            for (doc, expected) in c.1.iter().enumerate() {
                let expected: &[u8] = expected.unwrap_or(&[]);
                assert_eq!(values.get(doc as i32).unwrap().as_slice(), expected);
            }
        }
    }

    #[test]
    fn test_sorted_fixed_and_var() {
        let dir = Arc::new(RAMDirectory::new());
        let fields = vec![
            dv_field("fixed", 0, DocValuesType::Sorted),
            dv_field("missing", 1, DocValuesType::Sorted),
        ];
        let (reader, infos) = write_and_open(&dir, 4, fields, |writer, infos| {
            writer.add_sorted_field(
                infos.field_info_by_number(0).unwrap(),
                &[&b"aa"[..], &b"bb"[..], &b"cc"[..]],
                &[2, 0, 1, 0],
            )?;
            writer.add_sorted_field(
                infos.field_info_by_number(1).unwrap(),
                &[&b"b"[..], &b"cc"[..]],
                &[1, -1, 0, 1],
            )
        });

        assert_eq!(legacy(&infos, "fixed"), LegacyDocValuesType::BytesFixedSorted);
        let fixed = reader
            .get_sorted(infos.field_info_by_number(0).unwrap())
            .unwrap();
        assert_eq!(fixed.value_count(), 3);
        assert_eq!(fixed.get_ord(0).unwrap(), 2);
        assert_eq!(fixed.lookup_ord(2).unwrap(), b"cc".to_vec());
        assert_eq!(fixed.get(3).unwrap(), b"aa".to_vec());
        assert_eq!(fixed.lookup_term(b"bb").unwrap(), 1);
        assert_eq!(fixed.lookup_term(b"ab").unwrap(), -2);
        assert_eq!(fixed.lookup_term(b"zz").unwrap(), -4);

        // missing docs point at an inserted empty value
        assert_eq!(legacy(&infos, "missing"), LegacyDocValuesType::BytesVarSorted);
        let var = reader
            .get_sorted(infos.field_info_by_number(1).unwrap())
            .unwrap();
        assert_eq!(var.value_count(), 3);
        assert_eq!(var.get_ord(1).unwrap(), 0);
        assert!(var.get(1).unwrap().is_empty());
        assert_eq!(var.get_ord(0).unwrap(), 2);
        assert_eq!(var.get(2).unwrap(), b"b".to_vec());
        assert_eq!(var.get(3).unwrap(), b"cc".to_vec());
    }

    /// A 4.0 style sorted column where ord 0 is never used.
    fn write_buggy_sorted(dir: &Arc<RAMDirectory>) {
        let mut data = Vec::new();
        write_header(&mut data, BYTES_FIXED_SORTED_CODEC_NAME_DAT, BYTES_VERSION_CURRENT).unwrap();
        data.write_int(2).unwrap();
        data.write_bytes(b"zzaabb", 0, 6).unwrap();

        let mut index = Vec::new();
        write_header(&mut index, BYTES_FIXED_SORTED_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)
            .unwrap();
        index.write_int(3).unwrap();
        {
            let mut ords = PackedIntsWriter::new(&mut index, 3, 2).unwrap();
            for ord in &[1, 2, 1] {
                ords.add(*ord).unwrap();
            }
            ords.finish().unwrap();
        }

        let mut compound =
            CompoundFileWriter::new(Arc::clone(dir), "_0", DOC_VALUES_CONTAINER, &IOContext::Flush)
                .unwrap();
        compound.add_file("_0_0_dv.dat", &data).unwrap();
        compound.add_file("_0_0_dv.idx", &index).unwrap();
        compound.close().unwrap();
    }

    #[test]
    fn test_buggy_ords_are_shifted() {
        let dir = Arc::new(RAMDirectory::new());
        write_buggy_sorted(&dir);
        let mut fi = dv_field("sorted", 0, DocValuesType::Sorted);
        fi.put_attribute(
            LEGACY_DV_TYPE_KEY.to_string(),
            LegacyDocValuesType::BytesFixedSorted.name().to_string(),
        );

        let si = segment(3);
        let reader = Lucene40DocValuesReader::open(
            dir.as_ref(),
            &si,
            DOC_VALUES_CONTAINER,
            LEGACY_DV_TYPE_KEY,
            &IOContext::Read,
        )
        .unwrap();
        let raw = reader.load_sorted(&fi).unwrap();
        assert_eq!(raw.value_count(), 3);
        assert_eq!(raw.get_ord(0).unwrap(), 1);

        let corrected = reader.get_sorted(&fi).unwrap();
        assert_eq!(corrected.value_count(), raw.value_count() - 1);
        assert_eq!(corrected.get_ord(0).unwrap(), 0);
        assert_eq!(corrected.get_ord(1).unwrap(), 1);
        assert_eq!(corrected.get_ord(2).unwrap(), 0);
        assert_eq!(corrected.lookup_ord(0).unwrap(), b"aa".to_vec());
        assert_eq!(corrected.get(1).unwrap(), b"bb".to_vec());
        assert_eq!(corrected.lookup_term(b"bb").unwrap(), 1);
    }

    #[test]
    fn test_float_columns_expose_raw_bits() {
        let dir = Arc::new(RAMDirectory::new());
        let mut data = Vec::new();
        write_header(&mut data, FLOATS_CODEC_NAME, FLOATS_VERSION_CURRENT).unwrap();
        data.write_int(4).unwrap();
        for v in &[1.5f32, -2.5f32] {
            data.write_int(v.to_bits() as i32).unwrap();
        }
        let mut compound =
            CompoundFileWriter::new(Arc::clone(&dir), "_0", DOC_VALUES_CONTAINER, &IOContext::Flush)
                .unwrap();
        compound.add_file("_0_3_dv.dat", &data).unwrap();
        compound.close().unwrap();

        let mut fi = dv_field("price", 3, DocValuesType::Numeric);
        fi.put_attribute(
            LEGACY_DV_TYPE_KEY.to_string(),
            LegacyDocValuesType::Float32.name().to_string(),
        );
        let reader = Lucene40DocValuesReader::open(
            dir.as_ref(),
            &segment(2),
            DOC_VALUES_CONTAINER,
            LEGACY_DV_TYPE_KEY,
            &IOContext::Read,
        )
        .unwrap();
        let values = reader.get_numeric(&fi).unwrap();
        assert_eq!(
            values.get(0).unwrap(),
            i64::from(1.5f32.to_bits() as i32)
        );
        assert_eq!(
            values.get(1).unwrap(),
            i64::from((-2.5f32).to_bits() as i32)
        );
    }

    #[test]
    fn test_columns_are_cached() {
        let dir = Arc::new(RAMDirectory::new());
        let fields = vec![dv_field("n", 0, DocValuesType::Numeric)];
        let (reader, infos) = write_and_open(&dir, 3, fields, |writer, infos| {
            writer.add_numeric_field(
                infos.field_info_by_number(0).unwrap(),
                &[Some(7), Some(8), Some(9)],
            )
        });
        let fi = infos.field_info_by_number(0).unwrap();
        assert_eq!(reader.loaded_columns().unwrap(), 0);
        let first = reader.get_numeric(fi).unwrap();
        let second = reader.get_numeric(fi).unwrap();
        assert_eq!(
            Arc::as_ptr(&first) as *const u8,
            Arc::as_ptr(&second) as *const u8
        );
        assert_eq!(reader.loaded_columns().unwrap(), 1);
        assert_eq!(second.get(2).unwrap(), 9);

        // asking for the wrong kind of column does not load anything
        let err = reader.get_binary(fi).err().unwrap();
        match *err.kind() {
            ErrorKind::IllegalState(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert_eq!(reader.loaded_columns().unwrap(), 1);
        reader.check_integrity().unwrap();
    }

    #[test]
    fn test_sorted_set_unsupported_and_docs_with_field() {
        let dir = Arc::new(RAMDirectory::new());
        let fields = vec![dv_field("s", 0, DocValuesType::Sorted)];
        let (reader, infos) = write_and_open(&dir, 2, fields, |writer, infos| {
            let fi = infos.field_info_by_number(0).unwrap();
            let err = writer
                .add_sorted_set_field(fi, &[&b"a"[..]], &[1, 0], &[0])
                .unwrap_err();
            match *err.kind() {
                ErrorKind::UnsupportedOperation(_) => {}
                ref e => panic!("unexpected error {:?}", e),
            }
            writer.add_sorted_field(fi, &[&b"a"[..]], &[0, 0])
        });
        let fi = infos.field_info_by_number(0).unwrap();
        match *reader.get_sorted_set(fi).err().unwrap().kind() {
            ErrorKind::UnsupportedOperation(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        let bits = reader.get_docs_with_field(fi).unwrap();
        assert_eq!(bits.len(), 2);
        assert!(bits.get(0).unwrap() && bits.get(1).unwrap());
    }

    #[test]
    fn test_failed_write_removes_container() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment(3);
        let infos = Arc::new(
            FieldInfos::new(vec![dv_field("b", 0, DocValuesType::Binary)]).unwrap(),
        );
        let state = SegmentWriteState::new(
            Arc::clone(&dir),
            si,
            Arc::clone(&infos),
            IOContext::Flush,
            String::new(),
        );
        let mut writer = Lucene40DocValuesFormat.fields_consumer(&state).unwrap();
        let fi = infos.field_info_by_number(0).unwrap();
        let too_long = vec![0u8; MAX_BINARY_FIELD_LENGTH + 1];
        let err = writer
            .add_binary_field(fi, &[Some(&b"a"[..]), Some(&too_long[..]), None])
            .unwrap_err();
        match *err.kind() {
            ErrorKind::IllegalArgument(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
        assert!(dir.list_all().unwrap().is_empty());
        match *writer.add_numeric_field(fi, &[None, None, None]).unwrap_err().kind() {
            ErrorKind::IllegalState(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn test_value_count_must_match_segment() {
        let dir = Arc::new(RAMDirectory::new());
        let si = segment(3);
        let infos = Arc::new(
            FieldInfos::new(vec![dv_field("n", 0, DocValuesType::Numeric)]).unwrap(),
        );
        let state = SegmentWriteState::new(
            Arc::clone(&dir),
            si,
            Arc::clone(&infos),
            IOContext::Flush,
            String::new(),
        );
        let mut writer = Lucene40DocValuesFormat.fields_consumer(&state).unwrap();
        let fi = infos.field_info_by_number(0).unwrap();
        assert!(writer.add_numeric_field(fi, &[Some(1)]).is_err());
        assert!(dir.list_all().unwrap().is_empty());
    }
}
