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


use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use core::codec::codec_util::write_header;
use core::codec::compound::CompoundFileWriter;
use core::codec::doc_values::*;
use core::index::{segment_file_name, FieldInfo, SegmentWriteState};
use core::store::directory::Directory;
use core::store::io::DataOutput;
use core::util::packed::{bits_required, PackedIntsWriter};

use error::ErrorKind::{IllegalArgument, IllegalState, UnsupportedOperation};
use error::Result;

/// An encoded column: the `.dat` entry and, for two-file types, the `.idx`
/// entry.
struct EncodedColumn {
    legacy_type: LegacyDocValuesType,
    data: Vec<u8>,
    index: Option<Vec<u8>>,
}

impl EncodedColumn {
    fn single(legacy_type: LegacyDocValuesType, data: Vec<u8>) -> EncodedColumn {
        EncodedColumn {
            legacy_type,
            data,
            index: None,
        }
    }

    fn pair(legacy_type: LegacyDocValuesType, data: Vec<u8>, index: Vec<u8>) -> EncodedColumn {
        EncodedColumn {
            legacy_type,
            data,
            index: Some(index),
        }
    }
}

/// Writes doc values in the 4.0 layout: every column becomes one or two
/// entries of a compound container, encoded with the narrowest legacy type
/// that holds its values.
///
/// The chosen types are recorded per field number and have to be stored in
/// the field infos under `legacy_key` for the column to be readable again.
pub struct Lucene40DocValuesWriter<D: Directory> {
    compound: CompoundFileWriter<D>,
    segment_name: String,
    max_doc: i32,
    legacy_key: &'static str,
    legacy_types: HashMap<i32, LegacyDocValuesType>,
    aborted: bool,
    closed: bool,
}

impl<D: Directory> Lucene40DocValuesWriter<D> {
    /// `container` names the compound file, `dv` for doc values and `nrm`
    /// for norms.
    pub fn new(
        state: &SegmentWriteState<D>,
        container: &str,
        legacy_key: &'static str,
    ) -> Result<Lucene40DocValuesWriter<D>> {
        let compound = CompoundFileWriter::new(
            Arc::clone(&state.directory),
            &state.segment_info.name,
            container,
            &state.context,
        )?;
        Ok(Lucene40DocValuesWriter {
            compound,
            segment_name: state.segment_info.name.clone(),
            max_doc: state.segment_info.max_doc(),
            legacy_key,
            legacy_types: HashMap::new(),
            aborted: false,
            closed: false,
        })
    }

    pub fn legacy_key(&self) -> &'static str {
        self.legacy_key
    }

    /// The legacy type chosen for every field written so far, by field number.
    pub fn legacy_types(&self) -> &HashMap<i32, LegacyDocValuesType> {
        &self.legacy_types
    }

    pub fn files(&self) -> Vec<String> {
        vec![
            self.compound.data_file_name().to_string(),
            self.compound.entries_file_name().to_string(),
        ]
    }

    fn entry_name(&self, field_info: &FieldInfo, extension: &str) -> String {
        segment_file_name(
            &format!("{}_{}", self.segment_name, field_info.number),
            SEGMENT_SUFFIX,
            extension,
        )
    }

    fn check_open(&self) -> Result<()> {
        if self.aborted {
            bail!(IllegalState("doc values writer was aborted".into()));
        }
        if self.closed {
            bail!(IllegalState("doc values writer is closed".into()));
        }
        Ok(())
    }

    fn check_doc_count(&self, field_info: &FieldInfo, count: usize) -> Result<()> {
        if count != self.max_doc as usize {
            bail!(IllegalArgument(format!(
                "field {} has {} values but the segment has {} docs",
                field_info.name, count, self.max_doc
            )));
        }
        Ok(())
    }

    fn add_column(&mut self, field_info: &FieldInfo, column: EncodedColumn) -> Result<()> {
        let data_name = self.entry_name(field_info, DATA_EXTENSION);
        self.compound.add_file(&data_name, &column.data)?;
        if let Some(ref index) = column.index {
            let index_name = self.entry_name(field_info, INDEX_EXTENSION);
            self.compound.add_file(&index_name, index)?;
        }
        debug!(
            "field {} of segment {} written as {}",
            field_info.name, self.segment_name, column.legacy_type
        );
        self.legacy_types
            .insert(field_info.number, column.legacy_type);
        Ok(())
    }

    fn abort_on_error<T>(&mut self, res: Result<T>) -> Result<T> {
        if res.is_err() {
            self.abort();
        }
        res
    }

    fn numeric(&mut self, field_info: &FieldInfo, values: &[Option<i64>]) -> Result<()> {
        self.check_open()?;
        self.check_doc_count(field_info, values.len())?;
        let column = encode_numeric(values)?;
        self.add_column(field_info, column)
    }

    fn binary(&mut self, field_info: &FieldInfo, values: &[Option<&[u8]>]) -> Result<()> {
        self.check_open()?;
        self.check_doc_count(field_info, values.len())?;
        let column = encode_binary(field_info, values, self.max_doc as usize)?;
        self.add_column(field_info, column)
    }

    fn sorted(&mut self, field_info: &FieldInfo, values: &[&[u8]], doc_to_ord: &[i32]) -> Result<()> {
        self.check_open()?;
        self.check_doc_count(field_info, doc_to_ord.len())?;
        if let Some(ord) = doc_to_ord
            .iter()
            .find(|&&ord| ord < -1 || ord >= values.len() as i32)
        {
            bail!(IllegalArgument(format!(
                "field {} has ord {} outside of [-1, {})",
                field_info.name,
                ord,
                values.len()
            )));
        }
        let column = encode_sorted(field_info, values, doc_to_ord)?;
        self.add_column(field_info, column)
    }
}

impl<D: Directory> DocValuesConsumer for Lucene40DocValuesWriter<D> {
    fn add_numeric_field(&mut self, field_info: &FieldInfo, values: &[Option<i64>]) -> Result<()> {
        let res = self.numeric(field_info, values);
        self.abort_on_error(res)
    }

    fn add_binary_field(
        &mut self,
        field_info: &FieldInfo,
        values: &[Option<&[u8]>],
    ) -> Result<()> {
        let res = self.binary(field_info, values);
        self.abort_on_error(res)
    }

    fn add_sorted_field(
        &mut self,
        field_info: &FieldInfo,
        values: &[&[u8]],
        doc_to_ord: &[i32],
    ) -> Result<()> {
        let res = self.sorted(field_info, values, doc_to_ord);
        self.abort_on_error(res)
    }

    fn add_sorted_set_field(
        &mut self,
        field_info: &FieldInfo,
        _values: &[&[u8]],
        _doc_to_ord_count: &[usize],
        _ords: &[i64],
    ) -> Result<()> {
        bail!(UnsupportedOperation(
            format!(
                "field {}: the 4.0 doc values format does not support SortedSet",
                field_info.name
            )
            .into()
        ))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.check_open()?;
        let res = self.compound.close();
        self.abort_on_error(res)?;
        self.closed = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.compound.abort();
    }
}

fn value_or_zero(value: &Option<i64>) -> i64 {
    value.unwrap_or(0)
}

/// Picks bytes, shorts or ints when the range fits and would need more
/// than 4, 8 or 16 bits packed, VAR_INTS otherwise.
fn encode_numeric(values: &[Option<i64>]) -> Result<EncodedColumn> {
    let mut min_value = i64::max_value();
    let mut max_value = i64::min_value();
    for v in values.iter().map(value_or_zero) {
        min_value = min_value.min(v);
        max_value = max_value.max(v);
    }
    if values.is_empty() {
        min_value = 0;
        max_value = 0;
    }
    let range = max_value.wrapping_sub(min_value);
    let range_bits = if range < 0 { 64 } else { bits_required(range) };

    let mut data = Vec::new();
    let fits = |lo: i64, hi: i64| min_value >= lo && max_value <= hi;
    if fits(i64::from(i8::min_value()), i64::from(i8::max_value())) && range_bits > 4 {
        write_header(&mut data, INTS_CODEC_NAME, INTS_VERSION_CURRENT)?;
        data.write_int(1)?;
        for v in values.iter().map(value_or_zero) {
            data.write_byte(v as i8 as u8)?;
        }
        Ok(EncodedColumn::single(LegacyDocValuesType::FixedInts8, data))
    } else if fits(i64::from(i16::min_value()), i64::from(i16::max_value())) && range_bits > 8 {
        write_header(&mut data, INTS_CODEC_NAME, INTS_VERSION_CURRENT)?;
        data.write_int(2)?;
        for v in values.iter().map(value_or_zero) {
            data.write_short(v as i16)?;
        }
        Ok(EncodedColumn::single(LegacyDocValuesType::FixedInts16, data))
    } else if fits(i64::from(i32::min_value()), i64::from(i32::max_value())) && range_bits > 16 {
        write_header(&mut data, INTS_CODEC_NAME, INTS_VERSION_CURRENT)?;
        data.write_int(4)?;
        for v in values.iter().map(value_or_zero) {
            data.write_int(v as i32)?;
        }
        Ok(EncodedColumn::single(LegacyDocValuesType::FixedInts32, data))
    } else {
        write_header(&mut data, VAR_INTS_CODEC_NAME, VAR_INTS_VERSION_CURRENT)?;
        if range < 0 {
            data.write_byte(VAR_INTS_FIXED_64)?;
            for v in values.iter().map(value_or_zero) {
                data.write_long(v)?;
            }
        } else {
            data.write_byte(VAR_INTS_PACKED)?;
            data.write_long(min_value)?;
            // representation of a missing value
            data.write_long(0i64.wrapping_sub(min_value))?;
            let mut writer = PackedIntsWriter::new(&mut data, values.len(), range_bits)?;
            for v in values.iter().map(value_or_zero) {
                writer.add(v.wrapping_sub(min_value))?;
            }
            writer.finish()?;
        }
        Ok(EncodedColumn::single(LegacyDocValuesType::VarInts, data))
    }
}

/// Deduplicates when there are at most 256 distinct values that repeat on
/// average, stores straight otherwise.
fn encode_binary(
    field_info: &FieldInfo,
    values: &[Option<&[u8]>],
    max_doc: usize,
) -> Result<EncodedColumn> {
    let values: Vec<&[u8]> = values.iter().map(|v| v.unwrap_or(&[])).collect();
    let mut unique: Option<HashSet<&[u8]>> = Some(HashSet::new());
    let mut min_length = usize::max_value();
    let mut max_length = 0;
    for v in &values {
        if v.len() > MAX_BINARY_FIELD_LENGTH {
            bail!(IllegalArgument(format!(
                "DocValuesField \"{}\" is too large, must be <= {}",
                field_info.name, MAX_BINARY_FIELD_LENGTH
            )));
        }
        min_length = min_length.min(v.len());
        max_length = max_length.max(v.len());
        let overflow = match unique {
            Some(ref mut set) => set.insert(*v) && set.len() > 256,
            None => false,
        };
        if overflow {
            unique = None;
        }
    }
    let fixed = values.is_empty() || min_length == max_length;
    let dedup = match unique {
        Some(ref set) => set.len() * 2 < max_doc,
        None => false,
    };
    let length = if values.is_empty() { 0 } else { min_length };

    match (dedup, fixed) {
        (true, true) => encode_fixed_deref(&values, length),
        (true, false) => encode_var_deref(&values),
        (false, true) => encode_fixed_straight(&values, length),
        (false, false) => encode_var_straight(&values),
    }
}

fn encode_fixed_straight(values: &[&[u8]], length: usize) -> Result<EncodedColumn> {
    let mut data = Vec::new();
    write_header(&mut data, BYTES_FIXED_STRAIGHT_CODEC_NAME, BYTES_VERSION_CURRENT)?;
    data.write_int(length as i32)?;
    for v in values {
        data.write_bytes(v, 0, v.len())?;
    }
    Ok(EncodedColumn::single(
        LegacyDocValuesType::BytesFixedStraight,
        data,
    ))
}

fn encode_var_straight(values: &[&[u8]]) -> Result<EncodedColumn> {
    let mut data = Vec::new();
    let mut index = Vec::new();
    write_header(&mut data, BYTES_VAR_STRAIGHT_CODEC_NAME_DAT, BYTES_VERSION_CURRENT)?;
    write_header(&mut index, BYTES_VAR_STRAIGHT_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)?;

    let start = data.len();
    for v in values {
        data.write_bytes(v, 0, v.len())?;
    }
    let max_address = (data.len() - start) as i64;
    index.write_vlong(max_address)?;

    let mut writer = PackedIntsWriter::new(&mut index, values.len() + 1, bits_required(max_address))?;
    let mut address = 0i64;
    for v in values {
        writer.add(address)?;
        address += v.len() as i64;
    }
    writer.add(address)?;
    writer.finish()?;
    Ok(EncodedColumn::pair(
        LegacyDocValuesType::BytesVarStraight,
        data,
        index,
    ))
}

fn dictionary<'a>(values: &[&'a [u8]]) -> Vec<&'a [u8]> {
    let set: BTreeSet<&[u8]> = values.iter().cloned().collect();
    set.into_iter().collect()
}

fn ord_of(dictionary: &[&[u8]], value: &[u8]) -> i64 {
    match dictionary.binary_search(&value) {
        Ok(ord) => ord as i64,
        Err(_) => 0,
    }
}

fn encode_fixed_deref(values: &[&[u8]], length: usize) -> Result<EncodedColumn> {
    let dictionary = dictionary(values);
    let mut data = Vec::new();
    let mut index = Vec::new();
    write_header(&mut data, BYTES_FIXED_DEREF_CODEC_NAME_DAT, BYTES_VERSION_CURRENT)?;
    write_header(&mut index, BYTES_FIXED_DEREF_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)?;

    data.write_int(length as i32)?;
    for v in &dictionary {
        data.write_bytes(v, 0, v.len())?;
    }

    let value_count = dictionary.len();
    index.write_int(value_count as i32)?;
    let bits = bits_required((value_count as i64 - 1).max(0));
    let mut writer = PackedIntsWriter::new(&mut index, values.len(), bits)?;
    for v in values {
        writer.add(ord_of(&dictionary, v))?;
    }
    writer.finish()?;
    Ok(EncodedColumn::pair(
        LegacyDocValuesType::BytesFixedDeref,
        data,
        index,
    ))
}

/// Writes the 1 or 2 byte length prefix of a var-deref value.
fn write_vshort(out: &mut Vec<u8>, length: usize) -> Result<()> {
    debug_assert!(length <= i16::max_value() as usize);
    if length < 128 {
        out.write_byte(length as u8)
    } else {
        out.write_byte(0x80 | (length >> 8) as u8)?;
        out.write_byte((length & 0xff) as u8)
    }
}

fn encode_var_deref(values: &[&[u8]]) -> Result<EncodedColumn> {
    let dictionary = dictionary(values);
    let mut data = Vec::new();
    let mut index = Vec::new();
    write_header(&mut data, BYTES_VAR_DEREF_CODEC_NAME_DAT, BYTES_VERSION_CURRENT)?;
    write_header(&mut index, BYTES_VAR_DEREF_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)?;

    let start = data.len();
    let mut addresses = Vec::with_capacity(dictionary.len());
    let mut last_address = 0i64;
    for v in &dictionary {
        last_address = (data.len() - start) as i64;
        addresses.push(last_address);
        write_vshort(&mut data, v.len())?;
        data.write_bytes(v, 0, v.len())?;
    }

    index.write_long((data.len() - start) as i64)?;
    let mut writer = PackedIntsWriter::new(&mut index, values.len(), bits_required(last_address))?;
    for v in values {
        writer.add(addresses[ord_of(&dictionary, v) as usize])?;
    }
    writer.finish()?;
    Ok(EncodedColumn::pair(
        LegacyDocValuesType::BytesVarDeref,
        data,
        index,
    ))
}

/// Fixed-length dictionaries without missing documents are stored fixed.
/// Otherwise missing documents point at the empty value, which is added to
/// the dictionary when it is not there yet.
fn encode_sorted(
    field_info: &FieldInfo,
    values: &[&[u8]],
    doc_to_ord: &[i32],
) -> Result<EncodedColumn> {
    if let Some(v) = values.iter().find(|v| v.len() > MAX_BINARY_FIELD_LENGTH) {
        bail!(IllegalArgument(format!(
            "DocValuesField \"{}\" is too large, must be <= {} (got {})",
            field_info.name,
            MAX_BINARY_FIELD_LENGTH,
            v.len()
        )));
    }
    let min_length = values.iter().map(|v| v.len()).min();
    let max_length = values.iter().map(|v| v.len()).max();
    let any_missing = doc_to_ord.iter().any(|&ord| ord == -1);

    if !any_missing && min_length.is_some() && min_length == max_length {
        let length = min_length.unwrap_or(0);
        return encode_fixed_sorted(values, doc_to_ord, length);
    }
    if !any_missing {
        encode_var_sorted(values, doc_to_ord)
    } else if min_length == Some(0) {
        // the empty value sorts first, so it is ord 0
        let ords: Vec<i32> = doc_to_ord.iter().map(|&ord| ord.max(0)).collect();
        encode_var_sorted(values, &ords)
    } else {
        let mut with_empty: Vec<&[u8]> = Vec::with_capacity(values.len() + 1);
        with_empty.push(&[]);
        with_empty.extend_from_slice(values);
        let ords: Vec<i32> = doc_to_ord.iter().map(|&ord| ord + 1).collect();
        encode_var_sorted(&with_empty, &ords)
    }
}

fn encode_fixed_sorted(values: &[&[u8]], doc_to_ord: &[i32], length: usize) -> Result<EncodedColumn> {
    let mut data = Vec::new();
    let mut index = Vec::new();
    write_header(&mut data, BYTES_FIXED_SORTED_CODEC_NAME_DAT, BYTES_VERSION_CURRENT)?;
    write_header(&mut index, BYTES_FIXED_SORTED_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)?;

    data.write_int(length as i32)?;
    for v in values {
        data.write_bytes(v, 0, v.len())?;
    }

    index.write_int(values.len() as i32)?;
    let bits = bits_required((values.len() as i64 - 1).max(0));
    let mut writer = PackedIntsWriter::new(&mut index, doc_to_ord.len(), bits)?;
    for &ord in doc_to_ord {
        writer.add(i64::from(ord))?;
    }
    writer.finish()?;
    Ok(EncodedColumn::pair(
        LegacyDocValuesType::BytesFixedSorted,
        data,
        index,
    ))
}

fn encode_var_sorted(values: &[&[u8]], doc_to_ord: &[i32]) -> Result<EncodedColumn> {
    let mut data = Vec::new();
    let mut index = Vec::new();
    write_header(&mut data, BYTES_VAR_SORTED_CODEC_NAME_DAT, BYTES_VERSION_CURRENT)?;
    write_header(&mut index, BYTES_VAR_SORTED_CODEC_NAME_IDX, BYTES_VERSION_CURRENT)?;

    let start = data.len();
    for v in values {
        data.write_bytes(v, 0, v.len())?;
    }
    let max_address = (data.len() - start) as i64;
    index.write_long(max_address)?;

    {
        let mut addresses =
            PackedIntsWriter::new(&mut index, values.len() + 1, bits_required(max_address))?;
        let mut address = 0i64;
        for v in values {
            addresses.add(address)?;
            address += v.len() as i64;
        }
        addresses.add(address)?;
        addresses.finish()?;
    }

    let bits = bits_required((values.len() as i64 - 1).max(0));
    let mut ords = PackedIntsWriter::new(&mut index, doc_to_ord.len(), bits)?;
    for &ord in doc_to_ord {
        ords.add(i64::from(ord))?;
    }
    ords.finish()?;
    Ok(EncodedColumn::pair(
        LegacyDocValuesType::BytesVarSorted,
        data,
        index,
    ))
}
