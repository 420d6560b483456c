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


use std::io::Write;

use core::codec::codec_util;
use core::index::{segment_file_name, SegmentInfo};
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput, IndexOutput};
use core::store::IOContext;
use core::util::io::delete_file_ignoring_error;
use error::ErrorKind::CorruptIndex;
use error::Result;

/// Expert: Controls the format of the `SegmentInfo` (segment metadata file).
pub trait SegmentInfoFormat {
    /// Read `SegmentInfo` data from a directory.
    fn read<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_name: &str,
        context: &IOContext,
    ) -> Result<SegmentInfo>;

    /// Write `SegmentInfo` data. The `.si` file itself is added to the
    /// segment's file set before anything is written.
    fn write<D: Directory + ?Sized>(
        &self,
        dir: &D,
        info: &mut SegmentInfo,
        io_context: &IOContext,
    ) -> Result<()>;
}

/// File extension used to store `SegmentInfo`.
pub const SI_EXTENSION: &str = "si";
const CODEC_NAME: &str = "Lucene40SegmentInfo";
const VERSION_START: i32 = 0;
const VERSION_CHECKSUM: i32 = 1;
const VERSION_CURRENT: i32 = VERSION_CHECKSUM;

pub const SEGMENT_USE_COMPOUND_YES: u8 = 0x01;
pub const SEGMENT_USE_COMPOUND_NO: u8 = 0xff;

#[derive(Copy, Clone, Default)]
pub struct Lucene40SegmentInfoFormat;

impl Lucene40SegmentInfoFormat {
    fn write_info<O: IndexOutput + ?Sized>(output: &mut O, si: &SegmentInfo) -> Result<()> {
        codec_util::write_header(output, CODEC_NAME, VERSION_CURRENT)?;
        output.write_string(&si.version)?;
        output.write_int(si.max_doc)?;
        output.write_byte(if si.is_compound_file {
            SEGMENT_USE_COMPOUND_YES
        } else {
            SEGMENT_USE_COMPOUND_NO
        })?;
        output.write_map_of_strings(&si.diagnostics)?;
        output.write_map_of_strings(&si.attributes)?;
        output.write_set_of_strings(si.files())?;
        codec_util::write_footer(output)
    }
}

impl SegmentInfoFormat for Lucene40SegmentInfoFormat {
    fn read<D: Directory + ?Sized>(
        &self,
        directory: &D,
        segment_name: &str,
        context: &IOContext,
    ) -> Result<SegmentInfo> {
        let file_name = segment_file_name(segment_name, "", SI_EXTENSION);
        let mut input = directory.open_checksum_input(&file_name, context)?;
        let version =
            codec_util::check_header(&mut input, CODEC_NAME, VERSION_START, VERSION_CURRENT)?;
        let lucene_version = input.read_string()?;
        let doc_count = input.read_int()?;
        if doc_count < 0 {
            bail!(CorruptIndex(format!(
                "invalid docCount: {} (resource={})",
                doc_count, file_name
            )));
        }
        let is_compound_file = input.read_byte()? == SEGMENT_USE_COMPOUND_YES;
        let diagnostics = input.read_map_of_strings()?;
        let attributes = input.read_map_of_strings()?;
        let files = input.read_set_of_strings()?;

        if version >= VERSION_CHECKSUM {
            codec_util::check_footer(&mut input)?;
        } else {
            codec_util::check_eof(&input)?;
        }

        let mut si = SegmentInfo::new(
            &lucene_version,
            segment_name,
            doc_count,
            is_compound_file,
            diagnostics,
            attributes,
        )?;
        si.set_files(&files)?;
        Ok(si)
    }

    fn write<D: Directory + ?Sized>(
        &self,
        dir: &D,
        si: &mut SegmentInfo,
        io_context: &IOContext,
    ) -> Result<()> {
        let file_name = segment_file_name(&si.name, "", SI_EXTENSION);
        si.add_file(&file_name)?;

        let res = dir.create_output(&file_name, io_context).and_then(|mut output| {
            Self::write_info(&mut output, si)?;
            output.flush()?;
            Ok(())
        });
        if res.is_err() {
            delete_file_ignoring_error(dir, &file_name);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::index::LUCENE40_VERSION;
    use core::store::directory::RAMDirectory;
    use std::collections::HashMap;

    #[test]
    fn test_write_read() {
        let dir = RAMDirectory::new();
        let mut diagnostics = HashMap::new();
        diagnostics.insert("source".to_string(), "flush".to_string());
        let mut si =
            SegmentInfo::new(LUCENE40_VERSION, "_4", 12, true, diagnostics, HashMap::new())
                .unwrap();
        si.add_file("_4.cfs").unwrap();
        si.add_file("_4.cfe").unwrap();

        let format = Lucene40SegmentInfoFormat;
        format.write(&dir, &mut si, &IOContext::Default).unwrap();
        assert!(si.files().contains("_4.si"));

        let read = format.read(&dir, "_4", &IOContext::Default).unwrap();
        assert_eq!(read, si);
        assert_eq!(read.max_doc(), 12);
        assert!(read.is_compound_file);
        assert_eq!(read.diagnostics["source"], "flush");
    }

    #[test]
    fn test_negative_doc_count() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("_1.si", &IOContext::Default).unwrap();
            codec_util::write_header(&mut out, CODEC_NAME, VERSION_START).unwrap();
            out.write_string(LUCENE40_VERSION).unwrap();
            out.write_int(-5).unwrap();
        }
        let err = Lucene40SegmentInfoFormat
            .read(&dir, "_1", &IOContext::Default)
            .unwrap_err();
        assert!(::error::is_corrupt_index(&err));
    }
}
