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


use core::index::{strip_segment_name, FieldInfos};
use core::store::directory::Directory;
use core::store::IOContext;

use error::ErrorKind::{IllegalArgument, IllegalState};
use error::Result;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::result;
use std::sync::Arc;

/// Version string stamped on segments written by this codec.
pub const LUCENE40_VERSION: &str = "4.0.0.2";

/// Information about a segment such as its name, directory, and files
/// related to the segment.
#[derive(Clone, PartialEq)]
pub struct SegmentInfo {
    pub name: String,
    pub max_doc: i32,
    pub is_compound_file: bool,
    pub diagnostics: HashMap<String, String>,
    pub attributes: HashMap<String, String>,
    pub version: String,
    files: HashSet<String>,
}

impl SegmentInfo {
    pub fn new(
        version: &str,
        name: &str,
        max_doc: i32,
        is_compound_file: bool,
        diagnostics: HashMap<String, String>,
        attributes: HashMap<String, String>,
    ) -> Result<SegmentInfo> {
        if max_doc < -1 {
            bail!(IllegalArgument(format!(
                "invalid max_doc {} for segment {}",
                max_doc, name
            )));
        }
        Ok(SegmentInfo {
            name: String::from(name),
            max_doc,
            is_compound_file,
            diagnostics,
            attributes,
            version: String::from(version),
            files: HashSet::new(),
        })
    }

    pub fn max_doc(&self) -> i32 {
        debug_assert!(self.max_doc >= 0);
        self.max_doc
    }

    pub fn set_max_doc(&mut self, max_doc: i32) -> Result<()> {
        if self.max_doc != -1 {
            bail!(IllegalState("max_doc was already set".into()));
        }
        self.max_doc = max_doc;
        Ok(())
    }

    /// Return all files referenced by this SegmentInfo.
    pub fn files(&self) -> &HashSet<String> {
        &self.files
    }

    pub fn set_files(&mut self, files: &HashSet<String>) -> Result<()> {
        self.files = HashSet::with_capacity(files.len());
        self.add_files(files)
    }

    pub fn add_file(&mut self, file: &str) -> Result<()> {
        check_file_name(file)?;
        let file = self.named_for_this_segment(file);
        self.files.insert(file);
        Ok(())
    }

    pub fn add_files<'a, I>(&mut self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let files: Vec<&String> = files.into_iter().collect();
        for f in &files {
            check_file_name(f)?;
        }
        for f in files {
            let file = self.named_for_this_segment(f);
            self.files.insert(file);
        }
        Ok(())
    }

    fn named_for_this_segment(&self, file: &str) -> String {
        let mut name = self.name.clone();
        name.push_str(strip_segment_name(file));
        name
    }
}

// codec file names are `_<segment>[_suffix].<ext>` with lowercase alphanumerics
fn check_file_name(file: &str) -> Result<()> {
    let valid = file.starts_with('_')
        && file.len() > 1
        && file[1..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if !valid || !file.contains('.') {
        bail!(IllegalArgument(format!("invalid codec filename '{}'", file)));
    }
    if file.ends_with(".tmp") {
        bail!(IllegalArgument(format!(
            "invalid codec filename '{}', can't end with .tmp extension",
            file
        )));
    }
    Ok(())
}

impl Serialize for SegmentInfo {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut files: Vec<&String> = self.files.iter().collect();
        files.sort();
        let mut s = serializer.serialize_struct("SegmentInfo", 7)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("max_doc", &self.max_doc)?;
        s.serialize_field("is_compound_file", &self.is_compound_file)?;
        s.serialize_field("diagnostics", &self.diagnostics)?;
        s.serialize_field("attributes", &self.attributes)?;
        s.serialize_field("version", &self.version)?;
        s.serialize_field("files", &files)?;
        s.end()
    }
}

impl fmt::Display for SegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

impl fmt::Debug for SegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Embeds a [read-only] SegmentInfo and adds per-commit fields.
#[derive(Clone, Debug)]
pub struct SegmentCommitInfo {
    pub info: SegmentInfo,
    /// How many deleted docs in the segment
    pub del_count: i32,
    /// Generation number of the live docs file (-1 if there are no deletes yet)
    pub del_gen: i64,
    /// Normally 1+del_gen, unless an error was hit on last attempt to write
    pub next_write_del_gen: i64,
}

impl SegmentCommitInfo {
    pub fn new(info: SegmentInfo, del_count: i32, del_gen: i64) -> SegmentCommitInfo {
        SegmentCommitInfo {
            info,
            del_count,
            del_gen,
            next_write_del_gen: if del_gen == -1 { 1 } else { del_gen + 1 },
        }
    }

    pub fn has_deletions(&self) -> bool {
        self.del_gen != -1
    }

    /// Called when a live docs file was written successfully.
    pub fn advance_del_gen(&mut self) {
        self.del_gen = self.next_write_del_gen;
        self.next_write_del_gen = self.del_gen + 1;
    }

    /// Called when writing the next live docs generation failed, so the
    /// generation that may hold partial output is never reused.
    pub fn advance_next_write_del_gen(&mut self) {
        self.next_write_del_gen += 1;
    }

    pub fn set_del_count(&mut self, del_count: i32) -> Result<()> {
        if del_count < 0 || del_count > self.info.max_doc() {
            bail!(IllegalArgument(format!(
                "invalid del_count={} (max_doc={})",
                del_count,
                self.info.max_doc()
            )));
        }
        self.del_count = del_count;
        Ok(())
    }
}

/// Holder for common parameters used during write.
pub struct SegmentWriteState<D: Directory> {
    /// Directory where this segment will be written to.
    pub directory: Arc<D>,
    pub segment_info: SegmentInfo,
    pub field_infos: Arc<FieldInfos>,
    /// Unique suffix for any files written for this segment. Either empty or
    /// a textual suffix such as the doc values container name.
    pub segment_suffix: String,
    pub context: IOContext,
}

impl<D: Directory> SegmentWriteState<D> {
    pub fn new(
        directory: Arc<D>,
        segment_info: SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: IOContext,
        segment_suffix: String,
    ) -> Self {
        SegmentWriteState {
            directory,
            segment_info,
            field_infos,
            segment_suffix,
            context,
        }
    }

    pub fn with_suffix(&self, suffix: &str) -> Self {
        SegmentWriteState {
            directory: Arc::clone(&self.directory),
            segment_info: self.segment_info.clone(),
            field_infos: Arc::clone(&self.field_infos),
            segment_suffix: String::from(suffix),
            context: self.context,
        }
    }
}

/// Holder for common parameters used during read.
pub struct SegmentReadState<'a, D: Directory> {
    pub directory: Arc<D>,
    pub segment_info: &'a SegmentInfo,
    pub field_infos: Arc<FieldInfos>,
    pub context: &'a IOContext,
    pub segment_suffix: String,
}

impl<'a, D: Directory> SegmentReadState<'a, D> {
    pub fn new(
        directory: Arc<D>,
        segment_info: &'a SegmentInfo,
        field_infos: Arc<FieldInfos>,
        context: &'a IOContext,
        segment_suffix: String,
    ) -> SegmentReadState<'a, D> {
        SegmentReadState {
            directory,
            segment_info,
            field_infos,
            context,
            segment_suffix,
        }
    }

    pub fn with_suffix(state: &SegmentReadState<'a, D>, suffix: &str) -> SegmentReadState<'a, D> {
        Self::new(
            Arc::clone(&state.directory),
            state.segment_info,
            Arc::clone(&state.field_infos),
            state.context,
            String::from(suffix),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_are_renamed_for_segment() {
        let mut si = SegmentInfo::new(
            LUCENE40_VERSION,
            "_3",
            10,
            false,
            HashMap::new(),
            HashMap::new(),
        )
        .unwrap();
        si.add_file("_0.fdt").unwrap();
        si.add_file("_0_dv.cfs").unwrap();
        assert!(si.files().contains("_3.fdt"));
        assert!(si.files().contains("_3_dv.cfs"));
        assert!(si.add_file("_3.tmp").is_err());
        assert!(si.add_file("segments").is_err());
    }

    #[test]
    fn test_del_gen_advances() {
        let si = SegmentInfo::new(LUCENE40_VERSION, "_0", 4, false, HashMap::new(), HashMap::new())
            .unwrap();
        let mut commit = SegmentCommitInfo::new(si, 0, -1);
        assert!(!commit.has_deletions());
        assert_eq!(commit.next_write_del_gen, 1);
        commit.advance_next_write_del_gen();
        commit.advance_del_gen();
        assert_eq!(commit.del_gen, 2);
        assert_eq!(commit.next_write_del_gen, 3);
        assert!(commit.set_del_count(5).is_err());
    }
}
