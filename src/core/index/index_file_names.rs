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


//! Helpers for the file names that make up a segment.

use core::util::to_base36;

/// Returns a file name that includes the given segment name, the suffix and
/// the extension, e.g. `segment_file_name("_0", "1", "dat")` is `_0_1.dat`.
pub fn segment_file_name(name: &str, suffix: &str, ext: &str) -> String {
    if !ext.is_empty() || !suffix.is_empty() {
        debug_assert!(!ext.starts_with('.'));
        let mut filename = String::with_capacity(name.len() + 2 + suffix.len() + ext.len());
        filename.push_str(name);
        if !suffix.is_empty() {
            filename.push('_');
            filename.push_str(suffix);
        }
        if !ext.is_empty() {
            filename.push('.');
            filename.push_str(ext);
        }
        filename
    } else {
        String::from(name)
    }
}

/// Computes the full file name from base, extension and generation. The
/// generation is rendered in base 36, generation 0 omits it.
pub fn file_name_from_generation(base: &str, ext: &str, gen: u64) -> String {
    if gen == 0 {
        segment_file_name(base, "", ext)
    } else {
        segment_file_name(base, &to_base36(gen), ext)
    }
}

/// Strips the segment name out of the given file name, e.g. `_0_1.dat`
/// becomes `_1.dat` and `_0.fdt` becomes `.fdt`.
pub fn strip_segment_name(filename: &str) -> &str {
    let idx = filename
        .get(1..)
        .and_then(|rest| rest.find('_'))
        .map(|i| i + 1)
        .or_else(|| filename.find('.'));
    match idx {
        Some(idx) => &filename[idx..],
        None => filename,
    }
}

/// Returns the extension of the file name (without the dot), or `""`.
pub fn file_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[idx + 1..],
        None => "",
    }
}

pub fn matches_extension(filename: &str, ext: &str) -> bool {
    file_extension(filename) == ext
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name() {
        assert_eq!(segment_file_name("_0", "", "fdt"), "_0.fdt");
        assert_eq!(segment_file_name("_0", "3", "dat"), "_0_3.dat");
        assert_eq!(segment_file_name("_0", "", ""), "_0");
    }

    #[test]
    fn test_file_name_from_generation() {
        assert_eq!(file_name_from_generation("_3", "del", 0), "_3.del");
        assert_eq!(file_name_from_generation("_3", "del", 37), "_3_11.del");
    }

    #[test]
    fn test_strip_segment_name() {
        assert_eq!(strip_segment_name("_0_1_dv.dat"), "_1_dv.dat");
        assert_eq!(strip_segment_name("_0.fdt"), ".fdt");
        assert_eq!(strip_segment_name("segments"), "segments");
    }

    #[test]
    fn test_matches_extension() {
        assert!(matches_extension("_0.dvd", "dvd"));
        assert!(!matches_extension("_0.dvd", "dvm"));
    }
}
