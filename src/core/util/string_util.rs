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


/// Compares two byte slices, element by element, and returns the
/// number of elements common to both arrays (from the start of each).
pub fn bytes_difference(left: &[u8], right: &[u8]) -> usize {
    left.iter()
        .zip(right.iter())
        .take_while(|&(l, r)| l == r)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_difference() {
        assert_eq!(bytes_difference(b"abc", b"abd"), 2);
        assert_eq!(bytes_difference(b"ab", b"abd"), 2);
        assert_eq!(bytes_difference(b"", b"abd"), 0);
        assert_eq!(bytes_difference(b"xbc", b"abd"), 0);
    }
}
