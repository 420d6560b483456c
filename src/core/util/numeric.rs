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


/// Renders `val` in base 36 with lower case digits, the way generation
/// numbers appear in file names.
pub fn to_base36(val: u64) -> String {
    let base36 = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut val = val;
    let mut result = Vec::with_capacity(14);
    loop {
        result.push(base36[(val % 36) as usize]);
        val /= 36;
        if val == 0 {
            result.reverse();
            return String::from_utf8_lossy(&result).into_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1295), "zz");
    }
}
