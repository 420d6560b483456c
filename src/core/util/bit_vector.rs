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


use core::util::Bits;

use error::ErrorKind::{CorruptIndex, IndexOutOfBounds};
use error::Result;

use std::sync::atomic::{AtomicIsize, Ordering};

/// Optimized implementation of a vector of bits.
///
/// Bit `i` lives in byte `i >> 3` under mask `1 << (i & 7)`. Unused bits of
/// the last byte are always zero. The number of set bits is cached and
/// recomputed lazily after any mutation.
pub struct BitVector {
    bits: Vec<u8>,
    size: usize,
    count: AtomicIsize,
}

impl BitVector {
    /// Constructs a vector capable of holding `n` bits, all cleared.
    pub fn new(n: usize) -> BitVector {
        BitVector {
            bits: vec![0u8; Self::num_bytes(n)],
            size: n,
            count: AtomicIsize::new(0),
        }
    }

    /// Wraps `bits` holding `size` bits. Unused trailing bits must be zero.
    pub fn from_bytes(bits: Vec<u8>, size: usize) -> Result<BitVector> {
        if bits.len() != Self::num_bytes(size) {
            bail!(CorruptIndex(format!(
                "bit vector of {} bits needs {} bytes, got {}",
                size,
                Self::num_bytes(size),
                bits.len()
            )));
        }
        let v = BitVector {
            bits,
            size,
            count: AtomicIsize::new(-1),
        };
        if v.has_unused_bits_set() {
            bail!(CorruptIndex(format!(
                "bit vector of {} bits has trailing bits set",
                size
            )));
        }
        Ok(v)
    }

    #[inline]
    pub fn num_bytes(size: usize) -> usize {
        (size + 7) >> 3
    }

    #[inline]
    fn check_index(&self, bit: usize) -> Result<()> {
        if bit >= self.size {
            bail!(IndexOutOfBounds(format!(
                "bit index {} out of bounds for length {}",
                bit, self.size
            )));
        }
        Ok(())
    }

    #[inline]
    fn invalidate_count(&mut self) {
        *self.count.get_mut() = -1;
    }

    /// Sets the value of `bit` to one.
    pub fn set(&mut self, bit: usize) -> Result<()> {
        self.check_index(bit)?;
        self.bits[bit >> 3] |= 1 << (bit & 7);
        self.invalidate_count();
        Ok(())
    }

    /// Sets the value of `bit` to one, returning the previous value.
    pub fn get_and_set(&mut self, bit: usize) -> Result<bool> {
        self.check_index(bit)?;
        let pos = bit >> 3;
        let mask = 1u8 << (bit & 7);
        let old = self.bits[pos] & mask != 0;
        self.bits[pos] |= mask;
        self.invalidate_count();
        Ok(old)
    }

    /// Sets the value of `bit` to zero.
    pub fn clear(&mut self, bit: usize) -> Result<()> {
        self.check_index(bit)?;
        self.bits[bit >> 3] &= !(1 << (bit & 7));
        self.invalidate_count();
        Ok(())
    }

    /// Sets the value of `bit` to zero, returning the previous value.
    pub fn get_and_clear(&mut self, bit: usize) -> Result<bool> {
        self.check_index(bit)?;
        let pos = bit >> 3;
        let mask = 1u8 << (bit & 7);
        let old = self.bits[pos] & mask != 0;
        self.bits[pos] &= !mask;
        self.invalidate_count();
        Ok(old)
    }

    /// Returns the number of bits set in this vector. Computed lazily and
    /// cached until the next mutation.
    pub fn count(&self) -> usize {
        let cached = self.count.load(Ordering::Acquire);
        if cached >= 0 {
            return cached as usize;
        }
        let c = self.recount();
        self.count.store(c as isize, Ordering::Release);
        c
    }

    /// Counts set bits from scratch, ignoring the cache.
    pub fn recount(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Flips every bit within `[0, len)`.
    pub fn invert_all(&mut self) {
        for b in &mut self.bits {
            *b = !*b;
        }
        self.clear_unused_bits();
        self.invalidate_count();
    }

    /// Sets every bit within `[0, len)`.
    pub fn set_all(&mut self) {
        for b in &mut self.bits {
            *b = 0xff;
        }
        self.clear_unused_bits();
        self.invalidate_count();
    }

    pub(crate) fn clear_unused_bits(&mut self) {
        let used = self.size & 7;
        if used != 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
    }

    fn has_unused_bits_set(&self) -> bool {
        let used = self.size & 7;
        match self.bits.last() {
            Some(last) if used != 0 => *last & !((1u8 << used) - 1) != 0,
            _ => false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bits
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.invalidate_count();
        &mut self.bits
    }
}

impl Bits for BitVector {
    fn get(&self, bit: usize) -> Result<bool> {
        self.check_index(bit)?;
        Ok(self.bits[bit >> 3] & (1 << (bit & 7)) != 0)
    }

    fn len(&self) -> usize {
        self.size
    }
}

impl Clone for BitVector {
    fn clone(&self) -> Self {
        BitVector {
            bits: self.bits.clone(),
            size: self.size,
            count: AtomicIsize::new(self.count.load(Ordering::Acquire)),
        }
    }
}

impl PartialEq for BitVector {
    fn eq(&self, other: &BitVector) -> bool {
        self.size == other.size && self.bits == other.bits
    }
}

impl ::std::fmt::Debug for BitVector {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "BitVector(size={}, count={})", self.size, self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear_count() {
        let mut bv = BitVector::new(13);
        assert_eq!(bv.count(), 0);
        bv.set(0).unwrap();
        bv.set(12).unwrap();
        assert_eq!(bv.count(), 2);
        assert!(bv.get(12).unwrap());
        assert!(!bv.get(11).unwrap());
        assert!(bv.get_and_clear(12).unwrap());
        assert!(!bv.get_and_set(5).unwrap());
        assert_eq!(bv.count(), 2);
        assert!(bv.get(13).is_err());
        assert!(bv.set(13).is_err());
    }

    #[test]
    fn test_invert_all_keeps_trailing_bits_zero() {
        let mut bv = BitVector::new(10);
        bv.set(3).unwrap();
        bv.invert_all();
        assert_eq!(bv.count(), 9);
        assert_eq!(bv.bytes()[1], 0b11);
        bv.set_all();
        assert_eq!(bv.count(), 10);
    }

    #[test]
    fn test_from_bytes_rejects_trailing_bits() {
        assert!(BitVector::from_bytes(vec![0xff, 0xff], 10).is_err());
        assert!(BitVector::from_bytes(vec![0xff], 10).is_err());
        let bv = BitVector::from_bytes(vec![0xff, 0x03], 10).unwrap();
        assert_eq!(bv.count(), 10);
    }
}
