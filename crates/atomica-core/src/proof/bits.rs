use bitvec::prelude::*;

use crate::crypto::Hash;

/// Number of bits in a sparse Merkle key.
pub const KEY_BITS: usize = 256;

/// Iterates the bits of a 32-byte key, most significant bit of byte 0 first.
///
/// Double-ended, so a proof can walk from its bottom level upward with
/// `KeyBits::new(key).rev().skip(KEY_BITS - depth)`.
#[derive(Clone, Debug)]
pub struct KeyBits<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    front: usize,
    back: usize,
}

impl<'a> KeyBits<'a> {
    pub fn new(key: &'a Hash) -> Self {
        let bits = key.view_bits::<Msb0>();
        Self {
            bits,
            front: 0,
            back: bits.len(),
        }
    }
}

impl Iterator for KeyBits<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.front == self.back {
            return None;
        }
        let bit = self.bits[self.front];
        self.front += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for KeyBits<'_> {
    fn next_back(&mut self) -> Option<bool> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.bits[self.back])
    }
}

impl ExactSizeIterator for KeyBits<'_> {}

/// Bit `index` of `key`, counting from the most significant bit.
pub fn key_bit(key: &Hash, index: usize) -> bool {
    key.view_bits::<Msb0>()[index]
}

/// Length of the shared MSB-first prefix of two keys.
pub fn common_prefix_bits(a: &Hash, b: &Hash) -> usize {
    KeyBits::new(a)
        .zip(KeyBits::new(b))
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bits_msb_first() {
        let mut key = [0u8; 32];
        key[0] = 0b1010_0000;
        key[31] = 0b0000_0001;

        let bits: Vec<bool> = KeyBits::new(&key).collect();
        assert_eq!(bits.len(), KEY_BITS);
        assert_eq!(&bits[..4], &[true, false, true, false]);
        assert!(bits[255]);
        assert!(!bits[254]);

        assert!(key_bit(&key, 0));
        assert!(!key_bit(&key, 1));
        assert!(key_bit(&key, 255));
    }

    #[test]
    fn test_key_bits_reverse() {
        let mut key = [0u8; 32];
        key[31] = 0b0000_0010;
        let mut rev = KeyBits::new(&key).rev();
        assert_eq!(rev.next(), Some(false));
        assert_eq!(rev.next(), Some(true));
        assert_eq!(rev.len(), 254);
    }

    #[test]
    fn test_key_bits_meet_in_the_middle() {
        let key = [0xFFu8; 32];
        let mut bits = KeyBits::new(&key);
        for _ in 0..128 {
            bits.next();
            bits.next_back();
        }
        assert_eq!(bits.next(), None);
        assert_eq!(bits.next_back(), None);
    }

    #[test]
    fn test_common_prefix_bits() {
        let a = [0u8; 32];
        assert_eq!(common_prefix_bits(&a, &a), 256);

        let mut b = a;
        b[0] = 0x80;
        assert_eq!(common_prefix_bits(&a, &b), 0);

        let mut c = a;
        c[1] = 0x01;
        assert_eq!(common_prefix_bits(&a, &c), 15);
    }
}
