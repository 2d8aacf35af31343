//! MSB-first bit streams over `bit_vec::BitVec`.
//!
//! Every codec in this crate packs the most significant bit of a code first,
//! and pads the final byte with zeros, which is exactly what `BitVec::to_bytes`
//! produces, so no bit order options are needed here.

use bit_vec::BitVec;

/// Accumulates bits, owned by one compression call.
pub struct BitWriter {
    bits: BitVec
}

/// Reads bits from a compressed buffer, keeping a cursor.
pub struct BitReader {
    bits: BitVec,
    ptr: usize
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    pub fn with_capacity(num_bits: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(num_bits)
        }
    }
    pub fn put_bit(&mut self,bit: bool) {
        self.bits.push(bit);
    }
    /// output the same bit `count` times, used for pending bits
    pub fn put_repeated(&mut self,bit: bool,count: u64) {
        for _i in 0..count {
            self.bits.push(bit);
        }
    }
    /// output `num_bits` of `code` starting from the MSB, `num_bits` can be at most 64
    pub fn put_code(&mut self,num_bits: u8,code: u64) {
        for i in (0..num_bits).rev() {
            self.bits.push((code >> i) & 1 > 0);
        }
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    /// pad to a byte boundary with zeros and return the bytes
    pub fn finish(self) -> Vec<u8> {
        let mut ans = self.bits.to_bytes();
        ans.shrink_to_fit();
        ans
    }
}

impl BitReader {
    pub fn new(dat: &[u8]) -> Self {
        Self {
            bits: BitVec::from_bytes(dat),
            ptr: 0
        }
    }
    /// get the next bit, or None if the stream is exhausted
    pub fn get_bit(&mut self) -> Option<bool> {
        let ans = self.bits.get(self.ptr);
        if ans.is_some() {
            self.ptr += 1;
        }
        ans
    }
    /// get the next bit, reading zeros past the end of the stream
    pub fn get_bit_or_zero(&mut self) -> bool {
        self.get_bit().unwrap_or(false)
    }
    /// get `num_bits` (at most 64) MSB first, or None if not enough bits remain
    pub fn get_code(&mut self,num_bits: u8) -> Option<u64> {
        if self.remaining() < num_bits as usize {
            return None;
        }
        let mut ans: u64 = 0;
        for _i in 0..num_bits {
            ans <<= 1;
            ans |= self.get_bit()? as u64;
        }
        Some(ans)
    }
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.ptr
    }
}

#[test]
fn codes_pack_msb_first() {
    let mut w = BitWriter::new();
    w.put_code(3,0b101);
    w.put_bit(true);
    w.put_repeated(false,2);
    w.put_code(12,0xabc);
    assert_eq!(w.len(),18);
    assert_eq!(w.finish(),vec![0xb2,0xaf,0x00]);
}

#[test]
fn reader_stops_at_end() {
    let mut r = BitReader::new(&[0xb2,0xaf]);
    assert_eq!(r.get_code(3),Some(0b101));
    assert_eq!(r.remaining(),13);
    assert_eq!(r.get_code(14),None);
    assert_eq!(r.get_code(13),Some(0x12af));
    assert_eq!(r.get_bit(),None);
    assert!(!r.get_bit_or_zero());
}
