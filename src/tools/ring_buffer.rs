//! Ring buffer for LZ type compression windows
use num_traits::PrimInt;

/// Fixed capacity history.  Values are pushed at the cursor, once the buffer is
/// full each push evicts the oldest value.  Offsets are counted backward from
/// the most recent value, which is at offset 1.
pub struct RingBuffer<T: PrimInt> {
    buf: Vec<T>,
    pos: usize,
    filled: usize,
    n: usize
}

impl <T: PrimInt> RingBuffer<T> {
    pub fn create(fill: T,n: usize) -> Self {
        Self {
            buf: vec![fill;n],
            pos: 0,
            filled: 0,
            n
        }
    }
    /// number of values currently held, never more than the capacity
    pub fn len(&self) -> usize {
        self.filled
    }
    /// get absolute position of cursor - offset
    fn get_pos(&self,offset: usize) -> usize {
        (self.pos as i64 - offset as i64).rem_euclid(self.n as i64) as usize
    }
    /// write at the cursor and advance it by 1
    pub fn push(&mut self,val: T) {
        self.buf[self.pos] = val;
        self.pos = (self.pos + 1) % self.n;
        if self.filled < self.n {
            self.filled += 1;
        }
    }
    /// Value `offset` positions behind the cursor, `offset` in 1..=len.
    /// Returns None if the offset reaches beyond what has been pushed.
    pub fn get_behind(&self,offset: usize) -> Option<T> {
        if offset == 0 || offset > self.filled {
            return None;
        }
        Some(self.buf[self.get_pos(offset)])
    }
}

#[test]
fn offset() {
    let mut ring: RingBuffer<u8> = RingBuffer::create(0,4);
    for v in 1..=3 {
        ring.push(v);
    }
    assert_eq!(ring.len(),3);
    assert_eq!(ring.get_behind(1),Some(3));
    assert_eq!(ring.get_behind(3),Some(1));
    assert_eq!(ring.get_behind(4),None);
    assert_eq!(ring.get_behind(0),None);
}

#[test]
fn eviction() {
    // four positions 0 1 2 3, six pushes wrap once
    let mut ring: RingBuffer<u8> = RingBuffer::create(0,4);
    for v in 1..=6 {
        ring.push(v);
    }
    assert_eq!(ring.len(),4);
    assert_eq!(ring.get_behind(1),Some(6));
    assert_eq!(ring.get_behind(4),Some(3));
    assert_eq!(ring.get_behind(5),None);
}
