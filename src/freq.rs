//! Byte histogram
//!
//! One pass over the input, shared by the entropy coders, and by the escape
//! byte analysis of the LZ77 and RLE coders.

/// Occurrence count of every byte value over a buffer
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct ByteFrequencyModel {
    counts: [u64;256],
    total: u64
}

impl ByteFrequencyModel {
    pub fn create(dat: &[u8]) -> Self {
        let mut counts = [0;256];
        for byte in dat {
            counts[*byte as usize] += 1;
        }
        Self {
            counts,
            total: dat.len() as u64
        }
    }
    pub fn count(&self,symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }
    pub fn total(&self) -> u64 {
        self.total
    }
    /// number of byte values that occur at least once
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|c| **c > 0).count()
    }
    /// (symbol,count) for symbols that occur, in ascending symbol order
    pub fn present(&self) -> impl Iterator<Item = (u8,u64)> + '_ {
        self.counts.iter().enumerate().filter(|(_,c)| **c > 0).map(|(s,c)| (s as u8,*c))
    }
    /// Best escape byte: the least frequent value in 1..=255, so an absent byte
    /// wins whenever there is one.  Ties go to the lowest value.  Zero is never
    /// chosen since runs of zeros are common in binary data.
    pub fn escape_candidate(&self) -> u8 {
        let mut best: u8 = 1;
        for sym in 2..=255 {
            if self.counts[sym as usize] < self.counts[best as usize] {
                best = sym;
            }
        }
        best
    }
}

#[test]
fn histogram() {
    let model = ByteFrequencyModel::create(b"abracadabra");
    assert_eq!(model.total(),11);
    assert_eq!(model.count(b'a'),5);
    assert_eq!(model.count(b'r'),2);
    assert_eq!(model.count(b'z'),0);
    assert_eq!(model.distinct(),5);
    let present: Vec<u8> = model.present().map(|(s,_)| s).collect();
    assert_eq!(present,b"abcdr".to_vec());
}

#[test]
fn escape_choice() {
    assert_eq!(ByteFrequencyModel::create(b"abc").escape_candidate(),1);
    // every value twice, except 0x42 once and 0x00 not at all
    let mut dat: Vec<u8> = (1..=255).chain(1..=255).collect();
    let idx = dat.iter().position(|b| *b == 0x42).unwrap();
    dat.remove(idx);
    assert_eq!(ByteFrequencyModel::create(&dat).escape_candidate(),0x42);
}
