//! Static Arithmetic Coding
//!
//! The model is a table of 257 cumulative counts built from the whole input
//! before encoding begins.  The coder keeps a 32 bit `low`/`high` interval and
//! renormalizes with the usual three conditions:
//! * E1, interval in the lower half: emit 0
//! * E2, interval in the upper half: emit 1
//! * E3, interval straddles the middle half: defer a bit
//!
//! Intermediate products are computed in 64 bits.  The total count is kept at
//! or below `MAX_TOTAL` so that every symbol with a nonzero count keeps a
//! nonzero share of any interval that survives renormalization.

use crate::tools::bits::{BitReader,BitWriter};
use crate::freq::ByteFrequencyModel;
use crate::Error;

const CODE_BITS: usize = 32;
const TOP: u64 = (1 << CODE_BITS) - 1;
const HALF: u64 = 1 << 31;
const QUARTER: u64 = 1 << 30;
const THREE_QUARTERS: u64 = 3 * QUARTER;
/// largest total count a model may carry
pub const MAX_TOTAL: u32 = 1 << 28;
/// size of a serialized model
pub const MODEL_SIZE: usize = 257 * 4;

/// Cumulative frequency table, symbol `s` owns `[cumulative[s],cumulative[s+1])`
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct ArithmeticModel {
    cumulative: [u32;257]
}

impl Default for ArithmeticModel {
    /// uniform model, every byte has count 1
    fn default() -> Self {
        let mut cumulative = [0;257];
        for i in 0..257 {
            cumulative[i] = i as u32;
        }
        Self {
            cumulative
        }
    }
}

/// halve counts until the total fits, a nonzero count never drops to zero
fn rescale(freqs: &mut [u64;256]) {
    while freqs.iter().sum::<u64>() > MAX_TOTAL as u64 {
        for f in freqs.iter_mut() {
            *f = (*f + 1) >> 1;
        }
    }
}

impl ArithmeticModel {
    fn from_frequencies(freqs: &[u64;256]) -> Self {
        let mut cumulative = [0;257];
        for i in 0..256 {
            cumulative[i+1] = cumulative[i] + freqs[i] as u32;
        }
        Self {
            cumulative
        }
    }
    fn frequencies(&self) -> [u64;256] {
        let mut ans = [0;256];
        for i in 0..256 {
            ans[i] = (self.cumulative[i+1] - self.cumulative[i]) as u64;
        }
        ans
    }
    pub fn total(&self) -> u32 {
        self.cumulative[256]
    }
    /// Could `build_model` have produced this model from `len` bytes.
    /// Rescaling halves a total above `MAX_TOTAL`, so it stays above half of it.
    pub fn counts_length(&self,len: usize) -> bool {
        match len as u64 > MAX_TOTAL as u64 {
            true => self.total() > MAX_TOTAL / 2,
            false => self.total() as usize == len
        }
    }
    pub fn frequency(&self,symbol: u8) -> u32 {
        self.cumulative[symbol as usize + 1] - self.cumulative[symbol as usize]
    }
    /// Adaptive hook: count one more occurrence of `symbol`, rescaling if the
    /// total would pass `MAX_TOTAL`.  Compression in this crate never calls it.
    pub fn update(&mut self,symbol: u8) {
        let mut freqs = self.frequencies();
        freqs[symbol as usize] += 1;
        rescale(&mut freqs);
        *self = Self::from_frequencies(&freqs);
    }
    /// 256 little endian counts followed by the little endian total
    pub fn serialize(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(MODEL_SIZE);
        for s in 0..256 {
            ans.extend_from_slice(&u32::to_le_bytes(self.frequency(s as u8)));
        }
        ans.extend_from_slice(&u32::to_le_bytes(self.total()));
        ans
    }
    pub fn deserialize(dat: &[u8]) -> Result<Self,Error> {
        if dat.len() != MODEL_SIZE {
            log::error!("arithmetic model should be {} bytes, got {}",MODEL_SIZE,dat.len());
            return Err(Error::Corrupt("arithmetic model has wrong size"));
        }
        let mut freqs = [0u64;256];
        for s in 0..256 {
            freqs[s] = u32::from_le_bytes([dat[s*4],dat[s*4+1],dat[s*4+2],dat[s*4+3]]) as u64;
        }
        let total = u32::from_le_bytes([dat[1024],dat[1025],dat[1026],dat[1027]]) as u64;
        if total == 0 || total > MAX_TOTAL as u64 || freqs.iter().sum::<u64>() != total {
            return Err(Error::Corrupt("arithmetic model counts are inconsistent"));
        }
        Ok(Self::from_frequencies(&freqs))
    }
}

/// Count every byte of `dat`, the total equals the length unless the input
/// is longer than `MAX_TOTAL`, in which case the counts are scaled down.
pub fn build_model(dat: &[u8]) -> Result<ArithmeticModel,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("cannot build model from empty input"));
    }
    let hist = ByteFrequencyModel::create(dat);
    let mut freqs = [0u64;256];
    for (s,count) in hist.present() {
        freqs[s as usize] = count;
    }
    if hist.total() > MAX_TOTAL as u64 {
        log::warn!("rescaling arithmetic model, input has {} bytes",hist.total());
        rescale(&mut freqs);
    }
    Ok(ArithmeticModel::from_frequencies(&freqs))
}

/// narrow `[low,high]` to the sub-interval of `[lo,hi)` out of `total`
fn narrow(low: &mut u64,high: &mut u64,lo: u32,hi: u32,total: u32) {
    let range = *high - *low + 1;
    *high = *low + range * hi as u64 / total as u64 - 1;
    *low += range * lo as u64 / total as u64;
}

/// Main compression function
pub fn compress(ibuf: &[u8],model: &ArithmeticModel) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    let total = model.total();
    let mut ans = BitWriter::new();
    let mut low: u64 = 0;
    let mut high: u64 = TOP;
    let mut pending: u64 = 0;
    for sym in ibuf {
        let s = *sym as usize;
        let (lo,hi) = (model.cumulative[s],model.cumulative[s+1]);
        if lo == hi {
            log::error!("symbol {} has zero frequency",sym);
            return Err(Error::InvalidArgument("symbol is not in the model"));
        }
        narrow(&mut low,&mut high,lo,hi,total);
        loop {
            if high < HALF {
                ans.put_bit(false);
                ans.put_repeated(true,pending);
                pending = 0;
            } else if low >= HALF {
                ans.put_bit(true);
                ans.put_repeated(false,pending);
                pending = 0;
                low -= HALF;
                high -= HALF;
            } else if low >= QUARTER && high < THREE_QUARTERS {
                pending += 1;
                low -= QUARTER;
                high -= QUARTER;
            } else {
                break;
            }
            low <<= 1;
            high = (high << 1) | 1;
        }
    }
    // one more bit selects a quarter that lies inside the final interval
    pending += 1;
    if low < QUARTER {
        ans.put_bit(false);
        ans.put_repeated(true,pending);
    } else {
        ans.put_bit(true);
        ans.put_repeated(false,pending);
    }
    log::debug!("coded {} symbols into {} bits",ibuf.len(),ans.len());
    Ok(ans.finish())
}

/// Number of bytes `compress` emits for a stream that renormalized `shifts` times.
/// Every shift accounts for one bit, and the final quarter selection adds two.
fn stream_bytes(shifts: u64) -> u64 {
    (shifts + 2 + 7) / 8
}

/// Main decompression function, the stream is read as if followed by zeros.
/// The renormalizations needed for `expected_len` symbols fix the length of the
/// stream, so both a short stream and unused bytes are errors.
pub fn expand(ibuf: &[u8],model: &ArithmeticModel,expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    let total = model.total();
    if total == 0 {
        return Err(Error::InvalidArgument("empty model"));
    }
    let mut ans = crate::output_buffer(expected_len)?;
    let mut bits = BitReader::new(ibuf);
    let mut low: u64 = 0;
    let mut high: u64 = TOP;
    let mut value: u64 = 0;
    for _i in 0..CODE_BITS {
        value = (value << 1) | bits.get_bit_or_zero() as u64;
    }
    let available = ibuf.len() as u64;
    let mut shifts: u64 = 0;
    while ans.len() < expected_len {
        if value < low || value > high {
            log::error!("code value left the interval at symbol {}",ans.len());
            return Err(Error::Corrupt("code value outside interval"));
        }
        let range = high - low + 1;
        let scaled = ((value - low + 1) * total as u64 - 1) / range;
        if scaled >= total as u64 {
            return Err(Error::Corrupt("scaled value exceeds total"));
        }
        // linear scan for the interval containing the scaled value
        let mut s = 0;
        while model.cumulative[s+1] as u64 <= scaled {
            s += 1;
        }
        ans.push(s as u8);
        narrow(&mut low,&mut high,model.cumulative[s],model.cumulative[s+1],total);
        loop {
            if high < HALF {
                // lower half, nothing to subtract
            } else if low >= HALF {
                low -= HALF;
                high -= HALF;
                value -= HALF;
            } else if low >= QUARTER && high < THREE_QUARTERS {
                low -= QUARTER;
                high -= QUARTER;
                value -= QUARTER;
            } else {
                break;
            }
            low <<= 1;
            high = (high << 1) | 1;
            value = (value << 1) | bits.get_bit_or_zero() as u64;
            shifts += 1;
        }
        if stream_bytes(shifts) > available {
            log::error!("stream ended after {} of {} symbols",ans.len() - 1,expected_len);
            return Err(Error::LengthMismatch { expected: expected_len, actual: ans.len() - 1 });
        }
    }
    if stream_bytes(shifts) < available {
        log::error!("{} bytes remain after {} symbols",available - stream_bytes(shifts),expected_len);
        return Err(Error::Corrupt("data remains after expected length"));
    }
    Ok(ans)
}

#[cfg(test)]
fn lcg_bytes(n: usize,seed: u32) -> Vec<u8> {
    let mut x = seed;
    let mut ans = Vec::new();
    for _i in 0..n {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        ans.push((x >> 16) as u8);
    }
    ans
}

#[test]
fn total_is_length() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let model = build_model(test_data).expect("model failed");
    assert_eq!(model.total() as usize,test_data.len());
    assert_eq!(model.frequency(b'S'),3);
    assert_eq!(model.frequency(b'z'),0);
}

#[test]
fn single_symbol() {
    let test_data = "aaaaaaaa".as_bytes();
    let model = build_model(test_data).expect("model failed");
    let compressed = compress(test_data,&model).expect("compression failed");
    // the symbol owns the whole interval, only the final bits are emitted
    assert_eq!(compressed,vec![0x40]);
    assert_eq!(expand(&compressed,&model,8).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let model = build_model(test_data).expect("model failed");
    let compressed = compress(test_data,&model).expect("compression failed");
    assert!(compressed.len() < test_data.len());
    let model2 = ArithmeticModel::deserialize(&model.serialize()).expect("deserialize failed");
    assert_eq!(model,model2);
    let expanded = expand(&compressed,&model2,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn skewed_and_random() {
    let mut skewed = vec![b'x';5000];
    skewed.push(b'y');
    skewed.extend_from_slice(&lcg_bytes(3,7));
    for test_data in [skewed,lcg_bytes(20000,1),(0..=255).collect()] {
        let model = build_model(&test_data).expect("model failed");
        let compressed = compress(&test_data,&model).expect("compression failed");
        let expanded = expand(&compressed,&model,test_data.len()).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn uniform_model() {
    let model = ArithmeticModel::default();
    assert_eq!(model.total(),256);
    let test_data: Vec<u8> = (0..=255).rev().collect();
    let compressed = compress(&test_data,&model).expect("compression failed");
    // uniform coding cannot beat 8 bits per symbol
    assert!(compressed.len() >= 256);
    assert_eq!(expand(&compressed,&model,256).expect("expansion failed"),test_data);
}

#[test]
fn model_format() {
    let model = build_model(b"abb").unwrap();
    let ser = model.serialize();
    assert_eq!(ser.len(),MODEL_SIZE);
    assert_eq!(ser[b'a' as usize*4..b'a' as usize*4+4],[1,0,0,0]);
    assert_eq!(ser[b'b' as usize*4..b'b' as usize*4+4],[2,0,0,0]);
    assert_eq!(ser[1024..],[3,0,0,0]);
    // total disagrees with counts
    let mut bad = ser.clone();
    bad[1024] = 4;
    assert!(ArithmeticModel::deserialize(&bad).is_err());
    assert!(ArithmeticModel::deserialize(&ser[1..]).is_err());
    assert!(ArithmeticModel::deserialize(&[0u8;MODEL_SIZE]).is_err());
}

#[test]
fn adaptive_update() {
    let mut model = build_model(b"ab").unwrap();
    model.update(b'c');
    model.update(b'a');
    assert_eq!(model.total(),4);
    assert_eq!(model.frequency(b'a'),2);
    assert_eq!(model.frequency(b'c'),1);
    let test_data = "abcacab".as_bytes();
    let compressed = compress(test_data,&model).expect("compression failed");
    assert_eq!(expand(&compressed,&model,7).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn bad_input() {
    assert!(build_model(&[]).is_err());
    let model = build_model(b"abab").unwrap();
    assert!(compress(b"abc",&model).is_err());
    assert!(expand(&[0],&model,0).is_err());
}

#[test]
fn rescaled_counts_stay_nonzero() {
    let mut freqs = [0u64;256];
    freqs[0] = MAX_TOTAL as u64 * 3;
    freqs[1] = 1;
    rescale(&mut freqs);
    assert!(freqs.iter().sum::<u64>() <= MAX_TOTAL as u64);
    assert_eq!(freqs[1],1);
    assert_eq!(ArithmeticModel::from_frequencies(&freqs).frequency(1),1);
}

#[test]
fn wrong_expected_length() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let model = build_model(test_data).expect("model failed");
    let compressed = compress(test_data,&model).expect("compression failed");
    assert!(matches!(expand(&compressed,&model,10),Err(Error::Corrupt(_))));
    assert!(matches!(expand(&compressed,&model,90),Err(Error::LengthMismatch { expected: 90, .. })));
    // half a stream cannot hold every symbol
    let truncated = &compressed[..compressed.len()/2];
    assert!(matches!(expand(truncated,&model,test_data.len()),Err(Error::LengthMismatch { expected, .. }) if expected == test_data.len()));
    let mut padded = compressed.clone();
    padded.push(0);
    assert!(matches!(expand(&padded,&model,test_data.len()),Err(Error::Corrupt(_))));
}

#[test]
fn model_knows_its_length() {
    let model = build_model(b"aaaaaaaa").unwrap();
    assert!(model.counts_length(8));
    assert!(!model.counts_length(100000));
    // a single symbol model spends no bits per symbol, only the model can tell
    assert!(expand(&[0x40],&model,100000).is_ok());
    let mut freqs = [0u64;256];
    freqs[0] = MAX_TOTAL as u64 + 1;
    rescale(&mut freqs);
    let big = ArithmeticModel::from_frequencies(&freqs);
    assert!(big.counts_length(MAX_TOTAL as usize + 1));
    assert!(!big.counts_length(5));
}
