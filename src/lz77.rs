//! LZ77 Compression
//!
//! Greedy longest match over a 1024 byte sliding window.  The output is a
//! byte stream where one reserved escape byte (the prefix) introduces tokens:
//! * `b` - literal, any byte other than the prefix
//! * `prefix 0` - the prefix byte itself as a literal
//! * `prefix combined low` - a match, `combined` holds the top 2 bits of the
//!   offset and the length, `low` holds the low 8 bits of the offset
//!
//! The prefix is the only model, it has to be supplied to `expand`.

use crate::tools::ring_buffer::RingBuffer;
use crate::freq::ByteFrequencyModel;
use crate::Error;

pub const WINDOW_SIZE: usize = 1024;
pub const LOOKAHEAD_SIZE: usize = 66;
pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 65;

/// The escape byte
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Lz77Context {
    pub prefix: u8
}

impl Lz77Context {
    pub fn serialize(&self) -> Vec<u8> {
        vec![self.prefix]
    }
    pub fn deserialize(dat: &[u8]) -> Result<Self,Error> {
        match dat {
            [prefix] => Ok(Self { prefix: *prefix }),
            _ => Err(Error::Corrupt("LZ77 model must be 1 byte"))
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Token {
    Literal(u8),
    /// copy `length` bytes starting `offset` bytes back
    Match { offset: usize, length: usize }
}

/// Least frequent byte in 1..=255
pub fn analyze_prefix(dat: &[u8]) -> u8 {
    ByteFrequencyModel::create(dat).escape_candidate()
}

pub fn build_model(dat: &[u8]) -> Result<Lz77Context,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("cannot build model from empty input"));
    }
    let prefix = analyze_prefix(dat);
    log::debug!("LZ77 prefix is {:02x}",prefix);
    Ok(Lz77Context { prefix })
}

/// Longest match for position `pos`, as (offset,length).  Offsets are tried
/// from 1 upward, the first of equally long matches is kept.  The match may
/// run past `pos`, i.e. overlap the bytes it produces.
fn longest_match(dat: &[u8],pos: usize) -> (usize,usize) {
    let max_len = usize::min(MAX_MATCH,dat.len() - pos).min(LOOKAHEAD_SIZE);
    let mut best = (0,0);
    for offset in 1..=usize::min(pos,WINDOW_SIZE) {
        let start = pos - offset;
        let mut len = 0;
        while len < max_len && dat[start+len] == dat[pos+len] {
            len += 1;
        }
        if len > best.1 {
            best = (offset,len);
            if len == max_len {
                break;
            }
        }
    }
    best
}

/// Split the input into literals and matches
pub fn tokenize(dat: &[u8]) -> Vec<Token> {
    let mut ans = Vec::new();
    let mut pos = 0;
    while pos < dat.len() {
        let (offset,length) = longest_match(dat,pos);
        if length >= MIN_MATCH {
            log::trace!("match at {}: offset {} length {}",pos,offset,length);
            ans.push(Token::Match { offset, length });
            pos += length;
        } else {
            ans.push(Token::Literal(dat[pos]));
            pos += 1;
        }
    }
    ans
}

/// Main compression function
pub fn compress(ibuf: &[u8],ctx: &Lz77Context) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    let mut ans = Vec::new();
    let mut matches = 0;
    for tok in tokenize(ibuf) {
        match tok {
            Token::Literal(b) if b == ctx.prefix => ans.extend_from_slice(&[ctx.prefix,0]),
            Token::Literal(b) => ans.push(b),
            Token::Match { offset, length } => {
                let s_enc = (offset - 1) as u16;
                let l_enc = (length - 2) as u8;
                let combined = (((s_enc >> 8) & 0x03) as u8) << 6 | (l_enc & 0x3f);
                ans.extend_from_slice(&[ctx.prefix,combined,(s_enc & 0xff) as u8]);
                matches += 1;
            }
        }
    }
    log::debug!("{} matches, {} bytes in, {} bytes out",matches,ibuf.len(),ans.len());
    ans.shrink_to_fit();
    Ok(ans)
}

/// Main decompression function
pub fn expand(ibuf: &[u8],ctx: &Lz77Context,expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    let mut ans = crate::output_buffer(expected_len)?;
    let mut window: RingBuffer<u8> = RingBuffer::create(0,WINDOW_SIZE);
    let mut iter = ibuf.iter();
    while let Some(b) = iter.next() {
        if *b != ctx.prefix {
            ans.push(*b);
            window.push(*b);
            continue;
        }
        let combined = *iter.next().ok_or(Error::Corrupt("token is truncated"))?;
        if combined == 0 {
            ans.push(ctx.prefix);
            window.push(ctx.prefix);
            continue;
        }
        let s_low = *iter.next().ok_or(Error::Corrupt("token is truncated"))?;
        let length = (combined & 0x3f) as usize + 2;
        let offset = ((((combined >> 6) as usize) << 8) | s_low as usize) + 1;
        if length < MIN_MATCH || offset > window.len() {
            log::error!("bad match token: offset {} length {} window {}",offset,length,window.len());
            return Err(Error::Corrupt("match token out of range"));
        }
        for _i in 0..length {
            // byte `offset` back is always present since offset <= window.len()
            let val = window.get_behind(offset).ok_or(Error::Corrupt("match token out of range"))?;
            ans.push(val);
            window.push(val);
        }
        if ans.len() > expected_len {
            break;
        }
    }
    if ans.len() != expected_len {
        log::error!("decoded {} bytes, expected {}",ans.len(),expected_len);
        return Err(Error::LengthMismatch { expected: expected_len, actual: ans.len() });
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
fn repeated_pattern() {
    let test_data = "abcabcabcabc".as_bytes();
    let ctx = Lz77Context { prefix: 1 };
    assert_eq!(tokenize(test_data),vec![
        Token::Literal(b'a'),Token::Literal(b'b'),Token::Literal(b'c'),
        Token::Match { offset: 3, length: 9 }
    ]);
    let compressed = compress(test_data,&ctx).expect("compression failed");
    assert_eq!(compressed,hex::decode("616263010702").unwrap());
    assert_eq!(expand(&compressed,&ctx,12).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn escaped_literal() {
    let ctx = Lz77Context { prefix: 1 };
    let compressed = compress(&[1,b'x'],&ctx).expect("compression failed");
    assert_eq!(compressed,vec![1,0,b'x']);
    assert_eq!(expand(&compressed,&ctx,2).expect("expansion failed"),vec![1,b'x']);
}

#[test]
fn overlapping_run() {
    // one literal then a self-overlapping match of offset 1
    let test_data = vec![b'z';40];
    assert_eq!(tokenize(&test_data),vec![Token::Literal(b'z'),Token::Match { offset: 1, length: 39 }]);
    let ctx = build_model(&test_data).unwrap();
    let compressed = compress(&test_data,&ctx).expect("compression failed");
    assert_eq!(compressed.len(),4);
    assert_eq!(expand(&compressed,&ctx,40).expect("expansion failed"),test_data);
}

#[test]
fn token_bounds() {
    let mut test_data = Vec::new();
    let noise = lcg_bytes(3000,9);
    for i in 0..3000 {
        // long stretches of repeats at many distances
        test_data.push(noise[i % 700] & 0x0f);
    }
    test_data.extend_from_slice(&[0;500]);
    let tokens = tokenize(&test_data);
    let mut matched = 0;
    for tok in tokens {
        if let Token::Match { offset, length } = tok {
            assert!(offset >= 1 && offset <= WINDOW_SIZE);
            assert!(length >= MIN_MATCH && length <= MAX_MATCH);
            matched += length;
        }
    }
    assert!(matched > 2000);
    let ctx = build_model(&test_data).unwrap();
    let compressed = compress(&test_data,&ctx).expect("compression failed");
    assert_eq!(expand(&compressed,&ctx,test_data.len()).expect("expansion failed"),test_data);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let ctx = build_model(test_data).unwrap();
    let ctx2 = Lz77Context::deserialize(&ctx.serialize()).unwrap();
    let compressed = compress(test_data,&ctx).expect("compression failed");
    assert!(compressed.len() < test_data.len());
    assert_eq!(expand(&compressed,&ctx2,test_data.len()).expect("expansion failed"),test_data.to_vec());
    let all: Vec<u8> = (0..=255).collect();
    let ctx = build_model(&all).unwrap();
    let compressed = compress(&all,&ctx).expect("compression failed");
    assert_eq!(expand(&compressed,&ctx,256).expect("expansion failed"),all);
}

#[test]
fn corrupt_tokens() {
    let ctx = Lz77Context { prefix: 1 };
    // offset 4 with only 3 bytes of history
    assert!(matches!(expand(&[b'a',b'b',b'c',1,0x01,0x03],&ctx,6),Err(Error::Corrupt(_))));
    // length field of 0 with offset bits set
    assert!(matches!(expand(&[b'a',1,0x40,0x00],&ctx,3),Err(Error::Corrupt(_))));
    // truncated token
    assert!(matches!(expand(&[b'a',1],&ctx,2),Err(Error::Corrupt(_))));
    // too short
    assert!(matches!(expand(&[b'a'],&ctx,2),Err(Error::LengthMismatch { expected: 2, actual: 1 })));
    assert!(Lz77Context::deserialize(&[]).is_err());
}
