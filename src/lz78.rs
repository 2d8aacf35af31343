//! LZ78 Compression
//!
//! The dictionary starts with the 256 single byte phrases.  Each token is a
//! 12 bit code followed by a byte, and stands for the phrase of the code
//! extended by the byte.  That extended phrase becomes the next dictionary
//! entry.  When all 4096 codes are in use the next insertion first resets the
//! dictionary to its seed state, the decoder does the same at the same point.
//!
//! The token `(0,b)` at the very end of the stream, when exactly one byte is
//! still expected, stands for the single byte `b`.  In any other position it
//! is the phrase `0x00 b`.
//!
//! There is no model, the serialized model is empty.

use std::collections::HashMap;
use crate::tools::bits::{BitReader,BitWriter};
use crate::Error;

pub const CODE_BITS: u8 = 12;
pub const MAX_CODES: usize = 1 << CODE_BITS;
const SEED_CODES: usize = 256;
const TOKEN_BITS: usize = CODE_BITS as usize + 8;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Token {
    pub code: u16,
    pub next: u8
}

/// Phrases are stored as (prefix code,last byte) links, the seed phrases
/// are implicit.
struct Dictionary {
    lookup: HashMap<(u16,u8),u16>,
    links: Vec<(u16,u8)>
}

impl Dictionary {
    fn new() -> Self {
        Self {
            lookup: HashMap::new(),
            links: Vec::with_capacity(MAX_CODES - SEED_CODES)
        }
    }
    fn len(&self) -> usize {
        SEED_CODES + self.links.len()
    }
    fn reset(&mut self) {
        log::debug!("LZ78 dictionary reset");
        self.lookup.clear();
        self.links.clear();
    }
    fn find(&self,code: u16,next: u8) -> Option<u16> {
        self.lookup.get(&(code,next)).copied()
    }
    /// Add phrase(code)+next, resetting first if the dictionary is full.
    /// Returns the new code.
    fn insert(&mut self,code: u16,next: u8) -> u16 {
        if self.len() >= MAX_CODES {
            self.reset();
        }
        let new_code = self.len() as u16;
        self.lookup.insert((code,next),new_code);
        self.links.push((code,next));
        new_code
    }
    /// Append the phrase for `code` to `out`
    fn phrase(&self,code: u16,out: &mut Vec<u8>) -> Result<(),Error> {
        if code as usize >= self.len() {
            log::error!("code {} is not defined, dictionary has {}",code,self.len());
            return Err(Error::Corrupt("code is not in the dictionary"));
        }
        let start = out.len();
        let mut curs = code as usize;
        while curs >= SEED_CODES {
            let (prefix,last) = self.links[curs - SEED_CODES];
            out.push(last);
            curs = prefix as usize;
        }
        out.push(curs as u8);
        out[start..].reverse();
        Ok(())
    }
}

/// Greedy parse of `dat` into tokens
pub fn tokenize(dat: &[u8]) -> Vec<Token> {
    parse(dat,&mut Dictionary::new())
}

/// Parse into tokens, leaving the phrases learned in `dict`
fn parse(dat: &[u8],dict: &mut Dictionary) -> Vec<Token> {
    let mut ans = Vec::new();
    let mut iter = dat.iter();
    while let Some(first) = iter.next() {
        // (code of the matched phrase, code of the phrase minus its last byte)
        let mut curr = *first as u16;
        let mut prev: Option<u16> = None;
        let mut closed = false;
        for b in iter.by_ref() {
            match dict.find(curr,*b) {
                Some(code) => {
                    prev = Some(curr);
                    curr = code;
                },
                None => {
                    ans.push(Token { code: curr, next: *b });
                    dict.insert(curr,*b);
                    closed = true;
                    break;
                }
            }
        }
        if !closed {
            // input ended inside a known phrase
            let last = dat[dat.len()-1];
            match prev {
                Some(code) => ans.push(Token { code, next: last }),
                None => ans.push(Token { code: 0, next: last })
            }
        }
    }
    ans
}

/// Rebuild the data from tokens, `expected_len` is needed to recognize a
/// final lone byte.
pub fn detokenize(tokens: &[Token],expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    let mut ans = crate::output_buffer(expected_len)?;
    let mut dict = Dictionary::new();
    for tok in tokens {
        if ans.len() >= expected_len {
            return Err(Error::Corrupt("tokens remain after expected length"));
        }
        if expected_len - ans.len() == 1 {
            if tok.code != 0 {
                log::error!("final token has code {}",tok.code);
                return Err(Error::Corrupt("final single byte token must have code 0"));
            }
            ans.push(tok.next);
            continue;
        }
        dict.phrase(tok.code,&mut ans)?;
        ans.push(tok.next);
        dict.insert(tok.code,tok.next);
    }
    if ans.len() != expected_len {
        log::error!("decoded {} bytes, expected {}",ans.len(),expected_len);
        return Err(Error::LengthMismatch { expected: expected_len, actual: ans.len() });
    }
    Ok(ans)
}

/// Main compression function, each token is packed as 20 bits MSB first
pub fn compress(ibuf: &[u8]) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    let tokens = tokenize(ibuf);
    let mut ans = BitWriter::with_capacity(tokens.len() * TOKEN_BITS);
    for tok in &tokens {
        ans.put_code(CODE_BITS,tok.code as u64);
        ans.put_code(8,tok.next as u64);
    }
    log::debug!("{} tokens for {} bytes",tokens.len(),ibuf.len());
    Ok(ans.finish())
}

/// Main decompression function
pub fn expand(ibuf: &[u8],expected_len: usize) -> Result<Vec<u8>,Error> {
    let mut bits = BitReader::new(ibuf);
    let mut tokens = Vec::new();
    while bits.remaining() >= TOKEN_BITS {
        match (bits.get_code(CODE_BITS),bits.get_code(8)) {
            (Some(code),Some(next)) => tokens.push(Token { code: code as u16, next: next as u8 }),
            _ => break
        }
    }
    detokenize(&tokens,expected_len)
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
fn new_phrases() {
    let test_data = "aabacad".as_bytes();
    let tokens = tokenize(test_data);
    assert_eq!(tokens,vec![
        Token { code: 97, next: b'a' },
        Token { code: 98, next: b'a' },
        Token { code: 99, next: b'a' },
        Token { code: 0, next: b'd' }
    ]);
    let mut dict = Dictionary::new();
    parse(test_data,&mut dict);
    assert_eq!(dict.len(),259);
    for (code,phrase) in [(256,b"aa"),(257,b"ba"),(258,b"ca")] {
        let mut out = Vec::new();
        dict.phrase(code,&mut out).expect("phrase missing");
        assert_eq!(out,phrase.to_vec());
    }
    assert_eq!(dict.find(b'a' as u16,b'a'),Some(256));
    let compressed = compress(test_data).expect("compression failed");
    assert_eq!(compressed,hex::decode("06161062610636100064").unwrap());
    assert_eq!(expand(&compressed,7).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn phrase_reuse() {
    let test_data = "abababab".as_bytes();
    // ab is 256, the second ab extends to aba
    let tokens = tokenize(test_data);
    assert_eq!(tokens,vec![
        Token { code: 97, next: b'b' },
        Token { code: 256, next: b'a' },
        Token { code: 98, next: b'a' },
        Token { code: 0, next: b'b' }
    ]);
    assert_eq!(detokenize(&tokens,8).expect("detokenize failed"),test_data.to_vec());
}

#[test]
fn pending_phrase_at_end() {
    // the last "ab" is a known phrase when the input ends
    let tokens = tokenize(b"abab");
    assert_eq!(tokens,vec![Token { code: 97, next: b'b' },Token { code: 97, next: b'b' }]);
    assert_eq!(detokenize(&tokens,4).unwrap(),b"abab".to_vec());
    assert_eq!(tokenize(b"x"),vec![Token { code: 0, next: b'x' }]);
    assert_eq!(expand(&compress(b"x").unwrap(),1).unwrap(),b"x".to_vec());
}

#[test]
fn zero_bytes() {
    let test_data = vec![0,0,0,5,0];
    let compressed = compress(&test_data).expect("compression failed");
    assert_eq!(expand(&compressed,5).expect("expansion failed"),test_data);
}

#[test]
fn dictionary_reset() {
    let mut dict = Dictionary::new();
    for i in 0..(MAX_CODES - SEED_CODES) {
        dict.insert((i % 256) as u16,(i / 256) as u8);
    }
    assert_eq!(dict.len(),MAX_CODES);
    assert_eq!(dict.find(1,0),Some(257));
    assert_eq!(dict.insert(7,7),256);
    assert_eq!(dict.len(),257);
    assert_eq!(dict.find(1,0),None);
    let mut out = Vec::new();
    dict.phrase(256,&mut out).unwrap();
    assert_eq!(out,vec![7,7]);
    assert!(dict.phrase(257,&mut out).is_err());
}

#[test]
fn invertibility_across_resets() {
    // enough pseudo random data to fill the dictionary many times over
    let test_data = lcg_bytes(1 << 16,3);
    let tokens = tokenize(&test_data);
    assert!(tokens.len() > 3 * MAX_CODES);
    let compressed = compress(&test_data).expect("compression failed");
    assert_eq!(expand(&compressed,test_data.len()).expect("expansion failed"),test_data);
    let text = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(400);
    let compressed = compress(text.as_bytes()).expect("compression failed");
    assert!(compressed.len() < text.len() / 2);
    assert_eq!(expand(&compressed,text.len()).expect("expansion failed"),text.as_bytes().to_vec());
}

#[test]
fn corrupt_streams() {
    // code 300 is not defined yet
    let tokens = vec![Token { code: 300, next: b'a' },Token { code: 0, next: b'b' }];
    assert!(matches!(detokenize(&tokens,4),Err(Error::Corrupt(_))));
    // stream too short, the final token is read as the phrase 0x00 d
    let compressed = compress(b"aabacad").unwrap();
    assert!(matches!(expand(&compressed,9),Err(Error::LengthMismatch { expected: 9, actual: 8 })));
    assert!(expand(&compressed,0).is_err());
    assert!(expand(&compressed,5).is_err());
}
