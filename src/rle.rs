//! Run Length Encoding
//!
//! Runs are introduced by an escape byte (the prefix), which is the only model.
//! * `prefix n prefix` - run of `n+1` escape bytes, `n` in 1..=255
//! * `prefix 0` - a single escape byte
//! * `prefix n b` - run of `n+3` copies of `b`, `n` in 1..=255
//!
//! Runs of other bytes shorter than 4 are copied as they are.

use crate::freq::ByteFrequencyModel;
use crate::Error;

const MAX_PREFIX_RUN: usize = 256;
const MIN_RUN: usize = 4;
const MAX_RUN: usize = 258;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct RleContext {
    pub prefix: u8
}

impl RleContext {
    pub fn serialize(&self) -> Vec<u8> {
        vec![self.prefix]
    }
    pub fn deserialize(dat: &[u8]) -> Result<Self,Error> {
        match dat {
            [prefix] => Ok(Self { prefix: *prefix }),
            _ => Err(Error::Corrupt("RLE model must be 1 byte"))
        }
    }
}

/// Least frequent byte in 1..=255
pub fn analyze_prefix(dat: &[u8]) -> u8 {
    ByteFrequencyModel::create(dat).escape_candidate()
}

pub fn build_model(dat: &[u8]) -> Result<RleContext,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("cannot build model from empty input"));
    }
    let prefix = analyze_prefix(dat);
    log::debug!("RLE prefix is {:02x}",prefix);
    Ok(RleContext { prefix })
}

/// Main compression function
pub fn compress(ibuf: &[u8],ctx: &RleContext) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    let p = ctx.prefix;
    let mut ans = Vec::new();
    let mut ptr = 0;
    while ptr < ibuf.len() {
        let val = ibuf[ptr];
        let cap = if val == p { MAX_PREFIX_RUN } else { MAX_RUN };
        let mut run = 1;
        while run < cap && ptr + run < ibuf.len() && ibuf[ptr+run] == val {
            run += 1;
        }
        if val == p && run == 1 {
            ans.extend_from_slice(&[p,0]);
        } else if val == p {
            ans.extend_from_slice(&[p,(run-1) as u8,p]);
        } else if run >= MIN_RUN {
            ans.extend_from_slice(&[p,(run-3) as u8,val]);
        } else {
            for _i in 0..run {
                ans.push(val);
            }
        }
        ptr += run;
    }
    log::debug!("{} bytes in, {} bytes out",ibuf.len(),ans.len());
    ans.shrink_to_fit();
    Ok(ans)
}

/// Main decompression function.  An escape byte that does not start a
/// complete token at the end of the stream is taken as a literal.
pub fn expand(ibuf: &[u8],ctx: &RleContext,expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    let p = ctx.prefix;
    let mut ans = crate::output_buffer(expected_len)?;
    let mut ptr = 0;
    while ptr < ibuf.len() {
        let val = ibuf[ptr];
        if val != p {
            ans.push(val);
            ptr += 1;
            continue;
        }
        match (ibuf.get(ptr+1).copied(),ibuf.get(ptr+2).copied()) {
            (Some(0),_) => {
                ans.push(p);
                ptr += 2;
            },
            (Some(n),Some(b)) => {
                let count = match b == p {
                    true => n as usize + 1,
                    false => n as usize + 3
                };
                log::trace!("run of {} x {:02x}",count,b);
                ans.resize(ans.len() + count,b);
                ptr += 3;
            },
            _ => {
                log::warn!("incomplete token at end of stream, escape byte taken literally");
                ans.push(p);
                ptr += 1;
            }
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

#[test]
fn token_shapes() {
    let test_data = "aaaaab\x01\x01c\x01".as_bytes();
    let ctx = RleContext { prefix: 1 };
    let compressed = compress(test_data,&ctx).expect("compression failed");
    assert_eq!(compressed,hex::decode("01026162010101630100").unwrap());
    assert_eq!(expand(&compressed,&ctx,test_data.len()).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn short_runs_are_literal() {
    let ctx = RleContext { prefix: 0xff };
    assert_eq!(compress(b"aaabbbb",&ctx).unwrap(),vec![b'a',b'a',b'a',0xff,1,b'b']);
}

#[test]
fn long_runs_are_split() {
    let ctx = RleContext { prefix: 1 };
    // 258 + 258 + 2
    let test_data = vec![b'x';518];
    let compressed = compress(&test_data,&ctx).expect("compression failed");
    assert_eq!(compressed,vec![1,255,b'x',1,255,b'x',b'x',b'x']);
    assert_eq!(expand(&compressed,&ctx,518).expect("expansion failed"),test_data);
    // 256 + 1 escape bytes
    let test_data = vec![1;257];
    let compressed = compress(&test_data,&ctx).expect("compression failed");
    assert_eq!(compressed,vec![1,255,1,1,0]);
    assert_eq!(expand(&compressed,&ctx,257).expect("expansion failed"),test_data);
}

#[test]
fn incomplete_token() {
    let ctx = RleContext { prefix: 1 };
    assert_eq!(expand(&[b'a',1],&ctx,2).expect("expansion failed"),vec![b'a',1]);
    // prefix and count without the byte: both taken literally
    assert_eq!(expand(&[b'a',1,5],&ctx,3).expect("expansion failed"),vec![b'a',1,5]);
}

#[test]
fn invertibility() {
    let mut test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes().to_vec();
    test_data.extend_from_slice(&[0;100]);
    test_data.extend((0..=255).collect::<Vec<u8>>());
    let ctx = build_model(&test_data).unwrap();
    let ctx2 = RleContext::deserialize(&ctx.serialize()).unwrap();
    let compressed = compress(&test_data,&ctx).expect("compression failed");
    assert!(compressed.len() < test_data.len());
    assert_eq!(expand(&compressed,&ctx2,test_data.len()).expect("expansion failed"),test_data);
}

#[test]
fn length_mismatch() {
    let ctx = RleContext { prefix: 1 };
    let compressed = compress(b"aaaaaaaa",&ctx).unwrap();
    assert!(matches!(expand(&compressed,&ctx,7),Err(Error::LengthMismatch { expected: 7, actual: 8 })));
    assert!(matches!(expand(&compressed,&ctx,9),Err(Error::LengthMismatch { expected: 9, actual: 8 })));
    assert!(expand(&compressed,&ctx,0).is_err());
    assert!(RleContext::deserialize(&[1,2]).is_err());
}
