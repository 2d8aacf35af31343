//! Shannon-Fano Coding
//!
//! Symbols are sorted by descending frequency and the sorted list is split
//! repeatedly where the running frequency first reaches half of the range
//! total.  Unlike Huffman the result is not always optimal.
//!
//! The model that travels with the data is a flat list of leaf records,
//! `[1, symbol, length, bit, bit, ...]` with one byte per code bit, and the
//! decoder matches codes by scanning that list.

use crate::tools::bits::{BitReader,BitWriter};
use crate::tools::prefix_tree::{Code,CodeTable,PrefixTree,MAX_CODE_BITS};
use crate::freq::ByteFrequencyModel;
use crate::Error;

const RECORD_FLAG: u8 = 1;

/// Index where the sorted range `start..end` is split, the left side is `start..split`.
/// Both sides are guaranteed to be non-empty, `end-start` must be at least 2.
fn split_point(weights: &[u64],start: usize,end: usize) -> usize {
    let total: u64 = weights[start..end].iter().sum();
    let half = total / 2;
    let mut running = 0;
    let mut split = end - 1;
    for i in start..end {
        running += weights[i];
        if running >= half {
            split = i + 1;
            break;
        }
    }
    split.clamp(start + 1,end - 1)
}

/// Build the Shannon-Fano tree for `dat`, a single symbol gets the code `0`.
pub fn build_tree(dat: &[u8]) -> Result<PrefixTree,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("cannot build tree from empty input"));
    }
    let freq = ByteFrequencyModel::create(dat);
    let mut sorted: Vec<(u8,u64)> = freq.present().collect();
    // descending frequency, then ascending symbol
    sorted.sort_by(|a,b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let weights: Vec<u64> = sorted.iter().map(|(_,c)| *c).collect();
    log::debug!("building Shannon-Fano tree over {} symbols",sorted.len());
    let mut tree = PrefixTree::new();
    if sorted.len() == 1 {
        let leaf = tree.add_leaf(sorted[0].0);
        let root = tree.add_branch(Some(leaf),None);
        tree.set_root(root);
        return Ok(tree);
    }
    // pending ranges (start,end,parent slot)
    let mut stack: Vec<(usize,usize,Option<(usize,usize)>)> = vec![(0,sorted.len(),None)];
    while let Some((start,end,slot)) = stack.pop() {
        let node = match end - start {
            1 => tree.add_leaf(sorted[start].0),
            _ => {
                let split = split_point(&weights,start,end);
                log::trace!("split {}..{} at {}",start,end,split);
                let branch = tree.add_branch(None,None);
                stack.push((split,end,Some((branch,1))));
                stack.push((start,split,Some((branch,0))));
                branch
            }
        };
        match slot {
            Some((parent,side)) => tree.set_child(parent,side,node),
            None => tree.set_root(node)
        }
    }
    Ok(tree)
}

pub fn generate_codes(tree: &PrefixTree) -> Result<CodeTable,Error> {
    tree.codes()
}

/// Leaf records in ascending symbol order
pub fn serialize_codes(codes: &CodeTable) -> Vec<u8> {
    let mut ans = Vec::new();
    for (sym,code) in codes.iter() {
        ans.push(RECORD_FLAG);
        ans.push(sym);
        ans.push(code.len);
        for i in (0..code.len).rev() {
            ans.push(((code.bits >> i) & 1) as u8);
        }
    }
    ans
}

/// Rebuild the code table from leaf records, the table must be prefix free.
pub fn deserialize_codes(dat: &[u8]) -> Result<CodeTable,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("empty code table"));
    }
    let mut ans = CodeTable::new();
    let mut ptr = 0;
    while ptr < dat.len() {
        if dat.len() - ptr < 3 {
            return Err(Error::Corrupt("code record is truncated"));
        }
        if dat[ptr] != RECORD_FLAG {
            return Err(Error::Corrupt("bad code record flag"));
        }
        let sym = dat[ptr+1];
        let len = dat[ptr+2];
        ptr += 3;
        if len == 0 || len as usize > MAX_CODE_BITS {
            return Err(Error::Corrupt("bad code length"));
        }
        if ans.get(sym).is_some() {
            return Err(Error::Corrupt("symbol appears twice in code table"));
        }
        let bit_bytes = dat.get(ptr..ptr+len as usize).ok_or(Error::Corrupt("code record is truncated"))?;
        let mut bits: u64 = 0;
        for b in bit_bytes {
            if *b > 1 {
                return Err(Error::Corrupt("code bit must be 0 or 1"));
            }
            bits = (bits << 1) | *b as u64;
        }
        ptr += len as usize;
        ans.set(sym,Code { bits, len });
    }
    if !ans.is_prefix_free() {
        return Err(Error::Corrupt("code table is not prefix free"));
    }
    Ok(ans)
}

/// Main compression function, output is exactly `ceil(bit_cost/8)` bytes
pub fn compress(ibuf: &[u8],codes: &CodeTable) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    let mut ans = BitWriter::with_capacity(codes.bit_cost(ibuf)?);
    for sym in ibuf {
        if let Some(code) = codes.get(*sym) {
            ans.put_code(code.len,code.bits);
        }
    }
    log::debug!("packed {} symbols into {} bits",ibuf.len(),ans.len());
    Ok(ans.finish())
}

/// Main decompression function, grows a code one bit at a time and scans the
/// table for it after every bit.  Only the zero padding of the last byte may
/// be left over.
pub fn expand(ibuf: &[u8],codes: &CodeTable,expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    let table: Vec<(u8,Code)> = codes.iter().collect();
    let max_len = table.iter().map(|(_,c)| c.len).max().ok_or(Error::InvalidArgument("empty code table"))?;
    let mut ans = crate::output_buffer(expected_len)?;
    let mut bits = BitReader::new(ibuf);
    let mut curr = Code::default();
    while ans.len() < expected_len {
        let bit = match bits.get_bit() {
            Some(b) => b,
            None => {
                log::error!("bit stream ended after {} of {} symbols",ans.len(),expected_len);
                return Err(Error::LengthMismatch { expected: expected_len, actual: ans.len() });
            }
        };
        curr = Code { bits: (curr.bits << 1) | bit as u64, len: curr.len + 1 };
        if let Some((sym,_)) = table.iter().find(|(_,c)| *c == curr) {
            ans.push(*sym);
            curr = Code::default();
        } else if curr.len >= max_len {
            log::error!("no code matches at symbol {}",ans.len());
            return Err(Error::Corrupt("bits match no code"));
        }
    }
    if bits.remaining() >= 8 {
        log::error!("{} bits remain after {} symbols",bits.remaining(),expected_len);
        return Err(Error::Corrupt("data remains after expected length"));
    }
    Ok(ans)
}

#[test]
fn split_rule() {
    let test_data = "aaaabbc".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    let codes = generate_codes(&tree).expect("codes failed");
    assert_eq!(codes.get(b'a'),Some(Code { bits: 0b0, len: 1 }));
    assert_eq!(codes.get(b'b'),Some(Code { bits: 0b10, len: 2 }));
    assert_eq!(codes.get(b'c'),Some(Code { bits: 0b11, len: 2 }));
    assert_eq!(serialize_codes(&codes),vec![1,b'a',1,0, 1,b'b',2,1,0, 1,b'c',2,1,1]);
    // 0 0 0 0 10 10 11 -> 0000 1010 11
    let compressed = compress(test_data,&codes).expect("compression failed");
    assert_eq!(compressed,hex::decode("0ac0").unwrap());
}

#[test]
fn split_keeps_both_sides() {
    // the first symbol alone exceeds half of the range
    assert_eq!(split_point(&[10,1],0,2),1);
    assert_eq!(split_point(&[1,1,1,1],0,4),2);
    assert_eq!(split_point(&[5,3,3,3],1,4),3);
}

#[test]
fn single_symbol() {
    let test_data = "aaaaaaaa".as_bytes();
    let codes = generate_codes(&build_tree(test_data).unwrap()).unwrap();
    assert_eq!(codes.get(b'a'),Some(Code { bits: 0, len: 1 }));
    let compressed = compress(test_data,&codes).expect("compression failed");
    assert_eq!(compressed,vec![0]);
    let codes2 = deserialize_codes(&serialize_codes(&codes)).expect("deserialize failed");
    assert_eq!(expand(&compressed,&codes2,8).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let codes = generate_codes(&build_tree(test_data).unwrap()).unwrap();
    assert!(codes.is_prefix_free());
    let compressed = compress(test_data,&codes).expect("compression failed");
    let codes2 = deserialize_codes(&serialize_codes(&codes)).expect("deserialize failed");
    assert_eq!(codes,codes2);
    let expanded = expand(&compressed,&codes2,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn bad_tables_rejected() {
    assert!(deserialize_codes(&[]).is_err());
    assert!(deserialize_codes(&[2,b'a',1,0]).is_err());
    assert!(deserialize_codes(&[1,b'a',0]).is_err());
    assert!(deserialize_codes(&[1,b'a',2,0]).is_err());
    assert!(deserialize_codes(&[1,b'a',1,3]).is_err());
    assert!(deserialize_codes(&[1,b'a',1,0,1,b'a',1,1]).is_err());
    // "0" is a prefix of "01"
    assert!(deserialize_codes(&[1,b'a',1,0,1,b'b',2,0,1]).is_err());
}

#[test]
fn bad_streams_rejected() {
    // only "0" and "10" are codes, so "11" leads nowhere
    let codes = deserialize_codes(&[1,b'a',1,0,1,b'b',2,1,0]).unwrap();
    match expand(&[0xc0],&codes,2) {
        Err(Error::Corrupt(_)) => {},
        _ => panic!("expected corruption")
    }
    match expand(&[0x00],&codes,9) {
        Err(Error::LengthMismatch { expected: 9, actual: 8 }) => {},
        _ => panic!("expected length mismatch")
    }
    assert!(expand(&[0x00],&codes,0).is_err());
}

#[test]
fn wrong_expected_length() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let codes = generate_codes(&build_tree(test_data).unwrap()).unwrap();
    let compressed = compress(test_data,&codes).expect("compression failed");
    assert!(matches!(expand(&compressed,&codes,10),Err(Error::Corrupt(_))));
    assert!(matches!(expand(&compressed,&codes,90),Err(Error::LengthMismatch { expected: 90, .. })));
    // one trailing zero byte is more than padding
    let mut padded = compressed.clone();
    padded.push(0);
    assert!(matches!(expand(&padded,&codes,test_data.len()),Err(Error::Corrupt(_))));
}
