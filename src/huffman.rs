//! Static Huffman Coding
//!
//! The tree is built once from the complete input by repeatedly merging the
//! two lightest nodes.  The tree travels with the compressed data in
//! serialized form (see `PrefixTree::serialize`), and the expanded length must
//! be supplied by the caller.
//!
//! * Codes are packed MSB first, the last byte is padded with zeros
//! * Input with a single distinct symbol still spends 1 bit per symbol

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use crate::tools::bits::{BitReader,BitWriter};
use crate::tools::prefix_tree::{CodeTable,PrefixTree};
use crate::freq::ByteFrequencyModel;
use crate::Error;

/// Build the Huffman tree for `dat`.
/// Nodes are ordered by frequency, ties are resolved by the order in which nodes
/// entered the queue: leaves in ascending symbol order, merged nodes after all
/// nodes already waiting with the same frequency.  A merged node therefore
/// loses every tie against a leaf, whatever symbols it contains, and merged
/// nodes tie among themselves in order of creation.  The first node popped
/// becomes the left child.
pub fn build_tree(dat: &[u8]) -> Result<PrefixTree,Error> {
    if dat.is_empty() {
        return Err(Error::InvalidArgument("cannot build tree from empty input"));
    }
    let freq = ByteFrequencyModel::create(dat);
    let mut tree = PrefixTree::new();
    // heap items are (frequency,sequence,node)
    let mut queue = BinaryHeap::new();
    let mut seq: usize = 0;
    for (sym,count) in freq.present() {
        queue.push(Reverse((count,seq,tree.add_leaf(sym))));
        seq += 1;
    }
    log::debug!("building Huffman tree over {} symbols",queue.len());
    if queue.len() == 1 {
        if let Some(Reverse((_,_,leaf))) = queue.pop() {
            let root = tree.add_branch(Some(leaf),None);
            tree.set_root(root);
        }
        return Ok(tree);
    }
    while let (Some(Reverse((f1,_,left))),Some(Reverse((f2,_,right)))) = (queue.pop(),queue.pop()) {
        let parent = tree.add_branch(Some(left),Some(right));
        if queue.is_empty() {
            tree.set_root(parent);
            break;
        }
        queue.push(Reverse((f1+f2,seq,parent)));
        seq += 1;
    }
    Ok(tree)
}

/// Depth first walk assigning 0 to left edges and 1 to right edges
pub fn generate_codes(tree: &PrefixTree) -> Result<CodeTable,Error> {
    tree.codes()
}

pub fn serialize_tree(tree: &PrefixTree) -> Vec<u8> {
    tree.serialize()
}

pub fn deserialize_tree(dat: &[u8]) -> Result<PrefixTree,Error> {
    PrefixTree::deserialize(dat)
}

/// Main compression function, output is exactly `ceil(bit_cost/8)` bytes
pub fn compress(ibuf: &[u8],tree: &PrefixTree) -> Result<Vec<u8>,Error> {
    if ibuf.is_empty() {
        return Err(Error::InvalidArgument("nothing to compress"));
    }
    if !tree.has_root() {
        return Err(Error::InvalidArgument("empty tree"));
    }
    let codes = generate_codes(tree)?;
    let mut ans = BitWriter::with_capacity(codes.bit_cost(ibuf)?);
    for sym in ibuf {
        // bit_cost already verified every symbol has a code
        if let Some(code) = codes.get(*sym) {
            ans.put_code(code.len,code.bits);
        }
    }
    log::debug!("packed {} symbols into {} bits",ibuf.len(),ans.len());
    Ok(ans.finish())
}

/// Main decompression function, walks the tree from the root one bit at a time.
/// Only the zero padding of the last byte may be left over.
pub fn expand(ibuf: &[u8],tree: &PrefixTree,expected_len: usize) -> Result<Vec<u8>,Error> {
    if expected_len == 0 {
        return Err(Error::InvalidArgument("expected length must be positive"));
    }
    if !tree.has_root() {
        return Err(Error::InvalidArgument("empty tree"));
    }
    let mut ans = crate::output_buffer(expected_len)?;
    let mut bits = BitReader::new(ibuf);
    let mut curs = tree.root();
    while ans.len() < expected_len {
        let bit = match bits.get_bit() {
            Some(b) => b,
            None => {
                log::error!("bit stream ended after {} of {} symbols",ans.len(),expected_len);
                return Err(Error::LengthMismatch { expected: expected_len, actual: ans.len() });
            }
        };
        curs = match tree.step(curs,bit) {
            Some(c) => c,
            None => {
                log::error!("stream leads off the tree at symbol {}",ans.len());
                return Err(Error::Corrupt("invalid tree traversal"));
            }
        };
        if let Some(sym) = tree.symbol(curs) {
            ans.push(sym);
            curs = tree.root();
        }
    }
    if bits.remaining() >= 8 {
        log::error!("{} bits remain after {} symbols",bits.remaining(),expected_len);
        return Err(Error::Corrupt("data remains after expected length"));
    }
    Ok(ans)
}

// *************** TESTS *****************

#[cfg(test)]
fn kraft_sum_is_one(codes: &CodeTable) -> bool {
    // sum of 2^-len scaled by 2^64
    let total: u128 = codes.iter().map(|(_,c)| 1u128 << (64 - c.len as u32)).sum();
    total == 1u128 << 64
}

#[test]
fn two_symbols_one_bit_each() {
    let test_data = "abab".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    let codes = generate_codes(&tree).expect("codes failed");
    assert_eq!(codes.get(b'a').unwrap().len,1);
    assert_eq!(codes.get(b'b').unwrap().len,1);
    let compressed = compress(test_data,&tree).expect("compression failed");
    assert_eq!(compressed,hex::decode("50").unwrap());
    assert_eq!(serialize_tree(&tree),hex::decode("0001610162").unwrap());
    let expanded = expand(&compressed,&tree,4).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn single_symbol() {
    let test_data = "aaaaaaaa".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    assert_eq!(generate_codes(&tree).unwrap().get(b'a').unwrap().len,1);
    let compressed = compress(test_data,&tree).expect("compression failed");
    assert_eq!(compressed,vec![0]);
    let tree2 = deserialize_tree(&serialize_tree(&tree)).expect("deserialize failed");
    let expanded = expand(&compressed,&tree2,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn codes_are_optimal_and_prefix_free() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    let codes = generate_codes(&tree).expect("codes failed");
    assert!(codes.is_prefix_free());
    assert!(kraft_sum_is_one(&codes));
    // most frequent symbol (space) never gets a longer code than a rare one (newline)
    assert!(codes.get(b' ').unwrap().len <= codes.get(b'\n').unwrap().len);
    assert_eq!(codes.get(b'z'),None);
}

#[test]
fn tie_breaking() {
    // a,b,c,d all frequency 1: (a,b) then (c,d) then merge
    let tree = build_tree(b"abcd").expect("tree failed");
    let codes = generate_codes(&tree).expect("codes failed");
    assert_eq!(codes.get(b'a').unwrap().bits,0b00);
    assert_eq!(codes.get(b'b').unwrap().bits,0b01);
    assert_eq!(codes.get(b'c').unwrap().bits,0b10);
    assert_eq!(codes.get(b'd').unwrap().bits,0b11);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    let compressed = compress(test_data,&tree).expect("compression failed");
    let bits = generate_codes(&tree).unwrap().bit_cost(test_data).unwrap();
    assert_eq!(compressed.len(),(bits+7)/8);
    let tree2 = deserialize_tree(&serialize_tree(&tree)).expect("deserialize failed");
    let expanded = expand(&compressed,&tree2,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn bad_input() {
    assert!(build_tree(&[]).is_err());
    let tree = build_tree(b"abab").unwrap();
    assert!(expand(&[0x50],&tree,0).is_err());
    // 8 bits cannot produce 9 symbols
    match expand(&[0x50],&tree,9) {
        Err(Error::LengthMismatch { expected: 9, actual: 8 }) => {},
        _ => panic!("expected length mismatch")
    }
    // symbol absent from the tree
    assert!(compress(b"abc",&tree).is_err());
}

#[test]
fn null_traversal_is_corruption() {
    let tree = build_tree(b"aaaa").unwrap();
    // a 1 bit leads to the missing right child
    match expand(&[0x80],&tree,2) {
        Err(Error::Corrupt(_)) => {},
        _ => panic!("expected corruption")
    }
}

#[test]
fn wrong_expected_length() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let tree = build_tree(test_data).expect("tree failed");
    let compressed = compress(test_data,&tree).expect("compression failed");
    // stopping early leaves whole bytes unread
    assert!(matches!(expand(&compressed,&tree,10),Err(Error::Corrupt(_))));
    assert!(matches!(expand(&compressed,&tree,90),Err(Error::LengthMismatch { expected: 90, .. })));
    assert_eq!(expand(&compressed,&tree,test_data.len()).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn empty_tree_rejected() {
    let tree = PrefixTree::new();
    assert!(matches!(expand(&[0xff],&tree,1),Err(Error::InvalidArgument(_))));
    assert!(matches!(compress(b"a",&tree),Err(Error::InvalidArgument(_))));
}
