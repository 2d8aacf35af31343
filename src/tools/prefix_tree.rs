//! Prefix trees and code tables shared by the Huffman and Shannon-Fano coders.
//!
//! The tree lives in an arena, edges are indices into a node vector, and every
//! walk is done with an explicit stack, so a badly skewed tree cannot exhaust
//! the call stack.  Bit 0 selects the left child, bit 1 the right child.

use crate::Error;

/// longest code that can be stored in a `Code`
pub const MAX_CODE_BITS: usize = 64;

/// serialization flags, one per node in preorder
const FLAG_BRANCH: u8 = 0;
const FLAG_LEAF: u8 = 1;
const FLAG_ABSENT: u8 = 2;

/// A code word, right aligned in `bits`, written MSB first.
/// A length of 0 means the symbol has no code.
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct Code {
    pub bits: u64,
    pub len: u8
}

impl Code {
    /// Is `self` a prefix of `other` (or equal to it)
    pub fn is_prefix_of(&self,other: &Code) -> bool {
        if self.len == 0 || self.len > other.len {
            return false;
        }
        other.bits >> (other.len - self.len) == self.bits
    }
    /// extend the code by one bit on the right
    fn push(&self,bit: u64) -> Result<Code,Error> {
        if self.len as usize >= MAX_CODE_BITS {
            return Err(Error::CodeOverflow);
        }
        Ok(Code {
            bits: (self.bits << 1) | bit,
            len: self.len + 1
        })
    }
}

/// Map from byte values to code words
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct CodeTable {
    codes: [Code;256]
}

impl CodeTable {
    pub fn new() -> Self {
        Self {
            codes: [Code::default();256]
        }
    }
    /// code for a symbol, None if the symbol was absent from the source
    pub fn get(&self,symbol: u8) -> Option<Code> {
        match self.codes[symbol as usize] {
            c if c.len > 0 => Some(c),
            _ => None
        }
    }
    pub fn set(&mut self,symbol: u8,code: Code) {
        self.codes[symbol as usize] = code;
    }
    /// iterate over (symbol,code) for symbols that have a code
    pub fn iter(&self) -> impl Iterator<Item = (u8,Code)> + '_ {
        self.codes.iter().enumerate().filter(|(_,c)| c.len > 0).map(|(s,c)| (s as u8,*c))
    }
    /// Number of bits needed to encode `dat`, error if a symbol has no code
    pub fn bit_cost(&self,dat: &[u8]) -> Result<usize,Error> {
        let mut ans = 0;
        for sym in dat {
            match self.get(*sym) {
                Some(c) => ans += c.len as usize,
                None => return Err(Error::InvalidArgument("symbol is not in the code table"))
            }
        }
        Ok(ans)
    }
    /// true if no code is a prefix of another code in the table
    pub fn is_prefix_free(&self) -> bool {
        let codes: Vec<Code> = self.iter().map(|(_,c)| c).collect();
        for i in 0..codes.len() {
            for j in 0..codes.len() {
                if i != j && codes[i].is_prefix_of(&codes[j]) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Clone,Debug)]
struct Node {
    symbol: Option<u8>,
    child: [Option<usize>;2]
}

/// Binary prefix tree, leaves carry symbols, branches carry nothing.
#[derive(Clone,Debug)]
pub struct PrefixTree {
    nodes: Vec<Node>,
    root: usize
}

impl PrefixTree {
    /// Empty tree, the first node added becomes the root until `set_root` is called.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: 0
        }
    }
    pub fn add_leaf(&mut self,symbol: u8) -> usize {
        self.nodes.push(Node { symbol: Some(symbol), child: [None,None] });
        self.nodes.len() - 1
    }
    pub fn add_branch(&mut self,left: Option<usize>,right: Option<usize>) -> usize {
        self.nodes.push(Node { symbol: None, child: [left,right] });
        self.nodes.len() - 1
    }
    pub fn set_child(&mut self,parent: usize,side: usize,child: usize) {
        self.nodes[parent].child[side] = Some(child);
    }
    pub fn set_root(&mut self,root: usize) {
        self.root = root;
    }
    pub fn root(&self) -> usize {
        self.root
    }
    /// false until the tree has nodes and the root index points at one of them
    pub fn has_root(&self) -> bool {
        self.root < self.nodes.len()
    }
    /// symbol if `node` is a leaf
    pub fn symbol(&self,node: usize) -> Option<u8> {
        self.nodes.get(node).and_then(|n| n.symbol)
    }
    /// follow one edge, None means the stream leads nowhere
    pub fn step(&self,node: usize,bit: bool) -> Option<usize> {
        self.nodes.get(node)?.child[bit as usize]
    }
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.symbol.is_some()).count()
    }
    /// Walk the tree depth first, left edges are 0 and right edges are 1.
    pub fn codes(&self) -> Result<CodeTable,Error> {
        let mut ans = CodeTable::new();
        if self.nodes.is_empty() {
            return Ok(ans);
        }
        let mut stack = vec![(self.root,Code::default())];
        while let Some((idx,code)) = stack.pop() {
            let node = self.nodes.get(idx).ok_or(Error::InvalidArgument("tree edge points outside the tree"))?;
            if let Some(sym) = node.symbol {
                ans.set(sym,code);
                continue;
            }
            for side in [1,0] {
                if let Some(child) = node.child[side] {
                    stack.push((child,code.push(side as u64)?));
                }
            }
        }
        Ok(ans)
    }
    /// Preorder, one flag byte per node: 1 and the symbol for a leaf,
    /// 0 for a branch followed by the left then the right subtree.
    /// A missing child (only in the single symbol tree) is flagged 2.
    pub fn serialize(&self) -> Vec<u8> {
        let mut ans = Vec::new();
        if !self.has_root() {
            return ans;
        }
        let mut stack = vec![Some(self.root)];
        while let Some(item) = stack.pop() {
            match item.and_then(|idx| self.nodes.get(idx)) {
                None => ans.push(FLAG_ABSENT),
                Some(node) => {
                    match node.symbol {
                        Some(sym) => {
                            ans.push(FLAG_LEAF);
                            ans.push(sym);
                        },
                        None => {
                            ans.push(FLAG_BRANCH);
                            stack.push(node.child[1]);
                            stack.push(node.child[0]);
                        }
                    }
                }
            }
        }
        ans
    }
    /// Inverse of `serialize`, rejects anything `serialize` could not have produced.
    pub fn deserialize(dat: &[u8]) -> Result<Self,Error> {
        let mut tree = Self::new();
        let mut seen = [false;256];
        let mut ptr = 0;
        match dat.first() {
            Some(&FLAG_BRANCH) => {
                ptr += 1;
                let root = tree.add_branch(None,None);
                tree.set_root(root);
            },
            Some(_) => return Err(Error::Corrupt("tree root must be a branch")),
            None => return Err(Error::InvalidArgument("empty tree"))
        }
        // each entry is a slot waiting for a subtree: (parent,side)
        let mut stack = vec![(tree.root,1),(tree.root,0)];
        while let Some((parent,side)) = stack.pop() {
            let flag = *dat.get(ptr).ok_or(Error::Corrupt("tree is truncated"))?;
            ptr += 1;
            match flag {
                FLAG_LEAF => {
                    let sym = *dat.get(ptr).ok_or(Error::Corrupt("tree is truncated"))?;
                    ptr += 1;
                    if seen[sym as usize] {
                        return Err(Error::Corrupt("symbol appears twice in tree"));
                    }
                    seen[sym as usize] = true;
                    let leaf = tree.add_leaf(sym);
                    tree.set_child(parent,side,leaf);
                },
                FLAG_BRANCH => {
                    let branch = tree.add_branch(None,None);
                    tree.set_child(parent,side,branch);
                    stack.push((branch,1));
                    stack.push((branch,0));
                },
                FLAG_ABSENT if parent == tree.root && side == 1 => {},
                _ => return Err(Error::Corrupt("bad node flag in tree"))
            }
        }
        if ptr != dat.len() {
            return Err(Error::Corrupt("trailing bytes after tree"));
        }
        Ok(tree)
    }
}

#[test]
fn degenerate_tree_round_trip() {
    let mut tree = PrefixTree::new();
    let leaf = tree.add_leaf(b'a');
    let root = tree.add_branch(Some(leaf),None);
    tree.set_root(root);
    let ser = tree.serialize();
    assert_eq!(ser,vec![0,1,b'a',2]);
    let tree2 = PrefixTree::deserialize(&ser).expect("deserialize failed");
    assert_eq!(tree2.codes().unwrap().get(b'a'),Some(Code { bits: 0, len: 1 }));
    assert_eq!(tree2.leaf_count(),1);
}

#[test]
fn codes_follow_edges() {
    // root -> (a, (b, c))
    let mut tree = PrefixTree::new();
    let a = tree.add_leaf(b'a');
    let b = tree.add_leaf(b'b');
    let c = tree.add_leaf(b'c');
    let bc = tree.add_branch(Some(b),Some(c));
    let root = tree.add_branch(Some(a),Some(bc));
    tree.set_root(root);
    let codes = tree.codes().unwrap();
    assert_eq!(codes.get(b'a'),Some(Code { bits: 0b0, len: 1 }));
    assert_eq!(codes.get(b'b'),Some(Code { bits: 0b10, len: 2 }));
    assert_eq!(codes.get(b'c'),Some(Code { bits: 0b11, len: 2 }));
    assert_eq!(codes.get(b'd'),None);
    assert!(codes.is_prefix_free());
    assert_eq!(tree.serialize(),vec![0,1,b'a',0,1,b'b',1,b'c']);
}

#[test]
fn bad_trees_rejected() {
    assert!(PrefixTree::deserialize(&[]).is_err());
    assert!(PrefixTree::deserialize(&[1,b'a']).is_err());
    assert!(PrefixTree::deserialize(&[0,1,b'a']).is_err());
    assert!(PrefixTree::deserialize(&[0,1,b'a',1,b'a']).is_err());
    assert!(PrefixTree::deserialize(&[0,1,b'a',1,b'b',7]).is_err());
    assert!(PrefixTree::deserialize(&[0,2,1,b'a']).is_err());
    assert!(PrefixTree::deserialize(&[0,1,b'a',0,2,2]).is_err());
}

#[test]
fn prefix_detection() {
    let short = Code { bits: 0b10, len: 2 };
    let long = Code { bits: 0b101, len: 3 };
    assert!(short.is_prefix_of(&long));
    assert!(!long.is_prefix_of(&short));
    assert!(!Code { bits: 0b11, len: 2 }.is_prefix_of(&long));
}

#[test]
fn unrooted_tree_is_safe() {
    let empty = PrefixTree::new();
    assert!(!empty.has_root());
    assert_eq!(empty.step(0,true),None);
    assert_eq!(empty.symbol(0),None);
    assert!(empty.serialize().is_empty());
    let mut dangling = PrefixTree::new();
    let leaf = dangling.add_leaf(b'a');
    let root = dangling.add_branch(Some(leaf),Some(9));
    dangling.set_root(root);
    assert!(matches!(dangling.codes(),Err(Error::InvalidArgument(_))));
}
