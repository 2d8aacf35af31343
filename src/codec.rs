//! Codec dispatch
//!
//! `Method` names a codec and carries its wire id, `Model` holds a built model
//! for any codec.  Both are closed sets, adding a codec means adding a variant
//! to each.

use std::str::FromStr;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use crate::tools::prefix_tree::{CodeTable,PrefixTree};
use crate::arithmetic::ArithmeticModel;
use crate::lz77::Lz77Context;
use crate::rle::RleContext;
use crate::{huffman,shannon,arithmetic,lz77,lz78,rle};
use crate::Error;

/// Codec identifiers, the discriminant is the id stored in frames
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum Method {
    Huffman = 1,
    Arithmetic = 2,
    Shannon = 3,
    Rle = 4,
    Lz78 = 5,
    Lz77 = 6
}

pub const ALL_METHODS: [Method;6] = [
    Method::Huffman,
    Method::Arithmetic,
    Method::Shannon,
    Method::Rle,
    Method::Lz78,
    Method::Lz77
];

/// A model ready to compress or expand
#[derive(Clone,Debug)]
pub enum Model {
    Huffman(PrefixTree),
    Arithmetic(ArithmeticModel),
    Shannon(CodeTable),
    Rle(RleContext),
    Lz78,
    Lz77(Lz77Context)
}

impl Method {
    pub fn id(&self) -> u8 {
        *self as u8
    }
    pub fn from_id(id: u8) -> Result<Self,Error> {
        match FromPrimitive::from_u8(id) {
            Some(m) => Ok(m),
            None => {
                log::error!("unknown method id {}",id);
                Err(Error::InvalidArgument("unknown method id"))
            }
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Self::Huffman => "huffman",
            Self::Arithmetic => "arithmetic",
            Self::Shannon => "shannon",
            Self::Rle => "rle",
            Self::Lz78 => "lz78",
            Self::Lz77 => "lz77"
        }
    }
    /// Build this codec's model from the data it will compress
    pub fn build_model(&self,dat: &[u8]) -> Result<Model,Error> {
        Ok(match self {
            Self::Huffman => Model::Huffman(huffman::build_tree(dat)?),
            Self::Arithmetic => Model::Arithmetic(arithmetic::build_model(dat)?),
            Self::Shannon => Model::Shannon(shannon::generate_codes(&shannon::build_tree(dat)?)?),
            Self::Rle => Model::Rle(rle::build_model(dat)?),
            Self::Lz78 => match dat.is_empty() {
                true => return Err(Error::InvalidArgument("cannot build model from empty input")),
                false => Model::Lz78
            },
            Self::Lz77 => Model::Lz77(lz77::build_model(dat)?)
        })
    }
    pub fn deserialize_model(&self,dat: &[u8]) -> Result<Model,Error> {
        Ok(match self {
            Self::Huffman => Model::Huffman(huffman::deserialize_tree(dat)?),
            Self::Arithmetic => Model::Arithmetic(ArithmeticModel::deserialize(dat)?),
            Self::Shannon => Model::Shannon(shannon::deserialize_codes(dat)?),
            Self::Rle => Model::Rle(RleContext::deserialize(dat)?),
            Self::Lz78 => match dat.is_empty() {
                true => Model::Lz78,
                false => return Err(Error::Corrupt("LZ78 model must be empty"))
            },
            Self::Lz77 => Model::Lz77(Lz77Context::deserialize(dat)?)
        })
    }
}

impl FromStr for Method {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s.to_lowercase().as_str() {
            "huffman" | "huff" | "h" => Ok(Self::Huffman),
            "arithmetic" | "arith" => Ok(Self::Arithmetic),
            "shannon" | "shan" | "s" => Ok(Self::Shannon),
            "rle" | "r" => Ok(Self::Rle),
            "lz78" => Ok(Self::Lz78),
            "lz77" => Ok(Self::Lz77),
            _ => Err(Error::InvalidArgument("unknown method name"))
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self,f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}",self.name())
    }
}

impl Model {
    pub fn method(&self) -> Method {
        match self {
            Self::Huffman(_) => Method::Huffman,
            Self::Arithmetic(_) => Method::Arithmetic,
            Self::Shannon(_) => Method::Shannon,
            Self::Rle(_) => Method::Rle,
            Self::Lz78 => Method::Lz78,
            Self::Lz77(_) => Method::Lz77
        }
    }
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Huffman(tree) => huffman::serialize_tree(tree),
            Self::Arithmetic(model) => model.serialize(),
            Self::Shannon(codes) => shannon::serialize_codes(codes),
            Self::Rle(ctx) => ctx.serialize(),
            Self::Lz78 => Vec::new(),
            Self::Lz77(ctx) => ctx.serialize()
        }
    }
    pub fn compress(&self,dat: &[u8]) -> Result<Vec<u8>,Error> {
        match self {
            Self::Huffman(tree) => huffman::compress(dat,tree),
            Self::Arithmetic(model) => arithmetic::compress(dat,model),
            Self::Shannon(codes) => shannon::compress(dat,codes),
            Self::Rle(ctx) => rle::compress(dat,ctx),
            Self::Lz78 => lz78::compress(dat),
            Self::Lz77(ctx) => lz77::compress(dat,ctx)
        }
    }
    pub fn expand(&self,dat: &[u8],expected_len: usize) -> Result<Vec<u8>,Error> {
        match self {
            Self::Huffman(tree) => huffman::expand(dat,tree,expected_len),
            Self::Arithmetic(model) => {
                // models built here count every input byte
                if !model.counts_length(expected_len) {
                    log::error!("model counts {} bytes, expected {}",model.total(),expected_len);
                    return Err(Error::LengthMismatch { expected: expected_len, actual: model.total() as usize });
                }
                arithmetic::expand(dat,model,expected_len)
            },
            Self::Shannon(codes) => shannon::expand(dat,codes,expected_len),
            Self::Rle(ctx) => rle::expand(dat,ctx,expected_len),
            Self::Lz78 => lz78::expand(dat,expected_len),
            Self::Lz77(ctx) => lz77::expand(dat,ctx,expected_len)
        }
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn test_inputs() -> Vec<Vec<u8>> {
    let mut x: u32 = 17;
    let mut noise = Vec::new();
    for _i in 0..5000 {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        noise.push((x >> 16) as u8);
    }
    vec![
        "aaaaaaaa".as_bytes().to_vec(),
        (0..=255).collect(),
        "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(40).into_bytes(),
        noise
    ]
}

#[test]
fn round_trip_all_methods() {
    for method in ALL_METHODS {
        for test_data in test_inputs() {
            let model = method.build_model(&test_data).expect("model failed");
            assert_eq!(model.method(),method);
            let compressed = model.compress(&test_data).expect("compression failed");
            let model2 = method.deserialize_model(&model.serialize()).expect("deserialize failed");
            let expanded = model2.expand(&compressed,test_data.len()).expect("expansion failed");
            assert_eq!(test_data,expanded,"{} failed on {} bytes",method,test_data.len());
        }
    }
}

#[test]
fn repetitive_text_shrinks() {
    let inputs = test_inputs();
    let test_data = &inputs[2];
    for method in ALL_METHODS {
        let model = method.build_model(test_data).unwrap();
        let compressed = model.compress(test_data).unwrap();
        if method != Method::Rle {
            assert!(compressed.len() < test_data.len(),"{} did not compress",method);
        }
    }
}

#[test]
fn names_and_ids() {
    for method in ALL_METHODS {
        assert_eq!(Method::from_id(method.id()).unwrap(),method);
        assert_eq!(Method::from_str(method.name()).unwrap(),method);
    }
    assert_eq!(Method::from_str("huff").unwrap(),Method::Huffman);
    assert_eq!(Method::from_str("H").unwrap(),Method::Huffman);
    assert_eq!(Method::from_str("s").unwrap(),Method::Shannon);
    assert_eq!(Method::from_str("arith").unwrap(),Method::Arithmetic);
    assert_eq!(Method::Lz77.id(),6);
    assert!(Method::from_str("zip").is_err());
    assert!(Method::from_id(0).is_err());
    assert!(Method::from_id(7).is_err());
}

#[test]
fn empty_input_rejected() {
    for method in ALL_METHODS {
        assert!(method.build_model(&[]).is_err());
    }
    assert!(Method::Lz78.deserialize_model(&[0]).is_err());
}

#[test]
fn wrong_length_fails_every_method() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(4).into_bytes();
    for method in ALL_METHODS {
        let model = method.build_model(&test_data).unwrap();
        let compressed = model.compress(&test_data).unwrap();
        for len in [test_data.len() / 2,test_data.len() + 40] {
            assert!(model.expand(&compressed,len).is_err(),"{} accepted length {}",method,len);
        }
    }
    // the single symbol arithmetic stream is the same for any length
    let model = Method::Arithmetic.build_model(b"aaaaaaaa").unwrap();
    assert!(matches!(model.expand(&[0x40],100000),Err(Error::LengthMismatch { expected: 100000, actual: 8 })));
}
