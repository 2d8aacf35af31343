//! Framed Compression
//!
//! A frame wraps the output of one or two codecs so that it can be expanded
//! without outside knowledge.  All integers are little endian.
//!
//! ```text
//! signature      "BCODEC"
//! version        major u8, minor u8
//! original_size  u64
//! stage_count    u8, 0 to 2
//! stages         method u8, input_size u64, model_size u32, model
//! payload_size   u64
//! payload_crc    u32, CRC-32 of the payload
//! payload
//! ```
//!
//! Stages are listed in the order they were applied, the second stage
//! compresses the payload of the first.  Empty input has no stages.

use std::io::{Cursor,Read,Write,BufReader,BufWriter};
use crate::codec::{Method,ALL_METHODS};
use crate::{crc32,DYNERR,Error};

pub const SIGNATURE: [u8;6] = *b"BCODEC";
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
const MAX_STAGES: usize = 2;

/// Codec selection for a stage
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Choice {
    /// try every method and keep the smallest result
    Auto,
    Method(Method)
}

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// codec for the first stage
    pub primary: Choice,
    /// codec applied to the output of the first stage, if any
    pub secondary: Option<Choice>,
    /// return error if the expanded data is larger
    pub max_file_size: u64
}

pub const STD_OPTIONS: Options = Options {
    primary: Choice::Auto,
    secondary: None,
    max_file_size: u32::MAX as u64
};

/// One codec application as recorded in the frame
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Stage {
    pub method: Method,
    /// number of bytes the stage reproduces on expansion
    pub input_size: u64,
    /// serialized model
    pub model: Vec<u8>
}

/// Frame contents, the payload is the output of the last stage
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Frame {
    pub original_size: u64,
    pub stages: Vec<Stage>,
    pub payload: Vec<u8>
}

/// Compress with one method, returning the stage record and the payload
fn apply(dat: &[u8],method: Method) -> Result<(Stage,Vec<u8>),Error> {
    let model = method.build_model(dat)?;
    let payload = model.compress(dat)?;
    log::debug!("{}: {} bytes to {} bytes",method,dat.len(),payload.len());
    Ok((Stage { method, input_size: dat.len() as u64, model: model.serialize() },payload))
}

/// Resolve a choice, `Auto` picks the method with the smallest model plus payload,
/// the earlier method in `ALL_METHODS` wins a tie.
fn select(dat: &[u8],choice: Choice) -> Result<(Stage,Vec<u8>),Error> {
    if let Choice::Method(m) = choice {
        return apply(dat,m);
    }
    let mut best: Option<(Stage,Vec<u8>)> = None;
    for m in ALL_METHODS {
        match apply(dat,m) {
            Ok((stage,payload)) => {
                let cost = stage.model.len() + payload.len();
                let better = match &best {
                    Some((s,p)) => cost < s.model.len() + p.len(),
                    None => true
                };
                if better {
                    best = Some((stage,payload));
                }
            },
            Err(e) => log::warn!("{} skipped: {}",m,e)
        }
    }
    match best {
        Some((stage,payload)) => {
            log::info!("auto selected {}",stage.method);
            Ok((stage,payload))
        },
        None => Err(Error::InvalidArgument("no method could compress the data"))
    }
}

impl Frame {
    /// Run the stages that `opt` asks for
    pub fn create(dat: &[u8],opt: &Options) -> Result<Self,Error> {
        let mut ans = Self {
            original_size: dat.len() as u64,
            stages: Vec::new(),
            payload: Vec::new()
        };
        if dat.is_empty() {
            log::debug!("empty input, no stages");
            return Ok(ans);
        }
        let (stage,payload) = select(dat,opt.primary)?;
        ans.stages.push(stage);
        ans.payload = payload;
        if let Some(choice) = opt.secondary {
            let (stage,payload) = select(&ans.payload,choice)?;
            ans.stages.push(stage);
            ans.payload = payload;
        }
        Ok(ans)
    }
    /// Undo the stages in reverse order
    pub fn expand(&self) -> Result<Vec<u8>,Error> {
        if self.stages.is_empty() {
            return match self.original_size {
                0 => Ok(Vec::new()),
                _ => Err(Error::Corrupt("frame without stages must be empty"))
            };
        }
        let mut dat = self.payload.clone();
        for stage in self.stages.iter().rev() {
            let expected = usize::try_from(stage.input_size).map_err(|_| Error::FileTooLarge)?;
            let model = stage.method.deserialize_model(&stage.model)?;
            dat = model.expand(&dat,expected)?;
            log::debug!("undid {} stage, {} bytes",stage.method,dat.len());
        }
        if dat.len() as u64 != self.original_size {
            return Err(Error::LengthMismatch { expected: self.original_size as usize, actual: dat.len() });
        }
        Ok(dat)
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans = Vec::new();
        ans.extend_from_slice(&SIGNATURE);
        ans.push(VERSION_MAJOR);
        ans.push(VERSION_MINOR);
        ans.extend_from_slice(&u64::to_le_bytes(self.original_size));
        ans.push(self.stages.len() as u8);
        for stage in &self.stages {
            ans.push(stage.method.id());
            ans.extend_from_slice(&u64::to_le_bytes(stage.input_size));
            ans.extend_from_slice(&u32::to_le_bytes(stage.model.len() as u32));
            ans.extend_from_slice(&stage.model);
        }
        ans.extend_from_slice(&u64::to_le_bytes(self.payload.len() as u64));
        ans.extend_from_slice(&u32::to_le_bytes(crc32::compute(&self.payload)));
        ans.extend_from_slice(&self.payload);
        ans
    }
    /// Parse and verify a frame.  The checksum is checked here, the stages are
    /// only checked when expanding.
    pub fn from_bytes(dat: &[u8]) -> Result<Self,Error> {
        let mut rdr = FieldReader { dat, ptr: 0 };
        if rdr.take(6).map_err(|_| Error::FileFormatMismatch)? != SIGNATURE {
            log::error!("signature not found");
            return Err(Error::FileFormatMismatch);
        }
        let major = rdr.u8()?;
        let minor = rdr.u8()?;
        if major != VERSION_MAJOR {
            log::error!("unsupported frame version {}.{}",major,minor);
            return Err(Error::FileFormatMismatch);
        }
        let original_size = rdr.u64()?;
        let stage_count = rdr.u8()? as usize;
        if stage_count > MAX_STAGES {
            return Err(Error::Corrupt("too many stages"));
        }
        let mut stages = Vec::new();
        for _i in 0..stage_count {
            let method = Method::from_id(rdr.u8()?)?;
            let input_size = rdr.u64()?;
            let model_size = rdr.u32()? as usize;
            let model = rdr.take(model_size)?.to_vec();
            stages.push(Stage { method, input_size, model });
        }
        if let Some(first) = stages.first() {
            if first.input_size != original_size {
                return Err(Error::Corrupt("first stage size differs from original size"));
            }
        }
        let payload_size = usize::try_from(rdr.u64()?).map_err(|_| Error::Corrupt("payload size"))?;
        let crc = rdr.u32()?;
        let payload = rdr.take(payload_size)?.to_vec();
        if rdr.ptr != dat.len() {
            return Err(Error::Corrupt("trailing bytes after payload"));
        }
        if crc32::compute(&payload) != crc {
            log::error!("payload checksum mismatch");
            return Err(Error::ChecksumMismatch);
        }
        Ok(Self { original_size, stages, payload })
    }
}

/// little endian fields from a byte slice
struct FieldReader<'a> {
    dat: &'a [u8],
    ptr: usize
}

impl <'a> FieldReader<'a> {
    fn take(&mut self,n: usize) -> Result<&'a [u8],Error> {
        match self.ptr.checked_add(n) {
            Some(end) if end <= self.dat.len() => {
                let ans = &self.dat[self.ptr..end];
                self.ptr = end;
                Ok(ans)
            },
            _ => Err(Error::Corrupt("frame is truncated"))
        }
    }
    fn u8(&mut self) -> Result<u8,Error> {
        Ok(self.take(1)?[0])
    }
    fn u32(&mut self) -> Result<u32,Error> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0],b[1],b[2],b[3]]))
    }
    fn u64(&mut self) -> Result<u64,Error> {
        let mut buf = [0;8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read`, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write`, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut dat = Vec::new();
    reader.read_to_end(&mut dat)?;
    if dat.len() as u64 > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    let frame = Frame::create(&dat,opt)?;
    let bytes = frame.to_bytes();
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok((dat.len() as u64,bytes.len() as u64))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read`, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write`, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let mut dat = Vec::new();
    reader.read_to_end(&mut dat)?;
    let frame = Frame::from_bytes(&dat)?;
    if frame.original_size > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    let expanded = frame.expand()?;
    writer.write_all(&expanded)?;
    writer.flush()?;
    Ok((dat.len() as u64,expanded.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[test]
fn empty_frame() {
    let compressed = compress_slice(&[],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("42434f4445430100000000000000000000000000000000000000000000").unwrap());
    assert_eq!(expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed"),Vec::<u8>::new());
}

#[test]
fn single_stage_layout() {
    let mut opt = STD_OPTIONS;
    opt.primary = Choice::Method(Method::Huffman);
    let compressed = compress_slice(b"abab",&opt).expect("compression failed");
    let mut expected = hex::decode("42434f444543010004000000000000000101").unwrap();
    expected.extend_from_slice(&hex::decode("04000000000000000500000000016101620100000000000000").unwrap());
    expected.extend_from_slice(&u32::to_le_bytes(crc32::compute(&[0x50])));
    expected.push(0x50);
    assert_eq!(compressed,expected);
    assert_eq!(expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed"),b"abab".to_vec());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(20);
    for m in ALL_METHODS {
        let mut opt = STD_OPTIONS;
        opt.primary = Choice::Method(m);
        let compressed = compress_slice(test_data.as_bytes(),&opt).expect("compression failed");
        let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
        assert_eq!(test_data.as_bytes().to_vec(),expanded);
    }
}

#[test]
fn two_stages() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(20);
    let mut opt = STD_OPTIONS;
    opt.primary = Choice::Method(Method::Lz77);
    opt.secondary = Some(Choice::Method(Method::Huffman));
    let frame = Frame::create(test_data.as_bytes(),&opt).expect("compression failed");
    assert_eq!(frame.stages.len(),2);
    assert_eq!(frame.stages[0].method,Method::Lz77);
    assert_eq!(frame.stages[1].method,Method::Huffman);
    assert_eq!(frame.stages[0].input_size,test_data.len() as u64);
    let frame2 = Frame::from_bytes(&frame.to_bytes()).expect("parse failed");
    assert_eq!(frame,frame2);
    assert_eq!(frame2.expand().expect("expansion failed"),test_data.as_bytes().to_vec());
}

#[test]
fn auto_picks_smallest() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(20);
    let auto = Frame::create(test_data.as_bytes(),&STD_OPTIONS).expect("compression failed");
    for m in ALL_METHODS {
        let mut opt = STD_OPTIONS;
        opt.primary = Choice::Method(m);
        let fixed = Frame::create(test_data.as_bytes(),&opt).expect("compression failed");
        assert!(auto.to_bytes().len() <= fixed.to_bytes().len());
    }
    assert_eq!(auto.expand().unwrap(),test_data.as_bytes().to_vec());
}

#[test]
fn damaged_frames() {
    let compressed = compress_slice(b"I am Sam. Sam I am.",&STD_OPTIONS).expect("compression failed");
    // flip a payload bit
    let mut bad = compressed.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0x01;
    assert!(matches!(Frame::from_bytes(&bad),Err(Error::ChecksumMismatch)));
    // wrong signature
    let mut bad = compressed.clone();
    bad[0] = b'X';
    assert!(matches!(Frame::from_bytes(&bad),Err(Error::FileFormatMismatch)));
    // wrong major version
    let mut bad = compressed.clone();
    bad[6] = 2;
    assert!(matches!(Frame::from_bytes(&bad),Err(Error::FileFormatMismatch)));
    // truncated and extended
    assert!(Frame::from_bytes(&compressed[..compressed.len()-1]).is_err());
    let mut bad = compressed.clone();
    bad.push(0);
    assert!(Frame::from_bytes(&bad).is_err());
    assert!(matches!(Frame::from_bytes(b"BCO"),Err(Error::FileFormatMismatch)));
}

#[test]
fn size_limit() {
    let mut opt = STD_OPTIONS;
    opt.max_file_size = 4;
    assert!(compress_slice(b"abcde",&opt).is_err());
    let compressed = compress_slice(b"abcde",&STD_OPTIONS).unwrap();
    assert!(expand_slice(&compressed,&opt).is_err());
}

#[test]
fn stage_size_must_match() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(20);
    for secondary in [Method::Huffman,Method::Shannon,Method::Arithmetic] {
        let mut opt = STD_OPTIONS;
        opt.primary = Choice::Method(Method::Lz77);
        opt.secondary = Some(Choice::Method(secondary));
        let frame = Frame::create(test_data.as_bytes(),&opt).expect("compression failed");
        for delta in [-20i64,20] {
            let mut bad = frame.clone();
            bad.stages[1].input_size = (bad.stages[1].input_size as i64 + delta) as u64;
            // the stage sizes are outside the checksum
            let parsed = Frame::from_bytes(&bad.to_bytes()).expect("parse failed");
            assert!(parsed.expand().is_err(),"{} accepted a size off by {}",secondary,delta);
        }
    }
}
