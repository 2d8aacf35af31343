//! CRC-32 (ISO-HDLC, as used by zip and PNG)
//!
//! The lookup table is computed at compile time and never changes, so it can
//! be shared freely.

const POLYNOMIAL: u32 = 0xEDB88320; // reflected 0x04C11DB7
const INIT: u32 = 0xFFFF_FFFF;
const FINAL_XOR: u32 = 0xFFFF_FFFF;

const fn make_table() -> [u32;256] {
    let mut table = [0u32;256];
    let mut byte = 0;
    while byte < 256 {
        let mut crc = byte as u32;
        let mut bit = 0;
        while bit < 8 {
            if crc & 1 > 0 {
                crc = POLYNOMIAL ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[byte] = crc;
        byte += 1;
    }
    table
}

static TABLE: [u32;256] = make_table();

/// Incremental checksum, feed data with `update`, then call `finalize`.
#[derive(Clone,Debug)]
pub struct Crc32 {
    crc: u32
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            crc: INIT
        }
    }
    pub fn update(&mut self,buf: &[u8]) {
        for byte in buf {
            self.crc = TABLE[((self.crc ^ *byte as u32) & 0xff) as usize] ^ (self.crc >> 8);
        }
    }
    pub fn finalize(&self) -> u32 {
        self.crc ^ FINAL_XOR
    }
}

/// Checksum of a whole buffer
pub fn compute(buf: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(buf);
    crc.finalize()
}

#[test]
fn check_value() {
    assert_eq!(compute(b"123456789"),0xCBF43926);
    assert_eq!(compute(b""),0);
}

#[test]
fn incremental_matches_one_shot() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let mut crc = Crc32::new();
    for chunk in test_data.chunks(7) {
        crc.update(chunk);
    }
    assert_eq!(crc.finalize(),compute(test_data));
    assert_ne!(compute(b"123456780"),compute(b"123456789"));
}
