use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::{PathBuf,Path};
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Make a copy in temporary directory with LF newlines.
// This insulates us against newline substitutions inserted by git or other layers.
fn copy_and_fix_newlines(in_file: PathBuf,temp_dir: &tempfile::TempDir) -> Result<PathBuf,Box<dyn std::error::Error>> {
    let txt = std::fs::read(in_file).expect("could not read input file");
    let new_txt: Vec<u8> = txt.into_iter().filter(|c| *c != 13).collect();
    let new_txt_path = temp_dir.path().join("converted.txt");
    match std::fs::write(&new_txt_path,new_txt) {
        Ok(_) => Ok(new_txt_path),
        Err(e) => Err(Box::new(e))
    }
}

/// compress with the given method(s), expand, and compare with the input
fn round_trip_test(method: &str,secondary: Option<&str>) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = copy_and_fix_newlines(Path::new("tests").join("sample.txt"),&temp_dir)?;
    let cmp_path = temp_dir.path().join("sample.bcx");
    let out_path = temp_dir.path().join("sample.txt");
    let mut cmd = Command::cargo_bin("bytecoder")?;
    cmd.arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path);
    if let Some(s) = secondary {
        cmd.arg("-s").arg(s);
    }
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("compressed"));
    let mut cmd = Command::cargo_bin("bytecoder")?;
    cmd.arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(in_path),std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(c),Ok(v2)) => {
            assert_eq!(v1,v2);
            assert_eq!(&c[0..6],b"BCODEC");
            if method == "huffman" {
                assert!(c.len() < v1.len());
            }
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn huffman_round_trip() -> STDRESULT {
    round_trip_test("huffman",None)
}

#[test]
fn shannon_round_trip() -> STDRESULT {
    round_trip_test("shannon",None)
}

#[test]
fn arithmetic_round_trip() -> STDRESULT {
    round_trip_test("arith",None)
}

#[test]
fn dictionary_round_trips() -> STDRESULT {
    round_trip_test("lz77",None)?;
    round_trip_test("lz78",None)?;
    round_trip_test("rle",None)
}

#[test]
fn two_stage_round_trip() -> STDRESULT {
    round_trip_test("lz77",Some("huffman"))?;
    round_trip_test("auto",Some("auto"))
}

#[test]
fn corrupt_frame_fails() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = copy_and_fix_newlines(Path::new("tests").join("sample.txt"),&temp_dir)?;
    let cmp_path = temp_dir.path().join("sample.bcx");
    let out_path = temp_dir.path().join("sample.txt");
    Command::cargo_bin("bytecoder")?
        .arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .assert()
        .success();
    let mut dat = std::fs::read(&cmp_path)?;
    let last = dat.len() - 1;
    dat[last] ^= 0x80;
    std::fs::write(&cmp_path,dat)?;
    Command::cargo_bin("bytecoder")?
        .arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ChecksumMismatch"));
    Ok(())
}

#[test]
fn crc_of_file() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("check.txt");
    std::fs::write(&path,"123456789")?;
    Command::cargo_bin("bytecoder")?
        .arg("crc")
        .arg("-i").arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("cbf43926"));
    Ok(())
}

#[test]
fn unknown_method_rejected() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = copy_and_fix_newlines(Path::new("tests").join("sample.txt"),&temp_dir)?;
    Command::cargo_bin("bytecoder")?
        .arg("compress")
        .arg("-m").arg("zip")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("out.bcx"))
        .assert()
        .failure();
    Ok(())
}
