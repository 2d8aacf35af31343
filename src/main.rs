use clap::{arg,crate_version,Command};
use std::str::FromStr;
use bytecoder::{crc32,frame};
use bytecoder::codec::Method;
use bytecoder::frame::Choice;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        if std::io::stdin().read_line(&mut ans).is_err() {
            return false;
        }
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            return true;
        }
        return false;
    }
    true
}

fn parse_choice(name: &str) -> Result<Choice,bytecoder::Error> {
    match name {
        "auto" => Ok(Choice::Auto),
        _ => Ok(Choice::Method(Method::from_str(name)?))
    }
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `bytecoder compress -m huffman -i my_expanded -o my_compressed`
Two stages:    `bytecoder compress -m lz77 -s huffman -i my_expanded -o my_compressed`
Expand:        `bytecoder expand -i my_compressed -o my_expanded`
Checksum:      `bytecoder crc -i my_file`";

    let methods = ["auto","huffman","huff","h","arithmetic","arith","shannon","shan","s","rle","r","lz78","lz77"];

    let mut main_cmd = Command::new("bytecoder")
        .about("Compress and expand with classic coders")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .default_value("auto"))
        .arg(arg!(-s --secondary <METHOD> "algorithm applied to the output of the first").value_parser(methods)
            .required(false))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    main_cmd = main_cmd.subcommand(Command::new("crc")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .about("print the CRC-32 of a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let mut opt = frame::STD_OPTIONS;
        opt.primary = parse_choice(method)?;
        if let Some(secondary) = cmd.get_one::<String>("secondary") {
            opt.secondary = Some(parse_choice(secondary)?);
        }
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = frame::compress(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = frame::expand(&mut in_file,&mut out_file,&frame::STD_OPTIONS)?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("crc") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let dat = std::fs::read(path_in)?;
        println!("{:08x}",crc32::compute(&dat));
    }

    Ok(())
}
